use std::collections::HashMap;

use log::debug;

use crate::error::ShellError;
use crate::shell::executor::ExitResult;

pub type CustomCommand = Box<dyn Fn(&[String]) -> Result<(), ShellError>>;
pub type PreExecHook = Box<dyn Fn(&str) -> Result<(), ShellError>>;
pub type PostExecHook = Box<dyn Fn(&str, &ExitResult) -> Result<(), ShellError>>;
pub type OnErrorHook = Box<dyn Fn(&str, &ShellError) -> Result<(), ShellError>>;

/// Typed event subscribers, invoked in registration order. A failing
/// subscriber is reported and never aborts the ones after it.
pub struct Hooks {
    pre_exec: Vec<(String, PreExecHook)>,
    post_exec: Vec<(String, PostExecHook)>,
    on_error: Vec<(String, OnErrorHook)>,
}

impl Hooks {
    pub fn new() -> Self {
        Self {
            pre_exec: Vec::new(),
            post_exec: Vec::new(),
            on_error: Vec::new(),
        }
    }

    pub fn subscribe_pre_exec(&mut self, name: &str, hook: PreExecHook) {
        self.pre_exec.push((name.to_string(), hook));
    }

    pub fn subscribe_post_exec(&mut self, name: &str, hook: PostExecHook) {
        self.post_exec.push((name.to_string(), hook));
    }

    pub fn subscribe_on_error(&mut self, name: &str, hook: OnErrorHook) {
        self.on_error.push((name.to_string(), hook));
    }

    pub fn run_pre_exec(&self, line: &str) {
        for (name, hook) in &self.pre_exec {
            if let Err(e) = hook(line) {
                println!("[plugin pre-exec error] {}: {}", name, e);
            }
        }
    }

    pub fn run_post_exec(&self, line: &str, result: &ExitResult) {
        for (name, hook) in &self.post_exec {
            if let Err(e) = hook(line, result) {
                println!("[plugin post-exec error] {}: {}", name, e);
            }
        }
    }

    pub fn run_on_error(&self, line: &str, error: &ShellError) {
        for (name, hook) in &self.on_error {
            if let Err(e) = hook(line, error) {
                println!("[plugin on-error error] {}: {}", name, e);
            }
        }
    }
}

/// What a plugin may extend at activation time.
pub struct PluginContext<'a> {
    pub commands: &'a mut HashMap<String, CustomCommand>,
    pub hooks: &'a mut Hooks,
}

pub trait Plugin {
    fn name(&self) -> &str;
    fn activate(&self, ctx: &mut PluginContext);
}

/// Explicit compiled-in plugin list, activated once at startup. No ambient
/// discovery.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn with_builtin_plugins() -> Self {
        Self {
            plugins: vec![Box::new(SamplePlugin)],
        }
    }

    pub fn activate_all(&self, commands: &mut HashMap<String, CustomCommand>, hooks: &mut Hooks) {
        for plugin in &self.plugins {
            debug!("activating plugin {}", plugin.name());
            let mut ctx = PluginContext {
                commands: &mut *commands,
                hooks: &mut *hooks,
            };
            plugin.activate(&mut ctx);
        }
    }
}

/// Ships a `hello` custom command and a post-exec log hook.
struct SamplePlugin;

impl Plugin for SamplePlugin {
    fn name(&self) -> &str {
        "sample"
    }

    fn activate(&self, ctx: &mut PluginContext) {
        ctx.commands.insert(
            "hello".to_string(),
            Box::new(|args| {
                println!("Hello from SamplePlugin! Args: {:?}", args);
                Ok(())
            }),
        );
        ctx.hooks.subscribe_post_exec(
            "sample-log",
            Box::new(|line, result| {
                debug!("command '{}' finished with status {}", line, result.status());
                Ok(())
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_builtin_plugins_register_hello() {
        let mut commands = HashMap::new();
        let mut hooks = Hooks::new();
        PluginRegistry::with_builtin_plugins().activate_all(&mut commands, &mut hooks);
        assert!(commands.contains_key("hello"));
        let hello = commands.get("hello").unwrap();
        assert!(hello(&["world".to_string()]).is_ok());
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();

        let first = Rc::clone(&calls);
        hooks.subscribe_pre_exec(
            "first",
            Box::new(move |_| {
                first.borrow_mut().push("first");
                Ok(())
            }),
        );
        let second = Rc::clone(&calls);
        hooks.subscribe_pre_exec(
            "second",
            Box::new(move |_| {
                second.borrow_mut().push("second");
                Ok(())
            }),
        );

        hooks.run_pre_exec("ls");
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_failing_hook_does_not_abort_later_subscribers() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();

        hooks.subscribe_on_error(
            "broken",
            Box::new(|_, _| Err(ShellError::Hook("boom".to_string()))),
        );
        let survivor = Rc::clone(&calls);
        hooks.subscribe_on_error(
            "survivor",
            Box::new(move |_, _| {
                survivor.borrow_mut().push("survivor");
                Ok(())
            }),
        );

        hooks.run_on_error("ls", &ShellError::Spawn("x".to_string()));
        assert_eq!(*calls.borrow(), vec!["survivor"]);
    }
}
