use std::collections::BTreeMap;
use std::env;

use log::debug;
use once_cell::sync::Lazy;

use crate::error::ShellError;
use crate::shell::environment::Environment;
use crate::shell::job_table::{JobStatus, JobTable};
use crate::shell::parser::ast::Pipeline;

static BUILTIN_HELP: Lazy<Vec<(&str, &str)>> = Lazy::new(|| {
    vec![
        ("cd", "Change the current directory"),
        ("exit", "Exit the shell"),
        ("alias", "Create or list command aliases"),
        ("unalias", "Remove an alias"),
        ("export", "Set an environment variable"),
        ("unset", "Unset an environment variable"),
        ("jobs", "List background jobs"),
        ("fg", "Bring a job to the foreground"),
        ("bg", "Resume a job in the background"),
        ("disown", "Disown a job"),
        ("wait", "Wait for all background jobs"),
        ("help", "Show this help message"),
    ]
});

/// Reserved commands handled without invoking the executor. Also owns the
/// alias map applied to a pipeline's first stage before dispatch.
pub struct Builtins {
    aliases: BTreeMap<String, String>,
    exit_requested: bool,
}

impl Builtins {
    pub fn new() -> Self {
        Self {
            aliases: BTreeMap::new(),
            exit_requested: false,
        }
    }

    /// Whether a dispatched `exit` has asked the control loop to stop.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Rewrites the first stage's command through the alias map. Alias
    /// values are split with shell-word semantics.
    pub fn expand_alias(&self, pipeline: &mut Pipeline) -> Result<(), ShellError> {
        let stage = match pipeline.stages.first_mut() {
            Some(stage) if !stage.args.is_empty() => stage,
            _ => return Ok(()),
        };
        if let Some(value) = self.aliases.get(&stage.args[0]) {
            let mut words =
                shell_words::split(value).map_err(|e| ShellError::Parse(e.to_string()))?;
            if words.is_empty() {
                return Ok(());
            }
            debug!("alias {} -> {:?}", stage.args[0], words);
            words.extend(stage.args[1..].iter().cloned());
            stage.args = words;
        }
        Ok(())
    }

    /// Handles the pipeline if its first stage names a reserved command.
    /// Returns whether the command was claimed; job-control failures are
    /// claimed but surfaced as errors.
    pub fn dispatch(
        &mut self,
        pipeline: &Pipeline,
        env: &mut Environment,
        jobs: &mut JobTable,
        custom_names: &[String],
    ) -> Result<bool, ShellError> {
        let args = match pipeline.stages.first() {
            Some(stage) if !stage.args.is_empty() => &stage.args,
            _ => return Ok(false),
        };

        match args[0].as_str() {
            // claimed whatever the arguments, never passed to the executor
            "exit" => {
                self.exit_requested = true;
                Ok(true)
            }
            "cd" => self.builtin_cd(args),
            "alias" => self.builtin_alias(args),
            "unalias" => self.builtin_unalias(args),
            "export" => Self::builtin_export(args, env),
            "unset" => Self::builtin_unset(args, env),
            "help" => self.builtin_help(custom_names),
            "jobs" => {
                jobs.list();
                Ok(true)
            }
            "fg" => {
                let id = Self::parse_job_id(args, "fg")?;
                if let JobStatus::Stopped = jobs.fg(id)? {
                    if let Some(job) = jobs.jobs().iter().find(|job| job.id == id) {
                        println!("{}", job);
                    }
                }
                Ok(true)
            }
            "bg" => {
                let id = Self::parse_job_id(args, "bg")?;
                jobs.bg(id)?;
                Ok(true)
            }
            "disown" => {
                let id = Self::parse_job_id(args, "disown")?;
                jobs.disown(id)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn parse_job_id(args: &[String], name: &str) -> Result<usize, ShellError> {
        let arg = args
            .get(1)
            .ok_or_else(|| ShellError::Parse(format!("Usage: {} <job id>", name)))?;
        arg.parse::<usize>()
            .map_err(|_| ShellError::Parse(format!("{}: invalid job id: {}", name, arg)))
    }

    fn builtin_cd(&self, args: &[String]) -> Result<bool, ShellError> {
        let target = args.get(1).map(String::as_str).unwrap_or("~");
        let target = shellexpand::tilde(target);
        if let Err(e) = env::set_current_dir(target.as_ref()) {
            println!("cd: {}: {}", e, target);
        }
        Ok(true)
    }

    fn builtin_alias(&mut self, args: &[String]) -> Result<bool, ShellError> {
        if args.len() == 1 {
            for (name, value) in &self.aliases {
                println!("alias {}='{}'", name, value);
            }
        } else if let Some((name, value)) = args[1].split_once('=') {
            let value = value.trim_matches('\'').trim_matches('"');
            self.aliases.insert(name.to_string(), value.to_string());
        } else {
            println!("Usage: alias name='command'");
        }
        Ok(true)
    }

    fn builtin_unalias(&mut self, args: &[String]) -> Result<bool, ShellError> {
        match args.get(1) {
            Some(name) => {
                if self.aliases.remove(name).is_none() {
                    println!("unalias: {}: not found", name);
                }
            }
            None => println!("Usage: unalias name"),
        }
        Ok(true)
    }

    fn builtin_export(args: &[String], env: &mut Environment) -> Result<bool, ShellError> {
        match args.get(1).and_then(|arg| arg.split_once('=')) {
            Some((name, value)) => {
                let value = env.expand(value);
                env.set(name.to_string(), value);
            }
            None => println!("Usage: export VAR=value"),
        }
        Ok(true)
    }

    fn builtin_unset(args: &[String], env: &mut Environment) -> Result<bool, ShellError> {
        match args.get(1) {
            Some(name) => {
                if !env.unset(name) {
                    println!("unset: {}: not found", name);
                }
            }
            None => println!("Usage: unset VAR"),
        }
        Ok(true)
    }

    fn builtin_help(&self, custom_names: &[String]) -> Result<bool, ShellError> {
        println!("\nBuilt-in commands:");
        for (name, description) in BUILTIN_HELP.iter() {
            println!("  {:<8} - {}", name, description);
        }
        if !custom_names.is_empty() {
            println!("\nPlugin/custom commands:");
            for name in custom_names {
                println!("  {:<8} - (plugin/custom command)", name);
            }
        }
        println!();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::shell::parser;
    use crate::shell::parser::ast::Node;

    fn pipeline(line: &str) -> Pipeline {
        match parser::parse(line).unwrap() {
            Node::Pipeline(pipeline) => pipeline,
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    fn dispatch_pipeline(builtins: &mut Builtins, p: &Pipeline) -> Result<bool, ShellError> {
        let mut env = Environment::new();
        let mut jobs = JobTable::new();
        builtins.dispatch(p, &mut env, &mut jobs, &[])
    }

    fn dispatch(builtins: &mut Builtins, line: &str) -> Result<bool, ShellError> {
        dispatch_pipeline(builtins, &pipeline(line))
    }

    #[test]
    fn test_external_command_not_claimed() {
        let mut builtins = Builtins::new();
        assert!(!dispatch(&mut builtins, "ls -l").unwrap());
    }

    #[test]
    fn test_alias_set_and_expand() {
        let mut builtins = Builtins::new();
        assert!(dispatch(&mut builtins, "alias ll='ls -l'").unwrap());
        assert_eq!(builtins.aliases().get("ll").map(String::as_str), Some("ls -l"));

        let mut p = pipeline("ll /tmp");
        builtins.expand_alias(&mut p).unwrap();
        assert_eq!(p.stages[0].args, vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_unalias() {
        let mut builtins = Builtins::new();
        dispatch(&mut builtins, "alias gs='git status'").unwrap();
        assert!(dispatch(&mut builtins, "unalias gs").unwrap());
        assert!(builtins.aliases().is_empty());
    }

    #[test]
    fn test_export_and_unset() {
        let mut builtins = Builtins::new();
        let mut env = Environment::new();
        let mut jobs = JobTable::new();
        builtins
            .dispatch(&pipeline("export FOO=bar"), &mut env, &mut jobs, &[])
            .unwrap();
        assert_eq!(env.get("FOO"), Some("bar"));

        builtins
            .dispatch(&pipeline("unset FOO"), &mut env, &mut jobs, &[])
            .unwrap();
        assert_eq!(env.get("FOO"), None);
    }

    #[test]
    fn test_export_expands_existing_vars() {
        let mut builtins = Builtins::new();
        let mut env = Environment::new();
        env.set("BASE".to_string(), "/opt".to_string());
        let mut jobs = JobTable::new();
        builtins
            .dispatch(&pipeline("export DIR=$BASE/bin"), &mut env, &mut jobs, &[])
            .unwrap();
        assert_eq!(env.get("DIR"), Some("/opt/bin"));
    }

    #[test]
    fn test_exit_claimed_with_and_without_arguments() {
        let mut builtins = Builtins::new();
        assert!(dispatch(&mut builtins, "exit").unwrap());
        assert!(builtins.exit_requested());

        let mut builtins = Builtins::new();
        assert!(dispatch(&mut builtins, "exit 0").unwrap());
        assert!(builtins.exit_requested());
    }

    #[test]
    fn test_aliased_exit_is_claimed() {
        let mut builtins = Builtins::new();
        dispatch(&mut builtins, "alias quit='exit'").unwrap();
        let mut p = pipeline("quit");
        builtins.expand_alias(&mut p).unwrap();
        assert!(dispatch_pipeline(&mut builtins, &p).unwrap());
        assert!(builtins.exit_requested());
    }

    #[test]
    fn test_cd_failure_is_reported_not_fatal() {
        let mut builtins = Builtins::new();
        assert!(dispatch(&mut builtins, "cd /nonexistent/mysh-dir").unwrap());
    }

    #[test]
    fn test_fg_unknown_job() {
        let mut builtins = Builtins::new();
        let err = dispatch(&mut builtins, "fg 7").unwrap_err();
        assert!(matches!(err, ShellError::JobNotFound(7)));
    }

    #[test]
    fn test_fg_requires_id() {
        let mut builtins = Builtins::new();
        assert!(matches!(
            dispatch(&mut builtins, "fg"),
            Err(ShellError::Parse(_))
        ));
    }
}
