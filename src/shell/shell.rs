use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use log::{debug, error, warn};

use crate::error::ShellError;
use crate::shell::builtins::Builtins;
use crate::shell::environment::Environment;
use crate::shell::executor::{Executor, ExitResult};
use crate::shell::history::HistoryManager;
use crate::shell::job_table::JobTable;
use crate::shell::parser;
use crate::shell::parser::ast::{Node, Pipeline};
use crate::shell::parser::lexer;
use crate::shell::plugins::{CustomCommand, Hooks, PluginRegistry};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::{load_theme, PromptProvider, PromptRegistry, Theme};

/// The control loop: reads one line per iteration, applies history
/// expansion, parses, and dispatches to builtins, the executor or the job
/// table. Owns no processes or descriptors itself.
pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    prompt: Box<dyn PromptProvider>,
    readline: ReadlineManager<'a>,
    history: HistoryManager,
    environment: Environment,
    builtins: Builtins,
    jobs: JobTable,
    hooks: Hooks,
    custom_commands: HashMap<String, CustomCommand>,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ShellError> {
        let mut custom_commands = HashMap::new();
        let mut hooks = Hooks::new();
        PluginRegistry::with_builtin_plugins().activate_all(&mut custom_commands, &mut hooks);

        Ok(Self {
            config,
            theme: load_theme(&config.theme),
            prompt: PromptRegistry::new().resolve(config),
            readline: ReadlineManager::new(config)?,
            history: HistoryManager::new(),
            environment: Environment::from_process(),
            builtins: Builtins::new(),
            jobs: JobTable::new(),
            hooks,
            custom_commands,
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("initializing mysh...");
        signals::setup_shell_signals();
        self.readline.load_history();

        if signals::stdin_is_tty() {
            println!(
                "{}",
                (self.theme.success_style)(self.theme.welcome_message.clone())
            );
        }
        debug!("mysh ready");

        self.run_loop()?;
        self.readline.save_history();

        debug!("leaving mysh...");
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            std::io::stdout().flush()?;
            let prompt = self.prompt.render();

            match self.readline.readline(&prompt) {
                Ok(line) => {
                    self.handle_input(&line);
                    if self.builtins.exit_requested() {
                        println!(
                            "{}",
                            (self.theme.success_style)(self.theme.exit_message.clone())
                        );
                        break;
                    }
                }
                Err(ReadlineError::Eof) => {
                    warn!("received EOF, leaving mysh...");
                    println!(
                        "\n{}",
                        (self.theme.warning_style)(self.theme.exit_message.clone())
                    );
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("interrupted at prompt");
                    println!();
                }
                Err(err) => {
                    error!("readline error: {}", err);
                    self.report_error(&ShellError::Readline(err));
                }
            }
        }
        Ok(())
    }

    /// Runs each non-blank, non-comment line of a script through the same
    /// dispatch path as interactive input.
    pub fn run_script(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        signals::setup_shell_signals();
        let content = fs::read_to_string(path)?;
        for line in content.lines() {
            let line = line.trim_end();
            if line.trim().is_empty() || line.trim().starts_with('#') {
                continue;
            }
            println!("{}$ {}", self.config.name, line);
            self.handle_input(line);
            if self.builtins.exit_requested() {
                break;
            }
        }
        Ok(())
    }

    pub fn handle_input(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        let (command_text, background) = split_background(trimmed);

        let expanded = self.history.expand(&command_text);
        if expanded.is_empty() {
            return;
        }
        if expanded != command_text {
            println!("{}", expanded);
        }
        self.history.add(&expanded);
        if let Err(e) = self.readline.add_history(line.to_string()) {
            warn!("failed to record history entry: {}", e);
        }
        debug!("dispatching: {}", expanded);

        match parser::parse(&expanded) {
            Ok(node) => self.dispatch(node, &expanded, background),
            Err(e) => self.report_error(&e),
        }
    }

    fn dispatch(&mut self, node: Node, line: &str, background: bool) {
        match node {
            Node::Wait => self.jobs.wait_all(),
            Node::Unsupported { kind, text } => {
                // reported, status 0, executes nothing
                println!("[executor] {}: {}", kind.label(), text);
            }
            Node::ParallelJobs(pipelines) => {
                for pipeline in pipelines {
                    let text = pipeline.to_string();
                    match Executor::execute(&pipeline, true, &self.environment) {
                        Ok((_, Some(handle))) => {
                            let job = self.jobs.add(handle, text);
                            println!("{}", job);
                        }
                        Ok((_, None)) => {}
                        Err(e) => self.report_error(&e),
                    }
                }
            }
            Node::Pipeline(pipeline) => self.dispatch_pipeline(pipeline, line, background),
        }
    }

    fn dispatch_pipeline(&mut self, mut pipeline: Pipeline, line: &str, background: bool) {
        if let Err(e) = self.builtins.expand_alias(&mut pipeline) {
            self.report_error(&e);
            return;
        }

        if let Some(args) = pipeline.stages.first().map(|s| s.args.clone()) {
            if let Some(command) = self.custom_commands.get(&args[0]) {
                if let Err(e) = command(&args[1..]) {
                    self.report_error(&e);
                }
                return;
            }
        }

        let custom_names: Vec<String> = self.custom_commands.keys().cloned().collect();
        match self.builtins.dispatch(
            &pipeline,
            &mut self.environment,
            &mut self.jobs,
            &custom_names,
        ) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                self.report_error(&e);
                return;
            }
        }

        self.hooks.run_pre_exec(line);
        let started = Instant::now();
        match Executor::execute(&pipeline, background, &self.environment) {
            Ok((result, handle)) => {
                if background {
                    if let Some(handle) = handle {
                        let job = self.jobs.add(handle, line.to_string());
                        println!("{}", job);
                    }
                } else if result == ExitResult::Stopped {
                    if let Some(handle) = handle {
                        let job = self.jobs.add_stopped(handle, line.to_string());
                        println!();
                        println!("{}", job);
                    }
                } else {
                    self.hooks.run_post_exec(line, &result);
                    if !result.success() {
                        eprintln!(
                            "{} {}",
                            (self.theme.error_style)(self.theme.error_symbol.clone()),
                            (self.theme.error_style)(format!("exit status {}", result.status()))
                        );
                    }
                }

                let elapsed = started.elapsed().as_secs_f64();
                if !background && elapsed > self.config.timing_threshold {
                    println!("[timing] Command took {:.2} seconds.", elapsed);
                }
            }
            Err(e) => {
                self.hooks.run_on_error(line, &e);
                self.report_error(&e);
            }
        }
    }

    fn report_error(&self, e: &ShellError) {
        warn!("{}", e);
        eprintln!(
            "{} {}",
            (self.theme.error_style)(self.theme.error_symbol.clone()),
            (self.theme.error_style)(e.to_string())
        );
    }
}

/// Strips one trailing unquoted `&`, the background marker, so the parser
/// never sees it. A quoted or escaped `&` stays part of the command.
fn split_background(trimmed: &str) -> (String, bool) {
    let mut segments = lexer::split_unquoted(trimmed, '&');
    let trailing = segments.len() > 1
        && segments
            .last()
            .map(|s| s.trim().is_empty())
            .unwrap_or(false);
    if trailing {
        segments.pop();
        (segments.join("&").trim().to_string(), true)
    } else {
        (trimmed.to_string(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_background_strips_trailing_ampersand() {
        assert_eq!(split_background("sleep 1 &"), ("sleep 1".to_string(), true));
        assert_eq!(split_background("ls -l"), ("ls -l".to_string(), false));
    }

    #[test]
    fn test_split_background_keeps_quoted_and_escaped_ampersand() {
        assert_eq!(
            split_background(r"echo \&"),
            (r"echo \&".to_string(), false)
        );
        assert_eq!(
            split_background("echo 'a &'"),
            ("echo 'a &'".to_string(), false)
        );
        assert_eq!(
            split_background(r#"echo "&""#),
            (r#"echo "&""#.to_string(), false)
        );
    }

    #[test]
    fn test_split_background_after_parallel_jobs() {
        assert_eq!(split_background("a & b &"), ("a & b".to_string(), true));
    }
}
