use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::ShellError;
use crate::shell::environment::Environment;
use crate::shell::parser::ast::{Pipeline, Stage};
use crate::shell::signals;
use crate::utils::path;

/// Completion of one dispatched pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitResult {
    Code(i32),
    Signaled(i32),
    /// The foreground group was stopped (Ctrl-Z); the caller registers it
    /// as a stopped job.
    Stopped,
}

impl ExitResult {
    pub fn status(&self) -> i32 {
        match self {
            ExitResult::Code(code) => *code,
            ExitResult::Signaled(sig) => 128 + sig,
            ExitResult::Stopped => 128 + Signal::SIGTSTP as i32,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, ExitResult::Code(0))
    }
}

/// Handle to a backgrounded pipeline: the representative (last stage) pid
/// and the pipeline's process group. Ownership passes to the job table the
/// moment `execute` returns.
#[derive(Debug, Clone, Copy)]
pub struct ProcessHandle {
    pub pid: Pid,
    pub pgid: Pid,
}

pub struct Executor;

impl Executor {
    /// Launches every stage of `pipeline` left to right, wiring stdio per
    /// the stage redirections. Foreground dispatch hands the terminal to
    /// the new group and blocks until it finishes or stops; background
    /// dispatch returns immediately with the group's handle.
    ///
    /// A stage that fails to spawn aborts the remaining stages but leaves
    /// already-spawned ones running, mirroring normal pipeline semantics.
    pub fn execute(
        pipeline: &Pipeline,
        background: bool,
        env: &Environment,
    ) -> Result<(ExitResult, Option<ProcessHandle>), ShellError> {
        let mut children: Vec<Child> = Vec::new();
        let mut pgid: Option<Pid> = None;
        let mut prev_stdout: Option<ChildStdout> = None;
        let count = pipeline.stages.len();

        for (i, stage) in pipeline.stages.iter().enumerate() {
            let is_last = i + 1 == count;
            match Self::spawn_stage(stage, env, pgid, prev_stdout.take(), is_last) {
                Ok(mut child) => {
                    if pgid.is_none() {
                        pgid = Some(Pid::from_raw(child.id() as i32));
                    }
                    prev_stdout = child.stdout.take();
                    children.push(child);
                }
                Err(err) => {
                    if let ShellError::CommandNotFound(name) = &err {
                        let suggestions = path::suggest_similar(name, 3);
                        if !suggestions.is_empty() {
                            println!("Did you mean: {}?", suggestions.join(", "));
                        }
                    }
                    return Err(err);
                }
            }
        }

        let pgid = match pgid {
            Some(pgid) => pgid,
            None => return Ok((ExitResult::Code(0), None)),
        };
        let pids: Vec<Pid> = children
            .iter()
            .map(|c| Pid::from_raw(c.id() as i32))
            .collect();
        let last_pid = pids[pids.len() - 1];
        let handle = ProcessHandle {
            pid: last_pid,
            pgid,
        };

        if background {
            debug!("backgrounded group {} (representative {})", pgid, last_pid);
            return Ok((ExitResult::Code(0), Some(handle)));
        }

        signals::give_terminal_to(pgid);
        let result = Self::wait_foreground(pgid, &pids, last_pid);
        signals::reclaim_terminal();

        match result {
            ExitResult::Stopped => Ok((ExitResult::Stopped, Some(handle))),
            other => Ok((other, None)),
        }
    }

    fn spawn_stage(
        stage: &Stage,
        env: &Environment,
        pgid: Option<Pid>,
        prev_stdout: Option<ChildStdout>,
        is_last: bool,
    ) -> Result<Child, ShellError> {
        let args: Vec<String> = stage.args.iter().map(|arg| env.expand(arg)).collect();
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| ShellError::Spawn("empty stage".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(rest);
        cmd.env_clear();
        cmd.envs(env.iter());

        // Explicit `<` beats the previous stage's pipe; the first stage
        // without either inherits the terminal.
        if let Some(path) = &stage.stdin {
            let file = File::open(path)?;
            cmd.stdin(Stdio::from(file));
        } else if let Some(prev) = prev_stdout {
            cmd.stdin(Stdio::from(prev));
        } else {
            cmd.stdin(Stdio::inherit());
        }

        if let Some(redirect) = &stage.stdout {
            let mut options = OpenOptions::new();
            options.write(true).create(true);
            if redirect.append {
                options.append(true);
            } else {
                options.truncate(true);
            }
            let file = options.open(&redirect.path)?;
            cmd.stdout(Stdio::from(file));
        } else if !is_last {
            cmd.stdout(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
        }

        if let Some(path) = &stage.stderr {
            let file = File::create(path)?;
            cmd.stderr(Stdio::from(file));
        } else {
            cmd.stderr(Stdio::inherit());
        }

        // First stage leads a fresh process group; the rest join it. The
        // group is the unit of signal delivery and fg/bg transfer.
        cmd.process_group(pgid.map_or(0, |p| p.as_raw()));

        debug!("spawning {:?}", args);
        cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ShellError::CommandNotFound(program.clone()),
            ErrorKind::PermissionDenied => ShellError::PermissionDenied(program.clone()),
            _ => ShellError::Spawn(e.to_string()),
        })
    }

    /// Reaps every member of the foreground group, returning the last
    /// stage's status. A stop of any member stops the whole job.
    fn wait_foreground(pgid: Pid, pids: &[Pid], last_pid: Pid) -> ExitResult {
        let mut result = ExitResult::Code(0);
        let mut remaining = pids.len();

        while remaining > 0 {
            match waitpid(
                Pid::from_raw(-pgid.as_raw()),
                Some(WaitPidFlag::WUNTRACED),
            ) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    remaining -= 1;
                    if pid == last_pid {
                        result = ExitResult::Code(code);
                    }
                }
                Ok(WaitStatus::Signaled(pid, sig, _core_dumped)) => {
                    remaining -= 1;
                    if pid == last_pid {
                        result = ExitResult::Signaled(sig as i32);
                    }
                }
                Ok(WaitStatus::Stopped(_, _)) => return ExitResult::Stopped,
                Ok(_) => {}
                Err(Errno::ECHILD) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    error!("unexpected waitpid error: {}", e);
                    break;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::shell::parser;
    use crate::shell::parser::ast::Node;
    use std::time::Instant;

    fn pipeline(line: &str) -> Pipeline {
        match parser::parse(line).unwrap() {
            Node::Pipeline(pipeline) => pipeline,
            other => panic!("expected pipeline, got {:?}", other),
        }
    }

    fn temp_file(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mysh_exec_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_single_stage_redirect_round_trip() {
        let _guard = crate::shell::test_support::reap_lock();
        let out = temp_file("echo.txt");
        let line = format!("echo hello world > {}", out.display());
        let env = Environment::from_process();
        let (result, handle) = Executor::execute(&pipeline(&line), false, &env).unwrap();
        assert_eq!(result, ExitResult::Code(0));
        assert!(handle.is_none());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello world\n");
        std::fs::remove_file(&out).unwrap();
    }

    #[test]
    fn test_pipeline_wires_stages() {
        let _guard = crate::shell::test_support::reap_lock();
        let out = temp_file("wc.txt");
        let line = format!("printf 'a\\nb\\n' | wc -l > {}", out.display());
        let env = Environment::from_process();
        let (result, _) = Executor::execute(&pipeline(&line), false, &env).unwrap();
        assert_eq!(result, ExitResult::Code(0));
        let count = std::fs::read_to_string(&out).unwrap();
        assert_eq!(count.trim(), "2");
        std::fs::remove_file(&out).unwrap();
    }

    #[test]
    fn test_background_returns_immediately_in_new_group() {
        let _guard = crate::shell::test_support::reap_lock();
        let env = Environment::from_process();
        let started = Instant::now();
        let (result, handle) = Executor::execute(&pipeline("sleep 5"), true, &env).unwrap();
        assert!(started.elapsed().as_secs() < 2);
        assert_eq!(result, ExitResult::Code(0));
        let handle = handle.unwrap();
        assert_eq!(handle.pid, handle.pgid);
        // clean up: kill and reap
        let _ = nix::sys::signal::killpg(handle.pgid, Signal::SIGKILL);
        let _ = waitpid(handle.pid, None);
    }

    #[test]
    fn test_command_not_found() {
        let env = Environment::from_process();
        let err = Executor::execute(&pipeline("no-such-command-xyzzy"), false, &env).unwrap_err();
        assert!(matches!(err, ShellError::CommandNotFound(_)));
        assert_eq!(err.status(), 127);
    }

    #[test]
    fn test_missing_input_file_aborts_dispatch() {
        let env = Environment::from_process();
        let err =
            Executor::execute(&pipeline("cat < /nonexistent/mysh-in"), false, &env).unwrap_err();
        assert!(matches!(err, ShellError::Io(_)));
    }

    #[test]
    fn test_nonzero_exit_code_surfaces() {
        let _guard = crate::shell::test_support::reap_lock();
        let env = Environment::from_process();
        let (result, _) = Executor::execute(&pipeline("false"), false, &env).unwrap();
        assert_eq!(result, ExitResult::Code(1));
        assert!(!result.success());
    }

    #[test]
    fn test_env_expansion_in_args() {
        let _guard = crate::shell::test_support::reap_lock();
        let out = temp_file("env.txt");
        let mut env = Environment::from_process();
        env.set("GREETING".to_string(), "hi".to_string());
        let line = format!("echo $GREETING > {}", out.display());
        let (result, _) = Executor::execute(&pipeline(&line), false, &env).unwrap();
        assert_eq!(result, ExitResult::Code(0));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hi\n");
        std::fs::remove_file(&out).unwrap();
    }
}
