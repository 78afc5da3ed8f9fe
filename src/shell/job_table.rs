use std::fmt;

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::ShellError;
use crate::shell::executor::ProcessHandle;
use crate::shell::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Exited(i32),
    Signaled(i32),
}

impl JobStatus {
    fn terminated(&self) -> bool {
        matches!(self, JobStatus::Exited(_) | JobStatus::Signaled(_))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            JobStatus::Running => "Running",
            JobStatus::Stopped => "Stopped",
            JobStatus::Exited(_) => "Exited",
            JobStatus::Signaled(_) => "Signaled",
        };
        write!(f, "{}", status)
    }
}

/// One tracked background pipeline. `pid` is the representative (last
/// stage) process, `pgid` the group every signal targets.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub pid: Pid,
    pub pgid: Pid,
    pub command: String,
    pub status: JobStatus,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {} {}", self.id, self.pid, self.status, self.command)
    }
}

/// Table of background jobs. Only these methods mutate job status, and they
/// are only called from the single control thread. Ids increase
/// monotonically and are never reused; an entry disappears on `disown` or
/// after its termination has been reported once by `list`.
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, handle: ProcessHandle, command: String) -> Job {
        self.register(handle, command, JobStatus::Running)
    }

    /// Registers a foreground pipeline that was just stopped with Ctrl-Z.
    pub fn add_stopped(&mut self, handle: ProcessHandle, command: String) -> Job {
        self.register(handle, command, JobStatus::Stopped)
    }

    fn register(&mut self, handle: ProcessHandle, command: String, status: JobStatus) -> Job {
        let job = Job {
            id: self.next_id,
            pid: handle.pid,
            pgid: handle.pgid,
            command,
            status,
        };
        self.next_id += 1;
        debug!("job {} registered: group {}", job.id, job.pgid);
        self.jobs.push(job.clone());
        job
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Non-blocking probe and listing of every job. Entries whose
    /// termination has now been reported are dropped from the table.
    pub fn list(&mut self) {
        for job in &mut self.jobs {
            Self::probe(job);
            println!("{}", job);
        }
        self.jobs.retain(|job| !job.status.terminated());
    }

    fn probe(job: &mut Job) {
        let options = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
        match waitpid(job.pid, Some(options)) {
            Ok(WaitStatus::StillAlive) => {}
            Ok(WaitStatus::Exited(_, code)) => job.status = JobStatus::Exited(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => job.status = JobStatus::Signaled(sig as i32),
            Ok(WaitStatus::Stopped(_, _)) => job.status = JobStatus::Stopped,
            Ok(WaitStatus::Continued(_)) => job.status = JobStatus::Running,
            Ok(_) => {}
            // already reaped elsewhere: all we know is that it is gone
            Err(Errno::ECHILD) => job.status = JobStatus::Exited(0),
            Err(e) => error!("job {} probe error: {}", job.id, e),
        }
    }

    /// Moves a job to the foreground: terminal ownership to its group,
    /// SIGCONT, then block until the representative process terminates or
    /// the group stops again.
    pub fn fg(&mut self, id: usize) -> Result<JobStatus, ShellError> {
        let pos = self.position(id)?;
        let (pid, pgid) = (self.jobs[pos].pid, self.jobs[pos].pgid);

        signals::give_terminal_to(pgid);
        if let Err(e) = killpg(pgid, Signal::SIGCONT) {
            error!("fg: SIGCONT to group {} failed: {}", pgid, e);
        }
        self.jobs[pos].status = JobStatus::Running;

        let status = loop {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(_, code)) => break JobStatus::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => break JobStatus::Signaled(sig as i32),
                Ok(WaitStatus::Stopped(_, _)) => break JobStatus::Stopped,
                Ok(_) => continue,
                Err(Errno::EINTR) => continue,
                Err(_) => break JobStatus::Exited(0),
            }
        };
        signals::reclaim_terminal();

        self.jobs[pos].status = status;
        if status.terminated() {
            self.jobs.remove(pos);
        }
        Ok(status)
    }

    /// Resumes a job in the background: SIGCONT to the group, no terminal
    /// transfer.
    pub fn bg(&mut self, id: usize) -> Result<(), ShellError> {
        let pos = self.position(id)?;
        if let Err(e) = killpg(self.jobs[pos].pgid, Signal::SIGCONT) {
            error!("bg: SIGCONT to group {} failed: {}", self.jobs[pos].pgid, e);
        }
        self.jobs[pos].status = JobStatus::Running;
        println!("{}", self.jobs[pos]);
        Ok(())
    }

    /// Removes the entry without signaling; the process, if alive, runs on
    /// unmanaged.
    pub fn disown(&mut self, id: usize) -> Result<(), ShellError> {
        let pos = self.position(id)?;
        self.jobs.remove(pos);
        Ok(())
    }

    /// Blocks until every outstanding child of this process has been
    /// reaped, tracked or not. Returns immediately when there are none.
    pub fn wait_all(&mut self) {
        loop {
            match waitpid(Pid::from_raw(-1), None) {
                Ok(status) => {
                    if let Some(pid) = status.pid() {
                        self.jobs.retain(|job| job.pid != pid);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break,
                Err(e) => {
                    error!("wait: unexpected waitpid error: {}", e);
                    break;
                }
            }
        }
    }

    fn position(&self, id: usize) -> Result<usize, ShellError> {
        self.jobs
            .iter()
            .position(|job| job.id == id)
            .ok_or(ShellError::JobNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn fake_handle(pid: i32) -> ProcessHandle {
        ProcessHandle {
            pid: Pid::from_raw(pid),
            pgid: Pid::from_raw(pid),
        }
    }

    #[test]
    fn test_ids_strictly_increase_and_are_never_reused() {
        let mut table = JobTable::new();
        let a = table.add(fake_handle(900001), "sleep 100".to_string());
        let b = table.add(fake_handle(900002), "sleep 200".to_string());
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);

        table.disown(1).unwrap();
        let c = table.add(fake_handle(900003), "sleep 300".to_string());
        assert_eq!(c.id, 3);
        let ids: Vec<usize> = table.jobs().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_unknown_id_reports_job_not_found() {
        let mut table = JobTable::new();
        table.add(fake_handle(900010), "sleep 1".to_string());
        assert!(matches!(table.fg(42), Err(ShellError::JobNotFound(42))));
        assert!(matches!(table.bg(42), Err(ShellError::JobNotFound(42))));
        assert!(matches!(table.disown(42), Err(ShellError::JobNotFound(42))));
        assert_eq!(table.jobs().len(), 1);
    }

    #[test]
    fn test_list_reports_exited_once_then_removes() {
        let mut table = JobTable::new();
        // no child with this pid exists, so the probe sees ECHILD
        table.add(fake_handle(900020), "true".to_string());
        table.list();
        assert!(table.jobs().is_empty());
    }

    #[test]
    fn test_wait_all_without_children_returns_immediately() {
        let _guard = crate::shell::test_support::reap_lock();
        let mut table = JobTable::new();
        let started = std::time::Instant::now();
        table.wait_all();
        assert!(started.elapsed().as_secs() < 1);
    }

    #[test]
    fn test_wait_all_reaps_backgrounded_child() {
        let _guard = crate::shell::test_support::reap_lock();
        let child = std::process::Command::new("sleep")
            .arg("0.2")
            .spawn()
            .unwrap();
        let pid = Pid::from_raw(child.id() as i32);

        let mut table = JobTable::new();
        table.add(
            ProcessHandle { pid, pgid: pid },
            "sleep 0.2".to_string(),
        );
        table.wait_all();

        assert!(table.jobs().is_empty());
        // the child was reaped by wait_all, not left as a zombie
        assert_eq!(
            waitpid(pid, Some(WaitPidFlag::WNOHANG)),
            Err(Errno::ECHILD)
        );
    }

    #[test]
    fn test_display_format() {
        let job = Job {
            id: 2,
            pid: Pid::from_raw(4242),
            pgid: Pid::from_raw(4242),
            command: "sleep 10".to_string(),
            status: JobStatus::Running,
        };
        assert_eq!(job.to_string(), "[2] 4242 Running sleep 10");
    }
}
