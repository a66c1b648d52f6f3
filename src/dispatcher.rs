use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::{JobError, Result};
use crate::job::{Job, JobId, JobState, ProcessId};
use crate::job_table::{JobEvent, JobTable};
use crate::launcher::{launch, status_code};
use crate::signals::{ForegroundIndicator, InterruptBlock};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What became of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A foreground command ran to completion.
    Finished(ExitCode),
    /// A foreground command was stopped; it stays in the table.
    Stopped { id: JobId, pid: ProcessId },
    /// A background job was started and is still running.
    Backgrounded { id: JobId, pid: ProcessId },
}

/// An executable ready to launch.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub path: &'a Path,
    pub argv: &'a [&'a str],
    /// Command line as typed, kept on the job record.
    pub command: &'a str,
    pub background: bool,
}

/// Runs resolved commands as jobs and keeps the job table current.
///
/// The dispatcher owns the [`JobTable`] and is the only writer of the
/// [`ForegroundIndicator`]: the indicator names a group exactly while the
/// dispatcher is blocked waiting on it.
pub struct Dispatcher {
    jobs: JobTable,
    foreground: Arc<ForegroundIndicator>,
}

impl Dispatcher {
    pub fn new(jobs: JobTable, foreground: Arc<ForegroundIndicator>) -> Self {
        Self { jobs, foreground }
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn foreground(&self) -> &Arc<ForegroundIndicator> {
        &self.foreground
    }

    /// Run `req` in the foreground or as a background job, as it asks.
    ///
    /// # Arguments
    /// * `req` - The resolved executable and its command line.
    /// * `env` - Variables and working directory handed to the child.
    ///
    /// # Returns
    /// What became of the job, or why it could not be started or waited on.
    pub fn dispatch(&mut self, req: Request<'_>, env: &Environment) -> Result<Outcome> {
        if req.background {
            self.run_background(req, env)
        } else {
            self.run_foreground(req, env)
        }
    }

    /// Launch, mark as foreground and block until the child exits or stops.
    ///
    /// A job that stops is kept as `Stopped` only while the table has room for
    /// it; otherwise it is killed and the capacity error returned.
    pub fn run_foreground(&mut self, req: Request<'_>, env: &Environment) -> Result<Outcome> {
        let (id, pid, block) = self.start(req, env, JobState::Foreground)?;

        self.foreground.set(pid.as_group());
        drop(block);
        let waited = wait_foreground(pid);
        self.foreground.clear();

        match waited {
            Ok(None) => {
                if let Err(full) = self.jobs.ensure_room(JobState::Stopped) {
                    warn!(%id, %pid, "no room to keep stopped job, killing it");
                    let _ = killpg(pid.as_group().as_pid(), Signal::SIGKILL);
                    let _ = waitpid(pid.as_pid(), None);
                    self.jobs.remove(id);
                    return Err(full);
                }
                self.jobs.transition(id, JobState::Stopped)?;
                info!(%id, %pid, "foreground job stopped");
                Ok(Outcome::Stopped { id, pid })
            }
            Ok(Some(code)) => {
                self.jobs.transition(id, JobState::Done)?;
                self.jobs.remove(id);
                debug!(%id, %pid, code, "foreground job finished");
                Ok(Outcome::Finished(code))
            }
            Err(source) => {
                let err = JobError::Reap { id, pid, source };
                warn!("{err}");
                self.jobs.remove(id);
                Err(err)
            }
        }
    }

    /// Launch as a background job and return without waiting.
    pub fn run_background(&mut self, req: Request<'_>, env: &Environment) -> Result<Outcome> {
        let (id, pid, _block) = self.start(req, env, JobState::Background)?;
        info!(%id, %pid, command = req.command, "background job started");
        Ok(Outcome::Backgrounded { id, pid })
    }

    /// Report background jobs that finished or stopped since the last call.
    pub fn reap(&mut self) -> Vec<JobEvent> {
        self.jobs.reap_completed()
    }

    /// Hang up every tracked job and forget it. Does not wait for them.
    pub fn hang_up_all(&mut self) -> Vec<Job> {
        let jobs = self.jobs.drain();
        for job in &jobs {
            let group = job.group_id.as_pid();
            if let Err(e) = killpg(group, Signal::SIGHUP) {
                debug!(id = %job.id, "SIGHUP: {e}");
            }
            // Stopped jobs would not see the hangup otherwise.
            let _ = killpg(group, Signal::SIGCONT);
            let _ = waitpid(job.pid.as_pid(), Some(WaitPidFlag::WNOHANG));
        }
        if !jobs.is_empty() {
            info!(count = jobs.len(), "hung up remaining jobs");
        }
        jobs
    }

    /// Check for room, launch and register a job in `state`.
    ///
    /// SIGINT comes back blocked: the caller drops the guard once the
    /// indicator names the new group, so an early Ctrl-C is not swallowed.
    fn start(
        &mut self,
        req: Request<'_>,
        env: &Environment,
        state: JobState,
    ) -> Result<(JobId, ProcessId, InterruptBlock)> {
        self.jobs.ensure_room(state)?;
        let block = InterruptBlock::new().map_err(|source| JobError::Launch {
            command: req.command.to_string(),
            source,
        })?;
        let pid = launch(req.path, req.argv, env)?;
        match self.jobs.register(pid, pid.as_group(), state, req.command) {
            Ok(id) => Ok((id, pid, block)),
            Err(e) => {
                // Not trackable: don't leave it running behind our back.
                let _ = killpg(pid.as_group().as_pid(), Signal::SIGKILL);
                let _ = waitpid(pid.as_pid(), None);
                Err(e)
            }
        }
    }
}

/// Block until `pid` exits (`Some(code)`) or stops (`None`).
fn wait_foreground(pid: ProcessId) -> std::result::Result<Option<ExitCode>, Errno> {
    loop {
        match waitpid(pid.as_pid(), Some(WaitPidFlag::WUNTRACED)) {
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
            Ok(WaitStatus::Stopped(..)) => return Ok(None),
            Ok(status) => {
                if let Some(code) = status_code(status) {
                    return Ok(Some(code));
                }
            }
        }
    }
}
