use crate::command::ExitCode;
use crate::error::{JobError, Result};
use crate::job::{GroupId, Job, JobId, JobState, ProcessId};
use crate::launcher::status_code;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

/// Default number of background jobs the shell keeps track of at once.
pub const DEFAULT_MAX_JOBS: usize = 50;

/// Something `reap_completed` noticed about a background job.
#[derive(Debug)]
pub enum JobEvent {
    /// The job exited; its record is gone.
    Done {
        id: JobId,
        pid: ProcessId,
        status: ExitCode,
        command: String,
    },
    /// The job was stopped by a signal and stays in the table.
    Stopped { id: JobId, pid: ProcessId },
    /// The child disappeared; the record was force-removed.
    Lost(JobError),
}

/// Jobs the shell has launched and not yet reaped, keyed by job id.
///
/// `capacity` bounds background and stopped jobs. One slot on top of that is
/// kept for the foreground job, so a full table never blocks a foreground
/// command.
#[derive(Debug)]
pub struct JobTable {
    jobs: BTreeMap<JobId, Job>,
    next_id: u32,
    capacity: usize,
}

impl JobTable {
    /// Creates an empty table.
    ///
    /// # Arguments
    /// * `capacity` - Most background and stopped jobs tracked at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: BTreeMap::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Jobs in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn foreground(&self) -> Option<&Job> {
        self.jobs
            .values()
            .find(|job| job.state == JobState::Foreground)
    }

    /// Jobs that occupy a capacity slot: everything but the foreground job.
    fn background_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|job| job.state != JobState::Foreground)
            .count()
    }

    /// Checks that the table has room for one more job in `state`.
    ///
    /// The dispatcher calls this before launching so a refused job never
    /// spawns a process, and again before keeping a foreground job that
    /// stopped.
    ///
    /// # Returns
    /// `ForegroundBusy` if a foreground job is already tracked, `Capacity` if
    /// background and stopped jobs already fill the table, `InvalidTransition`
    /// for `Done`.
    pub fn ensure_room(&self, state: JobState) -> Result<()> {
        match state {
            JobState::Foreground => match self.foreground() {
                Some(job) => Err(JobError::ForegroundBusy { running: job.id }),
                None => Ok(()),
            },
            JobState::Background | JobState::Stopped => {
                if self.background_count() >= self.capacity {
                    Err(JobError::Capacity {
                        capacity: self.capacity,
                    })
                } else {
                    Ok(())
                }
            }
            other => Err(JobError::InvalidTransition {
                id: JobId(self.next_id),
                from: None,
                to: other,
            }),
        }
    }

    /// Record a freshly launched job.
    ///
    /// # Arguments
    /// * `pid` - The child's pid.
    /// * `group_id` - Its process group, which must equal `pid`.
    /// * `state` - `Foreground` or `Background`; nothing starts out stopped.
    /// * `command` - Command line as typed, for notices and `jobs`.
    ///
    /// # Returns
    /// The new job id, never one handed out before. On error the table is
    /// left as it was.
    pub fn register(
        &mut self,
        pid: ProcessId,
        group_id: GroupId,
        state: JobState,
        command: impl Into<String>,
    ) -> Result<JobId> {
        if pid.as_group() != group_id {
            return Err(JobError::GroupMismatch {
                pid,
                group: group_id,
            });
        }
        if !matches!(state, JobState::Foreground | JobState::Background) {
            return Err(JobError::InvalidTransition {
                id: JobId(self.next_id),
                from: None,
                to: state,
            });
        }
        self.ensure_room(state)?;

        let id = JobId(self.next_id);
        self.next_id += 1;
        self.jobs.insert(
            id,
            Job {
                id,
                pid,
                group_id,
                state,
                command: command.into(),
            },
        );
        debug!(%id, %pid, ?state, "registered job");
        Ok(id)
    }

    /// Move job `id` to `new_state` if [`JobState::can_become`] allows it.
    ///
    /// An unknown id or an illegal move is a bookkeeping bug: it is logged at
    /// error level and reported as `InvalidTransition`, leaving the job as is.
    pub fn transition(&mut self, id: JobId, new_state: JobState) -> Result<()> {
        let Some(job) = self.jobs.get_mut(&id) else {
            error!(%id, ?new_state, "transition of unknown job");
            return Err(JobError::InvalidTransition {
                id,
                from: None,
                to: new_state,
            });
        };
        if !job.state.can_become(new_state) {
            error!(%id, from = ?job.state, to = ?new_state, "illegal job transition");
            return Err(JobError::InvalidTransition {
                id,
                from: Some(job.state),
                to: new_state,
            });
        }
        job.state = new_state;
        Ok(())
    }

    /// Forget job `id`, returning its record if it was tracked.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// Drop every record, returning them in id order.
    pub fn drain(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs).into_values().collect()
    }

    /// Poll every background or stopped job without blocking.
    ///
    /// Exited jobs move to `Done`, are removed and reported. Background jobs
    /// stopped by a signal become `Stopped` and are reported once. A child
    /// `waitpid` no longer knows about is removed and reported as `Lost`.
    /// Calling this when nothing has changed returns an empty list and leaves
    /// the table alone.
    ///
    /// # Returns
    /// One event per job whose state changed, in id order.
    pub fn reap_completed(&mut self) -> Vec<JobEvent> {
        let candidates: Vec<(JobId, ProcessId)> = self
            .jobs
            .values()
            .filter(|job| matches!(job.state, JobState::Background | JobState::Stopped))
            .map(|job| (job.id, job.pid))
            .collect();

        let mut events = Vec::new();
        for (id, pid) in candidates {
            let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED;
            match waitpid(pid.as_pid(), Some(flags)) {
                Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => {}
                Ok(WaitStatus::Stopped(..)) => {
                    if self.get(id).map(|job| job.state) == Some(JobState::Background) {
                        if self.transition(id, JobState::Stopped).is_ok() {
                            events.push(JobEvent::Stopped { id, pid });
                        }
                    }
                }
                Ok(status) => {
                    let Some(code) = status_code(status) else {
                        continue;
                    };
                    if let Err(e) = self.transition(id, JobState::Done) {
                        warn!("{e}");
                    }
                    if let Some(job) = self.remove(id) {
                        debug!(%id, %pid, code, "reaped background job");
                        events.push(JobEvent::Done {
                            id,
                            pid,
                            status: code,
                            command: job.command,
                        });
                    }
                }
                Err(source) => {
                    let err = JobError::Reap { id, pid, source };
                    warn!("{err}");
                    self.remove(id);
                    events.push(JobEvent::Lost(err));
                }
            }
        }
        events
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS)
    }
}
