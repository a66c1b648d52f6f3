use crate::job::{GroupId, JobId, JobState, ProcessId};
use thiserror::Error;

/// Failures of the job-control layer.
///
/// None of these terminate the shell: the interpreter prints them as a single
/// line and moves on to the next prompt.
#[derive(Debug, Error)]
pub enum JobError {
    /// The executable was found but the child could not be created.
    #[error("{command}: launch failed: {source}")]
    Launch {
        command: String,
        #[source]
        source: nix::Error,
    },

    #[error("job table full ({capacity} jobs), refusing to start another background job")]
    Capacity { capacity: usize },

    #[error("job {id}: invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        id: JobId,
        from: Option<JobState>,
        to: JobState,
    },

    #[error("job {running} already holds the foreground")]
    ForegroundBusy { running: JobId },

    #[error("process {pid} does not lead group {group}")]
    GroupMismatch { pid: ProcessId, group: GroupId },

    /// The child can no longer be waited on; its record has been dropped.
    #[error("job {id} (pid {pid}) vanished: {source}")]
    Reap {
        id: JobId,
        pid: ProcessId,
        #[source]
        source: nix::Error,
    },
}

pub type Result<T, E = JobError> = std::result::Result<T, E>;
