//! Identifiers and records for jobs tracked by the shell.

use std::fmt;

use nix::unistd::Pid;

/// Shell-local job number, allocated sequentially and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating-system process id of a job leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(Pid);

impl ProcessId {
    pub fn from_raw(raw: i32) -> Self {
        Self(Pid::from_raw(raw))
    }

    pub fn as_raw(self) -> i32 {
        self.0.as_raw()
    }

    pub fn as_pid(self) -> Pid {
        self.0
    }

    /// The group a job leader heads: every job is its own process group.
    pub fn as_group(self) -> GroupId {
        GroupId(self.0)
    }
}

impl From<Pid> for ProcessId {
    fn from(pid: Pid) -> Self {
        Self(pid)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-group id. Kept apart from [`ProcessId`] so a group is never
/// signalled where a single process was meant, or the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(Pid);

impl GroupId {
    pub fn from_raw(raw: i32) -> Self {
        Self(Pid::from_raw(raw))
    }

    pub fn as_raw(self) -> i32 {
        self.0.as_raw()
    }

    pub fn as_pid(self) -> Pid {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Foreground,
    Background,
    Stopped,
    Done,
}

impl JobState {
    /// Whether `self -> next` is a move the job lifecycle allows.
    ///
    /// Resuming a stopped job is not supported, so `Stopped` only leads to `Done`.
    pub fn can_become(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Foreground, Done)
                | (Background, Done)
                | (Foreground, Stopped)
                | (Background, Stopped)
                | (Stopped, Done)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Foreground => "Foreground",
            JobState::Background => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        };
        f.pad(s)
    }
}

/// One process the shell launched and has not yet reaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub pid: ProcessId,
    pub group_id: GroupId,
    pub state: JobState,
    /// Command line as typed, used for notices and `jobs`.
    pub command: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_heads_its_own_group() {
        let pid = ProcessId::from_raw(4242);
        assert_eq!(pid.as_group().as_raw(), 4242);
        assert_eq!(pid.as_group(), GroupId::from_raw(4242));
    }

    #[test]
    fn test_lifecycle_moves() {
        use JobState::*;
        assert!(Foreground.can_become(Done));
        assert!(Background.can_become(Done));
        assert!(Background.can_become(Stopped));
        assert!(Stopped.can_become(Done));

        assert!(!Done.can_become(Background));
        assert!(!Stopped.can_become(Foreground));
        assert!(!Stopped.can_become(Background));
        assert!(!Foreground.can_become(Background));
        assert!(!Background.can_become(Foreground));
    }
}
