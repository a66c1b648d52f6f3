use crate::env::Environment;
use crate::job_table::JobTable;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code: 0 is success, anything else a failure.
pub type ExitCode = i32;

/// The byte a process actually reports for `code`: shells keep it modulo 256,
/// so `exit 256` reads as 0 and `exit -1` as 255.
pub fn exit_status(code: ExitCode) -> u8 {
    code as u8
}

/// What an in-process command may touch: the environment mutably, the job
/// table read-only.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub jobs: &'a JobTable,
}

/// Object-safe trait for a command the shell runs without forking.
pub trait ExecutableCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_wraps_like_a_shell() {
        assert_eq!(exit_status(3), 3);
        assert_eq!(exit_status(130), 130);
        assert_eq!(exit_status(256), 0);
        assert_eq!(exit_status(257), 1);
        assert_eq!(exit_status(-1), 255);
    }
}
