use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::{JobError, Result};
use crate::job::ProcessId;
use crate::signals::interrupt_set;
use nix::errno::Errno;
use nix::sys::signal::{SigHandler, SigmaskHow, Signal, signal, sigprocmask};
use nix::sys::wait::WaitStatus;
use nix::unistd::{ForkResult, Pid, chdir, execve, fork, setpgid};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::debug;

/// Exit status a child reports when its program image could not be replaced.
pub const EXEC_FAILED: ExitCode = 127;

/// Start `path` as a child process leading its own process group.
///
/// `argv[0]` is passed through as typed. The child gets the variables and the
/// working directory of `env`. Everything the child needs is built before the
/// fork: between `fork` and `execve` the child only makes plain syscalls.
///
/// The child starts with the shell's SIGINT handler, which knows nothing
/// about it. It puts back the default action before unblocking SIGINT, so an
/// interrupt forwarded while it was still blocked kills it. A working
/// directory that cannot be entered is treated like a failed exec.
///
/// # Arguments
/// * `path` - Resolved program to execute.
/// * `argv` - Full argument vector, program name first.
/// * `env` - Variables and working directory for the child.
///
/// # Returns
/// The pid of the child, which is also its process group id.
pub fn launch(path: &Path, argv: &[&str], env: &Environment) -> Result<ProcessId> {
    let command = argv.first().copied().unwrap_or_default().to_string();
    let launch_err = |source| JobError::Launch {
        command: command.clone(),
        source,
    };

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| launch_err(Errno::EINVAL))?;
    let c_argv = argv
        .iter()
        .map(|arg| CString::new(*arg))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| launch_err(Errno::EINVAL))?;
    let c_env = env
        .vars
        .iter()
        .filter_map(|(k, v)| CString::new(format!("{k}={v}")).ok())
        .collect::<Vec<_>>();
    let c_dir = CString::new(env.current_dir.as_os_str().as_bytes()).ok();
    let interrupts = interrupt_set();

    // SAFETY: the child branch below only calls async-signal-safe functions
    // (setpgid, sigaction, sigprocmask, chdir, execve, _exit) on data
    // allocated before the fork.
    match unsafe { fork() }.map_err(launch_err)? {
        ForkResult::Child => {
            let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
            // SAFETY: installs the default action, no handler code involved.
            let _ = unsafe { signal(Signal::SIGINT, SigHandler::SigDfl) };
            let _ = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&interrupts), None);
            if let Some(dir) = &c_dir {
                if chdir(dir.as_c_str()).is_err() {
                    exit_child();
                }
            }
            let _ = execve(&c_path, &c_argv, &c_env);
            exit_child()
        }
        ForkResult::Parent { child } => {
            // Racing the child's own setpgid: whichever runs first creates the
            // group. EACCES means the child already exec'd, ESRCH that it is
            // already gone; both leave the group as it should be.
            match setpgid(child, child) {
                Ok(()) | Err(Errno::EACCES) | Err(Errno::ESRCH) => {}
                Err(e) => debug!(%child, "parent setpgid failed: {e}"),
            }
            debug!(%child, path = %path.display(), "launched");
            Ok(ProcessId::from(child))
        }
    }
}

/// Leave a forked child that never reached its program.
fn exit_child() -> ! {
    // SAFETY: `_exit` skips atexit handlers and stdio flushing, so nothing
    // copied from the parent runs twice.
    unsafe { nix::libc::_exit(EXEC_FAILED) }
}

/// Shell-style exit code for a finished child, or `None` if it has not finished.
///
/// Death by signal maps to `128 + signal`.
pub fn status_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(128 + signal as i32),
        _ => None,
    }
}
