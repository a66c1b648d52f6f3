//! Interrupt forwarding to the foreground job.
//!
//! The only state shared with the signal handler is [`ForegroundIndicator`], a
//! single atomic. The handler loads it and calls `killpg`, nothing else: it
//! never allocates, locks, or looks at the job table.
//!
//! Between `fork` and the indicator being set, SIGINT is held back with an
//! [`InterruptBlock`]: the parent sees the interrupt only once it can name the
//! new group, and the child only once it has dropped the shell's handler.

use crate::job::GroupId;
use nix::sys::signal::{SigSet, SigmaskHow, Signal, killpg, pthread_sigmask};
use signal_hook::SigId;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::debug;

const NO_FOREGROUND: i32 = 0;

/// Process group of the job currently running in the foreground, if any.
///
/// Written by the dispatcher around its blocking wait, read from signal context.
#[derive(Debug, Default)]
pub struct ForegroundIndicator {
    group: AtomicI32,
}

impl ForegroundIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, group: GroupId) {
        self.group.store(group.as_raw(), Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.group.store(NO_FOREGROUND, Ordering::SeqCst);
    }

    pub fn get(&self) -> Option<GroupId> {
        match self.group.load(Ordering::SeqCst) {
            NO_FOREGROUND => None,
            raw => Some(GroupId::from_raw(raw)),
        }
    }

    /// Send `signal` to the foreground group. Returns whether one was set.
    ///
    /// Safe to call from a signal handler.
    pub fn forward(&self, signal: Signal) -> bool {
        let raw = self.group.load(Ordering::SeqCst);
        if raw <= NO_FOREGROUND {
            return false;
        }
        let _ = killpg(GroupId::from_raw(raw).as_pid(), signal);
        true
    }
}

/// The set holding only SIGINT.
pub(crate) fn interrupt_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set
}

/// Keeps SIGINT blocked on the calling thread until dropped, then restores
/// the previous mask. A SIGINT raised meanwhile stays pending and is handled
/// on drop.
#[must_use = "SIGINT is unblocked as soon as the guard is dropped"]
pub struct InterruptBlock {
    previous: SigSet,
}

impl InterruptBlock {
    pub fn new() -> nix::Result<Self> {
        let mut previous = SigSet::empty();
        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&interrupt_set()), Some(&mut previous))?;
        Ok(Self { previous })
    }
}

impl Drop for InterruptBlock {
    fn drop(&mut self) {
        if let Err(e) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
            debug!("restoring signal mask: {e}");
        }
    }
}

/// Registration of the SIGINT handler. Unregisters on drop.
pub struct SignalRouter {
    id: Option<SigId>,
}

impl SignalRouter {
    /// Route SIGINT to whatever `indicator` names. With no foreground job the
    /// signal is swallowed, so the shell itself survives Ctrl-C.
    pub fn install(indicator: Arc<ForegroundIndicator>) -> io::Result<Self> {
        // SAFETY: the closure only performs an atomic load and a kill syscall,
        // both async-signal-safe.
        let id = unsafe {
            signal_hook::low_level::register(signal_hook::consts::SIGINT, move || {
                indicator.forward(Signal::SIGINT);
            })
        }?;
        debug!("SIGINT router installed");
        Ok(Self { id: Some(id) })
    }

    pub fn uninstall(mut self) {
        self.unregister();
    }

    fn unregister(&mut self) {
        if let Some(id) = self.id.take() {
            signal_hook::low_level::unregister(id);
            debug!("SIGINT router removed");
        }
    }
}

impl Drop for SignalRouter {
    fn drop(&mut self) {
        self.unregister();
    }
}
