//! A small interactive shell with job control.
//!
//! Commands run either in the foreground, blocking the shell until they exit,
//! or in the background as tracked jobs that are reaped between prompts. Every
//! child leads its own process group, and Ctrl-C is forwarded to the group of
//! the current foreground job only, so the shell and its background jobs are
//! left alone.
//!
//! The pieces, from the bottom up:
//! - [`launcher`] forks and execs a child in a fresh process group.
//! - [`signals`] holds the [`ForegroundIndicator`] and the SIGINT
//!   [`SignalRouter`] that reads it.
//! - [`job_table`] keeps the [`JobTable`] of launched, not yet reaped jobs.
//! - [`dispatcher`] runs commands in the foreground or background and reaps.
//! - [`Interpreter`] ties these to line parsing, builtins and the prompt.

mod builtin;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod job;
pub mod job_table;
pub mod launcher;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod signals;

pub use config::Config;
pub use dispatcher::{Dispatcher, Outcome};
pub use error::JobError;
pub use interpreter::Interpreter;
pub use job::{GroupId, Job, JobId, JobState, ProcessId};
pub use job_table::{JobEvent, JobTable};
pub use signals::{ForegroundIndicator, SignalRouter};
