use crate::builtin;
use crate::command::{CommandFactory, Context, ExitCode};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, Outcome, Request};
use crate::env::Environment;
use crate::error::JobError;
use crate::job_table::{JobEvent, JobTable};
use crate::parser;
use crate::resolve::{Resolution, resolve};
use crate::signals::ForegroundIndicator;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, error};

/// Status of a command that could not be found.
pub const NOT_FOUND: ExitCode = 127;
/// Status of a line that did not parse.
pub const SYNTAX_ERROR: ExitCode = 2;
/// Status reported when a foreground job stops instead of exiting.
pub const STOPPED: ExitCode = 148;

/// The shell: classifies each line as builtin or executable and hands
/// executables to the [`Dispatcher`].
///
/// Example
/// ```no_run
/// use jobsh::{Config, ForegroundIndicator, Interpreter};
/// use std::sync::Arc;
///
/// let mut sh = Interpreter::new(&Config::default(), Arc::new(ForegroundIndicator::new()));
/// let mut out = Vec::new();
/// let mut err = Vec::new();
/// let code = sh.execute_line("/bin/true", &mut out, &mut err);
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
    dispatcher: Dispatcher,
}

impl Interpreter {
    pub fn new(config: &Config, foreground: Arc<ForegroundIndicator>) -> Self {
        Self {
            env: Environment::new(),
            builtins: builtin::factories(),
            dispatcher: Dispatcher::new(JobTable::new(config.max_jobs), foreground),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn jobs(&self) -> &JobTable {
        self.dispatcher.jobs()
    }

    pub fn should_exit(&self) -> bool {
        self.env.should_exit()
    }

    /// Run one input line. Failures are written to `err` as a single line and
    /// turned into a non-zero status; they never stop the shell.
    pub fn execute_line(&mut self, line: &str, out: &mut dyn Write, err: &mut dyn Write) -> ExitCode {
        match self.try_execute_line(line, out, err) {
            Ok(code) => code,
            Err(e) => {
                let _ = writeln!(err, "jobsh: {e:#}");
                1
            }
        }
    }

    fn try_execute_line(
        &mut self,
        line: &str,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let line = line.trim();
        let parsed = match parser::parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                writeln!(err, "jobsh: {e}")?;
                return Ok(SYNTAX_ERROR);
            }
        };
        if parsed.is_empty() {
            return Ok(0);
        }

        let words = parsed.expand(&self.env);
        let argv: Vec<&str> = words.iter().map(String::as_str).collect();
        let (name, args) = (argv[0], &argv[1..]);

        if let Some(cmd) = self.builtins.iter().find_map(|f| f.try_create(name, args)) {
            debug!(name, "builtin");
            let mut ctx = Context {
                env: &mut self.env,
                jobs: self.dispatcher.jobs(),
            };
            return cmd.execute(out, &mut ctx);
        }

        let path = match resolve(name, &self.env) {
            Resolution::Executable(path) => path,
            Resolution::NotExecutable => {
                writeln!(err, "command not found: {name}")?;
                return Ok(NOT_FOUND);
            }
        };
        debug!(name, path = %path.display(), "executable");

        let req = Request {
            path: &path,
            argv: &argv,
            command: line,
            background: parsed.background,
        };
        match self.dispatcher.dispatch(req, &self.env) {
            Ok(Outcome::Finished(code)) => Ok(code),
            Ok(Outcome::Backgrounded { id, pid }) => {
                writeln!(out, "[{id}] {pid}")?;
                Ok(0)
            }
            Ok(Outcome::Stopped { id, pid }) => {
                writeln!(out, "[{id}] Stopped {pid} {line}")?;
                Ok(STOPPED)
            }
            Err(e) => {
                if matches!(
                    e,
                    JobError::InvalidTransition { .. }
                        | JobError::ForegroundBusy { .. }
                        | JobError::GroupMismatch { .. }
                ) {
                    error!("job bookkeeping defect: {e}");
                }
                writeln!(err, "jobsh: {e}")?;
                Ok(1)
            }
        }
    }

    /// Print a notice for each background job that finished or stopped.
    pub fn report_jobs(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> std::io::Result<()> {
        for event in self.dispatcher.reap() {
            match event {
                JobEvent::Done {
                    id,
                    pid,
                    status,
                    command,
                } => writeln!(out, "[{id}] Done {pid} exit {status}  {command}")?,
                JobEvent::Stopped { id, pid } => writeln!(out, "[{id}] Stopped {pid}")?,
                JobEvent::Lost(e) => writeln!(err, "jobsh: {e}")?,
            }
        }
        Ok(())
    }

    /// Hang up every job still tracked and empty the table.
    pub fn shutdown(&mut self) {
        let jobs = self.dispatcher.hang_up_all();
        debug!(count = jobs.len(), "shell exiting");
    }

    /// Read-eval loop on the terminal. Returns the shell's exit status.
    pub fn repl(&mut self, prompt: &str) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        let mut stdout = std::io::stdout();
        let mut stderr = std::io::stderr();

        while !self.should_exit() {
            self.report_jobs(&mut stdout, &mut stderr)?;
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute_line(&line, &mut stdout, &mut stderr);
                    stdout.flush()?;
                }
                // Ctrl-C at the prompt only discards the line.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    self.shutdown();
                    return Err(e.into());
                }
            }
        }

        self.shutdown();
        Ok(self.env.exit_requested.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::thread;
    use std::time::{Duration, Instant};

    fn shell(max_jobs: usize) -> Interpreter {
        let config = Config {
            max_jobs,
            ..Config::default()
        };
        Interpreter::new(&config, Arc::new(ForegroundIndicator::new()))
    }

    fn exec(sh: &mut Interpreter, line: &str) -> (ExitCode, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = sh.execute_line(line, &mut out, &mut err);
        (
            code,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn test_foreground_stub_leaves_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("sleep-like-stub");
        fs::write(&stub, "#!/bin/sh\nsleep 0.2\nexit 6\n").unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let mut sh = shell(4);
        let (code, out, err) = exec(&mut sh, &stub.to_string_lossy());

        assert_eq!(code, 6);
        assert!(out.is_empty() && err.is_empty(), "unexpected output {out:?} {err:?}");
        assert!(sh.jobs().is_empty());
    }

    #[test]
    fn test_background_launch_prints_job_and_pid() {
        let mut sh = shell(4);
        let (code, out, _) = exec(&mut sh, "/bin/sh -c 'exit 2' &");
        assert_eq!(code, 0);
        assert!(out.starts_with("[1] "), "got {out:?}");

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut notices = Vec::new();
        while notices.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
            let mut err = Vec::new();
            sh.report_jobs(&mut notices, &mut err).unwrap();
        }
        let notices = String::from_utf8(notices).unwrap();
        assert!(notices.starts_with("[1] Done "), "got {notices:?}");
        assert!(notices.contains("exit 2"));
        assert!(sh.jobs().is_empty());
    }

    #[test]
    fn test_unknown_command() {
        let mut sh = shell(4);
        let (code, out, err) = exec(&mut sh, "definitely-not-a-command-jobsh");
        assert_eq!(code, NOT_FOUND);
        assert!(out.is_empty());
        assert_eq!(err, "command not found: definitely-not-a-command-jobsh\n");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let mut sh = shell(4);
        let (code, _, err) = exec(&mut sh, "sleep & 1");
        assert_eq!(code, SYNTAX_ERROR);
        assert!(err.starts_with("jobsh: syntax error"));
        assert!(sh.jobs().is_empty());
    }

    #[test]
    fn test_blank_line_does_nothing() {
        let mut sh = shell(4);
        assert_eq!(exec(&mut sh, "   "), (0, String::new(), String::new()));
    }

    #[test]
    fn test_builtins_run_in_process() {
        let mut sh = shell(4);
        let (code, out, _) = exec(&mut sh, "pwd &");
        assert_eq!(code, 0);
        assert_eq!(out.trim_end(), sh.env().current_dir.to_string_lossy());
        assert!(sh.jobs().is_empty());

        let (code, out, _) = exec(&mut sh, "jobs");
        assert_eq!((code, out.as_str()), (0, ""));
    }

    #[test]
    fn test_capacity_error_is_one_line() {
        let mut sh = shell(1);
        exec(&mut sh, "/bin/sh -c 'sleep 5' &");
        let (code, _, err) = exec(&mut sh, "/bin/sh -c 'sleep 5' &");

        assert_eq!(code, 1);
        assert_eq!(err.lines().count(), 1);
        assert!(err.contains("job table full"));
        assert_eq!(sh.jobs().len(), 1);
        sh.shutdown();
        assert!(sh.jobs().is_empty());
    }

    #[test]
    fn test_quit_stops_the_loop_and_clears_jobs() {
        let mut sh = shell(4);
        exec(&mut sh, "/bin/sh -c 'sleep 5' &");
        assert!(!sh.should_exit());

        let (code, _, _) = exec(&mut sh, "quit");
        assert_eq!(code, 0);
        assert!(sh.should_exit());

        sh.shutdown();
        assert!(sh.jobs().is_empty());
    }

    #[test]
    fn test_variables_expand_into_arguments() {
        let mut sh = shell(4);
        sh.env.set_var("JOBSH_STATUS", "9");
        let (code, _, _) = exec(&mut sh, "/bin/sh -c 'exit $0' $JOBSH_STATUS");
        assert_eq!(code, 9);
    }
}
