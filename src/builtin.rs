use crate::command::{CommandFactory, Context, ExecutableCommand, ExitCode};
use anyhow::{Context as _, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed with [`argh`] and run in-process, never as jobs.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Names the command answers to; the first one is canonical.
    fn names() -> &'static [&'static str];

    fn execute(self, stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, ctx) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _ctx: &mut Context<'_>) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

/// Creates a builtin of type `T` when the name matches.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if !T::names().contains(&name) {
            return None;
        }
        Some(match T::from_args(&[name], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// Factories for every builtin, in lookup order.
pub(crate) fn factories() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Quit>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Jobs>::default()),
    ]
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn names() -> &'static [&'static str] {
        &["pwd"]
    }

    fn execute(self, stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode> {
        writeln!(stdout, "{}", ctx.env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn names() -> &'static [&'static str] {
        &["cd"]
    }

    fn execute(self, _stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode> {
        let target = match self.target.filter(|t| !t.is_empty()) {
            Some(t) => PathBuf::from(t),
            None => ctx
                .env
                .get_var("HOME")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow::anyhow!("cd: no target and HOME not set"))?,
        };

        let new_dir = ctx.env.current_dir.join(target);
        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        ctx.env.set_var("PWD", canonical.to_string_lossy());
        ctx.env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell, hanging up any jobs still running.
pub struct Quit {
    #[argh(positional, default = "0")]
    /// exit status of the shell, 0 when omitted.
    pub status: ExitCode,
}

impl BuiltinCommand for Quit {
    fn names() -> &'static [&'static str] {
        &["quit", "exit"]
    }

    fn execute(self, _stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode> {
        ctx.env.request_exit(self.status);
        Ok(self.status)
    }
}

#[derive(FromArgs)]
/// List the jobs the shell is tracking.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn names() -> &'static [&'static str] {
        &["jobs"]
    }

    fn execute(self, stdout: &mut dyn Write, ctx: &mut Context<'_>) -> Result<ExitCode> {
        for job in ctx.jobs.iter() {
            writeln!(stdout, "[{}] {:<8} {:>7} {}", job.id, job.state, job.pid.as_raw(), job.command)?;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::job::{JobState, ProcessId};
    use crate::job_table::JobTable;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn bare_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: env::current_dir().unwrap(),
            exit_requested: None,
        }
    }

    fn run(name: &str, args: &[&str], env: &mut Environment, jobs: &JobTable) -> (ExitCode, String) {
        let cmd = factories()
            .iter()
            .find_map(|f| f.try_create(name, args))
            .unwrap_or_else(|| panic!("{name} is not a builtin"));
        let mut out = Vec::new();
        let code = cmd.execute(&mut out, &mut Context { env, jobs }).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_unknown_name_is_not_builtin() {
        assert!(factories().iter().all(|f| f.try_create("ls", &[]).is_none()));
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let mut env = bare_env();
        let expected = format!("{}\n", env.current_dir.to_string_lossy());
        let (code, out) = run("pwd", &[], &mut env, &JobTable::default());
        assert_eq!(code, 0);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let before = env::current_dir().unwrap();
        // Other tests capture the process cwd for their children, so only
        // visit a directory that outlives this test.
        let dir = env::temp_dir();
        let mut env = bare_env();

        let target = dir.to_string_lossy().into_owned();
        let (code, _) = run("cd", &[&target], &mut env, &JobTable::default());
        env::set_current_dir(&before).unwrap();

        assert_eq!(code, 0);
        assert_eq!(env.current_dir, fs::canonicalize(&dir).unwrap());
        assert_eq!(
            env.get_var("PWD"),
            Some(env.current_dir.to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let before = env::current_dir().unwrap();
        let home = env::temp_dir();
        let mut env = bare_env();
        env.set_var("HOME", home.to_string_lossy());

        let (code, _) = run("cd", &[], &mut env, &JobTable::default());
        env::set_current_dir(&before).unwrap();

        assert_eq!(code, 0);
        assert_eq!(env.current_dir, fs::canonicalize(&home).unwrap());
    }

    #[test]
    fn test_cd_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let mut env = bare_env();
        let before = env.current_dir.clone();

        let (code, out) = run("cd", &["/definitely/not/here/jobsh"], &mut env, &JobTable::default());

        assert_eq!(code, 1);
        assert!(out.starts_with("cd: can't canonicalize"), "got {out:?}");
        assert_eq!(env.current_dir, before);
    }

    #[test]
    fn test_quit_and_exit_request_exit() {
        let mut env = bare_env();
        let (code, _) = run("quit", &[], &mut env, &JobTable::default());
        assert_eq!(code, 0);
        assert_eq!(env.exit_requested, Some(0));

        let mut env = bare_env();
        run("exit", &["3"], &mut env, &JobTable::default());
        assert_eq!(env.exit_requested, Some(3));
    }

    #[test]
    fn test_quit_rejects_garbage_status() {
        let mut env = bare_env();
        let (code, _) = run("quit", &["soon"], &mut env, &JobTable::default());
        assert_eq!(code, 1);
        assert!(!env.should_exit());
    }

    #[test]
    fn test_jobs_lists_tracked_jobs_in_order() {
        let mut jobs = JobTable::new(4);
        for (raw, cmd) in [(901, "sleep 10 &"), (902, "make &")] {
            let pid = ProcessId::from_raw(raw);
            jobs.register(pid, pid.as_group(), JobState::Background, cmd)
                .unwrap();
        }
        let mut env = bare_env();
        let (code, out) = run("jobs", &[], &mut env, &jobs);

        assert_eq!(code, 0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[1] Running"));
        assert!(lines[0].contains("901") && lines[0].ends_with("sleep 10 &"));
        assert!(lines[1].starts_with("[2] Running"));
    }
}
