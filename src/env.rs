use crate::command::ExitCode;
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::PathBuf;

/// The shell's view of its process environment.
///
/// Variables here are what launched children receive; `current_dir` is where
/// they start. Built-ins mutate it, the launcher only reads it.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    /// Set by `quit`; the interactive loop stops once this is `Some`.
    pub exit_requested: Option<ExitCode>,
}

impl Environment {
    /// Snapshot the variables and working directory of the running process.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            exit_requested: None,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// `$PATH` as used for command lookup; empty when unset.
    pub fn search_path(&self) -> OsString {
        self.get_var("PATH").map(OsString::from).unwrap_or_default()
    }

    pub fn request_exit(&mut self, code: ExitCode) {
        self.exit_requested = Some(code);
    }

    pub fn should_exit(&self) -> bool {
        self.exit_requested.is_some()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
            exit_requested: None,
        }
    }

    #[test]
    fn test_set_var_shadows_process_env() {
        let mut env = empty_env();
        assert_eq!(env.get_var("JOBSH_SOME_RANDOM_VAR_12345"), None);

        env.set_var("JOBSH_SOME_RANDOM_VAR_12345", "value");
        assert_eq!(
            env.get_var("JOBSH_SOME_RANDOM_VAR_12345"),
            Some("value".to_string())
        );
    }

    #[test]
    fn test_snapshot_carries_path() {
        let env = Environment::new();
        assert!(env.vars.contains_key("PATH"));
        assert!(!env.search_path().is_empty());
    }

    #[test]
    fn test_exit_request() {
        let mut env = empty_env();
        assert!(!env.should_exit());
        env.request_exit(0);
        assert!(env.should_exit());
        assert_eq!(env.exit_requested, Some(0));
    }
}
