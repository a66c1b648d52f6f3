use crate::job_table::DEFAULT_MAX_JOBS;
use argh::FromArgs;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_PROMPT: &str = "prompt > ";

/// Environment variable holding a `tracing` filter directive, e.g. `jobsh=debug`.
pub const LOG_ENV: &str = "JOBSH_LOG";

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// Interactive shell that runs programs in the foreground or as background jobs.
pub struct Config {
    #[argh(option, default = "DEFAULT_MAX_JOBS")]
    /// most background jobs tracked at once.
    pub max_jobs: usize,

    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// text printed before each input line.
    pub prompt: String,

    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    pub command: Option<String>,

    #[argh(switch, short = 'v')]
    /// log debug events to stderr.
    pub verbose: bool,
}

impl Config {
    /// Log filter: `JOBSH_LOG` when set and valid, else `debug` with
    /// `--verbose` and `warn` without.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
            EnvFilter::new(if self.verbose { "debug" } else { "warn" })
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_JOBS,
            prompt: DEFAULT_PROMPT.to_string(),
            command: None,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let config = Config::from_args(&["jobsh"], &[]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flags() {
        let config = Config::from_args(
            &["jobsh"],
            &["--max-jobs", "3", "--prompt", "$ ", "-v", "-c", "sleep 1 &"],
        )
        .unwrap();
        assert_eq!(config.max_jobs, 3);
        assert_eq!(config.prompt, "$ ");
        assert!(config.verbose);
        assert_eq!(config.command.as_deref(), Some("sleep 1 &"));
    }

    #[test]
    fn test_bad_max_jobs_is_rejected() {
        assert!(Config::from_args(&["jobsh"], &["--max-jobs", "many"]).is_err());
    }
}
