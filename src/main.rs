use anyhow::{Context, Result};
use jobsh::command::exit_status;
use jobsh::{Config, ForegroundIndicator, Interpreter, SignalRouter};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let config: Config = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(config.log_filter())
        .with_writer(io::stderr)
        .init();

    match run(&config) {
        Ok(code) => ExitCode::from(exit_status(code)),
        Err(e) => {
            eprintln!("jobsh: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<i32> {
    let foreground = Arc::new(ForegroundIndicator::new());
    let router =
        SignalRouter::install(foreground.clone()).context("installing SIGINT handler")?;
    let mut shell = Interpreter::new(config, foreground);

    let code = match &config.command {
        Some(line) => {
            let code = shell.execute_line(line, &mut io::stdout(), &mut io::stderr());
            shell.report_jobs(&mut io::stdout(), &mut io::stderr())?;
            shell.shutdown();
            code
        }
        None => shell.repl(&config.prompt)?,
    };

    router.uninstall();
    Ok(code)
}
