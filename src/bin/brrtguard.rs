use brrtguard::cli::{run_cli, Cli};
use brrtguard::otel::{init_logging_with_config, LogConfig};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays a clean JSON report.
    if let Err(e) = init_logging_with_config(&LogConfig::from_env()) {
        eprintln!("failed to initialize logging: {e:#}");
    }

    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
