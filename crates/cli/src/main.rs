use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Command output owns stdout; diagnostics go to stderr.
    let filter = EnvFilter::try_from_env("PROMOBUNDLE_CLI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).compact().init();

    promobundle_cli::run()
}
