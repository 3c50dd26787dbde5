pub mod cli;
pub mod clinic;
pub mod config;
pub mod models;
pub mod reports;
pub mod scheduling;
pub mod storage;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<(), cli::CliError> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let args = cli::Cli::parse();
    let now = chrono::Local::now().naive_local();
    let stdout = std::io::stdout();
    cli::execute(args, now, &mut stdout.lock())
}
