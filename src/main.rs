//! access-client - command-line tool for the digital preservation service

mod cli;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    // Logs go to stderr so report and table output on stdout stays clean
    let filter = match cli.verbose {
        0 => "dpres_access_client=warn,access_client=warn",
        1 => "dpres_access_client=info,access_client=info",
        2 => "dpres_access_client=debug,access_client=debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", cli::error_message(&e));
            ExitCode::FAILURE
        }
    }
}
