use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use log_trimmer::{cli::Args, observability::init_tracing, report::RunReport, trimmer};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Error: {e}");
        return ExitCode::from(1);
    }

    tracing::debug!(?config, "Loaded configuration");

    let started = Utc::now();
    match trimmer::run_at(&config, started).await {
        Ok(outcome) => {
            print!("{}", RunReport::new(&outcome, started));
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}
