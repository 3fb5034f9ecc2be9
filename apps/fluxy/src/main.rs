use clap::Parser;
use fluxy_core::app::{self, Outcome};
use fluxy_core::cli::Cli;
use fluxy_core::config::AppConfig;
use fluxy_core::error::AppError;
use fluxy_core::telemetry::logging;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; the token may come from the shell.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match AppConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = logging::init(&config.logging) {
        eprintln!("⚠️  {}", AppError::from(err));
    }

    match app::run(config).await {
        Ok(Outcome::Quit) => ExitCode::SUCCESS,
        Ok(Outcome::Saved(path)) => {
            println!("Saved image to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(target: "fluxy::ui", error = %err, "session failed");
            eprintln!("❌ {err}");
            ExitCode::FAILURE
        }
    }
}
