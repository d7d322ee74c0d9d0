use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::Cli;
use etl_core::Settings;
use etl_log::StructuredLogger;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?;

    // The logger lives for the whole process and is handed to every component
    let logger = Arc::new(StructuredLogger::new(settings.logger_config()));
    tracing::info!(
        "Environment: {}, audit log: {}",
        logger.environment(),
        logger.dir().display()
    );

    commands::execute(cli.command, &settings, logger).await
}
