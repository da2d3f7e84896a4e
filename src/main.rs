//! Vidnotes CLI entry point.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidnotes::cli::{commands, Cli};
use vidnotes::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(Some(path))?,
        None => Settings::load()?,
    };
    cli.apply(&mut settings);
    settings.validate()?;

    // Initialize logging
    let log_level = cli.log_level(&settings.general.log_level).to_string();
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidnotes={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling batch");
            on_signal.cancel();
        }
    });

    let code = commands::run_convert(&cli, settings, cancel).await?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
