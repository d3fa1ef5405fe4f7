//! Statray demo entry point.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting statray demo");

    let config = config::DemoConfig::load()?;
    tracing::info!(icon = %config.icon, "configuration loaded");

    app::run(config)?;

    tracing::info!("demo shut down cleanly");
    Ok(())
}
