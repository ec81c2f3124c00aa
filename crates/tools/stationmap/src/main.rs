use anyhow::{Context, Result};
use clap::Parser;
use stationmap::{pipeline, Cli};
use stationmap_map::{TerrariumProvider, TopographyProvider};
use stationmap_stations::FdsnClient;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.resolve_config().context("invalid configuration")?;

    let client = FdsnClient::new(&config.query.source, config.request_timeout())
        .context("failed to set up the station service client")?;
    let terrarium = if config.topography.enabled {
        Some(
            TerrariumProvider::new(config.topography.terrarium.clone())
                .context("failed to set up the elevation tile client")?,
        )
    } else {
        None
    };
    let provider = terrarium.as_ref().map(|p| p as &dyn TopographyProvider);

    let report = pipeline::run(&config, &client, provider).await?;
    match &report.saved_to {
        Some(path) => tracing::info!("Done: {} arrays mapped, saved to {}", report.arrays, path.display()),
        None => tracing::info!("Done: {} arrays mapped", report.arrays),
    }

    Ok(())
}
