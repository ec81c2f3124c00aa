//! The station map run: query, aggregate, region, topography, render, output
//!
//! Stages run strictly in sequence. Only a topography failure is recovered
//! from; everything else aborts the run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbImage;
use stationmap_map::{load_topography, select_region, BoundingRegion, Resolution, TopographyProvider};
use stationmap_renderer::{export_png, render_map, show_image, ArrayMarker, Background, MapScene};
use stationmap_stations::{aggregate, StationSource};

use crate::config::StationMapConfig;

/// Which background ended up on the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    Topography(Resolution),
    Coastline,
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunReport {
    pub stations: usize,
    pub arrays: usize,
    pub region: BoundingRegion,
    pub background: BackgroundKind,
    pub image: RgbImage,
    pub saved_to: Option<PathBuf>,
}

pub async fn run(
    config: &StationMapConfig,
    stations: &dyn StationSource,
    topography: Option<&dyn TopographyProvider>,
) -> Result<RunReport> {
    let query = &config.query;
    tracing::info!(
        "Querying {} for {}.{} channels {} between {} and {}",
        query.source,
        query.network,
        query.station,
        query.channel,
        query.start_time,
        query.end_time
    );
    let station_set = stations
        .fetch_stations(query)
        .await
        .context("station metadata query failed")?;
    tracing::info!("Retrieved {} stations", station_set.len());

    let arrays = aggregate(&station_set).context("nothing to map")?;
    tracing::info!("Grouped stations into {} arrays", arrays.len());

    let epicenter = config.epicenter.epicenter();
    let (mut lats, mut lons) = (arrays.lats(), arrays.lons());
    if config.region.include_epicenter {
        if let Some(epicenter) = &epicenter {
            lats.push(epicenter.lat);
            lons.push(epicenter.lon);
        }
    }
    let region = select_region(
        config.region.override_region(),
        &lats,
        &lons,
        &config.region.padding,
    )
    .context("failed to select the map region")?;
    tracing::info!("Map region {}", region);

    let (background, kind) = match topography.filter(|_| config.topography.enabled) {
        Some(provider) => match load_topography(provider, &region, &config.topography.resolutions).await {
            Ok((resolution, grid)) => (Background::Topography(grid), BackgroundKind::Topography(resolution)),
            Err(e) => {
                let cause = std::error::Error::source(&e)
                    .map(|source| format!(": {}", source))
                    .unwrap_or_default();
                tracing::warn!("{}{}; falling back to the coastline basemap", e, cause);
                (Background::Coastline, BackgroundKind::Coastline)
            }
        },
        None => {
            tracing::info!("Topography disabled, drawing the coastline basemap");
            (Background::Coastline, BackgroundKind::Coastline)
        }
    };

    let mut style = config.figure.clone();
    if kind == BackgroundKind::Coastline {
        // The plain basemap annotates with automatic tick spacing
        style.frame.tick_interval_deg = None;
    }

    let scene = MapScene {
        region,
        arrays: arrays
            .iter()
            .map(|group| ArrayMarker {
                lat: group.lat,
                lon: group.lon,
                label: group.label(),
            })
            .collect(),
        epicenter,
        background,
    };
    let image = render_map(&scene, &style).context("failed to render the map")?;
    tracing::info!("Rendered {}x{} map", image.width(), image.height());

    let output = &config.output;
    let saved_to = if output.save {
        let path = export_png(&image, &output.save_dir, &output.file_name)
            .with_context(|| format!("failed to save the map to {}", output.save_dir.display()))?;
        Some(path)
    } else {
        None
    };

    if output.show {
        show_image(&image, &output.file_name);
    }

    Ok(RunReport {
        stations: station_set.len(),
        arrays: arrays.len(),
        region,
        background: kind,
        image,
        saved_to,
    })
}
