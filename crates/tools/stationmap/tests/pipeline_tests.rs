//! End-to-end runs with in-memory station and topography sources

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stationmap::{run, BackgroundKind, StationMapConfig};
use stationmap_map::{BoundingRegion, Resolution, TopographyError, TopographyGrid, TopographyProvider};
use stationmap_stations::{AggregateError, FdsnError, StationQuery, StationRecord, StationSet, StationSource};

struct FixedStations {
    stations: StationSet,
    calls: AtomicUsize,
}

impl FixedStations {
    fn new(records: Vec<StationRecord>) -> Self {
        Self {
            stations: records.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StationSource for FixedStations {
    async fn fetch_stations(&self, _query: &StationQuery) -> stationmap_stations::Result<StationSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stations.clone())
    }
}

struct UnreachableService;

#[async_trait]
impl StationSource for UnreachableService {
    async fn fetch_stations(&self, _query: &StationQuery) -> stationmap_stations::Result<StationSet> {
        Err(FdsnError::Status {
            status: 503,
            message: "Service Unavailable".to_string(),
        })
    }
}

/// Serves a flat grid for the listed resolutions and fails the rest
struct ScriptedTopography {
    available: Vec<Resolution>,
    attempts: Mutex<Vec<Resolution>>,
}

impl ScriptedTopography {
    fn new(available: Vec<Resolution>) -> Self {
        Self {
            available,
            attempts: Mutex::new(Vec::new()),
        }
    }

    fn attempts(&self) -> Vec<Resolution> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopographyProvider for ScriptedTopography {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self, region: &BoundingRegion, resolution: Resolution) -> stationmap_map::topography::Result<TopographyGrid> {
        self.attempts.lock().unwrap().push(resolution);
        if !self.available.contains(&resolution) {
            return Err(TopographyError::Http {
                url: format!("https://tiles.invalid/{}", resolution),
                status: 503,
            });
        }
        let data = (0..64).map(|i| 1300.0 + (i % 8) as f32 * 4.0).collect();
        TopographyGrid::from_data(*region, 8, 8, data, resolution)
    }
}

/// Formatted log output collected in memory
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn spe_stations() -> Vec<StationRecord> {
    vec![
        StationRecord::new("IS301", 37.20, -116.05, "SN"),
        StationRecord::new("IS302", 37.21, -116.04, "SN"),
        StationRecord::new("IS401", 37.22, -116.03, "SN"),
    ]
}

fn test_config() -> StationMapConfig {
    let mut config = StationMapConfig::default();
    config.figure.dpi = 50.0;
    config.output.show = false;
    config
}

fn resolutions() -> Vec<Resolution> {
    ["01s", "03s", "15s"].iter().map(|r| r.parse().unwrap()).collect()
}

#[tokio::test]
async fn test_no_stations_aborts_before_region_selection() {
    let stations = FixedStations::new(Vec::new());
    let topography = ScriptedTopography::new(resolutions());

    let err = run(&test_config(), &stations, Some(&topography)).await.unwrap_err();

    assert_eq!(err.downcast_ref::<AggregateError>(), Some(&AggregateError::NoStations));
    assert!(format!("{:#}", err).contains("no stations"));
    assert_eq!(stations.calls.load(Ordering::SeqCst), 1);
    assert!(topography.attempts().is_empty());
}

#[tokio::test]
async fn test_all_resolutions_failing_falls_back_to_coastline() {
    let stations = FixedStations::new(spe_stations());
    let topography = ScriptedTopography::new(Vec::new());

    let report = run(&test_config(), &stations, Some(&topography)).await.unwrap();

    assert_eq!(topography.attempts(), resolutions());
    assert_eq!(report.background, BackgroundKind::Coastline);
    assert_eq!(report.arrays, 2);
    assert!(report.image.width() > 0 && report.image.height() > 0);
    assert!(report.saved_to.is_none());
}

#[tokio::test]
async fn test_topography_fallback_warns_exactly_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let stations = FixedStations::new(spe_stations());
    let topography = ScriptedTopography::new(Vec::new());
    let report = run(&test_config(), &stations, Some(&topography)).await.unwrap();
    assert_eq!(report.background, BackgroundKind::Coastline);

    let warnings: Vec<String> = logs.lines().into_iter().filter(|line| line.contains("WARN")).collect();
    assert_eq!(warnings.len(), 1, "warnings: {:#?}", warnings);
    assert!(warnings[0].contains("15s"), "{}", warnings[0]);
    assert!(warnings[0].contains("503"), "{}", warnings[0]);
    assert!(warnings[0].contains("coastline"), "{}", warnings[0]);
}

#[tokio::test]
async fn test_third_resolution_used_when_finer_ones_fail() {
    let stations = FixedStations::new(spe_stations());
    let fifteen: Resolution = "15s".parse().unwrap();
    let topography = ScriptedTopography::new(vec![fifteen]);

    let report = run(&test_config(), &stations, Some(&topography)).await.unwrap();

    assert_eq!(topography.attempts().len(), 3);
    assert_eq!(report.background, BackgroundKind::Topography(fifteen));
}

#[tokio::test]
async fn test_finest_resolution_wins() {
    let stations = FixedStations::new(spe_stations());
    let topography = ScriptedTopography::new(resolutions());

    let report = run(&test_config(), &stations, Some(&topography)).await.unwrap();

    assert_eq!(topography.attempts(), vec![resolutions()[0]]);
    assert_eq!(report.background, BackgroundKind::Topography(resolutions()[0]));
    assert_eq!(report.stations, 3);
}

#[tokio::test]
async fn test_disabled_topography_is_never_queried() {
    let stations = FixedStations::new(spe_stations());
    let topography = ScriptedTopography::new(resolutions());
    let mut config = test_config();
    config.topography.enabled = false;

    let report = run(&config, &stations, Some(&topography)).await.unwrap();

    assert!(topography.attempts().is_empty());
    assert_eq!(report.background, BackgroundKind::Coastline);
}

#[tokio::test]
async fn test_manual_region_used_verbatim() {
    let stations = FixedStations::new(spe_stations());
    let report = run(&test_config(), &stations, None).await.unwrap();
    assert_eq!(report.region.to_array(), [-116.075, -116.033, 37.17, 37.23]);
}

#[tokio::test]
async fn test_auto_region_contains_arrays_and_epicenter() {
    let stations = FixedStations::new(spe_stations());
    let mut config = test_config();
    config.region.auto = true;
    config.region.include_epicenter = true;

    let report = run(&config, &stations, None).await.unwrap();

    let region = report.region;
    for (lat, lon) in [(37.205, -116.045), (37.22, -116.03), (37.2212, -116.0609)] {
        assert!(region.lat_min() < lat && lat < region.lat_max(), "lat {} outside {}", lat, region);
        assert!(region.lon_min() < lon && lon < region.lon_max(), "lon {} outside {}", lon, region);
    }
}

#[tokio::test]
async fn test_query_failure_is_fatal() {
    let topography = ScriptedTopography::new(resolutions());
    let err = run(&test_config(), &UnreachableService, Some(&topography)).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<FdsnError>(), Some(FdsnError::Status { status: 503, .. })));
    assert!(topography.attempts().is_empty());
}

#[tokio::test]
async fn test_saved_figure_lands_in_save_dir() {
    let dir = tempfile::tempdir().unwrap();
    let stations = FixedStations::new(spe_stations());
    let mut config = test_config();
    config.output.save = true;
    config.output.save_dir = dir.path().join("maps");

    let report = run(&config, &stations, None).await.unwrap();

    let path = report.saved_to.expect("figure saved");
    assert_eq!(path, dir.path().join("maps").join("SPE_station_map.png"));
    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), report.image.dimensions());
}
