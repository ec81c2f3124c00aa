//! FDSN station web-service client
//!
//! Queries `<base>/fdsnws/station/1/query` at station level in the
//! pipe-separated text format:
//!
//! ```text
//! #Network | Station | Latitude | Longitude | Elevation | SiteName | StartTime | EndTime
//! SN|IS31|37.2003|-116.0511|1285.0|Array 3 element 1|2011-05-03T00:00:00|
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::{FdsnError, Result};
use crate::record::{StationRecord, StationSet};

const QUERY_PATH: &str = "fdsnws/station/1/query";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Known data centers and their service roots
const DATA_CENTERS: &[(&str, &str)] = &[
    ("IRIS", "https://service.iris.edu"),
    ("EARTHSCOPE", "https://service.iris.edu"),
    ("GFZ", "https://geofon.gfz-potsdam.de"),
    ("ORFEUS", "https://www.orfeus-eu.org"),
    ("RESIF", "https://ws.resif.fr"),
    ("INGV", "https://webservices.ingv.it"),
    ("NCEDC", "https://service.ncedc.org"),
    ("SCEDC", "https://service.scedc.caltech.edu"),
    ("USGS", "https://earthquake.usgs.gov"),
];

/// Station search: match patterns plus an activity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationQuery {
    /// Data-center id (`IRIS`, `GFZ`, ...) or an `http(s)://` service root
    pub source: String,
    pub network: String,
    pub station: String,
    pub channel: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Default for StationQuery {
    fn default() -> Self {
        Self {
            source: "IRIS".to_string(),
            network: "SN".to_string(),
            station: "IS*".to_string(),
            channel: "*DF".to_string(),
            start_time: Utc.with_ymd_and_hms(2011, 5, 3, 0, 0, 0).single().unwrap_or_default(),
            end_time: Utc
                .with_ymd_and_hms(2016, 10, 12, 23, 59, 59)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl StationQuery {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("network", &self.network),
            ("station", &self.station),
            ("channel", &self.channel),
        ] {
            if value.trim().is_empty() {
                return Err(FdsnError::InvalidQuery(format!("{} pattern is empty", name)));
            }
        }
        if self.start_time >= self.end_time {
            return Err(FdsnError::InvalidQuery(format!(
                "start time {} is not before end time {}",
                self.start_time, self.end_time
            )));
        }
        resolve_base_url(&self.source).map(|_| ())
    }

    /// Query-string parameters for the station service
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("network", self.network.clone()),
            ("station", self.station.clone()),
            ("channel", self.channel.clone()),
            ("starttime", self.start_time.format(TIME_FORMAT).to_string()),
            ("endtime", self.end_time.format(TIME_FORMAT).to_string()),
            ("level", "station".to_string()),
            ("format", "text".to_string()),
        ]
    }
}

/// Service root for a data-center id or explicit URL
pub fn resolve_base_url(source: &str) -> Result<String> {
    let source = source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        return Ok(source.trim_end_matches('/').to_string());
    }
    DATA_CENTERS
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(source))
        .map(|(_, url)| url.to_string())
        .ok_or_else(|| FdsnError::UnknownSource(source.to_string()))
}

/// Anything that can answer a station query
#[async_trait]
pub trait StationSource: Send + Sync {
    async fn fetch_stations(&self, query: &StationQuery) -> Result<StationSet>;
}

/// HTTP client for an FDSN station service
pub struct FdsnClient {
    http: reqwest::Client,
    base_url: String,
}

impl FdsnClient {
    pub fn new(source: &str, timeout: Duration) -> Result<Self> {
        let base_url = resolve_base_url(source)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("station-map/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FdsnError::Client)?;
        Ok(Self { http, base_url })
    }

    pub fn query_url(&self, query: &StationQuery) -> Result<Url> {
        let endpoint = format!("{}/{}", self.base_url, QUERY_PATH);
        Url::parse_with_params(&endpoint, query.params())
            .map_err(|e| FdsnError::InvalidQuery(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl StationSource for FdsnClient {
    async fn fetch_stations(&self, query: &StationQuery) -> Result<StationSet> {
        let url = self.query_url(query)?;
        tracing::info!("Querying station metadata: {}", url);

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FdsnError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            tracing::info!("Station service returned no matching stations");
            return Ok(StationSet::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = body
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("no details"))
                .to_string();
            return Err(FdsnError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|source| FdsnError::Request {
            url: url.to_string(),
            source,
        })?;
        let stations = parse_station_text(&body)?;
        tracing::info!("Received {} stations", stations.len());
        Ok(stations)
    }
}

/// Parse a station-level text response
///
/// Comment lines start with `#`. Only the first four columns are used;
/// later epochs of a repeated station code replace earlier ones.
pub fn parse_station_text(body: &str) -> Result<StationSet> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .comment(Some(b'#'))
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut stations = StationSet::new();
    for row in reader.records() {
        let row = row.map_err(|e| FdsnError::Parse {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.len() < 4 {
            return Err(FdsnError::Parse {
                line,
                message: format!("expected at least 4 columns, found {}", row.len()),
            });
        }
        let network = &row[0];
        let code = &row[1];
        if network.is_empty() || code.is_empty() {
            return Err(FdsnError::Parse {
                line,
                message: "missing network or station code".to_string(),
            });
        }

        let lat = parse_coordinate(&row[2], "latitude", 90.0, line)?;
        let lon = parse_coordinate(&row[3], "longitude", 180.0, line)?;
        if stations.insert(StationRecord::new(code, lat, lon, network)).is_some() {
            tracing::debug!("Station {}.{} listed more than once, keeping the last epoch", network, code);
        }
    }
    Ok(stations)
}

fn parse_coordinate(field: &str, name: &str, limit: f64, line: u64) -> Result<f64> {
    let value: f64 = field.parse().map_err(|_| FdsnError::Parse {
        line,
        message: format!("invalid {} '{}'", name, field),
    })?;
    if !value.is_finite() || value.abs() > limit {
        return Err(FdsnError::Parse {
            line,
            message: format!("{} {} out of range", name, value),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#Network | Station | Latitude | Longitude | Elevation | SiteName | StartTime | EndTime
SN|IS31|37.2003|-116.0511|1285.0|Array 3 element 1|2011-05-03T00:00:00|2016-10-12T23:59:59
SN|IS32|37.2101|-116.0402|1290.0|Array 3 element 2|2011-05-03T00:00:00|
SN | IS41 | 37.2200 | -116.0300 | 1301.0 | Array 4 element 1 | 2012-01-01T00:00:00 |

XX|BEAR|37.1000|-116.1000|1200.0|Other network|2011-05-03T00:00:00|
";

    #[test]
    fn test_parse_station_text() {
        let stations = parse_station_text(SAMPLE).unwrap();
        assert_eq!(stations.len(), 4);

        let is41 = stations.get("IS41").unwrap();
        assert_eq!(is41.network, "SN");
        assert_eq!(is41.lat, 37.22);
        assert_eq!(is41.lon, -116.03);
        assert_eq!(stations.get("BEAR").map(|s| s.network.as_str()), Some("XX"));
    }

    #[test]
    fn test_parse_repeated_epoch_keeps_last() {
        let body = "SN|IS31|37.0|-116.0|1|a|2011-01-01T00:00:00|2012-01-01T00:00:00\n\
                    SN|IS31|37.5|-116.5|1|a|2012-01-01T00:00:00|\n";
        let stations = parse_station_text(body).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations.get("IS31").map(|s| s.lat), Some(37.5));
    }

    #[test]
    fn test_parse_empty_and_header_only() {
        assert!(parse_station_text("").unwrap().is_empty());
        assert!(parse_station_text("#Network | Station | Latitude | Longitude\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_rows() {
        assert!(matches!(
            parse_station_text("SN|IS31|north|-116.0\n"),
            Err(FdsnError::Parse { .. })
        ));
        assert!(matches!(
            parse_station_text("SN|IS31|137.0|-116.0\n"),
            Err(FdsnError::Parse { .. })
        ));
        assert!(matches!(parse_station_text("SN|IS31|37.0\n"), Err(FdsnError::Parse { .. })));
        assert!(matches!(
            parse_station_text("SN||37.0|-116.0\n"),
            Err(FdsnError::Parse { .. })
        ));
    }

    #[test]
    fn test_resolve_base_url() {
        assert_eq!(resolve_base_url("IRIS").unwrap(), "https://service.iris.edu");
        assert_eq!(resolve_base_url("gfz").unwrap(), "https://geofon.gfz-potsdam.de");
        assert_eq!(
            resolve_base_url("http://localhost:8080/").unwrap(),
            "http://localhost:8080"
        );
        assert!(matches!(resolve_base_url("NOWHERE"), Err(FdsnError::UnknownSource(_))));
    }

    #[test]
    fn test_query_url() {
        let client = FdsnClient::new("IRIS", Duration::from_secs(5)).unwrap();
        let url = client.query_url(&StationQuery::default()).unwrap();

        assert_eq!(url.host_str(), Some("service.iris.edu"));
        assert_eq!(url.path(), "/fdsnws/station/1/query");
        let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert!(pairs.contains(&("network".to_string(), "SN".to_string())));
        assert!(pairs.contains(&("station".to_string(), "IS*".to_string())));
        assert!(pairs.contains(&("channel".to_string(), "*DF".to_string())));
        assert!(pairs.contains(&("starttime".to_string(), "2011-05-03T00:00:00".to_string())));
        assert!(pairs.contains(&("endtime".to_string(), "2016-10-12T23:59:59".to_string())));
        assert!(pairs.contains(&("format".to_string(), "text".to_string())));
    }

    #[test]
    fn test_query_defaults_and_validation() {
        let query = StationQuery::default();
        assert_eq!(query.start_time.timestamp(), 1_304_380_800);
        assert_eq!(query.end_time.timestamp(), 1_476_316_799);
        assert!(query.validate().is_ok());

        let inverted = StationQuery {
            start_time: query.end_time,
            end_time: query.start_time,
            ..query.clone()
        };
        assert!(inverted.validate().is_err());

        let blank = StationQuery {
            channel: " ".to_string(),
            ..query
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_query_from_toml() {
        let query: StationQuery = toml::from_str(
            r#"
            network = "IM"
            start_time = "2015-01-01T00:00:00Z"
            "#,
        )
        .unwrap();
        assert_eq!(query.network, "IM");
        assert_eq!(query.station, "IS*");
        assert_eq!(query.start_time.timestamp(), 1_420_070_400);
    }
}
