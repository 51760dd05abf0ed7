//! Measurement records, probe targets and derived aggregates

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Bytes in one megabyte as used for data volume (binary megabyte)
pub const BYTES_PER_MB: f64 = 1_048_576.0;

/// Query parameter appended to every probe URL so caches cannot answer
const CACHE_BUST_PARAM: &str = "nocache";

/// Remote file to download on every probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// URL of the fixed-size file
    pub url: String,
    /// Exact size of the file; any other byte count fails the probe
    pub expected_size_bytes: u64,
}

impl ProbeTarget {
    pub fn new<S: Into<String>>(url: S, expected_size_bytes: u64) -> Self {
        Self {
            url: url.into(),
            expected_size_bytes,
        }
    }

    /// Target URL with a `nocache=<now_ms>` query pair appended.
    ///
    /// Existing query pairs are preserved and a stale `nocache` pair is replaced.
    pub fn cache_busted_url(&self, now_ms: i64) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| AppError::parse(format!("Invalid probe URL '{}': {}", self.url, e)))?;

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != CACHE_BUST_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (key, value) in &retained {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(CACHE_BUST_PARAM, &now_ms.to_string());
        }

        Ok(url)
    }

    /// Expected size expressed in megabytes
    pub fn expected_size_mb(&self) -> f64 {
        self.expected_size_bytes as f64 / BYTES_PER_MB
    }
}

/// One completed probe as recorded in the result log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Capture time in milliseconds since the Unix epoch
    #[serde(alias = "timestampMs")]
    pub timestamp: i64,

    /// Throughput as recorded, see [`throughput_mbps`]
    pub speed_mbps: f64,

    /// Bytes received divided by 1,048,576
    #[serde(rename = "dataDownloadedMB")]
    pub data_downloaded_mb: f64,

    /// Running total across the log up to and including this entry
    #[serde(rename = "totalDownloadedMB", alias = "cumulativeDownloadedMB", default)]
    pub cumulative_downloaded_mb: f64,
}

impl Measurement {
    /// Build a measurement from a finished transfer.
    ///
    /// The cumulative total is left at zero; the result store fills it in.
    pub fn from_transfer(timestamp: i64, bytes: u64, duration: Duration) -> Self {
        Self {
            timestamp,
            speed_mbps: round_to_hundredths(throughput_mbps(bytes, duration)),
            data_downloaded_mb: bytes as f64 / BYTES_PER_MB,
            cumulative_downloaded_mb: 0.0,
        }
    }

    /// Point plotted on the chart for this entry
    pub fn chart_point(&self) -> ChartPoint {
        ChartPoint {
            cumulative_mb: self.cumulative_downloaded_mb,
            speed_mbps: self.speed_mbps,
        }
    }
}

/// Throughput of a transfer as the log records it.
///
/// This divides the byte count (not bits) by `seconds * 1e6`, so the value
/// labelled "Mbps" is really megabytes per second. Stored logs depend on
/// this scale, so no ×8 conversion is applied.
pub fn throughput_mbps(bytes: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    bytes as f64 / (seconds * 1_000_000.0)
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// (x, y) pair handed to the chart: cumulative MB against speed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub cumulative_mb: f64,
    pub speed_mbps: f64,
}

/// Totals derived from the whole result log
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregates {
    /// Cumulative MB of the last entry, 0 when the log is empty
    pub total_mb: f64,
    /// Mean of all recorded speeds; `None` means "no data"
    pub average_speed_mbps: Option<f64>,
    /// Number of entries the aggregates were computed over
    pub count: usize,
}

impl Aggregates {
    pub fn from_log(log: &[Measurement]) -> Self {
        let total_mb = log
            .last()
            .map(|m| m.cumulative_downloaded_mb)
            .unwrap_or(0.0);

        let average_speed_mbps = if log.is_empty() {
            None
        } else {
            let sum: f64 = log.iter().map(|m| m.speed_mbps).sum();
            Some(sum / log.len() as f64).filter(|avg| avg.is_finite())
        };

        Self {
            total_mb,
            average_speed_mbps,
            count: log.len(),
        }
    }

    /// Whether there is anything to show
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(speed: f64, data: f64, cumulative: f64) -> Measurement {
        Measurement {
            timestamp: 0,
            speed_mbps: speed,
            data_downloaded_mb: data,
            cumulative_downloaded_mb: cumulative,
        }
    }

    #[test]
    fn test_throughput_uses_literal_byte_formula() {
        // 10 MiB in 2 seconds: bytes / (2.0 * 1e6), no bit conversion
        let speed = throughput_mbps(10_485_760, Duration::from_secs(2));
        assert!((speed - 5.24288).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_zero_duration() {
        assert_eq!(throughput_mbps(1024, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_measurement_from_transfer() {
        let m = Measurement::from_transfer(1_700_000_000_000, 10_485_760, Duration::from_secs(2));
        assert_eq!(m.speed_mbps, 5.24);
        assert_eq!(m.data_downloaded_mb, 10.0);
        assert_eq!(m.cumulative_downloaded_mb, 0.0);
        assert_eq!(m.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_measurement_json_keys() {
        let m = entry(5.24, 10.0, 20.0);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["speedMbps"], 5.24);
        assert_eq!(json["dataDownloadedMB"], 10.0);
        assert_eq!(json["totalDownloadedMB"], 20.0);
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_measurement_decodes_without_total() {
        let m: Measurement =
            serde_json::from_str(r#"{"timestamp":1,"speedMbps":3.5,"dataDownloadedMB":10}"#).unwrap();
        assert_eq!(m.cumulative_downloaded_mb, 0.0);
        assert_eq!(m.speed_mbps, 3.5);
    }

    #[test]
    fn test_measurement_accepts_alias_keys() {
        let m: Measurement = serde_json::from_str(
            r#"{"timestampMs":7,"speedMbps":1.0,"dataDownloadedMB":10,"cumulativeDownloadedMB":30}"#,
        )
        .unwrap();
        assert_eq!(m.timestamp, 7);
        assert_eq!(m.cumulative_downloaded_mb, 30.0);
    }

    #[test]
    fn test_aggregates_empty_log() {
        let aggregates = Aggregates::from_log(&[]);
        assert_eq!(aggregates.total_mb, 0.0);
        assert_eq!(aggregates.average_speed_mbps, None);
        assert!(!aggregates.has_data());
    }

    #[test]
    fn test_aggregates_two_entries() {
        let log = vec![entry(4.0, 10.0, 10.0), entry(6.0, 10.0, 20.0)];
        let aggregates = Aggregates::from_log(&log);
        assert_eq!(aggregates.total_mb, 20.0);
        assert_eq!(aggregates.average_speed_mbps, Some(5.0));
        assert_eq!(aggregates.count, 2);
    }

    #[test]
    fn test_cache_busted_url() {
        let target = ProbeTarget::new("https://example.com/10mb.test", 10);
        let url = target.cache_busted_url(1234).unwrap();
        assert_eq!(url.as_str(), "https://example.com/10mb.test?nocache=1234");
    }

    #[test]
    fn test_cache_busted_url_keeps_existing_query() {
        let target = ProbeTarget::new("https://example.com/file?a=1&nocache=5", 10);
        let url = target.cache_busted_url(99).unwrap();
        assert_eq!(url.query(), Some("a=1&nocache=99"));
    }

    #[test]
    fn test_cache_busted_url_rejects_garbage() {
        let target = ProbeTarget::new("not a url", 10);
        assert!(target.cache_busted_url(1).is_err());
    }

    #[test]
    fn test_expected_size_mb() {
        let target = ProbeTarget::new("https://example.com", 10 * 1024 * 1024);
        assert_eq!(target.expected_size_mb(), 10.0);
    }
}
