//! Append-only measurement log with running totals
//!
//! The log is one JSON array stored under a single key. Every append is a
//! whole-blob read-modify-write. A blob that is not a JSON array is discarded
//! with a warning instead of failing the session; unreadable records inside
//! an array are skipped and dropped on the next write.

mod blob;

pub use blob::{BlobStore, FileBlobStore, MemoryBlobStore};

use crate::error::{AppError, Result};
use crate::logging::Logger;
use crate::models::{Aggregates, ChartPoint, Measurement};
use std::sync::Arc;

/// Persistent, ordered log of completed measurements
pub struct ResultStore {
    backend: Arc<dyn BlobStore>,
    key: String,
    max_entries: usize,
    logger: Logger,
}

impl ResultStore {
    /// Store under the default key with no practical retention cap
    pub fn new(backend: Arc<dyn BlobStore>, logger: Logger) -> Self {
        Self {
            backend,
            key: crate::defaults::STORAGE_KEY.to_string(),
            max_entries: crate::defaults::DEFAULT_MAX_ENTRIES,
            logger: logger.named("STORE"),
        }
    }

    /// Keep at most `max_entries` measurements, dropping the oldest first
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Every stored measurement in chronological order
    pub async fn all(&self) -> Result<Vec<Measurement>> {
        let blob = match self.backend.load(&self.key)? {
            Some(blob) => blob,
            None => return Ok(Vec::new()),
        };

        let records = match serde_json::from_str::<Vec<serde_json::Value>>(&blob) {
            Ok(records) => records,
            Err(e) => {
                self.logger
                    .warn("Stored data is corrupted, clearing storage")
                    .field("key", &self.key)
                    .field("error", e.to_string())
                    .log()
                    .await;
                self.backend.remove(&self.key)?;
                return Ok(Vec::new());
            }
        };

        let mut log = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<Measurement>(record) {
                Ok(measurement) => log.push(measurement),
                Err(e) => {
                    self.logger
                        .warn("Skipping unreadable stored measurement")
                        .field("key", &self.key)
                        .field("index", index)
                        .field("error", e.to_string())
                        .log()
                        .await;
                }
            }
        }

        Ok(log)
    }

    /// Append a measurement, filling in its cumulative total.
    ///
    /// Returns the measurement as stored.
    pub async fn append(&self, mut measurement: Measurement) -> Result<Measurement> {
        let mut log = self.all().await?;

        let previous_total = log
            .last()
            .map(|m| m.cumulative_downloaded_mb)
            .unwrap_or(0.0);
        measurement.cumulative_downloaded_mb = previous_total + measurement.data_downloaded_mb;

        log.push(measurement.clone());

        if log.len() > self.max_entries {
            let excess = log.len() - self.max_entries;
            log.drain(..excess);
            self.logger
                .debug("Dropped oldest measurements over retention cap")
                .field("dropped", excess)
                .field("max_entries", self.max_entries)
                .log()
                .await;
        }

        let blob = serde_json::to_string(&log)
            .map_err(|e| AppError::storage(format!("Failed to serialize result log: {}", e)))?;
        self.backend.save(&self.key, &blob)?;

        Ok(measurement)
    }

    /// Remove every stored measurement
    pub fn clear(&self) -> Result<()> {
        self.backend.remove(&self.key)
    }

    /// Totals and averages over the stored log
    pub async fn aggregates(&self) -> Result<Aggregates> {
        Ok(Aggregates::from_log(&self.all().await?))
    }

    /// Chart series for the stored log, in log order
    pub async fn chart_points(&self) -> Result<Vec<ChartPoint>> {
        Ok(self.all().await?.iter().map(Measurement::chart_point).collect())
    }
}
