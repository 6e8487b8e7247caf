//! Series store implementation

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::config::StoreConfig;
use super::series::{DataPoint, Series};
use crate::error::Result;

/// Store of windowed series, one per producer
///
/// The producer index is sharded (`DashMap`) and every series has its own
/// lock, so producers never contend with each other. Locks are only held
/// for an append+trim or a copy-out, never across an `.await`.
pub struct SeriesStore {
    /// Map of producer id to its series
    series: DashMap<String, Mutex<Series>>,

    /// Most recent point per producer; outlives retention
    latest: DashMap<String, DataPoint>,

    /// Retention window as a chrono duration
    retention: chrono::Duration,

    /// Configuration
    config: StoreConfig,
}

impl SeriesStore {
    /// Create a store with default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with custom configuration
    pub fn with_config(config: StoreConfig) -> Self {
        let retention =
            chrono::Duration::from_std(config.retention).unwrap_or(chrono::Duration::MAX);

        Self {
            series: DashMap::new(),
            latest: DashMap::new(),
            retention,
            config,
        }
    }

    /// Get the store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Record a value for a producer, stamped now
    pub fn update(&self, producer_id: &str, value: Decimal) -> Result<()> {
        self.update_at(producer_id, value, Utc::now())
    }

    /// Record a value for a producer at an explicit time
    ///
    /// Fails with `OutOfRange` (and stores nothing) if the value is outside
    /// the configured domain.
    pub fn update_at(&self, producer_id: &str, value: Decimal, timestamp: DateTime<Utc>) -> Result<()> {
        let value = self.config.domain.check(value)?;
        let point = DataPoint::new(timestamp, value);

        let trimmed = match self.series.get(producer_id) {
            Some(series) => self.append(producer_id, &series, point),
            None => {
                let series = self
                    .series
                    .entry(producer_id.to_owned())
                    .or_insert_with(|| Mutex::new(self.new_series()));
                self.append(producer_id, &series, point)
            }
        };

        if trimmed > 0 {
            tracing::trace!(producer = %producer_id, trimmed = trimmed, "Series trimmed");
        }

        Ok(())
    }

    /// Push under the series lock so `latest` follows append order
    fn append(&self, producer_id: &str, series: &Mutex<Series>, point: DataPoint) -> usize {
        let mut series = series.lock();
        let trimmed = series.push(point);
        if let Some(last) = series.latest() {
            self.latest.insert(producer_id.to_owned(), *last);
        }
        trimmed
    }

    /// Most recent value of every producer
    ///
    /// Unaffected by retention: a producer whose history has aged out
    /// still reports its last value.
    pub fn latest_snapshot(&self) -> HashMap<String, Decimal> {
        self.latest
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().value))
            .collect()
    }

    /// Most recent value of one producer
    pub fn latest(&self, producer_id: &str) -> Option<Decimal> {
        self.latest.get(producer_id).map(|point| point.value)
    }

    /// Copy of every series, oldest point first
    pub fn history_snapshot(&self) -> HashMap<String, Vec<DataPoint>> {
        self.series
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().snapshot()))
            .collect()
    }

    /// Copy of one producer's series
    pub fn series(&self, producer_id: &str) -> Option<Vec<DataPoint>> {
        let series = self.series.get(producer_id)?;
        let points = series.lock().snapshot();
        Some(points)
    }

    /// Number of producers with a series
    pub fn producer_count(&self) -> usize {
        self.series.len()
    }

    /// Drop every series whose points have all aged out
    ///
    /// Latest values are kept. Returns the number of series removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .series
            .iter()
            .filter_map(|entry| {
                let mut series = entry.value().lock();
                series.trim(now);
                series.is_empty().then(|| entry.key().clone())
            })
            .collect();

        let mut removed = 0;
        for key in expired {
            // An update may have landed since the scan
            if self
                .series
                .remove_if(&key, |_, series| series.lock().is_empty())
                .is_some()
            {
                tracing::debug!(producer = %key, "Expired series removed");
                removed += 1;
            }
        }

        removed
    }

    /// Spawn background purge task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let interval = store.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.purge_expired(Utc::now());
            }
        })
    }

    fn new_series(&self) -> Series {
        Series::new(self.retention, self.config.capacity)
    }
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}
