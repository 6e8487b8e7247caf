//! Per-producer point series
//!
//! A bounded deque of points for one producer. Late joiners hydrate from a
//! copy of it; the deque itself never leaves the store.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A single observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataPoint {
    /// When the value was recorded
    pub timestamp: DateTime<Utc>,
    /// Recorded value
    pub value: Decimal,
}

impl DataPoint {
    pub fn new(timestamp: DateTime<Utc>, value: Decimal) -> Self {
        Self { timestamp, value }
    }
}

/// Time-windowed, capacity-bounded series
#[derive(Debug)]
pub struct Series {
    /// Maximum age of a retained point
    retention: Duration,
    /// Maximum number of retained points
    capacity: usize,
    /// Points in non-decreasing timestamp order
    points: VecDeque<DataPoint>,
}

impl Series {
    /// Create an empty series
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            retention,
            capacity: capacity.max(1),
            points: VecDeque::new(),
        }
    }

    /// Append a point and trim to both bounds
    ///
    /// A timestamp older than the current tail is clamped to the tail so
    /// that ordering holds. Returns the number of points trimmed.
    pub fn push(&mut self, mut point: DataPoint) -> usize {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                point.timestamp = last.timestamp;
            }
        }

        let now = point.timestamp;
        self.points.push_back(point);
        self.trim(now)
    }

    /// Trim points older than `now - retention`, then any excess over capacity
    ///
    /// Both trims remove a prefix. Returns the number of points removed.
    pub fn trim(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;

        if let Some(cutoff) = now.checked_sub_signed(self.retention) {
            while self.points.front().is_some_and(|p| p.timestamp < cutoff) {
                self.points.pop_front();
                removed += 1;
            }
        }

        if self.points.len() > self.capacity {
            let excess = self.points.len() - self.capacity;
            self.points.drain(..excess);
            removed += excess;
        }

        removed
    }

    /// Most recently appended point
    pub fn latest(&self) -> Option<&DataPoint> {
        self.points.back()
    }

    /// Oldest retained point
    pub fn oldest(&self) -> Option<&DataPoint> {
        self.points.front()
    }

    /// Copy the points out, oldest first
    pub fn snapshot(&self) -> Vec<DataPoint> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
