//! Windowed per-producer series store
//!
//! Each producer owns one append-only series of `(timestamp, value)` points.
//! A series is bounded twice: by age (the retention window) and by count
//! (the capacity cap). Both bounds are enforced on every append by trimming
//! a prefix, which is valid because points arrive in non-decreasing
//! timestamp order.
//!
//! ```text
//!   DashMap<producer, Mutex<Series>>           (sharded index)
//!        │
//!        └── Series: VecDeque<DataPoint>        (per-series lock)
//!              oldest ◄──── trim ──── append ────► newest
//! ```
//!
//! Readers never see the live deque; snapshots copy points out. The latest
//! point of each producer is also kept outside its series, so it survives
//! the series aging out entirely.

pub mod config;
pub mod series;
pub mod store;

pub use config::StoreConfig;
pub use series::{DataPoint, Series};
pub use store::SeriesStore;
