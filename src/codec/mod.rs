//! Wire codecs
//!
//! Items travel as one JSON object per line. Numeric payloads are carried as
//! canonical decimal text (see [`decimal`]) because JSON numbers would lose
//! precision on the way through.

pub mod decimal;
pub mod frame;
pub mod item;

pub use decimal::DecimalDomain;
pub use frame::{decode_frame, encode_frame, FrameReader};
pub use item::{Payload, StreamItem};

use rust_decimal::Decimal;

/// Error type for codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Value outside the declared domain
    #[error("value {0} is outside the declared domain")]
    OutOfRange(Decimal),

    /// Frame is not a valid JSON item
    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),
}
