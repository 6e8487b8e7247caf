//! Stream item carried on every connection

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::decimal::{self, DecimalDomain};
use super::CodecError;

/// Producer id used for items the relay itself originates
pub const SYSTEM_PRODUCER: &str = "System";

/// Item payload: either chat text or a numeric value in canonical text form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// Free-form chat text
    Text(String),
    /// Canonical decimal text (see [`decimal::encode`])
    NumericText(String),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Text(String::new())
    }
}

/// A single item relayed between connections
///
/// Items are immutable once built; the relay forwards exactly what the
/// producer sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamItem {
    producer_id: String,
    #[serde(default)]
    payload: Payload,
    #[serde(default)]
    timestamp_unix_seconds: i64,
    #[serde(default)]
    aux_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range_min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range_max: Option<String>,
}

impl StreamItem {
    fn new(producer_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            producer_id: producer_id.into(),
            payload,
            timestamp_unix_seconds: Utc::now().timestamp(),
            aux_label: String::new(),
            range_min: None,
            range_max: None,
        }
    }

    /// Create a text (chat) item stamped with the current time
    pub fn text(producer_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(producer_id, Payload::Text(text.into()))
    }

    /// Create a numeric item, encoding `value` in canonical form
    pub fn numeric(
        producer_id: impl Into<String>,
        value: Decimal,
        domain: DecimalDomain,
    ) -> Result<Self, CodecError> {
        let text = decimal::encode(value, domain)?;
        Ok(Self::new(producer_id, Payload::NumericText(text)))
    }

    /// Create a numeric item from already-encoded text
    ///
    /// The text is carried verbatim; receivers decode it with
    /// [`StreamItem::numeric_value`].
    pub fn numeric_text(producer_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(producer_id, Payload::NumericText(text.into()))
    }

    /// Create an item originated by the relay itself
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(SYSTEM_PRODUCER, text)
    }

    /// Set the timestamp (unix seconds)
    pub fn with_timestamp(mut self, timestamp_unix_seconds: i64) -> Self {
        self.timestamp_unix_seconds = timestamp_unix_seconds;
        self
    }

    /// Set the auxiliary label (e.g. waveform mode)
    pub fn with_aux_label(mut self, label: impl Into<String>) -> Self {
        self.aux_label = label.into();
        self
    }

    /// Set the display range hint
    pub fn with_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.range_min = Some(min.into());
        self.range_max = Some(max.into());
        self
    }

    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn timestamp_unix_seconds(&self) -> i64 {
        self.timestamp_unix_seconds
    }

    pub fn aux_label(&self) -> &str {
        &self.aux_label
    }

    pub fn range_min(&self) -> Option<&str> {
        self.range_min.as_deref()
    }

    pub fn range_max(&self) -> Option<&str> {
        self.range_max.as_deref()
    }

    /// Chat text, if this is a text item
    pub fn text_body(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::NumericText(_) => None,
        }
    }

    /// Decoded numeric payload
    ///
    /// `None` means "no numeric payload": a text item, empty numeric text,
    /// or numeric text that does not decode.
    pub fn numeric_value(&self) -> Option<Decimal> {
        match &self.payload {
            Payload::NumericText(text) => decimal::decode(text),
            Payload::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_numeric_item() {
        let value = Decimal::from_str("0.750").unwrap();
        let item = StreamItem::numeric("p1", value, DecimalDomain::UnitInterval)
            .unwrap()
            .with_aux_label("sine")
            .with_range("0", "1");

        assert_eq!(item.payload(), &Payload::NumericText("0.75".into()));
        assert_eq!(item.numeric_value(), Some(value));
        assert_eq!(item.aux_label(), "sine");
        assert_eq!(item.range_min(), Some("0"));
        assert_eq!(item.range_max(), Some("1"));
        assert!(item.text_body().is_none());
        assert!(item.timestamp_unix_seconds() > 0);
    }

    #[test]
    fn test_numeric_item_out_of_range() {
        let result = StreamItem::numeric("p1", Decimal::TWO, DecimalDomain::UnitInterval);
        assert!(matches!(result, Err(CodecError::OutOfRange(_))));
    }

    #[test]
    fn test_text_item_has_no_numeric_value() {
        let item = StreamItem::text("alice", "0.5");
        assert_eq!(item.text_body(), Some("0.5"));
        assert_eq!(item.numeric_value(), None);
    }

    #[test]
    fn test_empty_or_malformed_numeric_text_is_no_value() {
        assert_eq!(StreamItem::numeric_text("p1", "").numeric_value(), None);
        assert_eq!(StreamItem::numeric_text("p1", "0,5").numeric_value(), None);
    }

    #[test]
    fn test_json_shape() {
        let item = StreamItem::numeric_text("p1", "0.5").with_timestamp(1_700_000_000);
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["producer_id"], "p1");
        assert_eq!(json["payload"]["kind"], "numeric_text");
        assert_eq!(json["payload"]["body"], "0.5");
        assert_eq!(json["timestamp_unix_seconds"], 1_700_000_000);
        assert!(json.get("range_min").is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let item: StreamItem = serde_json::from_str(r#"{"producer_id":"bob"}"#).unwrap();
        assert_eq!(item.text_body(), Some(""));
        assert_eq!(item.timestamp_unix_seconds(), 0);
        assert_eq!(item.aux_label(), "");
    }
}
