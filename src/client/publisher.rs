//! Numeric publisher
//!
//! High-level API for streaming decimal values under one producer id.

use std::net::SocketAddr;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::{DecimalDomain, StreamItem};
use crate::error::{Error, Result};

use super::connector::{RelayConnector, RelayReceiver, RelaySender};

/// Events from the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishEvent {
    /// Connected; carries the relay's welcome text
    Connected(String),

    /// Item relayed back to this connection
    ///
    /// Dropped rather than queued when the event channel is full.
    Item(StreamItem),

    /// Disconnected
    Disconnected,
}

/// Numeric producer
///
/// # Example
/// ```no_run
/// use rust_decimal::Decimal;
/// use telemetry_relay::client::Publisher;
/// use telemetry_relay::DecimalDomain;
///
/// # async fn example() -> telemetry_relay::Result<()> {
/// let addr = "127.0.0.1:5000".parse().unwrap();
/// let (mut publisher, mut events) = Publisher::new(addr, "sensor-1", DecimalDomain::UnitInterval);
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// publisher.connect().await?;
/// publisher.send_value(Decimal::new(42, 2)).await?;
/// # Ok(())
/// # }
/// ```
pub struct Publisher {
    addr: SocketAddr,
    producer_id: String,
    domain: DecimalDomain,
    aux_label: String,
    event_tx: mpsc::Sender<PublishEvent>,
    sender: Option<RelaySender>,
    reader_task: Option<JoinHandle<()>>,
}

impl Publisher {
    /// Create a new publisher.
    ///
    /// Returns the publisher and a receiver for events.
    pub fn new(
        addr: SocketAddr,
        producer_id: impl Into<String>,
        domain: DecimalDomain,
    ) -> (Self, mpsc::Receiver<PublishEvent>) {
        let (tx, rx) = mpsc::channel(16);

        let publisher = Self {
            addr,
            producer_id: producer_id.into(),
            domain,
            aux_label: String::new(),
            event_tx: tx,
            sender: None,
            reader_task: None,
        };

        (publisher, rx)
    }

    /// Label attached to every value (e.g. the signal name)
    pub fn with_aux_label(mut self, label: impl Into<String>) -> Self {
        self.aux_label = label.into();
        self
    }

    /// Connect and consume the welcome item
    ///
    /// The inbound side is then drained by a background task so the relay
    /// never sees this connection as a stalled consumer.
    pub async fn connect(&mut self) -> Result<()> {
        let mut connector = RelayConnector::connect(self.addr).await?;
        let welcome = connector.expect_item().await?;
        let text = welcome.text_body().unwrap_or_default().to_string();

        tracing::info!(producer = %self.producer_id, relay = %self.addr, "Publisher connected");
        let _ = self.event_tx.send(PublishEvent::Connected(text)).await;

        let (sender, receiver) = connector.into_split();
        self.stop_reader();
        self.reader_task = Some(tokio::spawn(read_relayed(
            receiver,
            self.event_tx.clone(),
            self.producer_id.clone(),
        )));
        self.sender = Some(sender);
        Ok(())
    }

    /// Send one value.
    ///
    /// Fails with `OutOfRange` without touching the stream when `value`
    /// lies outside the publisher's domain.
    pub async fn send_value(&mut self, value: Decimal) -> Result<()> {
        let mut item = StreamItem::numeric(self.producer_id.as_str(), value, self.domain)?
            .with_aux_label(self.aux_label.as_str());
        if self.domain == DecimalDomain::UnitInterval {
            item = item.with_range("0", "1");
        }

        self.sender()?.send(&item).await
    }

    /// Send a chat line under the producer id
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        let item = StreamItem::text(self.producer_id.as_str(), text);
        self.sender()?.send(&item).await
    }

    /// Disconnect from the relay.
    pub async fn disconnect(&mut self) {
        self.stop_reader();
        if let Some(mut sender) = self.sender.take() {
            let _ = sender.shutdown().await;
        }
        let _ = self.event_tx.send(PublishEvent::Disconnected).await;
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }

    /// Producer id this publisher streams under
    pub fn producer_id(&self) -> &str {
        &self.producer_id
    }

    fn sender(&mut self) -> Result<&mut RelaySender> {
        self.sender.as_mut().ok_or(Error::StreamTerminated)
    }

    fn stop_reader(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

/// Drain relayed items until the relay closes the stream
async fn read_relayed(
    mut receiver: RelayReceiver,
    events: mpsc::Sender<PublishEvent>,
    producer_id: String,
) {
    loop {
        match receiver.recv().await {
            Ok(Some(item)) => {
                let _ = events.try_send(PublishEvent::Item(item));
            }
            Ok(None) => break,
            Err(Error::Json(e)) => {
                tracing::debug!(producer = %producer_id, error = %e, "Skipping malformed relayed item");
            }
            Err(e) => {
                tracing::warn!(producer = %producer_id, error = %e, "Relay stream failed");
                break;
            }
        }
    }

    tracing::debug!(producer = %producer_id, "Relay stream ended");
    let _ = events.try_send(PublishEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;
    use crate::codec::frame::encode_frame;
    use crate::codec::FrameReader;

    #[tokio::test]
    async fn test_send_before_connect() {
        let addr = "127.0.0.1:9".parse().unwrap();
        let (mut publisher, _events) = Publisher::new(addr, "p1", DecimalDomain::Unbounded);

        assert!(!publisher.is_connected());
        let err = publisher.send_value(Decimal::ONE).await;
        assert!(matches!(err, Err(Error::StreamTerminated)));
    }

    #[tokio::test]
    async fn test_out_of_range_rejected_locally() {
        let addr = "127.0.0.1:9".parse().unwrap();
        let (mut publisher, _events) = Publisher::new(addr, "p1", DecimalDomain::UnitInterval);

        let err = publisher.send_value(Decimal::TWO).await;
        assert!(matches!(err, Err(Error::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_publish_values() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let welcome = encode_frame(&StreamItem::system("hi")).unwrap();
            write.write_all(&welcome).await.unwrap();

            let mut reader = FrameReader::new(read);
            let mut items = Vec::new();
            while let Some(item) = reader.next_item().await.unwrap() {
                items.push(item.unwrap());
            }
            items
        });

        let (publisher, mut events) = Publisher::new(addr, "p1", DecimalDomain::UnitInterval);
        let mut publisher = publisher.with_aux_label("sine");
        publisher.connect().await.unwrap();
        assert_eq!(events.recv().await, Some(PublishEvent::Connected("hi".into())));

        publisher.send_value(Decimal::from_str("0.50").unwrap()).await.unwrap();
        publisher.disconnect().await;
        assert_eq!(events.recv().await, Some(PublishEvent::Disconnected));

        let items = server.await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].producer_id(), "p1");
        assert_eq!(items[0].aux_label(), "sine");
        assert_eq!(items[0].range_min(), Some("0"));
        assert_eq!(items[0].numeric_value(), Decimal::from_str("0.5").ok());
    }

    #[tokio::test]
    async fn test_relayed_items_are_forwarded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&encode_frame(&StreamItem::system("hi")).unwrap()).await.unwrap();
            socket.write_all(b"garbage\n").await.unwrap();
            let echo = StreamItem::text("other", "ping");
            socket.write_all(&encode_frame(&echo).unwrap()).await.unwrap();
        });

        let (mut publisher, mut events) = Publisher::new(addr, "p1", DecimalDomain::Unbounded);
        publisher.connect().await.unwrap();

        assert_eq!(events.recv().await, Some(PublishEvent::Connected("hi".into())));
        match events.recv().await {
            Some(PublishEvent::Item(item)) => assert_eq!(item.text_body(), Some("ping")),
            other => panic!("unexpected event {other:?}"),
        }
        // Relay closed the stream
        assert_eq!(events.recv().await, Some(PublishEvent::Disconnected));
    }
}
