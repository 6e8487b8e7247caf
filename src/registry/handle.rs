//! Connection identity and write capability

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::error::{Error, Result};

/// Stable identifier of one connection
///
/// Allocated once per accepted stream and never reused; a reconnect gets a
/// new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write capability for one registered connection
///
/// Cheap to clone. Frames pushed here are written to the socket by the
/// connection's own task, in order.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection id
    id: ConnectionId,

    /// Remote peer label (address or test name)
    peer: String,

    /// When the connection was registered
    connected_at: Instant,

    /// Outbound queue
    tx: mpsc::Sender<Bytes>,

    /// Fired once when the registry evicts this connection
    evicted: Arc<Notify>,
}

impl ConnectionHandle {
    /// Wrap an existing outbound queue
    pub fn new(id: ConnectionId, peer: impl Into<String>, tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            peer: peer.into(),
            connected_at: Instant::now(),
            tx,
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Create a handle together with the receiving end of its queue
    pub fn channel(
        id: ConnectionId,
        peer: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, peer, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Signal the owning session waits on to learn it was evicted
    ///
    /// The permit is stored, so waiting after the eviction still returns.
    pub fn eviction_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.evicted)
    }

    pub(super) fn signal_evicted(&self) {
        self.evicted.notify_one();
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a frame, waiting at most `timeout` for room
    pub(super) async fn send(&self, frame: Bytes, timeout: Duration) -> Result<()> {
        self.tx.send_timeout(frame, timeout).await.map_err(|e| {
            let reason = match e {
                SendTimeoutError::Timeout(_) => "timed out",
                SendTimeoutError::Closed(_) => "closed",
            };
            tracing::debug!(
                connection = %self.id,
                peer = %self.peer,
                reason = reason,
                "Peer write failed"
            );
            Error::PeerWriteFailure(self.id.get())
        })
    }
}
