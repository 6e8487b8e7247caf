//! Session handler

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Notify};

use super::state::{SessionPhase, SessionState};
use crate::codec::frame::{encode_frame, FrameReader, DEFAULT_MAX_FRAME_LEN};
use crate::codec::StreamItem;
use crate::error::{Error, Result};
use crate::notify::RelayEvent;
use crate::registry::{ConnectionHandle, ConnectionId, EchoMode};
use crate::relay::Relay;
use crate::stats::SessionStats;

/// Why a session left the `Active` phase
#[derive(Debug)]
pub enum CloseReason {
    /// Peer finished its inbound stream
    EndOfInput,
    /// Reading from the peer failed
    ReadError(io::Error),
    /// Writing to the peer failed
    WriteError(io::Error),
    /// The registry dropped this connection after a failed broadcast write
    Evicted,
    /// Server is shutting down
    Shutdown,
}

impl CloseReason {
    /// Whether this is a normal end of life rather than a failure
    pub fn is_graceful(&self) -> bool {
        matches!(
            self,
            CloseReason::EndOfInput | CloseReason::Evicted | CloseReason::Shutdown
        )
    }
}

/// One connection's lifecycle
pub struct Session {
    relay: Arc<Relay>,
    state: SessionState,
    max_frame_len: usize,
}

impl Session {
    /// Create a session in the `Connecting` phase
    pub fn new(relay: Arc<Relay>, peer: impl Into<String>) -> Self {
        let id = relay.registry().next_connection_id();
        Self {
            relay,
            state: SessionState::new(id, peer),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Set the maximum inbound frame length
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.state.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn stats(&self) -> &SessionStats {
        &self.state.stats
    }

    /// Run the session until the stream ends or `shutdown` resolves
    ///
    /// Registers the connection, writes the welcome item, then relays
    /// inbound items while draining the outbound queue onto `writer`.
    /// Whatever ends first (end of input, read error, write error,
    /// eviction, shutdown) moves the session to `Closing`; teardown then
    /// runs exactly once.
    pub async fn run<R, W, F>(mut self, reader: R, mut writer: W, shutdown: F) -> Result<SessionStats>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let (mut outbound, evicted) = self.activate();
        let write_timeout = self.relay.registry().config().write_timeout;

        // Welcome goes out before any inbound item is processed
        let welcome = encode_frame(&self.relay.welcome_item())?;
        if let Err(e) = write_frame(&mut writer, &welcome, write_timeout).await {
            return self
                .finish(CloseReason::WriteError(e))
                .map(|()| self.state.stats.clone());
        }

        let mut reader = FrameReader::with_max_frame_len(reader, self.max_frame_len);

        let reason = tokio::select! {
            reason = self.read_loop(&mut reader) => reason,
            reason = write_loop(&mut writer, &mut outbound, write_timeout) => reason,
            _ = evicted.notified() => CloseReason::Evicted,
            _ = shutdown => CloseReason::Shutdown,
        };

        self.finish(reason)?;
        Ok(self.state.stats.clone())
    }

    /// Register with the broadcaster and enter `Active`
    fn activate(&mut self) -> (mpsc::Receiver<Bytes>, Arc<Notify>) {
        let registry = self.relay.registry();
        let (handle, rx) = ConnectionHandle::channel(
            self.state.id,
            self.state.peer.clone(),
            registry.config().outbound_capacity,
        );
        let evicted = handle.eviction_signal();
        registry.register(handle);
        self.relay.stats().record_connection();
        self.state.activate();
        (rx, evicted)
    }

    async fn read_loop<R: AsyncRead + Unpin>(&mut self, reader: &mut FrameReader<R>) -> CloseReason {
        loop {
            match reader.next_item().await {
                Ok(Some(Ok(item))) => self.on_item(item).await,
                Ok(Some(Err(e))) => {
                    self.state.stats.frames_received += 1;
                    self.state.stats.malformed_frames += 1;
                    self.relay.stats().record_malformed();
                    tracing::warn!(
                        session_id = %self.state.id,
                        error = %e,
                        "Dropping malformed frame"
                    );
                }
                Ok(None) => return CloseReason::EndOfInput,
                Err(e) => return CloseReason::ReadError(e),
            }
        }
    }

    async fn on_item(&mut self, item: StreamItem) {
        self.state.stats.frames_received += 1;

        let producer_id = item.producer_id().trim();
        if !producer_id.is_empty() {
            if let Some(value) = item.numeric_value() {
                self.state.stats.numeric_items += 1;
                self.observe_producer(producer_id);

                match self.relay.store().update(producer_id, value) {
                    Ok(()) => self.relay.publish(RelayEvent::ValueUpdated {
                        producer_id: producer_id.to_owned(),
                        value,
                        timestamp: chrono::Utc::now(),
                        aux_label: item.aux_label().to_owned(),
                        range_min: item.range_min().map(str::to_owned),
                        range_max: item.range_max().map(str::to_owned),
                    }),
                    Err(e) => {
                        self.state.stats.out_of_range += 1;
                        self.relay.stats().record_out_of_range();
                        tracing::warn!(
                            session_id = %self.state.id,
                            producer = %producer_id,
                            error = %e,
                            "Value not stored"
                        );
                    }
                }
            }
        }

        let frame = match encode_frame(&item) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(session_id = %self.state.id, error = %e, "Failed to encode item");
                return;
            }
        };

        let exclude = match self.relay.registry().config().echo_mode {
            EchoMode::All => None,
            EchoMode::ExcludeSender => Some(self.state.id),
        };

        let outcome = self.relay.registry().broadcast(frame, exclude).await;
        self.state.stats.deliveries += outcome.delivered as u64;
        self.relay.stats().record_relayed();

        tracing::trace!(
            session_id = %self.state.id,
            producer = %item.producer_id(),
            delivered = outcome.delivered,
            evicted = outcome.evicted.len(),
            "Item relayed"
        );
    }

    fn observe_producer(&mut self, producer_id: &str) {
        if !self.state.claim_producer(producer_id) {
            return;
        }

        if self.relay.presence().observe_first_message(producer_id, self.state.id) {
            tracing::info!(session_id = %self.state.id, producer = %producer_id, "Producer joined");
            self.relay.publish(RelayEvent::joined(producer_id));
        }
    }

    /// Closing -> Closed; runs at most once
    ///
    /// Read and write failures come back as `Error::Io`.
    fn finish(&mut self, reason: CloseReason) -> Result<()> {
        if !self.state.begin_close() {
            return Ok(());
        }

        if reason.is_graceful() {
            tracing::debug!(session_id = %self.state.id, reason = ?reason, "Stream terminated");
        } else {
            tracing::warn!(session_id = %self.state.id, reason = ?reason, "Stream failed");
        }

        let id = self.state.id;
        self.relay.registry().unregister(id);

        if let Some(producer_id) = self.state.producer_id.take() {
            if self.relay.presence().mark_departed(&producer_id, id) {
                tracing::info!(session_id = %id, producer = %producer_id, "Producer left");
                self.relay.publish(RelayEvent::left(producer_id));
            }
        }

        self.state.close();

        match reason {
            CloseReason::ReadError(e) | CloseReason::WriteError(e) => Err(Error::Io(e)),
            _ => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Reached on early return or task cancellation
        if self.state.phase != SessionPhase::Closed {
            let _ = self.finish(CloseReason::Shutdown);
        }
    }
}

/// Drain the outbound queue onto the socket
///
/// Every write is bounded by `write_timeout`; a peer that stops reading
/// fails the session instead of parking it.
async fn write_loop<W: AsyncWrite + Unpin>(
    writer: &mut W,
    outbound: &mut mpsc::Receiver<Bytes>,
    write_timeout: Duration,
) -> CloseReason {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(writer, &frame, write_timeout).await {
            return CloseReason::WriteError(e);
        }
        // Drain whatever is already queued
        while let Ok(frame) = outbound.try_recv() {
            if let Err(e) = write_frame(writer, &frame, write_timeout).await {
                return CloseReason::WriteError(e);
            }
        }
    }

    // Every sender is gone: the registry no longer holds our handle
    CloseReason::Evicted
}

/// Write and flush one frame within `write_timeout`
async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
    write_timeout: Duration,
) -> io::Result<()> {
    let write = async {
        writer.write_all(frame).await?;
        writer.flush().await
    };

    match tokio::time::timeout(write_timeout, write).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "peer write timed out")),
    }
}
