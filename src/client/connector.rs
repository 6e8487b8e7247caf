//! Relay connector
//!
//! Owns one TCP stream to a relay and moves [`StreamItem`]s across it.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::codec::frame::encode_frame;
use crate::codec::{FrameReader, StreamItem};
use crate::error::{Error, Result};

/// Low-level connection to a relay
pub struct RelayConnector {
    sender: RelaySender,
    receiver: RelayReceiver,
    peer: SocketAddr,
}

/// Outbound half of a [`RelayConnector`]
pub struct RelaySender {
    writer: OwnedWriteHalf,
}

/// Inbound half of a [`RelayConnector`]
pub struct RelayReceiver {
    reader: FrameReader<OwnedReadHalf>,
}

impl RelayConnector {
    /// Connect to a relay
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        tracing::debug!(peer = %peer, "Connected to relay");

        Ok(Self {
            sender: RelaySender { writer },
            receiver: RelayReceiver {
                reader: FrameReader::new(reader),
            },
            peer,
        })
    }

    /// Address of the relay
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send one item
    pub async fn send(&mut self, item: &StreamItem) -> Result<()> {
        self.sender.send(item).await
    }

    /// Receive the next item
    ///
    /// Returns `Ok(None)` once the relay closes the stream.
    pub async fn recv(&mut self) -> Result<Option<StreamItem>> {
        self.receiver.recv().await
    }

    /// Receive the next item, treating end of stream as an error
    pub async fn expect_item(&mut self) -> Result<StreamItem> {
        self.receiver.expect_item().await
    }

    /// Finish the outbound half; the relay sees end of input
    pub async fn shutdown(&mut self) -> Result<()> {
        self.sender.shutdown().await
    }

    /// Split into halves that can be driven from separate tasks
    pub fn into_split(self) -> (RelaySender, RelayReceiver) {
        (self.sender, self.receiver)
    }
}

impl RelaySender {
    /// Send one item
    pub async fn send(&mut self, item: &StreamItem) -> Result<()> {
        let frame = encode_frame(item)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Finish the outbound half
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl RelayReceiver {
    /// Receive the next item, `Ok(None)` at end of stream
    pub async fn recv(&mut self) -> Result<Option<StreamItem>> {
        match self.reader.next_item().await? {
            Some(item) => Ok(Some(item?)),
            None => Ok(None),
        }
    }

    /// Receive the next item, treating end of stream as an error
    pub async fn expect_item(&mut self) -> Result<StreamItem> {
        self.recv().await?.ok_or(Error::StreamTerminated)
    }
}
