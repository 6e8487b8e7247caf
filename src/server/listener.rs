//! Relay server listener
//!
//! Handles the TCP accept loop and spawns one session task per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::notify::{EventHub, EventSink};
use crate::relay::Relay;
use crate::server::admin::{self, AdminState};
use crate::server::config::ServerConfig;
use crate::session::Session;

/// Relay server
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
    events: Arc<EventHub>,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: watch::Sender<bool>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let events = Arc::new(EventHub::new());
        let sink: Arc<dyn EventSink> = events.clone();
        let relay = Arc::new(Relay::with_config(
            config.registry.clone(),
            config.store.clone(),
            sink,
        ));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            relay,
            events,
            connection_semaphore,
            shutdown,
        }
    }

    /// Shared relay state
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Relay event feed
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let admin = match self.config.admin_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        self.serve(listener, admin, shutdown).await
    }

    /// Serve on already bound listeners
    ///
    /// On shutdown every session is signalled and awaited before returning.
    pub async fn serve<F>(
        &self,
        listener: TcpListener,
        admin: Option<TcpListener>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        let admin_handle = match admin {
            Some(admin) => Some(self.spawn_admin(admin)?),
            None => None,
        };

        let cleanup_handle = self.relay.spawn_cleanup_task();
        let mut sessions = JoinSet::new();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, &mut sessions) => result,
        };

        // Unwind sessions and the admin surface
        self.shutdown.send_replace(true);
        while sessions.join_next().await.is_some() {}

        cleanup_handle.abort();
        if let Some(handle) = admin_handle {
            let _ = handle.await;
        }

        tracing::info!(
            connections = self.relay.stats().snapshot().total_connections,
            "Relay server stopped"
        );

        result
    }

    async fn accept_loop(
        &self,
        listener: &TcpListener,
        sessions: &mut JoinSet<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, sessions);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                // Reap finished sessions
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        sessions: &mut JoinSet<()>,
    ) {
        // Check connection limit
        let permit: Option<OwnedSemaphorePermit> = match self.connection_semaphore {
            Some(ref sem) => match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let session = Session::new(Arc::clone(&self.relay), peer_addr.to_string())
            .max_frame_len(self.config.max_frame_len);
        let session_id = session.id();
        let mut shutdown = self.shutdown.subscribe();

        tracing::debug!(session_id = %session_id, peer = %peer_addr, "New connection");

        sessions.spawn(async move {
            let _permit = permit;
            let (reader, writer) = socket.into_split();
            let stop = async move {
                let _ = shutdown.wait_for(|stopped| *stopped).await;
            };

            match session.run(reader, writer, stop).await {
                Ok(stats) => tracing::debug!(
                    session_id = %session_id,
                    frames = stats.frames_received,
                    deliveries = stats.deliveries,
                    "Connection closed"
                ),
                Err(e) => tracing::debug!(
                    session_id = %session_id,
                    error = %e,
                    "Connection error"
                ),
            }
        });
    }

    fn spawn_admin(&self, listener: TcpListener) -> Result<tokio::task::JoinHandle<()>> {
        let addr = listener.local_addr()?;
        let app = admin::router(AdminState::new(
            Arc::clone(&self.relay),
            Arc::clone(&self.events),
            self.shutdown.subscribe(),
        ));
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!(addr = %addr, "Admin HTTP listening");

        Ok(tokio::spawn(async move {
            let stop = async move {
                let _ = shutdown.wait_for(|stopped| *stopped).await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "Admin HTTP server failed");
            }
        }))
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::codec::frame::encode_frame;
    use crate::codec::{FrameReader, StreamItem};

    async fn bind() -> TcpListener {
        TcpListener::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn test_shutdown_unwinds_sessions() {
        let server = Arc::new(RelayServer::new(ServerConfig::default()));
        let listener = bind().await;
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn({
            let server = Arc::clone(&server);
            async move {
                server
                    .serve(listener, None, async {
                        let _ = rx.await;
                    })
                    .await
            }
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = FrameReader::new(stream);
        let welcome = reader.next_item().await.unwrap().unwrap().unwrap();
        assert_eq!(welcome.producer_id(), "System");
        assert_eq!(server.relay().registry().len(), 1);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(server.relay().registry().is_empty());
        // Server side closed the stream
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server = Arc::new(RelayServer::new(ServerConfig::default().max_connections(1)));
        let listener = bind().await;
        let addr = listener.local_addr().unwrap();

        tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.serve(listener, None, std::future::pending()).await }
        });

        let first = TcpStream::connect(addr).await.unwrap();
        let mut first = FrameReader::new(first);
        first.next_frame().await.unwrap().unwrap();

        // Second connection is accepted by the OS then dropped
        let second = TcpStream::connect(addr).await.unwrap();
        let mut second = FrameReader::new(second);
        let closed = tokio::time::timeout(Duration::from_secs(2), second.next_frame())
            .await
            .unwrap();
        assert!(matches!(closed, Ok(None) | Err(_)));
        assert_eq!(server.relay().registry().len(), 1);
    }

    #[tokio::test]
    async fn test_relays_between_tcp_clients() {
        let server = Arc::new(RelayServer::new(ServerConfig::default()));
        let listener = bind().await;
        let addr = listener.local_addr().unwrap();

        tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.serve(listener, None, std::future::pending()).await }
        });

        let (read_a, mut write_a) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut reader_a = FrameReader::new(read_a);
        reader_a.next_frame().await.unwrap().unwrap();

        let (read_b, _write_b) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut reader_b = FrameReader::new(read_b);
        reader_b.next_frame().await.unwrap().unwrap();

        let item = StreamItem::numeric_text("p1", "0.75");
        write_a.write_all(&encode_frame(&item).unwrap()).await.unwrap();

        let received = reader_b.next_item().await.unwrap().unwrap().unwrap();
        assert_eq!(received, item);
    }
}
