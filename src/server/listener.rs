//! Relay server listener
//!
//! Runs one accept loop for producers and one for viewers and spawns a
//! handler per connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::error::{HandshakeError, Result};
use crate::media::{FrameCodec, FrameReader};
use crate::registry::{RegistryConfig, ScanoutRegistry};
use crate::server::config::ServerConfig;
use crate::server::handshake::{HandshakeStatus, Hello, Role};
use crate::subscriber::WriterSink;

/// TCP relay in front of a [`ScanoutRegistry`]
pub struct FanoutServer {
    config: ServerConfig,
    registry: Arc<ScanoutRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl FanoutServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        Self::with_registry(config, Arc::new(ScanoutRegistry::with_config(registry_config)))
    }

    /// Create a server sharing an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<ScanoutRegistry>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the scanout registry
    pub fn registry(&self) -> &Arc<ScanoutRegistry> {
        &self.registry
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server
    ///
    /// This method blocks until an accept loop fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ingest = TcpListener::bind(self.config.ingest_addr).await?;
        let viewer = TcpListener::bind(self.config.viewer_addr).await?;
        self.serve(ingest, viewer, shutdown).await
    }

    /// Serve on already-bound listeners until `shutdown` resolves
    pub async fn serve<F>(
        &self,
        ingest: TcpListener,
        viewer: TcpListener,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            ingest = %ingest.local_addr()?,
            viewer = %viewer.local_addr()?,
            "Fan-out server listening"
        );

        // Spawn cleanup task for the scanout registry
        let cleanup_handle = self.registry.spawn_cleanup_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&ingest, Role::Producer) => result,
            result = self.accept_loop(&viewer, Role::Viewer) => result,
        };

        // Stop cleanup task on shutdown
        cleanup_handle.abort();
        self.registry.shutdown().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener, role: Role) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, role);
                }
                Err(e) => {
                    tracing::error!(error = %e, role = ?role, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, role: Role) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            role = ?role,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let _permit = permit;

            let result = match role {
                Role::Producer => serve_producer(session_id, socket, &config, &registry).await,
                Role::Viewer => serve_viewer(session_id, socket, &config, &registry).await,
            };

            if let Err(e) = result {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

/// Read the hello and check it was sent to the right listener
async fn accept_hello(
    socket: &mut TcpStream,
    config: &ServerConfig,
    expected: Role,
) -> Result<Hello> {
    let read = match timeout(config.handshake_timeout, Hello::read_from(&mut *socket)).await {
        Ok(read) => read,
        Err(elapsed) => Err(elapsed.into()),
    };

    // Silent, malformed and late hellos all get an explicit rejection
    let hello = match read {
        Ok(hello) => hello,
        Err(e) => {
            let _ = HandshakeStatus::Rejected.write_to(&mut *socket).await;
            return Err(e);
        }
    };

    if hello.role != expected {
        HandshakeStatus::Rejected.write_to(&mut *socket).await?;
        return Err(HandshakeError::UnexpectedRole(hello.role.as_byte()).into());
    }

    Ok(hello)
}

async fn serve_producer(
    session_id: u64,
    mut socket: TcpStream,
    config: &ServerConfig,
    registry: &ScanoutRegistry,
) -> Result<()> {
    let hello = accept_hello(&mut socket, config, Role::Producer).await?;

    let reader = match registry.register(&hello.scanout_id).await {
        Ok(reader) => reader,
        Err(e) => {
            HandshakeStatus::from(&e).write_to(&mut socket).await?;
            return Err(e.into());
        }
    };
    HandshakeStatus::Accepted.write_to(&mut socket).await?;

    tracing::info!(
        session_id = session_id,
        scanout = %hello.scanout_id,
        "Producer attached"
    );

    let codec = FrameCodec::with_max_payload(config.max_payload);
    let source = FrameReader::new(socket, codec, config.read_buffer_size);
    let frames = reader.run(source).await?;

    tracing::info!(
        session_id = session_id,
        scanout = %hello.scanout_id,
        frames = frames,
        "Producer detached"
    );

    Ok(())
}

async fn serve_viewer(
    session_id: u64,
    mut socket: TcpStream,
    config: &ServerConfig,
    registry: &ScanoutRegistry,
) -> Result<()> {
    let hello = accept_hello(&mut socket, config, Role::Viewer).await?;

    let subscriber = match registry.subscribe(&hello.scanout_id).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            HandshakeStatus::from(&e).write_to(&mut socket).await?;
            return Err(e.into());
        }
    };
    HandshakeStatus::Accepted.write_to(&mut socket).await?;

    let subscriber_id = subscriber.id();
    tracing::info!(
        session_id = session_id,
        scanout = %hello.scanout_id,
        subscriber = subscriber_id,
        "Viewer attached"
    );

    let (mut read_half, write_half) = socket.into_split();
    let sink = WriterSink::new(write_half, FrameCodec::with_max_payload(config.max_payload));

    // Dropping the delivery future drops the subscriber handle, which leaves
    tokio::select! {
        report = subscriber.deliver(sink) => {
            tracing::info!(
                session_id = session_id,
                scanout = %hello.scanout_id,
                subscriber = subscriber_id,
                frames = report.frames_written,
                reason = %report.reason,
                "Viewer detached"
            );
        }
        _ = wait_for_hangup(&mut read_half) => {
            tracing::info!(
                session_id = session_id,
                scanout = %hello.scanout_id,
                subscriber = subscriber_id,
                "Viewer hung up"
            );
        }
    }

    Ok(())
}

/// Resolve once the viewer closes its side; anything it sends is ignored
async fn wait_for_hangup(read_half: &mut OwnedReadHalf) {
    let mut buf = [0u8; 256];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;

    use super::*;
    use crate::media::Frame;

    struct TestServer {
        server: Arc<FanoutServer>,
        ingest: SocketAddr,
        viewer: SocketAddr,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl TestServer {
        async fn start(config: ServerConfig) -> Self {
            let ingest = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let viewer = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let ingest_addr = ingest.local_addr().unwrap();
            let viewer_addr = viewer.local_addr().unwrap();

            let server = Arc::new(FanoutServer::new(config));
            let (tx, rx) = oneshot::channel::<()>();

            let running = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = running
                    .serve(ingest, viewer, async {
                        let _ = rx.await;
                    })
                    .await;
            });

            Self {
                server,
                ingest: ingest_addr,
                viewer: viewer_addr,
                shutdown: Some(tx),
            }
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    async fn connect(addr: SocketAddr, hello: Hello) -> (TcpStream, HandshakeStatus) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        hello.write_to(&mut stream).await.unwrap();
        let status = HandshakeStatus::read_from(&mut stream).await.unwrap();
        (stream, status)
    }

    #[tokio::test]
    async fn test_producer_to_viewer() {
        let server = TestServer::start(ServerConfig::default()).await;

        let (mut producer, status) = connect(server.ingest, Hello::producer("display-0")).await;
        assert_eq!(status, HandshakeStatus::Accepted);

        let (viewer, status) = connect(server.viewer, Hello::viewer("display-0")).await;
        assert_eq!(status, HandshakeStatus::Accepted);

        let codec = FrameCodec::new();
        let mut wire = Vec::new();
        let key = Frame::keyframe(1, 0, Bytes::from_static(b"idr"));
        wire.extend_from_slice(&codec.encode(&key).unwrap());
        let delta = Frame::delta(2, 16, Bytes::from_static(b"p"));
        wire.extend_from_slice(&codec.encode(&delta).unwrap());
        producer.write_all(&wire).await.unwrap();

        let mut frames = FrameReader::new(viewer, codec, 4096);
        let first = frames.read_frame().await.unwrap().unwrap();
        let second = frames.read_frame().await.unwrap().unwrap();
        assert_eq!((first.sequence, first.is_keyframe), (1, true));
        assert_eq!(second.sequence, 2);
        assert_eq!(second.payload, Bytes::from_static(b"p"));

        // Producer hangs up: the viewer stream ends
        drop(producer);
        let end = tokio::time::timeout(Duration::from_secs(5), frames.read_frame())
            .await
            .unwrap()
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_viewer_unknown_scanout() {
        let server = TestServer::start(ServerConfig::default()).await;

        let (_viewer, status) = connect(server.viewer, Hello::viewer("nobody")).await;
        assert_eq!(status, HandshakeStatus::ScanoutNotFound);
    }

    #[tokio::test]
    async fn test_second_producer_rejected() {
        let server = TestServer::start(ServerConfig::default()).await;

        let (_first, status) = connect(server.ingest, Hello::producer("display-0")).await;
        assert_eq!(status, HandshakeStatus::Accepted);

        let (_second, status) = connect(server.ingest, Hello::producer("display-0")).await;
        assert_eq!(status, HandshakeStatus::ScanoutAlreadyActive);
    }

    #[tokio::test]
    async fn test_wrong_role_rejected() {
        let server = TestServer::start(ServerConfig::default()).await;

        let (_stream, status) = connect(server.ingest, Hello::viewer("display-0")).await;
        assert_eq!(status, HandshakeStatus::Rejected);
    }

    #[tokio::test]
    async fn test_silent_client_rejected_after_timeout() {
        let config = ServerConfig::default().handshake_timeout(Duration::from_millis(50));
        let server = TestServer::start(config).await;

        // Connect and never send a hello
        let mut stream = TcpStream::connect(server.viewer).await.unwrap();
        let status = tokio::time::timeout(
            Duration::from_secs(5),
            HandshakeStatus::read_from(&mut stream),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(status, HandshakeStatus::Rejected);
    }

    #[tokio::test]
    async fn test_viewer_hangup_leaves() {
        let server = TestServer::start(ServerConfig::default()).await;

        let (_producer, _) = connect(server.ingest, Hello::producer("display-0")).await;
        let (viewer, status) = connect(server.viewer, Hello::viewer("display-0")).await;
        assert_eq!(status, HandshakeStatus::Accepted);

        let registry = Arc::clone(server.server.registry());
        assert_eq!(
            registry.stats("display-0").await.unwrap().subscriber_count,
            1
        );

        drop(viewer);

        let mut remaining = 1;
        for _ in 0..200 {
            remaining = registry.stats("display-0").await.unwrap().subscriber_count;
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(remaining, 0);
    }
}
