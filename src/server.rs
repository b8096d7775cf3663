//! TCP acceptor.
//!
//! The [`Server`] owns the listener and the shared queue. Every accepted
//! connection gets its own [`Session`] task; all sessions share one
//! [`RingBuffer`] and one [`BackpressurePolicy`].
//!
//! # Example
//!
//! ```no_run
//! use ringwire::Server;
//!
//! #[tokio::main]
//! async fn main() -> ringwire::Result<()> {
//!     let server = Server::builder()
//!         .listen_addr("127.0.0.1:8888")
//!         .capacity(1024)
//!         .bind()
//!         .await?;
//!
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};

use crate::backpressure::{BackpressureMode, BackpressurePolicy};
use crate::config::{ServerConfig, SessionConfig};
use crate::error::Result;
use crate::queue::RingBuffer;
use crate::session::Session;

/// Builder for configuring and binding a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    queue: Option<Arc<RingBuffer<Bytes>>>,
    policy: Option<Arc<dyn BackpressurePolicy>>,
}

impl ServerBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            queue: None,
            policy: None,
        }
    }

    /// Set the listen address.
    ///
    /// Default: `127.0.0.1:8888`
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the requested queue capacity (rounded up to a power of two).
    ///
    /// Default: 1024
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the maximum command line size.
    ///
    /// Default: 16 KiB
    pub fn max_line_size(mut self, size: usize) -> Self {
        self.config.max_line_size = size;
        self
    }

    /// Set the maximum PUT payload size.
    ///
    /// Default: 1 MiB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.config.max_payload_size = size;
        self
    }

    /// Set the number of failed slot attempts between yields.
    ///
    /// Default: 10,000
    pub fn spin_limit(mut self, limit: u32) -> Self {
        self.config.spin_limit = limit;
        self
    }

    /// Pick one of the built-in full-queue policies.
    pub fn backpressure(mut self, mode: BackpressureMode) -> Self {
        self.config.backpressure = mode;
        self
    }

    /// Install a custom policy, overriding [`backpressure`](Self::backpressure).
    pub fn policy(mut self, policy: Arc<dyn BackpressurePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Serve an existing queue. `capacity` and `spin_limit` are then ignored.
    pub fn queue(mut self, queue: Arc<RingBuffer<Bytes>>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Bind the listener.
    pub async fn bind(self) -> Result<Server> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;

        let queue = self.queue.unwrap_or_else(|| {
            Arc::new(RingBuffer::with_spin_limit(
                self.config.capacity,
                self.config.spin_limit,
            ))
        });
        let policy = self
            .policy
            .unwrap_or_else(|| self.config.backpressure.build());

        tracing::info!(
            addr = %listener.local_addr()?,
            capacity = queue.capacity(),
            "listening"
        );

        Ok(Server {
            listener,
            queue,
            policy,
            session_config: self.config.session_config(),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound queue server.
pub struct Server {
    listener: TcpListener,
    queue: Arc<RingBuffer<Bytes>>,
    policy: Arc<dyn BackpressurePolicy>,
    session_config: SessionConfig,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Bind a server from a configuration.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        ServerBuilder::from_config(config).bind().await
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared queue served to every connection.
    pub fn queue(&self) -> &Arc<RingBuffer<Bytes>> {
        &self.queue
    }

    /// Accept connections until accepting fails.
    ///
    /// Each connection runs in its own task. An accept error is logged and
    /// returned; sessions already running are left alone.
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    return Err(e.into());
                }
            };
            self.spawn_session(stream, peer);
        }
    }

    /// Like [`run`](Self::run), but also stops when `shutdown` resolves.
    ///
    /// The queue is disposed on the way out, so sessions blocked in PUT or
    /// GET get their Error frame and close.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future,
    {
        let outcome = tokio::select! {
            res = self.run() => res,
            _ = shutdown => {
                tracing::info!("shutdown requested");
                Ok(())
            }
        };

        if self.queue.dispose() {
            tracing::info!(remaining = self.queue.length(), "queue disposed");
        }
        outcome
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        tracing::debug!(%peer, "accepted connection");
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, "Failed to set TCP_NODELAY: {}", e);
        }

        let session = Session::new(
            stream,
            self.queue.clone(),
            self.policy.clone(),
            self.session_config,
        );

        tokio::spawn(async move {
            match session.run().await {
                Ok(()) => tracing::debug!(%peer, "session closed"),
                Err(e) if e.is_disposed() => tracing::debug!(%peer, "session ended: {}", e),
                Err(e) => tracing::warn!(%peer, "session failed: {}", e),
            }
        });
    }
}
