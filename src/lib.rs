//! # ringwire
//!
//! A lock-free, bounded MPMC queue of byte payloads, shared by every client
//! of a small TCP server.
//!
//! ## Architecture
//!
//! - **Queue** ([`queue`]): fixed power-of-two slot array with per-slot
//!   sequence numbers. Producers and consumers claim positions with a CAS
//!   and spin, yielding periodically, while the queue is full or empty.
//! - **Protocol** ([`protocol`]): 3-byte version handshake, newline
//!   terminated `PUT`/`GET`/`FIN` requests, length-prefixed reply frames.
//! - **Server** ([`Server`]): one task per connection, all bound to one
//!   shared queue, with a pluggable full-queue [`backpressure`] policy.
//!
//! ## Example
//!
//! ```no_run
//! use ringwire::{QueueClient, Server};
//!
//! #[tokio::main]
//! async fn main() -> ringwire::Result<()> {
//!     let server = Server::builder().listen_addr("127.0.0.1:0").bind().await?;
//!     let addr = server.local_addr()?;
//!     tokio::spawn(async move { server.run().await });
//!
//!     let mut client = QueueClient::connect(addr).await?;
//!     client.put(b"shikanon").await?;
//!     assert_eq!(&client.get().await?[..], b"shikanon");
//!     client.fin().await
//! }
//! ```

pub mod backpressure;
pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod writer;

mod client;
mod server;

pub use backpressure::{BackpressureMode, BackpressurePolicy, DisposeOnFull, LogOnFull};
pub use client::QueueClient;
pub use config::{ServerConfig, SessionConfig};
pub use error::{QueueError, Result, RingwireError};
pub use queue::RingBuffer;
pub use server::{Server, ServerBuilder};
pub use session::{Session, SessionState};
