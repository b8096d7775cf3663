//! Per-connection protocol state machine.
//!
//! A session moves through three states:
//!
//! ```text
//! AwaitingVersion ──"v01"──▶ Established ──FIN / EOF / error──▶ Closed
//!        │                                                        ▲
//!        └──────────────── unknown version (no reply) ────────────┘
//! ```
//!
//! Once established, commands are executed strictly in arrival order. A
//! blocking PUT or GET holds up the rest of this connection only; other
//! sessions keep running.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::backpressure::{self, BackpressurePolicy};
use crate::config::SessionConfig;
use crate::error::{QueueError, RingwireError, Result};
use crate::protocol::{Command, CommandBuffer, Frame, ProtocolVersion, HANDSHAKE_ACK, VERSION_LEN};
use crate::queue::RingBuffer;
use crate::writer::{write_frame, OutboundFrame};

/// Bytes requested from the stream per read.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingVersion,
    Established,
    Closed,
}

enum Flow {
    Continue,
    Stop,
}

/// One client connection bound to the shared queue.
pub struct Session<S> {
    stream: S,
    queue: Arc<RingBuffer<Bytes>>,
    policy: Arc<dyn BackpressurePolicy>,
    config: SessionConfig,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        queue: Arc<RingBuffer<Bytes>>,
        policy: Arc<dyn BackpressurePolicy>,
        config: SessionConfig,
    ) -> Self {
        Self {
            stream,
            queue,
            policy,
            config,
            state: SessionState::AwaitingVersion,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve the connection until FIN, EOF, or an error, consuming the
    /// session. See [`serve`](Self::serve).
    pub async fn run(mut self) -> Result<()> {
        self.serve().await
    }

    /// Serve the connection until FIN, EOF, or an error.
    ///
    /// The stream is shut down on every exit path and the session is left
    /// in [`SessionState::Closed`]. `Ok(())` means the client ended the
    /// session normally.
    ///
    /// # Errors
    ///
    /// - [`RingwireError::Handshake`] for an unsupported version (nothing
    ///   is written back)
    /// - [`RingwireError::Protocol`] for a malformed request, after an
    ///   Error frame describing it
    /// - [`RingwireError::Queue`] when the queue was disposed, after an
    ///   Error frame reading `queue disposed`
    pub async fn serve(&mut self) -> Result<()> {
        let outcome = self.drive().await;
        self.transition(SessionState::Closed);
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("Stream shutdown failed: {}", e);
        }
        outcome
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    async fn drive(&mut self) -> Result<()> {
        let version = self.handshake().await?;
        self.transition(SessionState::Established);
        tracing::debug!(?version, "handshake complete");

        let mut commands =
            CommandBuffer::with_limits(self.config.max_line_size, self.config.max_payload_size);
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            loop {
                let command = match commands.next_command() {
                    Ok(Some(command)) => command,
                    Ok(None) => break,
                    Err(e) => {
                        self.send_error(&e.to_string()).await;
                        return Err(e);
                    }
                };

                tracing::debug!(command = command.name(), "executing");
                if let Flow::Stop = self.execute(command).await? {
                    return Ok(());
                }
                backpressure::apply(self.policy.as_ref(), &self.queue);
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            commands.extend(&buf[..n]);
        }
    }

    async fn handshake(&mut self) -> Result<ProtocolVersion> {
        let mut token = [0u8; VERSION_LEN];
        match self.stream.read_exact(&mut token).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(RingwireError::ConnectionClosed);
            }
            Err(e) => return Err(e.into()),
        }

        let version =
            ProtocolVersion::from_token(&token).ok_or(RingwireError::Handshake(token))?;

        self.stream.write_all(&HANDSHAKE_ACK).await?;
        self.stream.flush().await?;
        Ok(version)
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Put { body, .. } => match self.queue.put_async(body).await {
                Ok(()) => Ok(Flow::Continue),
                Err(e) => self.fail(e).await,
            },
            Command::Get => match self.queue.get_async().await {
                Ok(payload) => {
                    let frame = OutboundFrame::from(Frame::response(payload));
                    write_frame(&mut self.stream, &frame).await?;
                    Ok(Flow::Continue)
                }
                Err(e) => self.fail(e).await,
            },
            Command::Fin => Ok(Flow::Stop),
            Command::Unknown(line) => {
                tracing::debug!(
                    line = %String::from_utf8_lossy(&line),
                    "unknown command, closing session"
                );
                Ok(Flow::Stop)
            }
        }
    }

    async fn fail(&mut self, err: QueueError) -> Result<Flow> {
        self.send_error(&err.to_string()).await;
        Err(err.into())
    }

    /// Best-effort final Error frame. A write failure here is only logged.
    async fn send_error(&mut self, message: &str) {
        let frame = OutboundFrame::from(Frame::error(message));
        if let Err(e) = write_frame(&mut self.stream, &frame).await {
            tracing::debug!("Failed to send error frame: {}", e);
        }
    }
}
