//! Async client for the queue protocol.
//!
//! # Example
//!
//! ```no_run
//! use ringwire::QueueClient;
//!
//! #[tokio::main]
//! async fn main() -> ringwire::Result<()> {
//!     let mut client = QueueClient::connect("127.0.0.1:8888").await?;
//!     client.put(b"shikanon").await?;
//!     let payload = client.get().await?;
//!     assert_eq!(&payload[..], b"shikanon");
//!     client.fin().await
//! }
//! ```

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{RingwireError, Result};
use crate::protocol::{Frame, FrameBuffer, FrameType, HANDSHAKE_ACK, PUT_LENGTH_LEN, VERSION_V01};

const READ_CHUNK_SIZE: usize = 16 * 1024;

/// A connection to a queue server.
///
/// Requests are sent in order; `get` waits for its reply frame, so one
/// client has at most one outstanding GET.
pub struct QueueClient<S> {
    stream: S,
    frames: FrameBuffer,
    pending: VecDeque<Frame>,
}

impl QueueClient<TcpStream> {
    /// Connect over TCP and perform the handshake.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let mut client = Self::new(stream);
        client.handshake().await?;
        Ok(client)
    }
}

impl<S> QueueClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream. Call [`handshake`](Self::handshake) before
    /// anything else.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            frames: FrameBuffer::new(),
            pending: VecDeque::new(),
        }
    }

    /// Announce protocol version `v01` and wait for `ok`.
    pub async fn handshake(&mut self) -> Result<()> {
        self.stream.write_all(&VERSION_V01).await?;
        self.stream.flush().await?;

        let mut ack = [0u8; HANDSHAKE_ACK.len()];
        match self.stream.read_exact(&mut ack).await {
            Ok(_) if ack == HANDSHAKE_ACK => Ok(()),
            Ok(_) => Err(RingwireError::Handshake(VERSION_V01)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(RingwireError::Handshake(VERSION_V01))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Enqueue `payload`. The server sends no acknowledgement.
    pub async fn put(&mut self, payload: &[u8]) -> Result<()> {
        let length = i32::try_from(payload.len()).map_err(|_| {
            RingwireError::Protocol(format!("Payload of {} bytes is too large", payload.len()))
        })?;

        let mut request = Vec::with_capacity(b"PUT ".len() + PUT_LENGTH_LEN + 1 + payload.len());
        request.extend_from_slice(b"PUT ");
        request.extend_from_slice(&length.to_be_bytes());
        request.push(b'\n');
        request.extend_from_slice(payload);

        self.stream.write_all(&request).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Dequeue one payload, waiting until the server has one.
    ///
    /// An Error frame becomes [`RingwireError::Remote`].
    pub async fn get(&mut self) -> Result<Bytes> {
        self.stream.write_all(b"GET\n").await?;
        self.stream.flush().await?;

        loop {
            let frame = self.next_frame().await?;
            match frame.frame_type() {
                FrameType::Message => {
                    tracing::debug!(len = frame.body().len(), "skipping unsolicited message");
                }
                FrameType::Error | FrameType::Response => return frame.into_result(),
            }
        }
    }

    /// Send FIN and close the write side.
    pub async fn fin(mut self) -> Result<()> {
        self.stream.write_all(b"FIN\n").await?;
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(RingwireError::ConnectionClosed);
            }
            self.pending.extend(self.frames.push(&buf[..n])?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn pair() -> (QueueClient<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        (QueueClient::new(client), server)
    }

    #[tokio::test]
    async fn test_handshake_ok() {
        let (mut client, mut server) = pair();
        server.write_all(b"ok").await.unwrap();

        client.handshake().await.unwrap();

        let mut token = [0u8; 3];
        server.read_exact(&mut token).await.unwrap();
        assert_eq!(&token, b"v01");
    }

    #[tokio::test]
    async fn test_handshake_rejected_on_close() {
        let (mut client, server) = pair();
        drop(server);

        let err = client.handshake().await.unwrap_err();
        assert!(matches!(err, RingwireError::Handshake(t) if t == VERSION_V01));
    }

    #[tokio::test]
    async fn test_handshake_wrong_ack() {
        let (mut client, mut server) = pair();
        server.write_all(b"no").await.unwrap();

        assert!(matches!(
            client.handshake().await.unwrap_err(),
            RingwireError::Handshake(_)
        ));
    }

    #[tokio::test]
    async fn test_put_wire_bytes() {
        let (mut client, mut server) = pair();
        client.put(b"shikanon").await.unwrap();

        let mut request = [0u8; 17];
        server.read_exact(&mut request).await.unwrap();
        assert_eq!(&request, b"PUT \x00\x00\x00\x08\nshikanon");
    }

    #[tokio::test]
    async fn test_get_response() {
        let (mut client, mut server) = pair();
        server
            .write_all(&Frame::response(Bytes::from_static(b"shikanon")).encode())
            .await
            .unwrap();

        assert_eq!(client.get().await.unwrap(), Bytes::from_static(b"shikanon"));

        let mut request = [0u8; 4];
        server.read_exact(&mut request).await.unwrap();
        assert_eq!(&request, b"GET\n");
    }

    #[tokio::test]
    async fn test_get_error_frame() {
        let (mut client, mut server) = pair();
        server.write_all(&Frame::error("queue disposed").encode()).await.unwrap();

        let err = client.get().await.unwrap_err();
        assert!(matches!(err, RingwireError::Remote(ref text) if text == "queue disposed"));
    }

    #[tokio::test]
    async fn test_get_skips_message_frames() {
        let (mut client, mut server) = pair();
        let mut bytes = Frame::message(Bytes::from_static(b"notice")).encode();
        bytes.extend(Frame::response(Bytes::from_static(b"data")).encode());
        server.write_all(&bytes).await.unwrap();

        assert_eq!(client.get().await.unwrap(), Bytes::from_static(b"data"));
    }

    #[tokio::test]
    async fn test_get_keeps_extra_frames() {
        let (mut client, mut server) = pair();
        let mut bytes = Frame::response(Bytes::from_static(b"one")).encode();
        bytes.extend(Frame::response(Bytes::from_static(b"two")).encode());
        server.write_all(&bytes).await.unwrap();

        assert_eq!(client.get().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(client.get().await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_get_on_closed_connection() {
        let (mut client, server) = pair();
        drop(server);

        let err = client.get().await.unwrap_err();
        assert!(matches!(err, RingwireError::ConnectionClosed | RingwireError::Io(_)));
    }

    #[tokio::test]
    async fn test_fin_closes_write_side() {
        let (client, mut server) = pair();
        client.fin().await.unwrap();

        let mut rest = Vec::new();
        server.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"FIN\n");
    }
}
