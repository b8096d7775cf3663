//! Reply frame writer.
//!
//! Frames are written with scatter/gather I/O: the 8-byte header and the
//! body go out in one `write_vectored` call when the socket accepts it, and
//! partial writes resume from the exact byte where the kernel stopped.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{RingwireError, Result};
use crate::protocol::{Frame, FRAME_HEADER_SIZE};

/// A frame ready to be written to the connection.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Pre-encoded header (8 bytes).
    pub header: [u8; FRAME_HEADER_SIZE],
    pub body: Bytes,
}

impl OutboundFrame {
    /// Total size on the wire (header + body).
    #[inline]
    pub fn size(&self) -> usize {
        FRAME_HEADER_SIZE + self.body.len()
    }
}

impl From<Frame> for OutboundFrame {
    fn from(frame: Frame) -> Self {
        Self {
            header: frame.header.encode(),
            body: frame.body,
        }
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &OutboundFrame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_frames(writer, std::slice::from_ref(frame)).await
}

/// Write a batch of frames using `write_vectored`, then flush.
pub async fn write_frames<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(RingwireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        let header_end = offset + FRAME_HEADER_SIZE;
        if skip_bytes < header_end {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame.header[start..]));
        }
        offset = header_end;

        if !frame.body.is_empty() {
            let body_end = offset + frame.body.len();
            if skip_bytes < body_end {
                let start = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&frame.body[start..]));
            }
            offset = body_end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Accepts at most `chunk` bytes per write call.
    struct Trickle {
        written: Vec<u8>,
        chunk: usize,
    }

    impl AsyncWrite for Trickle {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let n = buf.len().min(self.chunk);
            self.written.extend_from_slice(&buf[..n]);
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_outbound_from_frame() {
        let frame: OutboundFrame = Frame::response(Bytes::from_static(b"shikanon")).into();
        assert_eq!(frame.header, [0, 0, 0, 12, 0, 0, 0, 1]);
        assert_eq!(frame.size(), FRAME_HEADER_SIZE + 8);
    }

    #[test]
    fn test_remaining_slices_no_skip() {
        let batch = vec![OutboundFrame::from(Frame::response(Bytes::from_static(b"hello")))];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_remaining_slices_partial_header() {
        let batch = vec![OutboundFrame::from(Frame::response(Bytes::from_static(b"hello")))];
        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), FRAME_HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 5);
    }

    #[test]
    fn test_remaining_slices_inside_body() {
        let batch = vec![OutboundFrame::from(Frame::response(Bytes::from_static(b"hello")))];
        let slices = build_remaining_slices(&batch, FRAME_HEADER_SIZE + 2);
        assert_eq!(slices.len(), 1);
        assert_eq!(&*slices[0], b"llo");
    }

    #[test]
    fn test_remaining_slices_empty_body_frame() {
        let batch = vec![
            OutboundFrame::from(Frame::response(Bytes::new())),
            OutboundFrame::from(Frame::error("x")),
        ];
        let slices = build_remaining_slices(&batch, FRAME_HEADER_SIZE);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), FRAME_HEADER_SIZE);
        assert_eq!(&*slices[1], b"x");
    }

    #[tokio::test]
    async fn test_write_frame_single() {
        let mut buf = Cursor::new(Vec::new());
        let frame = OutboundFrame::from(Frame::response(Bytes::from_static(b"shikanon")));

        write_frame(&mut buf, &frame).await.unwrap();

        assert_eq!(buf.into_inner(), b"\x00\x00\x00\x0c\x00\x00\x00\x01shikanon");
    }

    #[tokio::test]
    async fn test_write_frames_survives_partial_writes() {
        let batch: Vec<_> = ["abc", "defgh", ""]
            .into_iter()
            .map(|body| OutboundFrame::from(Frame::response(Bytes::from_static(body.as_bytes()))))
            .collect();
        let expected: Vec<u8> = batch
            .iter()
            .flat_map(|f| f.header.iter().chain(f.body.iter()).copied())
            .collect();

        let mut sink = Trickle {
            written: Vec::new(),
            chunk: 3,
        };
        write_frames(&mut sink, &batch).await.unwrap();

        assert_eq!(sink.written, expected);
    }
}
