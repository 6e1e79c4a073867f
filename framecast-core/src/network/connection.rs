//! One TCP connection carrying the frame stream.
//!
//! A [`StreamConnection`] owns its socket exclusively and performs
//! strictly sequential, length-exact reads and writes — partial reads
//! are looped over internally and a zero-length read surfaces as
//! [`CastError::Disconnected`], never as a short buffer. Connections
//! are never reused across reconnects: dropping one closes the socket,
//! and every attempt constructs a fresh object.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::trace;

use crate::error::CastError;
use crate::framing::{self, FEEDBACK_SIZE, FrameHeader};

// ── StreamListener ───────────────────────────────────────────────

/// Listening socket accepting one frame-stream peer at a time.
#[derive(Debug)]
pub struct StreamListener {
    listener: TcpListener,
}

impl StreamListener {
    /// Bind `addr` and start listening.
    pub async fn bind(addr: SocketAddr) -> Result<Self, CastError> {
        let listener = TcpListener::bind(addr).await.map_err(CastError::Bind)?;
        Ok(Self { listener })
    }

    /// The bound local address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, CastError> {
        self.listener.local_addr().map_err(CastError::Bind)
    }

    /// Block until one peer connects.
    pub async fn accept(&self) -> Result<StreamConnection, CastError> {
        let (stream, peer) = self.listener.accept().await.map_err(CastError::Accept)?;
        stream.set_nodelay(true).map_err(CastError::Accept)?;
        Ok(StreamConnection { stream, peer })
    }
}

// ── StreamConnection ─────────────────────────────────────────────

/// An established bidirectional frame-stream connection.
#[derive(Debug)]
pub struct StreamConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl StreamConnection {
    /// Connect to `addr`, bounded by `timeout`.
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, CastError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| CastError::Timeout(timeout))?
            .map_err(CastError::Connect)?;
        stream.set_nodelay(true).map_err(CastError::Connect)?;
        let peer = stream.peer_addr().map_err(CastError::Connect)?;
        Ok(Self { stream, peer })
    }

    /// The remote address of this connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Fill `buf` completely, looping over partial reads.
    ///
    /// Returns [`CastError::Disconnected`] the moment the underlying
    /// read returns zero bytes.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), CastError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .stream
                .read(&mut buf[filled..])
                .await
                .map_err(CastError::Read)?;
            if n == 0 {
                return Err(CastError::Disconnected);
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `bytes` or fail with a fatal connection error.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), CastError> {
        self.stream.write_all(bytes).await.map_err(CastError::Write)
    }

    // ── Frame operations ─────────────────────────────────────────

    /// Write one frame: header, payload, then the sender's actual
    /// inter-send interval in seconds.
    pub async fn send_frame(&mut self, payload: &[u8], interval: f32) -> Result<(), CastError> {
        if payload.len() > i32::MAX as usize {
            return Err(CastError::FrameTooLarge {
                size: payload.len(),
                max: i32::MAX as usize,
            });
        }
        self.write_all(&FrameHeader::new(payload.len()).encode())
            .await?;
        self.write_all(payload).await?;
        self.write_all(&framing::encode_feedback(interval)).await?;
        trace!(len = payload.len(), interval, "frame written");
        Ok(())
    }

    /// Read one frame: header, payload, reported interval.
    ///
    /// The payload is always fully drained from the stream whatever
    /// its size, so a runt frame never desynchronizes framing; the
    /// caller decides whether a short payload is worth delivering.
    /// Lengths above `max_len` are rejected before any payload read.
    pub async fn recv_frame(&mut self, max_len: usize) -> Result<(Bytes, f32), CastError> {
        let mut header_buf = [0u8; FrameHeader::SIZE];
        self.read_exact(&mut header_buf).await?;
        let header = FrameHeader::decode(header_buf)?;
        if header.payload_len > max_len {
            return Err(CastError::FrameTooLarge {
                size: header.payload_len,
                max: max_len,
            });
        }

        let mut payload = vec![0u8; header.payload_len];
        self.read_exact(&mut payload).await?;

        let mut feedback = [0u8; FEEDBACK_SIZE];
        self.read_exact(&mut feedback).await?;

        Ok((Bytes::from(payload), framing::decode_feedback(feedback)))
    }

    /// Write the smoothed-delay feedback value back to the peer.
    pub async fn send_feedback(&mut self, seconds: f32) -> Result<(), CastError> {
        self.write_all(&framing::encode_feedback(seconds)).await
    }

    /// Read the peer's feedback value.
    pub async fn recv_feedback(&mut self) -> Result<f32, CastError> {
        let mut buf = [0u8; FEEDBACK_SIZE];
        self.read_exact(&mut buf).await?;
        Ok(framing::decode_feedback(buf))
    }
}

// ── Tests ────────────────────────────────────────────────────────
