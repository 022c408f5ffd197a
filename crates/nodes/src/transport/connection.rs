// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Framed reads and writes over a byte stream.
//!
//! ## Read State Machine
//!
//! ```text
//!   Idle ──▶ ReadingHeader ──▶ ReadingBody ──▶ Delivered
//!                 │                 │              │
//!                 ▼                 ▼              └──▶ ReadingHeader (next frame)
//!              Errored ◀────────────┘
//! ```
//!
//! `Errored` is terminal: the owner is expected to drop the connection.

use super::constants::HEADER_LEN;
use super::error::{ProtocolError, TransportError};
use super::frame;
use bytes::{Bytes, BytesMut};
use cablekit_core::{BlockFormat, SampleBlock};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    ReadingHeader,
    ReadingBody { len: usize },
    Delivered,
    Errored,
}

/// A framed connection carrying sample blocks of one [`BlockFormat`].
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    expected_body_len: usize,
    state: ReadState,
    header: [u8; HEADER_LEN],
    body: BytesMut,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, format: BlockFormat) -> Self {
        Self {
            stream,
            expected_body_len: format.body_len(),
            state: ReadState::Idle,
            header: [0; HEADER_LEN],
            body: BytesMut::new(),
        }
    }

    pub const fn state(&self) -> ReadState {
        self.state
    }

    /// Read the next frame and decode it.
    ///
    /// # Errors
    ///
    /// - [`TransportError::PeerClosed`] on end of stream, even mid-frame
    /// - [`TransportError::Protocol`] for a malformed header, a length that does not
    ///   match the format, or an undecodable body
    /// - [`TransportError::Io`] for socket failures
    /// - [`TransportError::Errored`] if a previous read already failed
    pub async fn read_block(&mut self) -> Result<SampleBlock, TransportError> {
        if self.state == ReadState::Errored {
            return Err(TransportError::Errored);
        }
        match self.read_frame().await {
            Ok(block) => {
                self.state = ReadState::Delivered;
                Ok(block)
            },
            Err(e) => {
                self.state = ReadState::Errored;
                Err(e)
            },
        }
    }

    async fn read_frame(&mut self) -> Result<SampleBlock, TransportError> {
        self.state = ReadState::ReadingHeader;
        self.stream.read_exact(&mut self.header).await.map_err(closed_on_eof)?;

        let len = frame::parse_header(&self.header)?;
        if len != self.expected_body_len {
            return Err(ProtocolError::LengthMismatch { expected: self.expected_body_len, actual: len }
                .into());
        }

        self.state = ReadState::ReadingBody { len };
        self.body.resize(len, 0);
        self.stream.read_exact(&mut self.body[..]).await.map_err(closed_on_eof)?;

        Ok(frame::decode_body(&self.body)?)
    }

    /// Write one pre-encoded frame. Header and body go out as a single buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket write fails.
    pub async fn write_frame(&mut self, frame: &Bytes) -> Result<(), TransportError> {
        self.stream.write_all(frame).await?;
        Ok(())
    }

    /// Encode and write one block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block cannot be framed or the write fails.
    pub async fn write_block(&mut self, block: &SampleBlock) -> Result<(), TransportError> {
        let frame = frame::encode(block)?;
        self.write_frame(&frame).await
    }

    /// Flush and close the write half.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

fn closed_on_eof(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::PeerClosed
    } else {
        TransportError::Io(err)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{constant_block, ramp_block};
    use cablekit_core::Sample;

    const FORMAT: BlockFormat = BlockFormat::new(44_100, 100);

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let mut writer = Connection::new(a, FORMAT);
        let mut reader = Connection::new(b, FORMAT);
        assert_eq!(reader.state(), ReadState::Idle);

        let blocks: Vec<_> = (0..5u8).map(|i| constant_block(f32::from(i), 100)).collect();
        let sent = blocks.clone();
        let write = tokio::spawn(async move {
            for block in &sent {
                writer.write_block(block).await.unwrap();
            }
            writer
        });

        for expected in &blocks {
            assert_eq!(&reader.read_block().await.unwrap(), expected);
            assert_eq!(reader.state(), ReadState::Delivered);
        }
        drop(write.await.unwrap());
    }

    #[tokio::test]
    async fn test_first_sample_survives() {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let mut writer = Connection::new(a, FORMAT);
        let mut reader = Connection::new(b, FORMAT);

        let block = ramp_block(0.5, 0.001, 100);
        writer.write_block(&block).await.unwrap();
        let received = reader.read_block().await.unwrap();
        assert_eq!(received.first(), Some(Sample::new(0.5, -0.5)));
        assert_eq!(received, block);
    }

    #[tokio::test]
    async fn test_length_mismatch_is_protocol_error() {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let mut writer = Connection::new(a, FORMAT);
        let mut reader = Connection::new(b, FORMAT);

        writer.write_block(&constant_block(0.1, 99)).await.unwrap();
        let err = reader.read_block().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Protocol(ProtocolError::LengthMismatch { expected: 800, actual: 792 })
        ));
        assert_eq!(reader.state(), ReadState::Errored);
        assert!(matches!(reader.read_block().await, Err(TransportError::Errored)));
    }

    #[tokio::test]
    async fn test_bad_header_is_protocol_error() {
        let (mut a, b) = tokio::io::duplex(1024);
        let mut reader = Connection::new(b, FORMAT);

        a.write_all(b"hello, world").await.unwrap();
        let err = reader.read_block().await.unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_eof_mid_body_is_peer_closed() {
        let (mut a, b) = tokio::io::duplex(1024);
        let mut reader = Connection::new(b, FORMAT);

        a.write_all(b"00000320").await.unwrap();
        a.write_all(&[0u8; 16]).await.unwrap();
        drop(a);

        let err = reader.read_block().await.unwrap_err();
        assert!(matches!(err, TransportError::PeerClosed));
    }

    #[tokio::test]
    async fn test_clean_eof_is_peer_closed() {
        let (a, b) = tokio::io::duplex(1024);
        let mut reader = Connection::new(b, FORMAT);
        drop(a);
        assert!(matches!(reader.read_block().await, Err(TransportError::PeerClosed)));
    }
}
