// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use cablekit_core::CableError;
use thiserror::Error;

/// The peer sent something that is not a valid frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed frame header {0:?}")]
    BadHeader(String),

    #[error("frame length {actual} does not match the expected {expected} bytes")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("frame body of {0} bytes is not a whole number of samples")]
    Decode(usize),

    #[error("frame body of {0} bytes does not fit an 8-digit header")]
    Oversized(usize),
}

/// Errors raised while moving frames over a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A previous read failed; the connection must be torn down.
    #[error("connection already failed")]
    Errored,

    /// Code behind an [`Outlet`](cablekit_core::Outlet) panicked while handling a block.
    #[error("outlet panicked while handling a block")]
    OutletPanicked,

    #[error("network reactor is shut down")]
    Shutdown,

    #[error("blocking call issued from the network reactor thread")]
    Reentrant,
}

impl TransportError {
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl From<TransportError> for CableError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(e) => Self::Io(e),
            TransportError::Protocol(e) => Self::Protocol(e.to_string()),
            other => Self::Network(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_survives_conversion() {
        let err: CableError = TransportError::from(ProtocolError::Decode(7)).into();
        assert!(matches!(err, CableError::Protocol(_)));

        let err: CableError = TransportError::PeerClosed.into();
        assert!(matches!(err, CableError::Network(_)));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: CableError = TransportError::from(io).into();
        assert!(matches!(err, CableError::Io(_)));
    }

    #[test]
    fn test_is_protocol() {
        assert!(TransportError::from(ProtocolError::BadHeader("zz".into())).is_protocol());
        assert!(!TransportError::PeerClosed.is_protocol());
    }
}
