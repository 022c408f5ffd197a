// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for Cablekit.
//!
//! Errors are grouped by category so callers can decide between retrying,
//! logging and tearing down. Device hiccups (under/overruns) are kept apart
//! from hard device failures because the production loop absorbs the former.

use thiserror::Error;

/// Main error type for Cablekit operations.
#[derive(Debug, Error)]
pub enum CableError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Zero sample rate or block length
    /// - Volume outside the accepted range
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid graph wiring or an unknown node.
    ///
    /// Examples:
    /// - Connecting nodes into a cycle
    /// - Feeding a source node
    /// - Duplicate node names
    #[error("Graph error: {0}")]
    Graph(String),

    /// Runtime processing error during normal operation.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Network-related error (connect, bind, peer closed).
    #[error("Network error: {0}")]
    Network(String),

    /// The peer sent bytes that do not form a valid frame.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Audio device error reported by a source or sink collaborator.
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// I/O error (sockets, files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CableError {
    /// Whether the production loop may carry on after this error.
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Device(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

/// Errors raised by audio device collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device had no data ready for this block.
    #[error("buffer underrun")]
    Underrun,

    /// The device dropped data because it was not drained in time.
    #[error("buffer overrun")]
    Overrun,

    /// The device is gone or unusable.
    #[error("device failed: {0}")]
    Failed(String),
}

impl DeviceError {
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Underrun | Self::Overrun)
    }
}

/// Convenience type alias for Results using `CableError`.
pub type Result<T> = std::result::Result<T, CableError>;

impl From<CableError> for String {
    fn from(err: CableError) -> Self {
        err.to_string()
    }
}

// Generic string errors default to the runtime category
impl From<String> for CableError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for CableError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}
