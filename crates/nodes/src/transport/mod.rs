// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Framed TCP transport.
//!
//! A link is one TCP connection carrying frames of `[8 hex digits][body]`,
//! where the body is one sample block. Both ends must agree on the
//! [`BlockFormat`](cablekit_core::BlockFormat).
//!
//! - [`frame`]: header and body codec
//! - [`connection`]: framed reads and writes over a byte stream
//! - [`reactor`]: the single thread that owns all network I/O
//! - [`send`] / [`receive`]: the bridge nodes a graph uses to reach a peer

pub mod connection;
pub mod constants;
pub mod error;
pub mod frame;
pub mod reactor;
pub mod receive;
pub mod send;

pub use connection::{Connection, ReadState};
pub use error::{ProtocolError, TransportError};
pub use reactor::Reactor;
pub use receive::ReceiveBridge;
pub use send::SendBridge;
