// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Built-in nodes for Cablekit graphs.
//!
//! - [`audio`]: generators and filters (tone, keepalive, volume, switch, noise gate)
//! - [`core`]: plumbing nodes (passthrough, level meter, capture)
//! - [`transport`]: framed TCP links between graphs on different machines

pub mod audio;
pub mod core;
pub mod transport;

#[cfg(test)]
pub mod test_utils;
