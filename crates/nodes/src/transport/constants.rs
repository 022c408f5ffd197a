// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared constants for the TCP transport

use std::time::Duration;

/// Length of the ASCII hex length prefix.
pub const HEADER_LEN: usize = 8;

/// Largest body an 8-digit hex header can describe.
pub const MAX_BODY_LEN: usize = 0xffff_ffff;

/// Name of the network I/O thread.
pub const REACTOR_THREAD_NAME: &str = "cable-reactor";

/// How long a send bridge waits for the peer to accept its connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed `accept` before trying again (e.g. out of file descriptors).
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
