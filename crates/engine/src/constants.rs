// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared engine constants.

/// Prefix of source worker thread names. The node name is appended.
pub const SOURCE_THREAD_PREFIX: &str = "cable-src";

/// How many block periods a paced source may fall behind before its
/// schedule is re-anchored to the current time instead of catching up.
pub const PACER_MAX_LAG_PERIODS: u32 = 1;
