// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Block format shared by every node of a graph and both ends of a link.
//!
//! The format is not negotiated over the wire. A receiver rejects frames whose
//! length does not match its own format.

use crate::block::SampleBlock;
use crate::error::{CableError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default number of stereo samples per block.
pub const DEFAULT_BLOCK_LEN: usize = 8_192;

/// Bytes one stereo sample occupies on the wire (two little-endian `f32`s).
pub const BYTES_PER_SAMPLE: usize = 8;

/// Sample rate and block length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BlockFormat {
    /// Samples per second, per channel.
    pub sample_rate: u32,
    /// Stereo samples per block.
    pub block_len: usize,
}

impl Default for BlockFormat {
    fn default() -> Self {
        Self { sample_rate: DEFAULT_SAMPLE_RATE, block_len: DEFAULT_BLOCK_LEN }
    }
}

impl BlockFormat {
    pub const fn new(sample_rate: u32, block_len: usize) -> Self {
        Self { sample_rate, block_len }
    }

    /// Validate that both fields are non-zero.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the sample rate or block length is zero.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(CableError::Configuration("sample_rate must be positive".to_string()));
        }
        if self.block_len == 0 {
            return Err(CableError::Configuration("block_len must be positive".to_string()));
        }
        Ok(())
    }

    /// Wall-clock duration of one block.
    pub fn period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = u64::try_from(self.block_len).unwrap_or(u64::MAX);
        Duration::from_nanos(frames.saturating_mul(1_000_000_000) / u64::from(self.sample_rate))
    }

    /// Length in bytes of a frame body carrying one block.
    pub const fn body_len(&self) -> usize {
        self.block_len * BYTES_PER_SAMPLE
    }

    /// A silent block of this format's length.
    pub fn silence(&self) -> SampleBlock {
        SampleBlock::silence(self.block_len)
    }
}
