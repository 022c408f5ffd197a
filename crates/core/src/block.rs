// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Stereo samples and immutable sample blocks.
//!
//! A [`SampleBlock`] is the unit of transfer between nodes. Blocks are backed by
//! an `Arc<[Sample]>`, so fanning a block out to several downstream nodes only
//! clones a pointer. Nodes never mutate a block they received; transforms build
//! a new block instead.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};
use std::sync::Arc;

/// One stereo sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub left: f32,
    pub right: f32,
}

impl Sample {
    pub const SILENCE: Self = Self { left: 0.0, right: 0.0 };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Same value on both channels.
    pub const fn mono(value: f32) -> Self {
        Self { left: value, right: value }
    }

    /// Largest absolute value across both channels.
    pub fn magnitude(self) -> f32 {
        self.left.abs().max(self.right.abs())
    }

    #[allow(clippy::float_cmp)]
    pub fn is_silent(self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

impl Add for Sample {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { left: self.left + rhs.left, right: self.right + rhs.right }
    }
}

impl AddAssign for Sample {
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for Sample {
    type Output = Self;

    fn mul(self, factor: f32) -> Self {
        Self { left: self.left * factor, right: self.right * factor }
    }
}

/// An immutable, cheaply clonable block of stereo samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    samples: Arc<[Sample]>,
}

impl SampleBlock {
    /// A block of `len` zero samples.
    pub fn silence(len: usize) -> Self {
        Self::filled(len, Sample::SILENCE)
    }

    /// A block of `len` copies of `sample`.
    pub fn filled(len: usize, sample: Sample) -> Self {
        Self { samples: vec![sample; len].into() }
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self {
        Self { samples: samples.into() }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn first(&self) -> Option<Sample> {
        self.samples.first().copied()
    }

    /// Builds a new block by applying `f` to every sample.
    #[must_use]
    pub fn map(&self, f: impl FnMut(Sample) -> Sample) -> Self {
        Self { samples: self.samples.iter().copied().map(f).collect() }
    }

    /// A silent block with the same length as this one.
    #[must_use]
    pub fn silenced(&self) -> Self {
        Self::silence(self.len())
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| s.is_silent())
    }

    /// Largest absolute sample value in the block, on either channel.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.magnitude()))
    }
}

impl From<Vec<Sample>> for SampleBlock {
    fn from(samples: Vec<Sample>) -> Self {
        Self::from_samples(samples)
    }
}

impl AsRef<[Sample]> for SampleBlock {
    fn as_ref(&self) -> &[Sample] {
        &self.samples
    }
}

/// Sums blocks sample by sample.
///
/// The accumulator starts empty (silence) and grows to the longest block
/// added, so a shorter block contributes silence past its end.
#[derive(Debug, Default)]
pub struct BlockMixer {
    acc: Vec<Sample>,
    inputs: usize,
}

impl BlockMixer {
    pub const fn new() -> Self {
        Self { acc: Vec::new(), inputs: 0 }
    }

    pub fn add(&mut self, block: &SampleBlock) {
        if self.acc.len() < block.len() {
            self.acc.resize(block.len(), Sample::SILENCE);
        }
        for (acc, sample) in self.acc.iter_mut().zip(block.samples()) {
            *acc += *sample;
        }
        self.inputs += 1;
    }

    /// Number of blocks added so far.
    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn finish(self) -> SampleBlock {
        SampleBlock::from_samples(self.acc)
    }
}
