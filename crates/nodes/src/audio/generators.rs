// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Signal generators.
//!
//! Both generators compute a block instantly, so they report themselves as not
//! real-time and the engine paces them at one block per block period.

use cablekit_core::{AudioSource, BlockFormat, CableError, Result, Sample, SampleBlock};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Emits silent blocks.
///
/// Useful as an extra upstream of a mixing point so the mix keeps ticking
/// while every real input is idle.
#[derive(Debug, Clone)]
pub struct Keepalive {
    block: SampleBlock,
}

impl Keepalive {
    pub fn new(format: BlockFormat) -> Self {
        Self { block: format.silence() }
    }
}

impl AudioSource for Keepalive {
    fn read(&mut self) -> Result<SampleBlock> {
        Ok(self.block.clone())
    }
}

/// The configuration struct for the tone generator.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct ToneConfig {
    /// Frequency in Hz. Must be below half the sample rate.
    pub frequency: f32,
    /// Peak amplitude, between 0.0 and 1.0.
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self { frequency: 440.0, amplitude: 0.5 }
    }
}

impl ToneConfig {
    /// # Errors
    ///
    /// Returns an error if the frequency is not below Nyquist or the amplitude is out of range.
    pub fn validate(&self, format: &BlockFormat) -> Result<()> {
        #[allow(clippy::cast_precision_loss)] // sample rates are far below f32's exact range
        let nyquist = format.sample_rate as f32 / 2.0;
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.frequency >= nyquist {
            return Err(CableError::Configuration(format!(
                "Tone frequency must be between 0 and {nyquist} Hz, got: {}",
                self.frequency
            )));
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(CableError::Configuration(format!(
                "Tone amplitude must be between 0.0 and 1.0, got: {}",
                self.amplitude
            )));
        }
        Ok(())
    }
}

/// A stereo sine tone built from one precomputed period.
#[derive(Debug, Clone)]
pub struct ToneGenerator {
    table: Vec<f32>,
    position: usize,
    block_len: usize,
}

impl ToneGenerator {
    /// # Errors
    ///
    /// Returns an error if the configuration or format is invalid.
    pub fn new(config: &ToneConfig, format: BlockFormat) -> Result<Self> {
        format.validate()?;
        config.validate(&format)?;

        let period = (f64::from(format.sample_rate) / f64::from(config.frequency)).round();
        // validate() bounds the period to 2..=sample_rate
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let period = period.max(1.0) as usize;

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let table = (0..period)
            .map(|i| {
                let phase = std::f64::consts::TAU * i as f64 / period as f64;
                (phase.sin() * f64::from(config.amplitude)) as f32
            })
            .collect();

        Ok(Self { table, position: 0, block_len: format.block_len })
    }

    /// Samples in one period of the tone.
    pub fn period_len(&self) -> usize {
        self.table.len()
    }
}

impl AudioSource for ToneGenerator {
    fn read(&mut self) -> Result<SampleBlock> {
        let mut samples = Vec::with_capacity(self.block_len);
        for _ in 0..self.block_len {
            samples.push(Sample::mono(self.table[self.position]));
            self.position = (self.position + 1) % self.table.len();
        }
        Ok(SampleBlock::from_samples(samples))
    }

    fn stop(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}
