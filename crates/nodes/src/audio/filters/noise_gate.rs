// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use cablekit_core::{CableError, Sample, SampleBlock, Transform};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The configuration struct for the noise gate.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct NoiseGateConfig {
    /// Samples whose magnitude is at or below this level are zeroed.
    pub threshold: f32,
}

impl Default for NoiseGateConfig {
    fn default() -> Self {
        Self { threshold: 0.01 }
    }
}

impl NoiseGateConfig {
    /// # Errors
    ///
    /// Returns an error if the threshold is negative or not finite.
    pub fn validate(&self) -> Result<(), CableError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(CableError::Configuration(format!(
                "Noise gate threshold must be a non-negative number, got: {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Zeroes quiet samples, channel by channel.
#[derive(Debug)]
pub struct NoiseGate {
    threshold: f32,
}

impl NoiseGate {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &NoiseGateConfig) -> Result<Self, CableError> {
        config.validate()?;
        Ok(Self { threshold: config.threshold })
    }

    fn gate(&self, value: f32) -> f32 {
        if value.abs() <= self.threshold {
            0.0
        } else {
            value
        }
    }
}

impl Transform for NoiseGate {
    fn process(&mut self, block: &SampleBlock) -> SampleBlock {
        block.map(|s| Sample::new(self.gate(s.left), self.gate(s.right)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_zeroes_quiet_channels_only() {
        let mut gate = NoiseGate::new(&NoiseGateConfig { threshold: 0.1 }).unwrap();
        let input = SampleBlock::from_samples(vec![
            Sample::new(0.05, -0.5),
            Sample::new(-0.1, 0.2),
            Sample::new(0.0, -0.09),
        ]);

        let output = gate.process(&input);
        assert_eq!(
            output.samples(),
            &[Sample::new(0.0, -0.5), Sample::new(0.0, 0.2), Sample::SILENCE]
        );
    }

    #[test]
    fn test_rejects_negative_threshold() {
        assert!(NoiseGate::new(&NoiseGateConfig { threshold: -0.1 }).is_err());
        assert!(NoiseGate::new(&NoiseGateConfig { threshold: f32::NAN }).is_err());
    }
}
