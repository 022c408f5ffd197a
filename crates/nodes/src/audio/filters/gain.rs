// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use cablekit_core::{CableError, SampleBlock, Transform};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Upper bound for the volume, in percent (+12dB).
pub const MAX_VOLUME_PERCENT: u16 = 400;

fn percent_schema(_gen: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "type": "integer",
        "default": 100,
        "minimum": 0,
        "maximum": 400,
        "tunable": true,
        "description": "Volume in percent. 0 = mute, 100 = unity (no change), 200 = +6dB. Range: 0 to 400"
    })
}

/// The configuration struct for the volume filter.
#[derive(Serialize, Deserialize, Debug, Clone, JsonSchema)]
#[serde(default)]
pub struct VolumeConfig {
    /// Gain in percent of the input level.
    /// This parameter can be updated in real-time through a [`VolumeHandle`].
    #[schemars(schema_with = "percent_schema")]
    pub percent: u16,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { percent: 100 }
    }
}

impl VolumeConfig {
    /// Validate the volume is within acceptable bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume exceeds [`MAX_VOLUME_PERCENT`].
    pub fn validate(&self) -> Result<(), CableError> {
        if self.percent > MAX_VOLUME_PERCENT {
            return Err(CableError::Configuration(format!(
                "Volume must be between 0 and {MAX_VOLUME_PERCENT} percent, got: {}",
                self.percent
            )));
        }
        Ok(())
    }
}

/// Scales every sample by a percentage.
pub struct Volume {
    percent: Arc<AtomicU16>,
}

impl Volume {
    /// Create a new volume filter with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(config: &VolumeConfig) -> Result<Self, CableError> {
        config.validate()?;
        Ok(Self { percent: Arc::new(AtomicU16::new(config.percent)) })
    }

    /// A handle for changing the volume while the graph runs.
    pub fn handle(&self) -> VolumeHandle {
        VolumeHandle { percent: Arc::clone(&self.percent) }
    }
}

impl Transform for Volume {
    fn process(&mut self, block: &SampleBlock) -> SampleBlock {
        let percent = self.percent.load(Ordering::Relaxed);
        if percent == 100 {
            return block.clone();
        }
        let factor = f32::from(percent) / 100.0;
        block.map(|s| s * factor)
    }
}

/// Runtime control for a [`Volume`] filter.
#[derive(Debug, Clone)]
pub struct VolumeHandle {
    percent: Arc<AtomicU16>,
}

impl VolumeHandle {
    pub fn percent(&self) -> u16 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Set the volume, clamped to `0..=MAX_VOLUME_PERCENT`.
    pub fn set_percent(&self, percent: u16) {
        let percent = percent.min(MAX_VOLUME_PERCENT);
        tracing::info!(old = self.percent(), new = percent, "Updating volume");
        self.percent.store(percent, Ordering::Relaxed);
    }

    /// Move the volume by `delta` percent, saturating at both ends. Returns the new value.
    pub fn adjust(&self, delta: i32) -> u16 {
        let current = i32::from(self.percent());
        let target = (current + delta).clamp(0, i32::from(MAX_VOLUME_PERCENT));
        let target = u16::try_from(target).unwrap_or(MAX_VOLUME_PERCENT);
        self.set_percent(target);
        target
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::test_utils::constant_block;

    #[test]
    fn test_unity_passes_through() {
        let mut volume = Volume::new(&VolumeConfig::default()).unwrap();
        let input = constant_block(0.5, 16);
        let output = volume.process(&input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_half_volume_scales_both_channels() {
        let mut volume = Volume::new(&VolumeConfig { percent: 50 }).unwrap();
        let output = volume.process(&constant_block(0.5, 4));
        for sample in output.samples() {
            assert_eq!(sample.left, 0.25);
            assert_eq!(sample.right, 0.25);
        }
    }

    #[test]
    fn test_handle_changes_live_volume() {
        let mut volume = Volume::new(&VolumeConfig::default()).unwrap();
        let handle = volume.handle();

        handle.set_percent(0);
        assert!(volume.process(&constant_block(0.8, 8)).is_silent());

        assert_eq!(handle.adjust(-10), 0);
        assert_eq!(handle.adjust(150), 150);
        assert_eq!(handle.adjust(1_000), MAX_VOLUME_PERCENT);
    }

    #[test]
    fn test_rejects_out_of_range_config() {
        assert!(Volume::new(&VolumeConfig { percent: MAX_VOLUME_PERCENT + 1 }).is_err());
    }
}
