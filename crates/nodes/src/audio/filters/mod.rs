// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

pub mod gain;
pub mod noise_gate;
pub mod switch;

pub use gain::{Volume, VolumeConfig, VolumeHandle, MAX_VOLUME_PERCENT};
pub use noise_gate::{NoiseGate, NoiseGateConfig};
pub use switch::{Switch, SwitchHandle};
