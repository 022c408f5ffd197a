// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Audio generators and filters.

pub mod filters;
pub mod generators;

pub use filters::{NoiseGate, NoiseGateConfig, Switch, SwitchHandle, Volume, VolumeConfig, VolumeHandle};
pub use generators::{Keepalive, ToneConfig, ToneGenerator};
