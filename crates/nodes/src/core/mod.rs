// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Plumbing nodes: passthrough, level meter and capture.

mod passthrough;
pub mod sink;

pub use passthrough::Passthrough;
pub use sink::{CaptureHandle, CaptureSink, LevelMeter, LevelProbe, LevelReading};
