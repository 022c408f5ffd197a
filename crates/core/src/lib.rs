// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Cablekit Core - Fundamental types and collaborator contracts for real-time audio routing.
//!
//! This crate defines the abstractions shared by the graph engine, the built-in nodes
//! and the network transport:
//!
//! ## Core Modules
//!
//! - [`block`]: Stereo samples and immutable sample blocks
//! - [`format`]: Block format (sample rate, block length) shared by every node
//! - [`device`]: Collaborator traits for sources, sinks, transforms and outlets
//! - [`state`]: Node lifecycle state and liveness reporting
//! - [`stats`]: Node statistics collection
//! - [`error`]: Error types and handling
//!
//! ## Quick Start
//!
//! ```ignore
//! use cablekit_core::{SampleBlock, Transform};
//!
//! struct Invert;
//!
//! impl Transform for Invert {
//!     fn process(&mut self, block: &SampleBlock) -> SampleBlock {
//!         block.map(|s| s * -1.0)
//!     }
//! }
//! ```

pub mod block;
pub mod device;
pub mod error;
pub mod format;
pub mod state;
pub mod stats;

// Convenience re-exports for commonly used types

// Error handling
pub use error::{CableError, DeviceError, Result};

// Audio data
pub use block::{BlockMixer, Sample, SampleBlock};
pub use format::BlockFormat;

// Collaborator contracts
pub use device::{AudioSink, AudioSource, Outlet, Transform};

// State tracking
pub use state::{Liveness, NodeState};

// Statistics
pub use stats::{NodeStats, NodeStatsTracker};
