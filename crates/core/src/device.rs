// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Collaborator contracts.
//!
//! The engine drives these traits; it never talks to sound cards, files or
//! sockets directly. Implementations live in `cablekit-nodes` or in the
//! embedding application.
//!
//! - [`AudioSource`]: produces one block per `read`, on the node's own thread
//! - [`AudioSink`]: receives every block consumed by a sink node
//! - [`Transform`]: maps an input block to an output block
//! - [`Outlet`]: how code outside the engine pushes blocks into a node

use crate::block::SampleBlock;
use crate::error::Result;

/// A producer of sample blocks, such as a capture device or a generator.
///
/// `start` and `stop` run on the production thread, around the read loop.
pub trait AudioSource: Send {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Produce the next block.
    ///
    /// Recoverable device errors (`DeviceError::Underrun`/`Overrun`) skip the
    /// block; any other error ends production for this run.
    fn read(&mut self) -> Result<SampleBlock>;

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Whether `read` blocks on a real-time clock (a sound card).
    ///
    /// Sources that return `false` are paced by the engine at one block period.
    fn is_realtime(&self) -> bool {
        false
    }
}

/// A consumer of sample blocks, such as a playback device or a meter.
pub trait AudioSink: Send {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, block: &SampleBlock) -> Result<()>;

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A block-to-block processing step.
pub trait Transform: Send {
    fn process(&mut self, block: &SampleBlock) -> SampleBlock;

    /// Clear internal state. Called when the node stops.
    fn reset(&mut self) {}
}

/// Entry point for blocks produced outside the engine's threads.
pub trait Outlet: Send + Sync {
    fn emit(&self, block: SampleBlock);

    /// The producer behind this outlet gained or lost its upstream link.
    fn link_changed(&self, _connected: bool) {}
}

impl<F> Outlet for F
where
    F: Fn(SampleBlock) + Send + Sync,
{
    fn emit(&self, block: SampleBlock) {
        self(block);
    }
}
