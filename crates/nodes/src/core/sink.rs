// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Terminal nodes.
//!
//! - [`LevelMeter`] keeps the level of the most recent block for monitoring
//! - [`CaptureSink`] records blocks so callers can inspect what a graph produced

use cablekit_core::{AudioSink, Result, Sample, SampleBlock};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Level of the last block seen by a [`LevelMeter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    /// First sample of the block.
    pub first: Sample,
    /// Largest magnitude in the block.
    pub peak: f32,
    /// Blocks metered so far.
    pub blocks: u64,
}

#[derive(Debug, Default)]
struct Levels {
    left: AtomicU32,
    right: AtomicU32,
    peak: AtomicU32,
    blocks: AtomicU64,
}

/// Read side of a [`LevelMeter`]. Cheap to clone, lock-free to read.
#[derive(Debug, Clone, Default)]
pub struct LevelProbe {
    levels: Arc<Levels>,
}

impl LevelProbe {
    pub fn reading(&self) -> LevelReading {
        let levels = &self.levels;
        LevelReading {
            first: Sample::new(
                f32::from_bits(levels.left.load(Ordering::Relaxed)),
                f32::from_bits(levels.right.load(Ordering::Relaxed)),
            ),
            peak: f32::from_bits(levels.peak.load(Ordering::Relaxed)),
            blocks: levels.blocks.load(Ordering::Relaxed),
        }
    }
}

/// Sink that meters every block it receives.
#[derive(Debug, Default)]
pub struct LevelMeter {
    probe: LevelProbe,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> LevelProbe {
        self.probe.clone()
    }
}

impl AudioSink for LevelMeter {
    fn write(&mut self, block: &SampleBlock) -> Result<()> {
        let levels = &self.probe.levels;
        let first = block.first().unwrap_or(Sample::SILENCE);
        levels.left.store(first.left.to_bits(), Ordering::Relaxed);
        levels.right.store(first.right.to_bits(), Ordering::Relaxed);
        levels.peak.store(block.peak().to_bits(), Ordering::Relaxed);
        levels.blocks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let levels = &self.probe.levels;
        levels.left.store(0, Ordering::Relaxed);
        levels.right.store(0, Ordering::Relaxed);
        levels.peak.store(0, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Captured {
    blocks: Mutex<Vec<SampleBlock>>,
    arrived: Condvar,
}

/// Sink that stores every block it receives.
#[derive(Debug, Default)]
pub struct CaptureSink {
    captured: Arc<Captured>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle { captured: Arc::clone(&self.captured) }
    }
}

impl AudioSink for CaptureSink {
    fn write(&mut self, block: &SampleBlock) -> Result<()> {
        let mut blocks = self.captured.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        blocks.push(block.clone());
        self.captured.arrived.notify_all();
        Ok(())
    }
}

/// Read side of a [`CaptureSink`].
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    captured: Arc<Captured>,
}

impl CaptureHandle {
    pub fn len(&self) -> usize {
        self.captured.blocks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn blocks(&self) -> Vec<SampleBlock> {
        self.captured.blocks.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remove and return everything captured so far.
    pub fn take(&self) -> Vec<SampleBlock> {
        std::mem::take(&mut *self.captured.blocks.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Block until at least `count` blocks were captured or `timeout` elapses.
    /// Returns whether the count was reached.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut blocks = self.captured.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        while blocks.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            blocks = match self.captured.arrived.wait_timeout(blocks, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}
