// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! On/off switch.
//!
//! When off, the switch keeps emitting at the input cadence but every block is
//! silent, so downstream fan-in never stalls on it.

use cablekit_core::{SampleBlock, Transform};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Switch {
    on: Arc<AtomicBool>,
}

impl Switch {
    pub fn new(on: bool) -> Self {
        Self { on: Arc::new(AtomicBool::new(on)) }
    }

    pub fn handle(&self) -> SwitchHandle {
        SwitchHandle { on: Arc::clone(&self.on) }
    }
}

impl Default for Switch {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Transform for Switch {
    fn process(&mut self, block: &SampleBlock) -> SampleBlock {
        if self.on.load(Ordering::Relaxed) {
            block.clone()
        } else {
            block.silenced()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchHandle {
    on: Arc<AtomicBool>,
}

impl SwitchHandle {
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }

    pub fn set(&self, on: bool) {
        self.on.store(on, Ordering::Relaxed);
    }

    /// Flip the switch and return the new position.
    pub fn toggle(&self) -> bool {
        !self.on.fetch_xor(true, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::constant_block;

    #[test]
    fn test_off_emits_silence_of_same_length() {
        let mut switch = Switch::new(false);
        let output = switch.process(&constant_block(0.3, 32));
        assert_eq!(output.len(), 32);
        assert!(output.is_silent());
    }

    #[test]
    fn test_toggle() {
        let mut switch = Switch::default();
        let handle = switch.handle();
        let input = constant_block(0.3, 4);

        assert_eq!(switch.process(&input), input);
        assert!(!handle.toggle());
        assert!(switch.process(&input).is_silent());
        assert!(handle.toggle());
        assert!(handle.is_on());
    }
}
