// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use cablekit_core::{SampleBlock, Transform};

/// Forwards every block unchanged.
/// Useful as an explicit mixing point or for wiring tests.
#[derive(Debug, Default)]
pub struct Passthrough;

impl Transform for Passthrough {
    fn process(&mut self, block: &SampleBlock) -> SampleBlock {
        block.clone()
    }
}
