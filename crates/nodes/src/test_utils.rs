// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Test utilities for node testing

use cablekit_core::{Sample, SampleBlock};

/// A block of `len` samples with `value` on both channels.
pub fn constant_block(value: f32, len: usize) -> SampleBlock {
    SampleBlock::filled(len, Sample::mono(value))
}

/// A block whose samples count up from `start` in steps of `step`, left positive and right negative.
#[allow(clippy::cast_precision_loss)]
pub fn ramp_block(start: f32, step: f32, len: usize) -> SampleBlock {
    SampleBlock::from_samples(
        (0..len)
            .map(|i| {
                let value = (i as f32).mul_add(step, start);
                Sample::new(value, -value)
            })
            .collect(),
    )
}

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
