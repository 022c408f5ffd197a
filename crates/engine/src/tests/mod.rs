// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Unit tests for the engine crate.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

mod lifecycle;

use cablekit_core::{AudioSource, BlockFormat, DeviceError, Result, Sample, SampleBlock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(super) const FORMAT: BlockFormat = BlockFormat::new(44_100, 4);
pub(super) const TIMEOUT: Duration = Duration::from_secs(5);

const POLL: Duration = Duration::from_millis(5);

pub(super) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub(super) fn block(left: f32, right: f32) -> SampleBlock {
    SampleBlock::filled(FORMAT.block_len, Sample::new(left, right))
}

/// Poll `condition` until it holds or [`TIMEOUT`] elapses.
pub(super) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(POLL);
    }
    condition()
}

/// Test side of a [`FeedSource`].
pub(super) struct Feed {
    tx: Sender<SampleBlock>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl Feed {
    pub(super) fn push(&self, block: SampleBlock) {
        self.tx.send(block).unwrap();
    }

    pub(super) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(super) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Real-time source that emits exactly the blocks pushed into its [`Feed`].
///
/// An empty feed reads as an underrun. Dropping the feed is a device failure.
pub(super) struct FeedSource {
    rx: Receiver<SampleBlock>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

pub(super) fn feed() -> (Feed, FeedSource) {
    let (tx, rx) = mpsc::channel();
    let starts = Arc::new(AtomicUsize::new(0));
    let stops = Arc::new(AtomicUsize::new(0));
    (
        Feed { tx, starts: Arc::clone(&starts), stops: Arc::clone(&stops) },
        FeedSource { rx, starts, stops },
    )
}

impl AudioSource for FeedSource {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<SampleBlock> {
        match self.rx.recv_timeout(POLL) {
            Ok(block) => Ok(block),
            Err(RecvTimeoutError::Timeout) => Err(DeviceError::Underrun.into()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(DeviceError::Failed("feed dropped".to_string()).into())
            },
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_realtime(&self) -> bool {
        true
    }
}
