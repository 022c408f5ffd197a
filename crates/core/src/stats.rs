// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node statistics tracking and reporting.
//!
//! Counters are updated from whichever thread delivers a block, so the tracker
//! uses relaxed atomics and hands out plain [`NodeStats`] snapshots.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Runtime statistics for a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Blocks handed to the node's logic
    pub consumed: u64,
    /// Blocks written to the node's outbound edge
    pub emitted: u64,
    /// Blocks dropped (node stopped, edge closed, link down)
    pub dropped: u64,
    /// Processing errors that didn't stop the node
    pub errored: u64,
    /// Seconds since the tracker was created
    pub duration_secs: f64,
}

/// Shared counters behind [`NodeStats`].
#[derive(Debug)]
pub struct NodeStatsTracker {
    consumed: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    errored: AtomicU64,
    start_time: Instant,
}

impl Default for NodeStatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStatsTracker {
    pub fn new() -> Self {
        Self {
            consumed: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            errored: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn errored(&self) {
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NodeStats {
        NodeStats {
            consumed: self.consumed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}
