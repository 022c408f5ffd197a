// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-node fan-in and fan-out.
//!
//! Every node owns exactly one edge. The inbound side keeps one FIFO per
//! upstream node and releases a mix once every upstream either has a block
//! queued or is unavailable. The outbound side delivers each emitted block to
//! every downstream edge in wiring order.
//!
//! ## Locks
//!
//! - `inbound` guards the accept flag and the queues. It is never held while
//!   the mixed block is consumed.
//! - `send` serializes fan-out. `outbound` only flips under it, so a closing
//!   edge waits for an in-flight fan-out to finish.
//!
//! Availability is read from atomics without taking any lock.

use crate::node::NodeId;
use cablekit_core::{BlockMixer, SampleBlock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Inbound {
    accepting: bool,
    queues: Vec<VecDeque<SampleBlock>>,
}

pub(crate) struct Edge {
    downstream: Vec<NodeId>,
    upstream: Vec<NodeId>,
    inbound: Mutex<Inbound>,
    outbound: AtomicBool,
    send: Mutex<()>,
}

impl Edge {
    pub(crate) fn new(upstream: Vec<NodeId>, downstream: Vec<NodeId>) -> Self {
        let queues = upstream.iter().map(|_| VecDeque::new()).collect();
        Self {
            downstream,
            upstream,
            inbound: Mutex::new(Inbound { accepting: false, queues }),
            outbound: AtomicBool::new(false),
            send: Mutex::new(()),
        }
    }

    pub(crate) fn downstream(&self) -> &[NodeId] {
        &self.downstream
    }

    pub(crate) fn upstream(&self) -> &[NodeId] {
        &self.upstream
    }

    pub(crate) fn is_outbound_open(&self) -> bool {
        self.outbound.load(Ordering::Acquire)
    }

    fn lock_inbound(&self) -> MutexGuard<'_, Inbound> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_send(&self) -> MutexGuard<'_, ()> {
        self.send.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start accepting on both sides.
    pub(crate) fn open(&self) {
        self.lock_inbound().accepting = true;
        let _send = self.lock_send();
        self.outbound.store(true, Ordering::Release);
    }

    /// Stop accepting on both sides and discard everything queued.
    pub(crate) fn close(&self) {
        {
            let mut inbound = self.lock_inbound();
            inbound.accepting = false;
            for queue in &mut inbound.queues {
                queue.clear();
            }
        }
        self.seal_outbound();
    }

    /// Stop emitting without touching the inbound side.
    pub(crate) fn seal_outbound(&self) {
        let _send = self.lock_send();
        self.outbound.store(false, Ordering::Release);
    }

    /// Fan `block` out to every downstream node. Returns `false` if the edge
    /// is closed and the block was dropped.
    pub(crate) fn write(&self, block: &SampleBlock, mut deliver: impl FnMut(NodeId, SampleBlock)) -> bool {
        let _send = self.lock_send();
        if !self.outbound.load(Ordering::Acquire) {
            return false;
        }
        for &to in &self.downstream {
            deliver(to, block.clone());
        }
        true
    }

    /// Queue a block from `from`. Returns the mix if this arrival completed a round.
    pub(crate) fn on_recv(
        &self,
        from: NodeId,
        block: SampleBlock,
        available: impl Fn(NodeId) -> bool,
    ) -> Option<SampleBlock> {
        let mut inbound = self.lock_inbound();
        if !inbound.accepting {
            tracing::trace!(from = %from, "Edge closed, dropping block");
            return None;
        }
        let slot = self.upstream.iter().position(|&u| u == from)?;
        inbound.queues[slot].push_back(block);
        self.take_ready(&mut inbound, &available)
    }

    /// Release every round that is ready now. Used after an upstream went away.
    pub(crate) fn reevaluate(&self, available: impl Fn(NodeId) -> bool) -> Vec<SampleBlock> {
        let mut inbound = self.lock_inbound();
        let mut ready = Vec::new();
        if !inbound.accepting {
            return ready;
        }
        while let Some(mixed) = self.take_ready(&mut inbound, &available) {
            ready.push(mixed);
        }
        ready
    }

    /// Queue depth per upstream, in wiring order.
    pub(crate) fn queue_depths(&self) -> Vec<usize> {
        self.lock_inbound().queues.iter().map(VecDeque::len).collect()
    }

    fn take_ready(&self, inbound: &mut Inbound, available: &impl Fn(NodeId) -> bool) -> Option<SampleBlock> {
        let ready = self
            .upstream
            .iter()
            .zip(&inbound.queues)
            .all(|(&upstream, queue)| !queue.is_empty() || !available(upstream));
        if !ready {
            return None;
        }

        let mut mixer = BlockMixer::new();
        for queue in &mut inbound.queues {
            if let Some(block) = queue.pop_front() {
                mixer.add(&block);
            }
        }
        (mixer.inputs() > 0).then(|| mixer.finish())
    }
}
