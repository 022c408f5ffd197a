// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A built, fixed-topology graph and the node lifecycle.
//!
//! ## Lifecycle
//!
//! - `start`: exclusive state lock → `Running`, edge opened, variant hook
//!   (spawn producer, bind listener, begin connect, start device)
//! - `stop`: exclusive state lock → `Stopped`, edge closed and drained;
//!   then, without the lock, the variant hook (join producer, wait for the
//!   reactor, stop device); then downstream edges re-check readiness
//! - `consume`: shared state lock; dropped unless `Running`
//!
//! Start/stop of one node are serialized with each other. Delivering to a node
//! and changing its lifecycle exclude each other through the state lock.

use crate::node::{Behavior, NodeId, NodeKind, NodeSlot};
use cablekit_core::{
    BlockFormat, CableError, Liveness, NodeState, NodeStats, Outlet, Result, SampleBlock,
};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLockReadGuard, Weak};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state behind a [`Graph`]: the node arena plus a topological order.
pub(crate) struct GraphCore {
    format: BlockFormat,
    slots: Box<[NodeSlot]>,
    order: Vec<NodeId>,
}

impl GraphCore {
    pub(crate) fn new(format: BlockFormat, slots: Vec<NodeSlot>, order: Vec<NodeId>) -> Self {
        Self { format, slots: slots.into_boxed_slice(), order }
    }

    pub(crate) const fn format(&self) -> BlockFormat {
        self.format
    }

    fn slot(&self, id: NodeId) -> &NodeSlot {
        &self.slots[id.index()]
    }

    fn checked_slot(&self, id: NodeId) -> Result<&NodeSlot> {
        self.slots
            .get(id.index())
            .ok_or_else(|| CableError::Graph(format!("Unknown node {id}")))
    }

    pub(crate) fn name(&self, id: NodeId) -> &str {
        &self.slot(id).name
    }

    fn read_state(&self, id: NodeId) -> RwLockReadGuard<'_, NodeState> {
        self.slot(id).state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open outbound, and either any upstream available or, without upstream,
    /// a producer that is actually producing (receive nodes need a peer).
    pub(crate) fn is_available(&self, id: NodeId) -> bool {
        let slot = self.slot(id);
        let edge = &slot.edge;
        if !edge.is_outbound_open() {
            return false;
        }
        if let Behavior::Receive(bridge) = &slot.behavior {
            return bridge.is_connected();
        }
        edge.upstream().is_empty() || edge.upstream().iter().any(|&u| self.is_available(u))
    }

    /// Write `block` (or silence, when muted) to the node's outbound edge.
    pub(crate) fn emit_output(&self, id: NodeId, block: SampleBlock) {
        let slot = self.slot(id);
        let block = if slot.muted.load(Ordering::Acquire) { block.silenced() } else { block };
        let delivered = slot.edge.write(&block, |to, copy| self.deliver(id, to, copy));
        if delivered {
            slot.stats.emitted();
        } else {
            slot.stats.dropped();
        }
    }

    fn deliver(&self, from: NodeId, to: NodeId, block: SampleBlock) {
        let ready = self.slot(to).edge.on_recv(from, block, |u| self.is_available(u));
        if let Some(mixed) = ready {
            self.consume(to, mixed);
        }
    }

    fn consume(&self, id: NodeId, block: SampleBlock) {
        let slot = self.slot(id);
        let state = self.read_state(id);
        if !state.is_running() {
            slot.stats.dropped();
            return;
        }
        slot.stats.consumed();

        match &slot.behavior {
            Behavior::Transform(transform) => {
                let output = lock(transform).process(&block);
                self.emit_output(id, output);
            },
            Behavior::Sink(sink) => {
                if let Err(e) = lock(sink).write(&block) {
                    slot.stats.errored();
                    if e.is_recoverable() {
                        tracing::trace!(node = %slot.name, error = %e, "Sink skipped a block");
                    } else {
                        tracing::warn!(node = %slot.name, error = %e, "Sink write failed");
                    }
                }
            },
            Behavior::Send(bridge) => {
                if bridge.submit(&block) {
                    slot.stats.emitted();
                } else {
                    slot.stats.dropped();
                }
            },
            Behavior::Source(_) | Behavior::Receive(_) => {
                // The builder never wires an input into these.
                slot.stats.dropped();
            },
        }
    }

    /// Re-check readiness below `id` after it stopped producing.
    fn release_downstream(&self, id: NodeId) {
        for &to in self.slot(id).edge.downstream() {
            for mixed in self.slot(to).edge.reevaluate(|u| self.is_available(u)) {
                self.consume(to, mixed);
            }
            self.release_downstream(to);
        }
    }

    /// A producer gave up: mark the node failed and stop its output.
    pub(crate) fn fail(&self, id: NodeId) {
        let slot = self.slot(id);
        slot.failed.store(true, Ordering::Release);
        slot.edge.seal_outbound();
        self.release_downstream(id);
    }

    pub(crate) fn record_error(&self, id: NodeId) {
        self.slot(id).stats.errored();
    }
}

/// Pushes blocks from the network reactor into a receive node.
struct NodeOutlet {
    core: Weak<GraphCore>,
    id: NodeId,
}

impl Outlet for NodeOutlet {
    fn emit(&self, block: SampleBlock) {
        if let Some(core) = self.core.upgrade() {
            core.emit_output(self.id, block);
        }
    }

    fn link_changed(&self, connected: bool) {
        if connected {
            return;
        }
        if let Some(core) = self.core.upgrade() {
            core.release_downstream(self.id);
        }
    }
}

/// A built graph. Nodes start stopped; the topology cannot change.
///
/// Dropping the graph stops every running node.
pub struct Graph {
    core: Arc<GraphCore>,
}

impl Graph {
    pub(crate) fn new(core: GraphCore) -> Self {
        Self { core: Arc::new(core) }
    }

    pub fn format(&self) -> BlockFormat {
        self.core.format
    }

    pub fn len(&self) -> usize {
        self.core.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.slots.is_empty()
    }

    /// Look a node up by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.core.slots.iter().position(|s| s.name == name).and_then(|i| u32::try_from(i).ok()).map(NodeId)
    }

    /// All nodes, in topological order (every node after all of its upstreams).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str, NodeKind)> + '_ {
        self.core.order.iter().map(|&id| {
            let slot = self.core.slot(id);
            (id, slot.name.as_str(), slot.kind())
        })
    }

    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn name(&self, id: NodeId) -> Result<&str> {
        Ok(&self.core.checked_slot(id)?.name)
    }

    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.core.checked_slot(id)?.kind())
    }

    /// Start one node.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or the node's start hook fails
    /// (bind error, device error, thread spawn failure). The node is left stopped.
    ///
    /// # Panics
    ///
    /// Panics if the node is already running.
    pub fn start(&self, id: NodeId) -> Result<()> {
        let slot = self.core.checked_slot(id)?;
        let _transition = lock(&slot.transition);
        {
            let mut state = slot.state.write().unwrap_or_else(PoisonError::into_inner);
            assert!(!state.is_running(), "node `{}` started twice", slot.name);
            *state = NodeState::Running;
            slot.failed.store(false, Ordering::Release);
            slot.edge.open();

            if let Err(e) = self.on_start(id, slot) {
                *state = NodeState::Stopped;
                slot.edge.close();
                tracing::warn!(node = %slot.name, error = %e, "Node failed to start");
                return Err(e);
            }
        }
        tracing::info!(node = %slot.name, kind = %slot.kind(), "Node started");
        Ok(())
    }

    fn on_start(&self, id: NodeId, slot: &NodeSlot) -> Result<()> {
        match &slot.behavior {
            Behavior::Source(driver) => driver.start(&self.core, id, &slot.name),
            Behavior::Transform(_) => Ok(()),
            Behavior::Sink(sink) => lock(sink).start(),
            Behavior::Send(bridge) => bridge.start(),
            Behavior::Receive(bridge) => {
                let outlet = Arc::new(NodeOutlet { core: Arc::downgrade(&self.core), id });
                bridge.start(outlet).map(|_| ())
            },
        }
    }

    /// Stop one node. Returns once its thread is joined and its network tasks are gone.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the node is not running.
    pub fn stop(&self, id: NodeId) -> Result<()> {
        let slot = self.core.checked_slot(id)?;
        let _transition = lock(&slot.transition);
        {
            let mut state = slot.state.write().unwrap_or_else(PoisonError::into_inner);
            assert!(state.is_running(), "node `{}` stopped twice", slot.name);
            *state = NodeState::Stopped;
            slot.edge.close();
        }

        match &slot.behavior {
            Behavior::Source(driver) => driver.stop(&slot.name),
            Behavior::Transform(transform) => lock(transform).reset(),
            Behavior::Sink(sink) => {
                if let Err(e) = lock(sink).stop() {
                    tracing::warn!(node = %slot.name, error = %e, "Sink failed to stop cleanly");
                }
            },
            Behavior::Send(bridge) => bridge.stop(),
            Behavior::Receive(bridge) => bridge.stop(),
        }

        self.core.release_downstream(id);
        tracing::info!(node = %slot.name, "Node stopped");
        Ok(())
    }

    /// Start every stopped node, consumers before producers.
    ///
    /// # Errors
    ///
    /// Returns the first start error. Nodes started by this call are stopped again.
    pub fn start_all(&self) -> Result<()> {
        let mut started = Vec::new();
        for &id in self.core.order.iter().rev() {
            if self.is_running(id) {
                continue;
            }
            if let Err(e) = self.start(id) {
                for &id in started.iter().rev() {
                    let _ = self.stop(id);
                }
                return Err(e);
            }
            started.push(id);
        }
        Ok(())
    }

    /// Stop every running node, producers before consumers.
    pub fn stop_all(&self) {
        for &id in &self.core.order {
            if self.is_running(id) {
                let _ = self.stop(id);
            }
        }
    }

    fn is_running(&self, id: NodeId) -> bool {
        self.core.read_state(id).is_running()
    }

    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn state(&self, id: NodeId) -> Result<NodeState> {
        self.core.checked_slot(id)?;
        Ok(*self.core.read_state(id))
    }

    /// Replace everything the node emits with silence of the same length, or stop doing so.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn set_mute(&self, id: NodeId, muted: bool) -> Result<()> {
        let slot = self.core.checked_slot(id)?;
        slot.muted.store(muted, Ordering::Release);
        tracing::debug!(node = %slot.name, muted, "Mute changed");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn is_muted(&self, id: NodeId) -> Result<bool> {
        Ok(self.core.checked_slot(id)?.muted.load(Ordering::Acquire))
    }

    /// Whether the node counts as producing for fan-in purposes.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn is_available(&self, id: NodeId) -> Result<bool> {
        self.core.checked_slot(id)?;
        Ok(self.core.is_available(id))
    }

    /// Monitoring view of a node.
    ///
    /// Bridges report their connection. Other nodes are live while available.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn liveness(&self, id: NodeId) -> Result<Liveness> {
        let slot = self.core.checked_slot(id)?;
        if !self.is_running(id) {
            return Ok(Liveness::Stopped);
        }
        if slot.failed.load(Ordering::Acquire) {
            return Ok(Liveness::Failed);
        }
        let live = match &slot.behavior {
            Behavior::Send(bridge) => bridge.is_connected(),
            Behavior::Receive(bridge) => bridge.is_connected(),
            _ => self.core.is_available(id),
        };
        Ok(if live { Liveness::Live } else { Liveness::Idle })
    }

    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn stats(&self, id: NodeId) -> Result<NodeStats> {
        Ok(self.core.checked_slot(id)?.stats.snapshot())
    }

    /// Blocks queued on the node's inbound edge, one entry per upstream in wiring order.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn queue_depths(&self, id: NodeId) -> Result<Vec<usize>> {
        Ok(self.core.checked_slot(id)?.edge.queue_depths())
    }

    /// Upstream nodes in wiring order.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn upstream(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.core.checked_slot(id)?.edge.upstream())
    }

    /// Downstream nodes in wiring order.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not belong to this graph.
    pub fn downstream(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.core.checked_slot(id)?.edge.downstream())
    }

    /// The listening address of a running receive node.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not a receive node.
    pub fn local_addr(&self, id: NodeId) -> Result<Option<SocketAddr>> {
        match &self.core.checked_slot(id)?.behavior {
            Behavior::Receive(bridge) => Ok(bridge.local_addr()),
            _ => Err(CableError::Graph(format!("Node {id} is not a receive node"))),
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for (id, name, kind) in self.nodes() {
            list.entry(&format_args!("{id} {name} ({kind})"));
        }
        list.finish()
    }
}
