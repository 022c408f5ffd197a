// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node identity, variants and per-node runtime state.

use crate::edge::Edge;
use crate::source::SourceDriver;
use cablekit_core::{AudioSink, NodeState, NodeStatsTracker, Transform};
use cablekit_nodes::transport::{ReceiveBridge, SendBridge};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, RwLock};

/// Index of a node in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Produces blocks on its own thread.
    Source,
    /// Maps each consumed block to an emitted block.
    Transform,
    /// Consumes blocks into a device or meter.
    Sink,
    /// Forwards consumed blocks to a remote peer.
    Send,
    /// Emits blocks received from a remote peer.
    Receive,
}

impl NodeKind {
    /// Whether this kind has an outbound side.
    pub const fn emits(self) -> bool {
        matches!(self, Self::Source | Self::Transform | Self::Receive)
    }

    /// Whether this kind accepts inbound blocks.
    pub const fn accepts(self) -> bool {
        matches!(self, Self::Transform | Self::Sink | Self::Send)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Transform => "transform",
            Self::Sink => "sink",
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) enum Behavior {
    Source(SourceDriver),
    Transform(Mutex<Box<dyn Transform>>),
    Sink(Mutex<Box<dyn AudioSink>>),
    Send(SendBridge),
    Receive(ReceiveBridge),
}

impl Behavior {
    pub(crate) const fn kind(&self) -> NodeKind {
        match self {
            Self::Source(_) => NodeKind::Source,
            Self::Transform(_) => NodeKind::Transform,
            Self::Sink(_) => NodeKind::Sink,
            Self::Send(_) => NodeKind::Send,
            Self::Receive(_) => NodeKind::Receive,
        }
    }
}

/// Everything the graph keeps for one node.
///
/// `transition` serializes start/stop. `state` is held shared while a block is
/// consumed and exclusively while the lifecycle flips.
pub(crate) struct NodeSlot {
    pub(crate) name: String,
    pub(crate) edge: Edge,
    pub(crate) transition: Mutex<()>,
    pub(crate) state: RwLock<NodeState>,
    pub(crate) muted: AtomicBool,
    pub(crate) failed: AtomicBool,
    pub(crate) behavior: Behavior,
    pub(crate) stats: NodeStatsTracker,
}

impl NodeSlot {
    pub(crate) fn new(name: String, edge: Edge, behavior: Behavior) -> Self {
        Self {
            name,
            edge,
            transition: Mutex::new(()),
            state: RwLock::new(NodeState::Stopped),
            muted: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            behavior,
            stats: NodeStatsTracker::new(),
        }
    }

    pub(crate) const fn kind(&self) -> NodeKind {
        self.behavior.kind()
    }
}
