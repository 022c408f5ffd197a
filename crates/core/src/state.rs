// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node lifecycle state and liveness.
//!
//! ## State Machine
//!
//! ```text
//!     Stopped ──start──▶ Running
//!        ▲                  │
//!        └───────stop───────┘
//! ```
//!
//! A node only accepts input while `Running`. Starting a running node or
//! stopping a stopped one is a programming error.
//!
//! [`Liveness`] is the monitoring view on top of the lifecycle: a running node
//! may still be idle (no upstream producing, no peer connected) or failed
//! (its producer hit a fatal device error).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Stopped,
    Running,
}

impl NodeState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Whether a node is currently carrying audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// The node is stopped.
    Stopped,
    /// Running, but nothing is flowing: no live upstream, or no peer connected.
    Idle,
    /// Running with a live upstream or a connected peer.
    Live,
    /// Running, but its producer gave up after a fatal error.
    Failed,
}

impl Liveness {
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Idle => "idle",
            Self::Live => "live",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
