// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graph construction and wiring validation.
//!
//! All wiring happens here, before any node runs. `build` consumes the
//! builder, so a running graph cannot be rewired.
//!
//! `connect` rejects:
//! - unknown node ids
//! - self loops and links that would close a cycle
//! - links into a source or receive node, or out of a sink or send node
//! - duplicate links

use crate::edge::Edge;
use crate::graph::{Graph, GraphCore};
use crate::node::{Behavior, NodeId, NodeSlot};
use crate::source::SourceDriver;
use cablekit_core::{AudioSink, AudioSource, BlockFormat, CableError, Result, Transform};
use cablekit_nodes::transport::{Reactor, ReceiveBridge, SendBridge};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;

struct PendingNode {
    name: String,
    behavior: Behavior,
    upstream: Vec<NodeId>,
    downstream: Vec<NodeId>,
}

/// Collects nodes and links, then freezes them into a [`Graph`].
pub struct GraphBuilder {
    format: BlockFormat,
    nodes: Vec<PendingNode>,
    names: HashMap<String, NodeId>,
    reactor: Option<Reactor>,
}

impl GraphBuilder {
    pub fn new(format: BlockFormat) -> Self {
        Self { format, nodes: Vec::new(), names: HashMap::new(), reactor: None }
    }

    /// Run this graph's bridges on an existing reactor instead of spawning one.
    #[must_use]
    pub fn with_reactor(mut self, reactor: Reactor) -> Self {
        self.reactor = Some(reactor);
        self
    }

    pub const fn format(&self) -> BlockFormat {
        self.format
    }

    fn reactor(&mut self) -> Result<Reactor> {
        if let Some(reactor) = &self.reactor {
            return Ok(reactor.clone());
        }
        let reactor = Reactor::start()?;
        self.reactor = Some(reactor.clone());
        Ok(reactor)
    }

    fn add(&mut self, name: &str, behavior: Behavior) -> Result<NodeId> {
        if name.is_empty() {
            return Err(CableError::Graph("Node names must not be empty".to_string()));
        }
        // Source threads are named after their node.
        if name.contains('\0') {
            return Err(CableError::Graph(format!("Node name {name:?} contains a NUL byte")));
        }
        if self.names.contains_key(name) {
            return Err(CableError::Graph(format!("Duplicate node name `{name}`")));
        }
        let index = u32::try_from(self.nodes.len())
            .map_err(|_| CableError::Graph("Too many nodes".to_string()))?;
        let id = NodeId(index);
        self.nodes.push(PendingNode {
            name: name.to_string(),
            behavior,
            upstream: Vec::new(),
            downstream: Vec::new(),
        });
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Add a producer that runs on its own thread while the node is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or already taken.
    pub fn add_source(&mut self, name: &str, source: impl AudioSource + 'static) -> Result<NodeId> {
        self.add(name, Behavior::Source(SourceDriver::new(Box::new(source))))
    }

    /// # Errors
    ///
    /// Returns an error if the name is empty or already taken.
    pub fn add_transform(&mut self, name: &str, transform: impl Transform + 'static) -> Result<NodeId> {
        self.add(name, Behavior::Transform(Mutex::new(Box::new(transform))))
    }

    /// # Errors
    ///
    /// Returns an error if the name is empty or already taken.
    pub fn add_sink(&mut self, name: &str, sink: impl AudioSink + 'static) -> Result<NodeId> {
        self.add(name, Behavior::Sink(Mutex::new(Box::new(sink))))
    }

    /// Add a node that forwards its input to `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the network reactor cannot be started.
    pub fn add_send(&mut self, name: &str, remote: SocketAddr) -> Result<NodeId> {
        let bridge = SendBridge::new(name, remote, self.format, self.reactor()?);
        self.add(name, Behavior::Send(bridge))
    }

    /// Add a node that listens on `bind` and emits what its peer sends.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the network reactor cannot be started.
    pub fn add_receive(&mut self, name: &str, bind: SocketAddr) -> Result<NodeId> {
        let bridge = ReceiveBridge::new(name, bind, self.format, self.reactor()?);
        self.add(name, Behavior::Receive(bridge))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Link every node in `from` to every node in `to`.
    ///
    /// Either all links are added or, on error, none are.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::Graph`] for any invalid link.
    pub fn connect(&mut self, from: &[NodeId], to: &[NodeId]) -> Result<()> {
        let mut added = Vec::new();
        for &a in from {
            for &b in to {
                if let Err(e) = self.link(a, b) {
                    for (a, b) in added.into_iter().rev() {
                        self.unlink(a, b);
                    }
                    return Err(e);
                }
                added.push((a, b));
            }
        }
        Ok(())
    }

    /// Link `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CableError::Graph`] if the link is invalid.
    pub fn link(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.validate_link(from, to)?;
        self.nodes[from.index()].downstream.push(to);
        self.nodes[to.index()].upstream.push(from);
        tracing::debug!(
            from = %self.nodes[from.index()].name,
            to = %self.nodes[to.index()].name,
            "Linked nodes"
        );
        Ok(())
    }

    fn unlink(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.index()].downstream.retain(|&n| n != to);
        self.nodes[to.index()].upstream.retain(|&n| n != from);
    }

    fn pending(&self, id: NodeId) -> Result<&PendingNode> {
        self.nodes.get(id.index()).ok_or_else(|| CableError::Graph(format!("Unknown node {id}")))
    }

    fn validate_link(&self, from: NodeId, to: NodeId) -> Result<()> {
        let source = self.pending(from)?;
        let target = self.pending(to)?;
        let from_kind = source.behavior.kind();
        let to_kind = target.behavior.kind();

        if from == to {
            return Err(CableError::Graph(format!("Node `{}` cannot feed itself", source.name)));
        }
        if !from_kind.emits() {
            return Err(CableError::Graph(format!(
                "Node `{}` is a {from_kind} node and has no output",
                source.name
            )));
        }
        if !to_kind.accepts() {
            return Err(CableError::Graph(format!(
                "Node `{}` is a {to_kind} node and takes no input",
                target.name
            )));
        }
        if source.downstream.contains(&to) {
            return Err(CableError::Graph(format!(
                "Nodes `{}` and `{}` are already linked",
                source.name, target.name
            )));
        }
        if let Some(path) = self.path(to, from) {
            let names: Vec<&str> = path.iter().map(|&id| self.nodes[id.index()].name.as_str()).collect();
            return Err(CableError::Graph(format!(
                "Circular dependency detected: {} -> {}",
                names.join(" -> "),
                target.name
            )));
        }
        Ok(())
    }

    /// A downstream path from `start` to `goal`, if any (DFS).
    fn path(&self, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
        fn dfs(
            nodes: &[PendingNode],
            at: NodeId,
            goal: NodeId,
            visited: &mut HashSet<NodeId>,
            path: &mut Vec<NodeId>,
        ) -> bool {
            path.push(at);
            if at == goal {
                return true;
            }
            if visited.insert(at) {
                for &next in &nodes[at.index()].downstream {
                    if dfs(nodes, next, goal, visited, path) {
                        return true;
                    }
                }
            }
            path.pop();
            false
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        dfs(&self.nodes, start, goal, &mut visited, &mut path).then_some(path)
    }

    /// Kahn's algorithm over the downstream lists. Ties keep insertion order.
    fn topological_order(&self) -> Vec<NodeId> {
        let mut indegree: Vec<usize> = self.nodes.iter().map(|n| n.upstream.len()).collect();
        let mut ready: VecDeque<usize> = (0..self.nodes.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(i) = ready.pop_front() {
            order.push(NodeId(u32::try_from(i).unwrap_or(u32::MAX)));
            for &next in &self.nodes[i].downstream {
                let n = next.index();
                indegree[n] -= 1;
                if indegree[n] == 0 {
                    ready.push_back(n);
                }
            }
        }
        order
    }

    /// Freeze the topology.
    ///
    /// # Errors
    ///
    /// Returns an error if the block format is invalid.
    pub fn build(self) -> Result<Graph> {
        self.format.validate()?;
        let order = self.topological_order();
        let slots = self
            .nodes
            .into_iter()
            .map(|node| NodeSlot::new(node.name, Edge::new(node.upstream, node.downstream), node.behavior))
            .collect();

        let graph = Graph::new(GraphCore::new(self.format, slots, order));
        tracing::info!(nodes = graph.len(), "Graph built");
        Ok(graph)
    }
}

