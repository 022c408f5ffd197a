// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The graphs run by the `cable` binary.
//!
//! ```text
//! sender:  tone -> volume -> meter
//!                        \-> uplink (send)
//!
//! mixer:   peer-N (receive) -> [peer-N-gate] -> peer-N-volume -\
//!          pump (keepalive) ----------------------------------> master -> meter
//! ```

use crate::config::{MixConfig, SendConfig};
use cablekit_core::{BlockFormat, Liveness, Result};
use cablekit_engine::{Graph, GraphBuilder, NodeId, NodeKind};
use cablekit_nodes::audio::{Keepalive, NoiseGate, ToneGenerator, Volume};
use cablekit_nodes::core::{LevelMeter, LevelProbe, LevelReading};
use cablekit_nodes::transport::Reactor;
use std::net::SocketAddr;
use tracing::info;

/// Connection state of one bridge node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub name: String,
    pub liveness: Liveness,
    /// Bound address, for receive nodes that are listening.
    pub local_addr: Option<SocketAddr>,
}

/// A built graph plus the handles the binary watches while it runs.
pub struct Pipeline {
    role: &'static str,
    graph: Graph,
    meter: LevelProbe,
    links: Vec<NodeId>,
    reactor: Reactor,
}

impl Pipeline {
    /// A tone generator sending to `remote`, with its link on `reactor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tone or volume settings are invalid or the graph cannot be built.
    pub fn sender(
        format: BlockFormat,
        config: &SendConfig,
        remote: SocketAddr,
        reactor: &Reactor,
    ) -> Result<Self> {
        let mut builder = GraphBuilder::new(format).with_reactor(reactor.clone());
        let tone = builder.add_source("tone", ToneGenerator::new(&config.tone, format)?)?;
        let volume = builder.add_transform("volume", Volume::new(&config.volume)?)?;
        let meter = LevelMeter::new();
        let probe = meter.probe();
        let meter = builder.add_sink("meter", meter)?;
        let uplink = builder.add_send("uplink", remote)?;

        builder.connect(&[tone], &[volume])?;
        builder.connect(&[volume], &[meter, uplink])?;

        Ok(Self {
            role: "sender",
            graph: builder.build()?,
            meter: probe,
            links: vec![uplink],
            reactor: reactor.clone(),
        })
    }

    /// A mixer accepting one peer per address in `listen`.
    ///
    /// # Errors
    ///
    /// Returns an error if a filter setting is invalid or the graph cannot be built.
    pub fn mixer(
        format: BlockFormat,
        config: &MixConfig,
        listen: &[SocketAddr],
        reactor: &Reactor,
    ) -> Result<Self> {
        let mut builder = GraphBuilder::new(format).with_reactor(reactor.clone());
        let mut inputs = Vec::with_capacity(listen.len() + 1);
        let mut links = Vec::with_capacity(listen.len());

        for (index, &addr) in listen.iter().enumerate() {
            let peer = builder.add_receive(&format!("peer-{index}"), addr)?;
            links.push(peer);

            let mut tail = peer;
            if let Some(gate) = &config.noise_gate {
                let gate = builder.add_transform(&format!("peer-{index}-gate"), NoiseGate::new(gate)?)?;
                builder.connect(&[tail], &[gate])?;
                tail = gate;
            }
            let volume =
                builder.add_transform(&format!("peer-{index}-volume"), Volume::new(&config.peer_volume)?)?;
            builder.connect(&[tail], &[volume])?;
            inputs.push(volume);
        }

        if config.keepalive {
            inputs.push(builder.add_source("pump", Keepalive::new(format))?);
        }

        let master = builder.add_transform("master", Volume::new(&config.master_volume)?)?;
        let meter = LevelMeter::new();
        let probe = meter.probe();
        let meter = builder.add_sink("meter", meter)?;
        builder.connect(&inputs, &[master])?;
        builder.connect(&[master], &[meter])?;

        Ok(Self { role: "mixer", graph: builder.build()?, meter: probe, links, reactor: reactor.clone() })
    }

    pub const fn role(&self) -> &'static str {
        self.role
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The network reactor this pipeline's links run on.
    pub const fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// # Errors
    ///
    /// Returns the first node start error; nothing is left running in that case.
    pub fn start(&self) -> Result<()> {
        self.graph.start_all()?;
        info!(pipeline = self.role, nodes = self.graph.len(), "Pipeline started");
        Ok(())
    }

    pub fn stop(&self) {
        self.graph.stop_all();
        info!(pipeline = self.role, "Pipeline stopped");
    }

    /// Level at the end of the pipeline.
    pub fn level(&self) -> LevelReading {
        self.meter.reading()
    }

    pub fn links(&self) -> Vec<LinkStatus> {
        self.links
            .iter()
            .map(|&id| LinkStatus {
                name: self.graph.name(id).unwrap_or_default().to_string(),
                liveness: self.graph.liveness(id).unwrap_or(Liveness::Stopped),
                local_addr: match self.graph.kind(id) {
                    Ok(NodeKind::Receive) => self.graph.local_addr(id).ok().flatten(),
                    _ => None,
                },
            })
            .collect()
    }

    /// Addresses the receive nodes are bound to while running.
    pub fn listen_addrs(&self) -> Vec<SocketAddr> {
        self.links().into_iter().filter_map(|link| link.local_addr).collect()
    }

    /// Log link states and the current level.
    pub fn report(&self) {
        for link in self.links() {
            info!(pipeline = self.role, node = %link.name, liveness = %link.liveness, "Link status");
        }
        let reading = self.level();
        info!(
            pipeline = self.role,
            left = reading.first.left,
            right = reading.first.right,
            peak = reading.peak,
            blocks = reading.blocks,
            "Output level"
        );
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("role", &self.role).field("graph", &self.graph).finish_non_exhaustive()
    }
}
