// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: The dataflow graph engine for Cablekit.
//!
//! A [`Graph`] is an arena of nodes wired by [`GraphBuilder`]. Each node owns
//! one edge that mixes its inputs (one FIFO per upstream, summed once every
//! live upstream has contributed) and fans its output out to every
//! downstream node. Sources run on their own threads; network bridges run on
//! the shared reactor thread; everything else runs on whichever thread
//! completed a mix.
//!
//! ```ignore
//! use cablekit_engine::GraphBuilder;
//! use cablekit_nodes::audio::{Keepalive, ToneConfig, ToneGenerator};
//! use cablekit_nodes::core::LevelMeter;
//!
//! let format = BlockFormat::default();
//! let mut builder = GraphBuilder::new(format);
//! let tone = builder.add_source("tone", ToneGenerator::new(&ToneConfig::default(), format)?)?;
//! let pump = builder.add_source("pump", Keepalive::new(format))?;
//! let meter = builder.add_sink("meter", LevelMeter::new())?;
//! builder.connect(&[tone, pump], &[meter])?;
//!
//! let graph = builder.build()?;
//! graph.start_all()?;
//! ```

pub mod constants;
mod edge;
mod graph;
pub mod graph_builder;
mod node;
mod source;

pub use graph::Graph;
pub use graph_builder::GraphBuilder;
pub use node::{NodeId, NodeKind};

#[cfg(test)]
mod tests;
