// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Start/stop semantics, liveness and failure handling.

use super::{block, feed, init_tracing, wait_until, FORMAT, TIMEOUT};
use crate::GraphBuilder;
use cablekit_core::{
    AudioSink, AudioSource, CableError, DeviceError, Liveness, NodeState, Result, SampleBlock,
};
use cablekit_nodes::audio::{Volume, VolumeConfig};
use cablekit_nodes::core::{CaptureSink, Passthrough};

struct BrokenSink;

impl AudioSink for BrokenSink {
    fn start(&mut self) -> Result<()> {
        Err(DeviceError::Failed("no such device".to_string()).into())
    }

    fn write(&mut self, _block: &SampleBlock) -> Result<()> {
        Ok(())
    }
}

/// Emits one block, then panics on the next read.
struct PanickingSource {
    reads: usize,
}

impl AudioSource for PanickingSource {
    fn read(&mut self) -> Result<SampleBlock> {
        self.reads += 1;
        assert!(self.reads < 2, "capture driver crashed");
        Ok(block(0.5, 0.5))
    }

    fn is_realtime(&self) -> bool {
        true
    }
}

#[test]
fn test_restart_runs_a_fresh_producer() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let (feed, source) = feed();
    let src = builder.add_source("src", source).unwrap();
    let sink = CaptureSink::new();
    let capture = sink.handle();
    let out = builder.add_sink("out", sink).unwrap();
    builder.connect(&[src], &[out]).unwrap();
    let graph = builder.build().unwrap();
    graph.start(out).unwrap();

    for cycle in 1..=2 {
        graph.start(src).unwrap();
        assert_eq!(graph.state(src).unwrap(), NodeState::Running);
        feed.push(block(0.5, 0.5));
        assert!(capture.wait_for(cycle, TIMEOUT));

        graph.stop(src).unwrap();
        // stop joins the producer thread, so its teardown already ran.
        assert_eq!(feed.stops(), cycle);
        assert_eq!(graph.state(src).unwrap(), NodeState::Stopped);
    }
    assert_eq!(feed.starts(), 2);
    assert_eq!(capture.len(), 2);
}

#[test]
#[should_panic(expected = "started twice")]
fn test_double_start_panics() {
    let mut builder = GraphBuilder::new(FORMAT);
    let pass = builder.add_transform("pass", Passthrough).unwrap();
    let graph = builder.build().unwrap();
    graph.start(pass).unwrap();
    let _ = graph.start(pass);
}

#[test]
#[should_panic(expected = "stopped twice")]
fn test_stop_without_start_panics() {
    let mut builder = GraphBuilder::new(FORMAT);
    let pass = builder.add_transform("pass", Passthrough).unwrap();
    let graph = builder.build().unwrap();
    let _ = graph.stop(pass);
}

#[test]
fn test_start_all_and_stop_all() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let (feed, source) = feed();
    let src = builder.add_source("src", source).unwrap();
    let gain = builder.add_transform("gain", Volume::new(&VolumeConfig { percent: 50 }).unwrap()).unwrap();
    let sink = CaptureSink::new();
    let capture = sink.handle();
    let out = builder.add_sink("out", sink).unwrap();
    builder.connect(&[src], &[gain]).unwrap();
    builder.connect(&[gain], &[out]).unwrap();
    let graph = builder.build().unwrap();

    let order: Vec<&str> = graph.nodes().map(|(_, name, _)| name).collect();
    assert_eq!(order, ["src", "gain", "out"]);

    graph.start_all().unwrap();
    feed.push(block(0.5, -0.5));
    assert!(capture.wait_for(1, TIMEOUT));
    assert_eq!(capture.blocks()[0], block(0.25, -0.25));

    // Already-running nodes are skipped.
    graph.start_all().unwrap();

    graph.stop_all();
    for (id, _, _) in graph.nodes() {
        assert_eq!(graph.state(id).unwrap(), NodeState::Stopped);
    }
    assert_eq!(feed.stops(), 1);
}

#[test]
fn test_start_all_rolls_back_on_error() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let (feed, source) = feed();
    let src = builder.add_source("src", source).unwrap();
    let broken = builder.add_sink("broken", BrokenSink).unwrap();
    let out = builder.add_sink("out", CaptureSink::new()).unwrap();
    builder.connect(&[src], &[out]).unwrap();
    let graph = builder.build().unwrap();

    let err = graph.start_all().unwrap_err();
    assert!(matches!(err, CableError::Device(DeviceError::Failed(_))));
    for id in [src, broken, out] {
        assert_eq!(graph.state(id).unwrap(), NodeState::Stopped);
    }
    assert_eq!(feed.starts(), 0);
}

#[test]
fn test_liveness_follows_upstream() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let (_feed, source) = feed();
    let src = builder.add_source("src", source).unwrap();
    let pass = builder.add_transform("pass", Passthrough).unwrap();
    let out = builder.add_sink("out", CaptureSink::new()).unwrap();
    builder.connect(&[src], &[pass]).unwrap();
    builder.connect(&[pass], &[out]).unwrap();
    let graph = builder.build().unwrap();

    assert_eq!(graph.liveness(pass).unwrap(), Liveness::Stopped);

    graph.start_all().unwrap();
    for id in [src, pass, out] {
        assert_eq!(graph.liveness(id).unwrap(), Liveness::Live);
    }

    graph.stop(src).unwrap();
    assert_eq!(graph.liveness(src).unwrap(), Liveness::Stopped);
    assert_eq!(graph.liveness(pass).unwrap(), Liveness::Idle);
    assert_eq!(graph.liveness(out).unwrap(), Liveness::Idle);
}

#[test]
fn test_failed_source_is_sealed_and_bypassed() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let (feed_a, source_a) = feed();
    let (feed_b, source_b) = feed();
    let a = builder.add_source("a", source_a).unwrap();
    let b = builder.add_source("b", source_b).unwrap();
    let sink = CaptureSink::new();
    let capture = sink.handle();
    let out = builder.add_sink("out", sink).unwrap();
    builder.connect(&[a, b], &[out]).unwrap();
    let graph = builder.build().unwrap();
    graph.start_all().unwrap();

    feed_b.push(block(0.25, 0.25));
    assert!(wait_until(|| graph.queue_depths(out).unwrap() == vec![0, 1]));

    // Losing the feed is a device failure for `a`.
    drop(feed_a);
    assert!(wait_until(|| graph.liveness(a).unwrap() == Liveness::Failed));
    assert!(!graph.is_available(a).unwrap());
    assert_eq!(graph.state(a).unwrap(), NodeState::Running);

    // The waiting round was released when `a` failed.
    assert!(capture.wait_for(1, TIMEOUT));
    feed_b.push(block(0.5, 0.5));
    assert!(capture.wait_for(2, TIMEOUT));
    assert_eq!(capture.blocks(), vec![block(0.25, 0.25), block(0.5, 0.5)]);

    graph.stop(a).unwrap();
    assert_eq!(graph.liveness(a).unwrap(), Liveness::Stopped);
}

#[test]
fn test_panicked_source_fails_and_cannot_restart() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let src = builder.add_source("src", PanickingSource { reads: 0 }).unwrap();
    let sink = CaptureSink::new();
    let capture = sink.handle();
    let out = builder.add_sink("out", sink).unwrap();
    builder.connect(&[src], &[out]).unwrap();
    let graph = builder.build().unwrap();
    graph.start_all().unwrap();

    assert!(capture.wait_for(1, TIMEOUT));
    assert!(wait_until(|| graph.liveness(src).unwrap() == Liveness::Failed));
    assert!(!graph.is_available(src).unwrap());
    assert_eq!(graph.liveness(out).unwrap(), Liveness::Idle);

    graph.stop(src).unwrap();
    assert_eq!(graph.liveness(src).unwrap(), Liveness::Stopped);

    // The source was left in an unknown state and is not reused.
    assert!(matches!(graph.start(src), Err(CableError::Runtime(_))));
    assert_eq!(graph.state(src).unwrap(), NodeState::Stopped);
    assert_eq!(capture.len(), 1);
}

#[test]
fn test_underruns_are_counted_not_fatal() {
    init_tracing();
    let mut builder = GraphBuilder::new(FORMAT);
    let (feed, source) = feed();
    let src = builder.add_source("src", source).unwrap();
    let sink = CaptureSink::new();
    let capture = sink.handle();
    let out = builder.add_sink("out", sink).unwrap();
    builder.connect(&[src], &[out]).unwrap();
    let graph = builder.build().unwrap();
    graph.start_all().unwrap();

    // An idle feed underruns every poll.
    assert!(wait_until(|| graph.stats(src).unwrap().errored >= 3));
    assert_eq!(graph.liveness(src).unwrap(), Liveness::Live);

    feed.push(block(0.5, 0.5));
    assert!(capture.wait_for(1, TIMEOUT));
}

#[test]
fn test_unknown_node_is_an_error() {
    let mut builder = GraphBuilder::new(FORMAT);
    builder.add_transform("pass", Passthrough).unwrap();
    let graph = builder.build().unwrap();

    let mut other = GraphBuilder::new(FORMAT);
    other.add_transform("x", Passthrough).unwrap();
    let stranger = other.add_transform("y", Passthrough).unwrap();

    assert!(matches!(graph.start(stranger), Err(CableError::Graph(_))));
    assert!(matches!(graph.liveness(stranger), Err(CableError::Graph(_))));
    assert!(graph.local_addr(graph.node_id("pass").unwrap()).is_err());
}
