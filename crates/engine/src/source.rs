// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Source production threads.
//!
//! Each running source node owns one OS thread that runs
//! `start → (read → emit)* → stop` on its [`AudioSource`]. The source object
//! moves into the thread on start and comes back through the join handle on
//! stop, so it is never shared.
//!
//! Sources that are not real-time are paced with a deadline schedule of one
//! block period per block.

use crate::constants::{PACER_MAX_LAG_PERIODS, SOURCE_THREAD_PREFIX};
use crate::graph::GraphCore;
use crate::node::NodeId;
use cablekit_core::{AudioSource, CableError, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<Option<Box<dyn AudioSource>>>,
}

/// Owns a source object while stopped and its thread while running.
pub(crate) struct SourceDriver {
    parked: Mutex<Option<Box<dyn AudioSource>>>,
    worker: Mutex<Option<Worker>>,
}

impl SourceDriver {
    pub(crate) fn new(source: Box<dyn AudioSource>) -> Self {
        Self { parked: Mutex::new(Some(source)), worker: Mutex::new(None) }
    }

    /// Spawn the production thread.
    pub(crate) fn start(&self, core: &Arc<GraphCore>, id: NodeId, name: &str) -> Result<()> {
        let source = self.parked.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(source) = source else {
            return Err(CableError::Runtime(format!(
                "Source `{name}` is unavailable after a previous panic"
            )));
        };

        let running = Arc::new(AtomicBool::new(true));
        let producer = Producer { core: Arc::clone(core), id, running: Arc::clone(&running) };
        let builder = std::thread::Builder::new().name(format!("{SOURCE_THREAD_PREFIX}-{name}"));
        let handle = match spawn_with(builder, source, move |source| producer.run(source)) {
            Ok(handle) => handle,
            Err((source, e)) => {
                *self.parked.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
                return Err(CableError::Runtime(format!("Failed to spawn source thread: {e}")));
            },
        };

        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(Worker { running, handle });
        Ok(())
    }

    /// Signal the thread, wake it if it is waiting for its next deadline, and join it.
    pub(crate) fn stop(&self, name: &str) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Worker { running, handle }) = worker else {
            return;
        };
        running.store(false, Ordering::Release);
        handle.thread().unpark();
        match handle.join() {
            Ok(Some(source)) => {
                *self.parked.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
            },
            Ok(None) => {
                tracing::error!(node = %name, "Source was lost to a panic and cannot be restarted");
            },
            Err(_) => {
                tracing::error!(node = %name, "Source thread panicked");
            },
        }
    }
}

/// Spawn a thread and move `value` into it once the spawn succeeded.
///
/// On failure `value` is handed back with the error.
fn spawn_with<T, R>(
    builder: std::thread::Builder,
    value: T,
    body: impl FnOnce(T) -> Option<R> + Send + 'static,
) -> std::result::Result<JoinHandle<Option<R>>, (T, std::io::Error)>
where
    T: Send + 'static,
    R: Send + 'static,
{
    let (handoff, inbox) = mpsc::sync_channel::<T>(1);
    let handle = match builder.spawn(move || inbox.recv().ok().and_then(body)) {
        Ok(handle) => handle,
        Err(e) => return Err((value, e)),
    };
    match handoff.send(value) {
        Ok(()) => Ok(handle),
        Err(mpsc::SendError(value)) => {
            let _ = handle.join();
            Err((value, std::io::Error::other("thread exited before receiving its input")))
        },
    }
}

struct Producer {
    core: Arc<GraphCore>,
    id: NodeId,
    running: Arc<AtomicBool>,
}

impl Producer {
    fn run(self, mut source: Box<dyn AudioSource>) -> Option<Box<dyn AudioSource>> {
        let name = self.core.name(self.id).to_string();
        tracing::debug!(node = %name, "Source thread started");

        let outcome = catch_unwind(AssertUnwindSafe(|| self.produce(source.as_mut())));
        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(node = %name, "Source thread finished");
                Some(source)
            },
            Ok(Err(e)) => {
                tracing::error!(node = %name, error = %e, "Source failed, sealing its output");
                self.core.fail(self.id);
                Some(source)
            },
            Err(_) => {
                tracing::error!(node = %name, "Source panicked, sealing its output");
                self.core.fail(self.id);
                // The source may be left half-updated; do not hand it out again.
                None
            },
        }
    }

    fn produce(&self, source: &mut dyn AudioSource) -> Result<()> {
        source.start()?;
        let produced = self.produce_loop(source);
        let teardown = source.stop();
        produced.and(teardown)
    }

    fn produce_loop(&self, source: &mut dyn AudioSource) -> Result<()> {
        let mut pacer = (!source.is_realtime()).then(|| Pacer::new(self.core.format().period()));

        while self.running.load(Ordering::Acquire) {
            match source.read() {
                Ok(block) => {
                    if self.running.load(Ordering::Acquire) {
                        self.core.emit_output(self.id, block);
                    }
                },
                Err(e) if e.is_recoverable() => {
                    tracing::trace!(node = %self.core.name(self.id), error = %e, "Skipping block");
                    self.core.record_error(self.id);
                },
                Err(e) => return Err(e),
            }
            if let Some(pacer) = pacer.as_mut() {
                pacer.wait(&self.running);
            }
        }
        Ok(())
    }
}

/// Deadline schedule for sources without a real-time clock.
pub(crate) struct Pacer {
    period: Duration,
    next: Instant,
}

impl Pacer {
    pub(crate) fn new(period: Duration) -> Self {
        Self { period, next: Instant::now() + period }
    }

    /// Sleep until the next deadline, or return early once `running` clears.
    ///
    /// A wait never exceeds one period. A loop that fell more than
    /// `PACER_MAX_LAG_PERIODS` behind is re-anchored to now.
    pub(crate) fn wait(&mut self, running: &AtomicBool) {
        let now = Instant::now();
        if now > self.next + self.period * PACER_MAX_LAG_PERIODS {
            self.next = now + self.period;
            return;
        }
        while running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= self.next {
                break;
            }
            std::thread::park_timeout(self.next - now);
        }
        self.next += self.period;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_hands_value_to_thread() {
        let handle = spawn_with(std::thread::Builder::new(), 21, |n| Some(n * 2)).unwrap();
        assert_eq!(handle.join().unwrap(), Some(42));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_spawn_failure_returns_value() {
        // No address space can hold this stack, so the spawn itself fails.
        let builder = std::thread::Builder::new().stack_size(1 << 60);
        let Err((value, _)) = spawn_with(builder, String::from("parked"), Some) else {
            panic!("spawn with an impossible stack should fail");
        };
        assert_eq!(value, "parked");
    }

    #[test]
    fn test_pacer_holds_cadence() {
        let period = Duration::from_millis(10);
        let running = AtomicBool::new(true);
        let mut pacer = Pacer::new(period);

        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait(&running);
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(45), "finished too early: {elapsed:?}");
    }

    #[test]
    fn test_pacer_reanchors_when_late() {
        let period = Duration::from_millis(10);
        let running = AtomicBool::new(true);
        let mut pacer = Pacer::new(period);

        std::thread::sleep(Duration::from_millis(40));
        let start = Instant::now();
        pacer.wait(&running);
        assert!(start.elapsed() < period, "a late pacer must not sleep");
        pacer.wait(&running);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_pacer_returns_when_stopped() {
        let running = AtomicBool::new(false);
        let mut pacer = Pacer::new(Duration::from_secs(60));
        let start = Instant::now();
        pacer.wait(&running);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
