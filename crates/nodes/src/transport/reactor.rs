// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The network reactor.
//!
//! One OS thread runs a current-thread tokio runtime. Every socket and every
//! connection task lives there, so callbacks for a connection never race each
//! other and graph threads never touch sockets directly.
//!
//! - [`Reactor::post`] hands work over and returns immediately
//! - [`Reactor::call`] hands work over and blocks until it completes
//!
//! The thread shuts down and is joined when the last handle is dropped.

use super::constants::REACTOR_THREAD_NAME;
use super::error::TransportError;
use cablekit_core::{CableError, Result};
use std::future::Future;
use std::sync::{mpsc, Arc};
use std::thread::{JoinHandle, ThreadId};
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;

/// Cheaply clonable handle to the reactor thread.
#[derive(Clone)]
pub struct Reactor {
    inner: Arc<ReactorInner>,
}

struct ReactorInner {
    handle: Handle,
    thread_id: ThreadId,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor").field("thread_id", &self.inner.thread_id).finish()
    }
}

impl Reactor {
    /// Spawn the reactor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or the thread cannot be spawned.
    pub fn start() -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(|e| {
            CableError::Runtime(format!("Failed to build network runtime: {e}"))
        })?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(REACTOR_THREAD_NAME.to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = shutdown_rx.await;
                });
                // Dropping the runtime cancels whatever tasks are still parked.
                drop(runtime);
                tracing::debug!("Network reactor stopped");
            })
            .map_err(|e| CableError::Runtime(format!("Failed to spawn network reactor: {e}")))?;

        tracing::debug!("Network reactor started");
        Ok(Self {
            inner: Arc::new(ReactorInner {
                handle,
                thread_id: thread.thread().id(),
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            }),
        })
    }

    /// Id of the reactor thread. Clones of one reactor share it.
    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    /// Whether the caller is running on the reactor thread.
    pub fn is_reactor_thread(&self) -> bool {
        std::thread::current().id() == self.inner.thread_id
    }

    /// Run `future` on the reactor without waiting for it.
    pub fn post<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.handle.spawn(future)
    }

    /// Run `future` on the reactor and block the calling thread until it completes.
    ///
    /// Safe to use from inside another tokio runtime, since the reactor has its own thread.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Reentrant`] when called from the reactor thread itself
    /// - [`TransportError::Shutdown`] if the reactor stopped before the future finished
    pub fn call<F>(&self, future: F) -> std::result::Result<F::Output, TransportError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.is_reactor_thread() {
            return Err(TransportError::Reentrant);
        }
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        self.inner.handle.spawn(async move {
            let _ = done_tx.send(future.await);
        });
        done_rx.recv().map_err(|_| TransportError::Shutdown)
    }
}

impl Drop for ReactorInner {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        if std::thread::current().id() == self.thread_id {
            // Last handle dropped by a reactor task; the thread exits on its own.
            return;
        }
        if thread.join().is_err() {
            tracing::error!("Network reactor thread panicked");
        }
    }
}
