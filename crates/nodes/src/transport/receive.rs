// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Receiving half of a link.
//!
//! The bridge listens on a local address and serves one peer at a time.
//! Every decoded block is pushed into the graph through an [`Outlet`]. When
//! the peer goes away or sends garbage the connection is dropped and the
//! bridge goes back to accepting, so a restarted sender can reconnect
//! without touching this side.
//!
//! Outlet calls run on the reactor thread. A panic inside one is caught and
//! treated like a failed connection, so the accept loop always survives.

use super::connection::Connection;
use super::constants::ACCEPT_RETRY_DELAY;
use super::error::TransportError;
use super::reactor::Reactor;
use cablekit_core::{BlockFormat, CableError, Outlet, Result};
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

struct Listening {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// Accepts a [`SendBridge`](super::SendBridge) connection and feeds its blocks into a graph.
pub struct ReceiveBridge {
    name: String,
    bind: SocketAddr,
    format: BlockFormat,
    reactor: Reactor,
    connected: Arc<AtomicBool>,
    listening: Mutex<Option<Listening>>,
}

impl ReceiveBridge {
    pub fn new(name: impl Into<String>, bind: SocketAddr, format: BlockFormat, reactor: Reactor) -> Self {
        Self {
            name: name.into(),
            bind,
            format,
            reactor,
            connected: Arc::new(AtomicBool::new(false)),
            listening: Mutex::new(None),
        }
    }

    /// Whether a peer is currently connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The bound address while listening. Useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|l| l.local_addr)
    }

    /// Bind the listener and start accepting. Blocks until the bind completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the reactor is gone.
    pub fn start(&self, outlet: Arc<dyn Outlet>) -> Result<SocketAddr> {
        let bind = self.bind;
        let listener = self.reactor.call(TcpListener::bind(bind))?.map_err(|e| {
            CableError::Network(format!("Failed to bind {bind}: {e}"))
        })?;
        let local_addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let acceptor = Acceptor {
            name: self.name.clone(),
            format: self.format,
            connected: Arc::clone(&self.connected),
            cancel: cancel.clone(),
            outlet,
        };
        let task = self.reactor.post(acceptor.run(listener));

        let mut listening = self.listening.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stale) = listening.replace(Listening { local_addr, cancel, task }) {
            stale.cancel.cancel();
        }
        tracing::info!(node = %self.name, addr = %local_addr, "Listening for peer");
        Ok(local_addr)
    }

    /// Close the listener and any connection. Blocks until the reactor has let go.
    pub fn stop(&self) {
        let listening = self.listening.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Listening { local_addr, cancel, task }) = listening else {
            return;
        };
        cancel.cancel();
        if let Err(e) = self.reactor.call(async move {
            let _ = task.await;
        }) {
            tracing::warn!(node = %self.name, error = %e, "Could not wait for receive task to finish");
        }
        self.connected.store(false, Ordering::Release);
        tracing::info!(node = %self.name, addr = %local_addr, "Receive link closed");
    }
}

struct Acceptor {
    name: String,
    format: BlockFormat,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    outlet: Arc<dyn Outlet>,
}

impl Acceptor {
    async fn run(self, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                () = self.cancel.cancelled() => return,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(node = %self.name, error = %e, "Accept failed");
                    tokio::select! {
                        () = self.cancel.cancelled() => return,
                        () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {},
                    }
                    continue;
                },
            };

            tracing::info!(node = %self.name, peer = %peer, "Peer connected");
            self.connected.store(true, Ordering::Release);
            let outcome = match guarded(|| self.outlet.link_changed(true)) {
                Ok(()) => self.serve(stream).await,
                Err(e) => Some(e),
            };
            self.connected.store(false, Ordering::Release);
            if guarded(|| self.outlet.link_changed(false)).is_err() {
                tracing::error!(node = %self.name, "Outlet panicked while releasing downstream");
            }

            match outcome {
                None => return,
                Some(TransportError::PeerClosed) => {
                    tracing::info!(node = %self.name, peer = %peer, "Peer disconnected");
                },
                Some(TransportError::OutletPanicked) => {
                    tracing::error!(node = %self.name, peer = %peer, "Downstream panicked, dropping connection");
                },
                Some(e) if e.is_protocol() => {
                    tracing::warn!(node = %self.name, peer = %peer, error = %e, "Protocol error, dropping connection");
                },
                Some(e) => {
                    tracing::warn!(node = %self.name, peer = %peer, error = %e, "I/O error, dropping connection");
                },
            }
        }
    }

    /// Forward blocks until the connection fails. Returns `None` when cancelled.
    async fn serve(&self, stream: TcpStream) -> Option<TransportError> {
        let mut connection = Connection::new(stream, self.format);
        loop {
            let read = tokio::select! {
                () = self.cancel.cancelled() => return None,
                read = connection.read_block() => read,
            };
            match read {
                Ok(block) => {
                    if let Err(e) = guarded(|| self.outlet.emit(block)) {
                        return Some(e);
                    }
                },
                Err(e) => return Some(e),
            }
        }
    }
}

/// Run outlet code, turning a panic into a connection error.
fn guarded(call: impl FnOnce()) -> std::result::Result<(), TransportError> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|_| TransportError::OutletPanicked)
}
