// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Sending half of a link.
//!
//! `start` asks the reactor to connect and returns at once. Until the
//! connection is up, and again after it fails, submitted blocks are dropped.
//! Frames are written one at a time in submission order by a single task
//! per connection.
//!
//! A failed connection stays down until the node is stopped and started
//! again. The receiving half, by contrast, goes back to accepting on its own.

use super::connection::Connection;
use super::constants::CONNECT_TIMEOUT;
use super::frame;
use super::reactor::Reactor;
use bytes::Bytes;
use cablekit_core::{BlockFormat, Result, SampleBlock};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Session {
    frames: mpsc::UnboundedSender<Bytes>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// Forwards blocks to a remote [`ReceiveBridge`](super::ReceiveBridge).
pub struct SendBridge {
    name: String,
    remote: SocketAddr,
    format: BlockFormat,
    reactor: Reactor,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<Session>>,
}

impl SendBridge {
    pub fn new(name: impl Into<String>, remote: SocketAddr, format: BlockFormat, reactor: Reactor) -> Self {
        Self {
            name: name.into(),
            remote,
            format,
            reactor,
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        }
    }

    pub const fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Begin connecting to the remote peer. Returns before the connection is up.
    ///
    /// # Errors
    ///
    /// Currently infallible; connection failures are logged and leave the bridge disconnected.
    pub fn start(&self) -> Result<()> {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let link = Link {
            name: self.name.clone(),
            remote: self.remote,
            format: self.format,
            connected: Arc::clone(&self.connected),
            cancel: cancel.clone(),
        };
        let task = self.reactor.post(link.run(frames_rx));

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stale) = session.replace(Session { frames: frames_tx, cancel, task }) {
            stale.cancel.cancel();
        }
        tracing::info!(node = %self.name, peer = %self.remote, "Connecting to peer");
        Ok(())
    }

    /// Queue a block for sending. Returns `false` if the block was dropped.
    pub fn submit(&self, block: &SampleBlock) -> bool {
        if !self.is_connected() {
            tracing::trace!(node = %self.name, "Not connected, dropping block");
            return false;
        }
        let frame = match frame::encode(block) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(node = %self.name, error = %e, "Cannot frame block, dropping it");
                return false;
            },
        };
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        session.as_ref().is_some_and(|s| s.frames.send(frame).is_ok())
    }

    /// Close the connection and discard queued frames. Blocks until the reactor has let go.
    pub fn stop(&self) {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Session { frames, cancel, task }) = session else {
            return;
        };
        cancel.cancel();
        drop(frames);
        if let Err(e) = self.reactor.call(async move {
            let _ = task.await;
        }) {
            tracing::warn!(node = %self.name, error = %e, "Could not wait for send task to finish");
        }
        self.connected.store(false, Ordering::Release);
        tracing::info!(node = %self.name, peer = %self.remote, "Send link closed");
    }
}

struct Link {
    name: String,
    remote: SocketAddr,
    format: BlockFormat,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Link {
    async fn run(self, frames: mpsc::UnboundedReceiver<Bytes>) {
        let connect = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(self.remote));
        let stream = tokio::select! {
            () = self.cancel.cancelled() => return,
            result = connect => result,
        };
        let stream = match stream {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::warn!(node = %self.name, peer = %self.remote, error = %e, "Connect failed");
                return;
            },
            Err(_) => {
                tracing::warn!(node = %self.name, peer = %self.remote, "Connect timed out");
                return;
            },
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(node = %self.name, error = %e, "Could not disable Nagle");
        }

        self.connected.store(true, Ordering::Release);
        tracing::info!(node = %self.name, peer = %self.remote, "Connected to peer");

        let mut connection = Connection::new(stream, self.format);
        self.pump(&mut connection, frames).await;
        self.connected.store(false, Ordering::Release);
        let _ = connection.shutdown().await;
    }

    async fn pump(&self, connection: &mut Connection<TcpStream>, mut frames: mpsc::UnboundedReceiver<Bytes>) {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                frame = frames.recv() => match frame {
                    Some(frame) => frame,
                    None => return,
                },
            };
            let written = tokio::select! {
                () = self.cancel.cancelled() => return,
                result = connection.write_frame(&frame) => result,
            };
            if let Err(e) = written {
                if e.is_protocol() {
                    tracing::warn!(node = %self.name, peer = %self.remote, error = %e, "Protocol error, closing link");
                } else {
                    tracing::warn!(node = %self.name, peer = %self.remote, error = %e, "I/O error, closing link");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{constant_block, init_tracing};
    use std::time::{Duration, Instant};

    const FORMAT: BlockFormat = BlockFormat::new(44_100, 16);

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_drops_blocks_until_connected() {
        init_tracing();
        let reactor = Reactor::start().unwrap();
        let bridge = SendBridge::new("tx", "127.0.0.1:9".parse().unwrap(), FORMAT, reactor);
        assert!(!bridge.submit(&constant_block(0.1, 16)));
        bridge.stop();
    }

    #[test]
    fn test_writes_frames_in_order() {
        init_tracing();
        let reactor = Reactor::start().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let bridge = SendBridge::new("tx", addr, FORMAT, reactor);
        bridge.start().unwrap();
        let (mut peer, _) = listener.accept().unwrap();
        assert!(wait_until(|| bridge.is_connected()));

        for i in 0..4u8 {
            assert!(bridge.submit(&constant_block(f32::from(i), 16)));
        }

        let frame_len = 8 + FORMAT.body_len();
        let mut raw = vec![0u8; frame_len * 4];
        std::io::Read::read_exact(&mut peer, &mut raw).unwrap();
        for (i, chunk) in raw.chunks(frame_len).enumerate() {
            assert_eq!(&chunk[..8], b"00000080");
            let block = frame::decode_body(&chunk[8..]).unwrap();
            assert_eq!(block, constant_block(f32::from(u8::try_from(i).unwrap()), 16));
        }

        bridge.stop();
        assert!(!bridge.is_connected());
        assert!(!bridge.submit(&constant_block(0.0, 16)));
    }

    #[test]
    fn test_does_not_reconnect_after_peer_loss() {
        init_tracing();
        let reactor = Reactor::start().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let bridge = SendBridge::new("tx", addr, FORMAT, reactor);
        bridge.start().unwrap();
        let (peer, _) = listener.accept().unwrap();
        assert!(wait_until(|| bridge.is_connected()));
        drop(peer);

        // Writes eventually fail once the peer's reset arrives.
        assert!(wait_until(|| {
            bridge.submit(&constant_block(0.5, 16));
            !bridge.is_connected()
        }));

        listener.set_nonblocking(true).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(listener.accept().is_err(), "bridge must not reconnect on its own");
        bridge.stop();
    }
}
