// ABOUTME: TCP transport underneath an SMPP session
// ABOUTME: Non-blocking reads so the event loop can wait on readiness without holding the session

use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, trace, warn};

/// Outcome of a single non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// `n` bytes were appended to the buffer.
    Data(usize),
    /// Nothing to read right now; not an error.
    WouldBlock,
    /// The peer closed the stream (or the transport was never connected).
    Closed,
}

/// Byte transport for one SMPP session.
///
/// The session layer only ever needs "send these bytes" and "give me whatever
/// has arrived"; keeping it this small lets tests substitute an in-memory
/// transport.
pub trait Transport: Send + 'static {
    /// Write all of `bytes`, returning the count written.
    fn send(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Append whatever is currently readable to `buf` without waiting.
    fn receive(&mut self, buf: &mut BytesMut) -> io::Result<Received>;

    /// Close the stream. Calling this more than once is harmless.
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// SMPP v3.4 TCP session transport.
///
/// The stream sits behind an `Arc` so the event loop can await readability on
/// a clone while the session itself stays unlocked.
#[derive(Debug, Default)]
pub struct TransportSession {
    stream: Option<Arc<TcpStream>>,
    peer: Option<String>,
}

impl TransportSession {
    /// Resolve `host` and try each address in turn until one accepts.
    pub async fn connect(host: &str, port: u16) -> io::Result<TransportSession> {
        let mut last_error = None;

        for addr in lookup_host((host, port)).await? {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected");
                    return Ok(TransportSession {
                        stream: Some(Arc::new(stream)),
                        peer: Some(addr.to_string()),
                    });
                }
                Err(e) => {
                    warn!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{host}:{port} did not resolve to any address"),
            )
        }))
    }

    /// Wrap an already connected stream (accepted sockets, tests).
    pub fn from_stream(stream: TcpStream) -> TransportSession {
        let peer = stream.peer_addr().ok().map(|addr| addr.to_string());
        TransportSession {
            stream: Some(Arc::new(stream)),
            peer,
        }
    }

    /// A handle the caller can await `readable()` on without borrowing the session.
    pub fn readiness(&self) -> Option<Arc<TcpStream>> {
        self.stream.clone()
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }
}

impl Transport for TransportSession {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport is closed"))?;
        write_all(stream, bytes).await?;
        trace!(len = bytes.len(), "sent");
        Ok(bytes.len())
    }

    fn receive(&mut self, buf: &mut BytesMut) -> io::Result<Received> {
        let Some(stream) = self.stream.as_ref() else {
            return Ok(Received::Closed);
        };

        buf.reserve(4 * 1024);
        match stream.try_read_buf(buf) {
            Ok(0) => Ok(Received::Closed),
            Ok(n) => {
                trace!(len = n, "received");
                Ok(Received::Data(n))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Received::WouldBlock),
            Err(e) => Err(e),
        }
    }

    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!(peer = self.peer.as_deref().unwrap_or("-"), "transport closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Write every byte through a shared stream, waiting for writability between
/// partial writes.
pub async fn write_all(stream: &TcpStream, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        stream.writable().await?;
        match stream.try_write(bytes) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport used by the session tests.

    use super::{Received, Transport};
    use bytes::{Bytes, BytesMut};
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockState {
        inbound: VecDeque<Bytes>,
        sent: Vec<Bytes>,
        connected: bool,
        fail_sends: bool,
        peer_closed: bool,
    }

    /// Cloneable handle; every clone sees the same queues.
    #[derive(Clone, Default)]
    pub(crate) struct MockTransport {
        state: Arc<Mutex<MockState>>,
    }

    impl MockTransport {
        pub(crate) fn connected() -> Self {
            let mock = MockTransport::default();
            mock.state.lock().unwrap().connected = true;
            mock
        }

        pub(crate) fn push_inbound(&self, bytes: impl Into<Bytes>) {
            self.state.lock().unwrap().inbound.push_back(bytes.into());
        }

        /// Every chunk written so far, oldest first.
        pub(crate) fn sent(&self) -> Vec<Bytes> {
            self.state.lock().unwrap().sent.clone()
        }

        pub(crate) fn take_sent(&self) -> Vec<Bytes> {
            std::mem::take(&mut self.state.lock().unwrap().sent)
        }

        pub(crate) fn fail_sends(&self) {
            self.state.lock().unwrap().fail_sends = true;
        }

        /// Simulate the peer closing once queued data is drained.
        pub(crate) fn close_from_peer(&self) {
            self.state.lock().unwrap().peer_closed = true;
        }

        pub(crate) fn is_open(&self) -> bool {
            self.state.lock().unwrap().connected
        }
    }

    impl Transport for MockTransport {
        async fn send(&mut self, bytes: &[u8]) -> io::Result<usize> {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(io::ErrorKind::NotConnected.into());
            }
            if state.fail_sends {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            state.sent.push(Bytes::copy_from_slice(bytes));
            Ok(bytes.len())
        }

        fn receive(&mut self, buf: &mut BytesMut) -> io::Result<Received> {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Ok(Received::Closed);
            }
            match state.inbound.pop_front() {
                Some(chunk) => {
                    buf.extend_from_slice(&chunk);
                    Ok(Received::Data(chunk.len()))
                }
                None if state.peer_closed => Ok(Received::Closed),
                None => Ok(Received::WouldBlock),
            }
        }

        fn disconnect(&mut self) {
            self.state.lock().unwrap().connected = false;
        }

        fn is_connected(&self) -> bool {
            self.state.lock().unwrap().connected
        }
    }
}
