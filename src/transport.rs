//! Send/receive opaque payload bundles to/from `ipn:<node>.<service>`
//! endpoints.
//!
//! A real implementation binds to a Bundle Protocol v7 stack; no BPv7 crate
//! is available to ground one on here, so only the trait and an in-memory
//! fake (used by the engine's own tests) live in this module.

use crate::Endpoint;

/// A delivered bundle: its payload and the endpoint it arrived from.
#[derive(Debug, Clone)]
pub struct Received {
    /// the opaque bundle payload (a serialized envelope, per the engine)
    pub bytes: Vec<u8>,
    /// the endpoint the bundle was sent from
    pub source: Endpoint,
}

/// A transport error: a send or receive could not be completed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Send/receive of opaque bundles, safe for concurrent send (timer task)
/// and receive (inbound task).
pub trait TransportAdapter: Send + Sync {
    /// Send `bytes` to `destination`, with `ttl_seconds` as the bundle's
    /// time-to-live in the router's outbound queue.
    fn send(&self, destination: Endpoint, bytes: &[u8], ttl_seconds: u64) -> Result<(), TransportError>;

    /// Block until the next bundle arrives at this endpoint.
    fn recv_blocking(&self) -> Result<Received, TransportError>;

    /// Interrupt a blocked [`TransportAdapter::recv_blocking`] call and
    /// release the endpoint, used during supervisor shutdown.
    fn close(&self);
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! An in-memory, channel-backed [`TransportAdapter`] for tests.

    use super::*;
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::Mutex;
    use std::time::Duration;

    /// A transport endpoint backed by an in-process channel. Sends made to
    /// this node by [`InMemoryNetwork`] land in the channel; `recv_blocking`
    /// drains it.
    pub struct FakeTransport {
        local: Endpoint,
        inbox: Mutex<Receiver<Received>>,
        network: InMemoryNetwork,
        closed: std::sync::atomic::AtomicBool,
    }

    impl FakeTransport {
        fn new(local: Endpoint, network: InMemoryNetwork, inbox: Receiver<Received>) -> Self {
            FakeTransport {
                local,
                inbox: Mutex::new(inbox),
                network,
                closed: std::sync::atomic::AtomicBool::new(false),
            }
        }

        /// Non-blocking poll of this endpoint's inbox, used by tests that
        /// assert a node never received a particular bundle.
        pub fn try_recv(&self) -> Option<Received> {
            self.inbox.lock().unwrap().try_recv().ok()
        }
    }

    impl TransportAdapter for FakeTransport {
        fn send(&self, destination: Endpoint, bytes: &[u8], _ttl_seconds: u64) -> Result<(), TransportError> {
            self.network.deliver(
                destination,
                Received {
                    bytes: bytes.to_vec(),
                    source: self.local,
                },
            )
        }

        fn recv_blocking(&self) -> Result<Received, TransportError> {
            let inbox = self.inbox.lock().unwrap();
            loop {
                if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
                    return Err(TransportError("endpoint closed".into()));
                }
                match inbox.recv_timeout(Duration::from_millis(50)) {
                    Ok(received) => return Ok(received),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(TransportError("endpoint disconnected".into()))
                    }
                }
            }
        }

        fn close(&self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    /// A shared in-memory "network": routes sends between [`FakeTransport`]
    /// endpoints registered on it, for multi-node integration tests without
    /// a real BPv7 stack.
    #[derive(Clone)]
    pub struct InMemoryNetwork {
        senders: std::sync::Arc<Mutex<std::collections::HashMap<Endpoint, Sender<Received>>>>,
    }

    impl Default for InMemoryNetwork {
        fn default() -> Self {
            InMemoryNetwork {
                senders: std::sync::Arc::new(Mutex::new(std::collections::HashMap::new())),
            }
        }
    }

    impl InMemoryNetwork {
        /// Construct an empty network.
        pub fn new() -> Self {
            Self::default()
        }

        /// Register `endpoint` on this network and get back its transport.
        pub fn register(&self, endpoint: Endpoint) -> FakeTransport {
            let (tx, rx) = mpsc::channel();
            self.senders.lock().unwrap().insert(endpoint, tx);
            FakeTransport::new(endpoint, self.clone(), rx)
        }

        fn deliver(&self, destination: Endpoint, received: Received) -> Result<(), TransportError> {
            let senders = self.senders.lock().unwrap();
            match senders.get(&destination) {
                Some(tx) => tx
                    .send(received)
                    .map_err(|_| TransportError(format!("{destination} is no longer receiving"))),
                None => Err(TransportError(format!("no such endpoint {destination}"))),
            }
        }
    }
}
