//! The periodic broadcaster, the inbound handler, and the forwarder;
//! orchestrates crypto, codec, replay cache, metadata store, router adapter,
//! and transport adapter.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, trace, warn};
use tokio::sync::watch;

use crate::codec::{self, ContactAdvertisement, Envelope, EnvelopeFields, MetadataRecord, Payload};
use crate::config::Config;
use crate::crypto::generate_nonce;
use crate::error::DtnexError;
use crate::metadata::MetadataStore;
use crate::replay::ReplayCache;
use crate::router::{self, Plan, RouterAdapter, RouterError};
use crate::transport::{TransportAdapter, TransportError};
use crate::{Endpoint, NodeId};

/// How long a neighbor snapshot is reused before the router is re-queried.
const NEIGHBOR_CACHE_TTL: Duration = Duration::from_secs(20);

/// How often the timer task wakes to check whether the neighbor set has
/// changed, independent of the full `update_interval` deadline.
const NEIGHBOR_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wall-clock seconds since epoch. Envelope timestamps are wall-clock so
/// peers can compare them directly; only sleep deadlines use a monotonic
/// clock.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_secs()
}

struct NeighborCache {
    plans: Vec<Plan>,
    cached_at: u64,
}

/// The error surface of [`Engine::recv_and_handle`]: either the transport
/// couldn't deliver a bundle, or `handle_inbound` rejected/processed one
/// with an error (most of which are the normal silent-discard outcomes of a
/// gossip protocol, not real failures).
#[derive(Debug, thiserror::Error)]
pub enum EngineRecvError {
    /// the transport's blocking receive itself failed
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// `handle_inbound` returned an error for the received bundle
    #[error(transparent)]
    Handle(#[from] DtnexError),
}

/// The protocol engine: one value per running agent, grouping what would
/// otherwise be module-level singletons into a single value threaded
/// through the three tasks.
pub struct Engine<R, T> {
    config: Config,
    router: R,
    transport: Arc<T>,
    local_id: NodeId,
    replay: Mutex<ReplayCache>,
    metadata: Mutex<MetadataStore>,
    neighbors: Mutex<NeighborCache>,
}

impl<R, T> Engine<R, T>
where
    R: RouterAdapter,
    T: TransportAdapter,
{
    /// Construct an engine bound to `router` and `transport`. Seeds the
    /// local node's own metadata record at startup if configured (spec
    /// §4.4).
    pub fn new(config: Config, router: R, transport: T) -> Result<Self, DtnexError> {
        let local_id = router
            .local_node_id()
            .map_err(|e| DtnexError::RouterGone(e.to_string()))?;
        if local_id == 0 {
            return Err(DtnexError::RouterGone(
                "router reports connected but local_node_id is 0".into(),
            ));
        }

        let mut metadata = MetadataStore::new();
        if config.has_local_metadata() {
            metadata.put(MetadataRecord {
                node_id: local_id,
                name: config.local_metadata_name.clone(),
                contact: config.local_metadata_contact.clone(),
                lat_udeg: config.local_gps_lat_udeg(),
                lon_udeg: config.local_gps_lon_udeg(),
            });
        }

        Ok(Engine {
            config,
            router,
            transport: Arc::new(transport),
            local_id,
            replay: Mutex::new(ReplayCache::new(crate::replay::DEFAULT_CAPACITY)),
            metadata: Mutex::new(metadata),
            neighbors: Mutex::new(NeighborCache {
                plans: Vec::new(),
                cached_at: 0,
            }),
        })
    }

    /// This node's id, as reported by the router at construction time.
    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Current neighbor snapshot, refreshing from the router if the cached
    /// copy is older than [`NEIGHBOR_CACHE_TTL`].
    pub fn neighbors(&self) -> Result<Vec<Plan>, DtnexError> {
        let mut cache = self.neighbors.lock().unwrap();
        let t = now();
        if t.saturating_sub(cache.cached_at) >= NEIGHBOR_CACHE_TTL.as_secs() || cache.cached_at == 0 {
            let fresh = self
                .router
                .neighbors()
                .map_err(|e| DtnexError::RouterGone(e.to_string()))?;
            cache.plans = fresh;
            cache.cached_at = t;
        }
        Ok(cache.plans.clone())
    }

    /// Originate broadcast: pairwise Contact fan-out, plus the local
    /// Metadata record if configured and enabled. Returns the number of
    /// bundles sent.
    pub fn originate_broadcast(&self) -> Result<usize, DtnexError> {
        let neighbors = self.neighbors()?;
        let t = now();
        // expire_time carries contact_time_tolerance on top of
        // contact_lifetime so a peer a little behind on its clock doesn't
        // discard the advertisement as already-expired; duration_minutes
        // itself is the contact's real length and is unaffected by that
        // tolerance.
        let expire_time = t + self.config.contact_lifetime + self.config.contact_time_tolerance;
        let duration_minutes = (self.config.contact_lifetime / 60) as u16;
        let mut sent = 0usize;

        for i in &neighbors {
            for j in &neighbors {
                if j.neighbor == self.local_id {
                    continue;
                }
                let fields = EnvelopeFields {
                    timestamp: t,
                    expire_time,
                    origin: self.local_id,
                    from: self.local_id,
                    nonce: generate_nonce(),
                };
                let contact = ContactAdvertisement {
                    node_a: self.local_id,
                    node_b: i.neighbor,
                    duration_minutes,
                };
                match codec::encode_contact(&fields, contact, &self.config.shared_key) {
                    Ok(bytes) => {
                        if self.send_to(j.neighbor, &bytes).is_ok() {
                            sent += 1;
                        }
                    }
                    Err(e) => warn!("failed to encode contact advertisement: {e}"),
                }
            }
        }

        if !self.config.disable_metadata_exchange {
            let local_record = self.metadata.lock().unwrap().get(self.local_id).cloned();
            if let Some(record) = local_record {
                for j in &neighbors {
                    if j.neighbor == self.local_id {
                        continue;
                    }
                    let fields = EnvelopeFields {
                        timestamp: t,
                        expire_time,
                        origin: self.local_id,
                        from: self.local_id,
                        nonce: generate_nonce(),
                    };
                    match codec::encode_metadata(&fields, record.clone(), &self.config.shared_key) {
                        Ok(bytes) => {
                            if self.send_to(j.neighbor, &bytes).is_ok() {
                                sent += 1;
                            }
                        }
                        Err(e) => warn!("failed to encode local metadata record: {e}"),
                    }
                }
            }
        }

        Ok(sent)
    }

    /// Decode, authenticate, deduplicate, apply, and forward one inbound
    /// bundle. Silent discards are returned as `Err` for the caller to log
    /// at trace/debug; they are the normal case for a gossip protocol, not
    /// failures.
    pub fn handle_inbound(&self, bytes: &[u8], _source: Endpoint) -> Result<(), DtnexError> {
        let envelope = codec::decode(bytes, self.config.accept_legacy_metadata)?;

        let t = now();
        if envelope.is_expired(t) {
            return Err(DtnexError::Expired {
                expire_time: envelope.expire_time(),
                now: t,
            });
        }

        if !envelope.verify(&self.config.shared_key) {
            return Err(DtnexError::AuthFailed);
        }

        {
            let mut replay = self.replay.lock().unwrap();
            if replay.contains(envelope.origin(), envelope.nonce()) {
                return Err(DtnexError::Duplicate {
                    origin: envelope.origin(),
                });
            }
            replay.insert(envelope.origin(), envelope.nonce());
        }

        if envelope.origin() == self.local_id {
            return Err(DtnexError::SelfOrigin {
                origin: envelope.origin(),
            });
        }

        match envelope.payload() {
            Payload::Contact(contact) => self.apply_contact(&envelope, contact)?,
            Payload::Metadata(record) => {
                if !self.config.disable_metadata_exchange {
                    self.metadata.lock().unwrap().put(record.clone());
                }
            }
        }

        self.forward(&envelope)?;
        Ok(())
    }

    fn apply_contact(&self, envelope: &Envelope, contact: &ContactAdvertisement) -> Result<(), DtnexError> {
        let from_time = envelope.timestamp();
        let to_time = from_time + contact.duration_minutes as u64 * 60;
        match router::install_bidirectional_contact(
            &self.router,
            from_time,
            to_time,
            contact.node_a,
            contact.node_b,
        ) {
            Ok(()) => Ok(()),
            Err(RouterError::Gone(msg)) => Err(DtnexError::RouterGone(msg)),
            Err(RouterError::Transient(msg)) => {
                // logged, not fatal; the message is still forwarded so
                // other peers may still benefit from it.
                warn!("router rejected a contact insertion, continuing: {msg}");
                Ok(())
            }
        }
    }

    /// Re-emit `envelope` to every neighbor except its `origin`, its
    /// immediate sender (`from`), and the local node.
    fn forward(&self, envelope: &Envelope) -> Result<usize, DtnexError> {
        let neighbors = self.neighbors()?;
        let mut sent = 0usize;
        for n in &neighbors {
            if n.neighbor == envelope.origin() || n.neighbor == envelope.from() || n.neighbor == self.local_id {
                continue;
            }
            let bytes = envelope
                .forward(self.local_id, &self.config.shared_key)
                .map_err(DtnexError::Encode)?;
            if self.send_to(n.neighbor, &bytes).is_ok() {
                sent += 1;
            }
        }
        Ok(sent)
    }

    fn send_to(&self, node: NodeId, bytes: &[u8]) -> Result<(), DtnexError> {
        let destination = Endpoint {
            node,
            service: self.config.service_number,
        };
        self.transport
            .send(destination, bytes, self.config.bundle_ttl)
            .map_err(|TransportError(msg)| {
                warn!("send to {destination} failed: {msg}");
                DtnexError::TransportSendFailed {
                    endpoint: destination.to_string(),
                    source: msg,
                }
            })
    }

    /// Drive the timer task: an immediate broadcast, then wake on whichever
    /// comes first of [`NEIGHBOR_POLL_INTERVAL`] or shutdown, re-broadcasting
    /// when `update_interval` has elapsed or the neighbor set has changed.
    pub async fn run_timer_loop(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), DtnexError> {
        self.originate_broadcast()?;
        let mut last_broadcast_at = now();
        let mut last_neighbor_ids: Vec<NodeId> = self.neighbors()?.iter().map(|p| p.neighbor).collect();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(NEIGHBOR_POLL_INTERVAL) => {
                    let t = now();
                    let current = self.neighbors()?;
                    let current_ids: Vec<NodeId> = current.iter().map(|p| p.neighbor).collect();
                    let interval_elapsed = t.saturating_sub(last_broadcast_at) >= self.config.update_interval;
                    let neighbors_changed = current_ids != last_neighbor_ids;
                    if interval_elapsed || neighbors_changed {
                        self.originate_broadcast()?;
                        last_broadcast_at = t;
                        last_neighbor_ids = current_ids;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Block for one bundle and run `handle_inbound` synchronously on it.
    /// The async inbound loop runs this inside `spawn_blocking`; tests and
    /// other synchronous callers can call it directly.
    pub fn recv_and_handle(&self) -> Result<(), EngineRecvError> {
        let received = self.transport.recv_blocking()?;
        self.handle_inbound(&received.bytes, received.source)?;
        Ok(())
    }

    /// Drive the inbound task: repeatedly block on a receive, then run
    /// `handle_inbound` + forward synchronously before blocking again.
    /// Silent-discard errors are logged at trace/debug and do not stop the
    /// loop; `RouterGone` propagates out so the supervisor can restart.
    pub async fn run_inbound_loop(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), DtnexError>
    where
        R: 'static,
        T: 'static,
    {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }
            let engine = Arc::clone(self);
            let recv_result = tokio::task::spawn_blocking(move || engine.recv_and_handle()).await;

            match recv_result {
                Ok(Ok(())) => {}
                Ok(Err(EngineRecvError::Handle(DtnexError::RouterGone(msg)))) => {
                    return Err(DtnexError::RouterGone(msg))
                }
                Ok(Err(EngineRecvError::Handle(e))) => trace!("discarded inbound envelope: {e}"),
                Ok(Err(EngineRecvError::Transport(e))) => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                    debug!("transient receive error, retrying: {e}");
                }
                Err(join_err) => {
                    return Err(DtnexError::RouterGone(format!(
                        "inbound receive task panicked: {join_err}"
                    )))
                }
            }

            if shutdown.has_changed().unwrap_or(false) && *shutdown.borrow() {
                return Ok(());
            }
        }
    }

    /// Close the transport endpoint, interrupting any blocked receive.
    pub fn shutdown(&self) {
        self.transport.close();
    }

    /// The router adapter this engine was constructed with, for tests that
    /// need to assert on installed edges directly.
    #[cfg(any(test, feature = "test-support"))]
    pub fn router_for_test(&self) -> &R {
        &self.router
    }

    /// Send raw bytes to `node` as though this were a forward or originate
    /// send, bypassing the engine's own envelope construction. Used by
    /// integration tests to inject a hand-built envelope at a specific hop.
    #[cfg(any(test, feature = "test-support"))]
    pub fn send_to_neighbor_for_test(&self, node: NodeId, bytes: &[u8]) {
        self.send_to(node, bytes).expect("test send should succeed");
    }
}

#[cfg(any(test, feature = "test-support"))]
impl<R: RouterAdapter> Engine<R, crate::transport::fake::FakeTransport> {
    /// Non-blocking check of this engine's own inbox, for asserting that
    /// nothing was ever delivered to it: a node never receives a copy of
    /// its own originated message.
    pub fn try_recv_for_test(&self) -> Option<crate::transport::Received> {
        self.transport.try_recv()
    }
}
