//! The boundary with the external DTN router.
//!
//! Opaque to the core: a real implementation binds to an ION-DTN-class
//! router's contact/range insertion API. The trait here is the full surface
//! the engine needs; any router exposing the same six operations is
//! acceptable. The engine is generic over `R: RouterAdapter` rather than
//! reaching for `dyn`, the same way it stays generic over the message
//! variant at the transport boundary.

use crate::NodeId;

/// Fixed region number used for every contact insertion.
pub const CONTACT_REGION: u32 = 1;

/// Default transmission rate installed with every contact, bytes/s.
pub const DEFAULT_XMIT_RATE: u64 = 100_000;

/// Default confidence installed with every contact.
pub const DEFAULT_CONFIDENCE: f32 = 1.0;

/// Default one-way light time installed with every range, seconds.
pub const DEFAULT_OWLT_SECONDS: u32 = 1;

/// A read-only snapshot of one directly configured neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// the neighbor node id
    pub neighbor: NodeId,
    /// when this snapshot was taken, seconds since epoch
    pub observed_at: u64,
}

/// Outcome of an idempotent insertion: `AlreadyExists` and `Duplicate` are
/// not errors to the engine, only `Err` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// the edge was newly created
    Inserted,
    /// an identical edge already existed
    AlreadyExists,
    /// the router reported this exact insertion as a duplicate request
    Duplicate,
}

/// A hard failure from a router call. `Transient` means the router is
/// otherwise reachable but this one insertion failed; `Gone` means the
/// router itself is unreachable or in an invalid state and should escalate
/// to the supervisor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// a single insertion failed while the router is otherwise reachable
    #[error("router rejected an operation: {0}")]
    Transient(String),
    /// the router is unreachable or in an invalid state
    #[error("router is gone: {0}")]
    Gone(String),
}

/// A directional contact record as read back for diagnostics via
/// `list_contacts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactRecord {
    /// source node of the contact
    pub src: NodeId,
    /// destination node of the contact
    pub dst: NodeId,
    /// window start, seconds since epoch
    pub from_time: u64,
    /// window end, seconds since epoch
    pub to_time: u64,
}

/// The external DTN router's contact/range/neighbor surface.
pub trait RouterAdapter: Send + Sync {
    /// The id this adapter uses as `origin`/`from` for originated messages.
    /// MUST be non-zero once the adapter reports connected.
    fn local_node_id(&self) -> Result<NodeId, RouterError>;

    /// Snapshot of currently configured neighbors, excluding the local node.
    fn neighbors(&self) -> Result<Vec<Plan>, RouterError>;

    /// Idempotent insertion of a directional contact edge.
    #[allow(clippy::too_many_arguments)]
    fn insert_contact(
        &self,
        region: u32,
        from_time: u64,
        to_time: u64,
        src: NodeId,
        dst: NodeId,
        xmit_rate: u64,
        confidence: f32,
    ) -> Result<InsertOutcome, RouterError>;

    /// Idempotent insertion of a directional propagation-delay edge.
    fn insert_range(
        &self,
        from_time: u64,
        to_time: u64,
        src: NodeId,
        dst: NodeId,
        one_way_light_time_s: u32,
    ) -> Result<InsertOutcome, RouterError>;

    /// Cheap liveness probe.
    fn is_available(&self) -> bool;

    /// Diagnostics-only read of currently installed contacts. Not required
    /// by the engine's correctness; may be unimplemented by a minimal
    /// adapter.
    fn list_contacts(&self) -> Result<Vec<ContactRecord>, RouterError> {
        Ok(Vec::new())
    }
}

/// Convenience helper: install both directions of a contact plus both
/// directions of its matching range. `AlreadyExists`/`Duplicate` on either
/// call does not abort the others.
pub fn install_bidirectional_contact<R: RouterAdapter>(
    router: &R,
    from_time: u64,
    to_time: u64,
    node_a: NodeId,
    node_b: NodeId,
) -> Result<(), RouterError> {
    router.insert_contact(
        CONTACT_REGION,
        from_time,
        to_time,
        node_a,
        node_b,
        DEFAULT_XMIT_RATE,
        DEFAULT_CONFIDENCE,
    )?;
    router.insert_contact(
        CONTACT_REGION,
        from_time,
        to_time,
        node_b,
        node_a,
        DEFAULT_XMIT_RATE,
        DEFAULT_CONFIDENCE,
    )?;
    router.insert_range(from_time, to_time, node_a, node_b, DEFAULT_OWLT_SECONDS)?;
    router.insert_range(from_time, to_time, node_b, node_a, DEFAULT_OWLT_SECONDS)?;
    Ok(())
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    //! An in-memory [`RouterAdapter`] for engine unit tests; the real
    //! ION-DTN binding lives outside this crate.

    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct EdgeKey {
        src: NodeId,
        dst: NodeId,
        from_time: u64,
        to_time: u64,
    }

    #[derive(Debug, Default)]
    struct State {
        local_id: NodeId,
        neighbors: Vec<Plan>,
        contacts: std::collections::HashSet<EdgeKey>,
        ranges: std::collections::HashSet<EdgeKey>,
        available: bool,
        force_gone: bool,
    }

    /// A `RouterAdapter` backed by in-process `HashSet`s, for unit and
    /// integration tests.
    #[derive(Debug)]
    pub struct MockRouter {
        state: Mutex<State>,
    }

    impl MockRouter {
        /// Construct a mock router reporting `local_id` and `neighbors`.
        pub fn new(local_id: NodeId, neighbors: Vec<Plan>) -> Self {
            MockRouter {
                state: Mutex::new(State {
                    local_id,
                    neighbors,
                    contacts: Default::default(),
                    ranges: Default::default(),
                    available: true,
                    force_gone: false,
                }),
            }
        }

        /// Replace the neighbor snapshot the mock reports.
        pub fn set_neighbors(&self, neighbors: Vec<Plan>) {
            self.state.lock().unwrap().neighbors = neighbors;
        }

        /// Force every subsequent call to report `RouterError::Gone`.
        pub fn simulate_gone(&self) {
            let mut s = self.state.lock().unwrap();
            s.force_gone = true;
            s.available = false;
        }

        /// Number of directional contact edges currently installed.
        pub fn contact_count(&self) -> usize {
            self.state.lock().unwrap().contacts.len()
        }

        /// Whether `(src, dst)` has an installed contact edge.
        pub fn has_contact(&self, src: NodeId, dst: NodeId) -> bool {
            let s = self.state.lock().unwrap();
            s.contacts.iter().any(|e| e.src == src && e.dst == dst)
        }

        /// Whether `(src, dst)` has an installed range edge.
        pub fn has_range(&self, src: NodeId, dst: NodeId) -> bool {
            let s = self.state.lock().unwrap();
            s.ranges.iter().any(|e| e.src == src && e.dst == dst)
        }
    }

    impl RouterAdapter for MockRouter {
        fn local_node_id(&self) -> Result<NodeId, RouterError> {
            let s = self.state.lock().unwrap();
            if s.force_gone {
                return Err(RouterError::Gone("mock router forced gone".into()));
            }
            Ok(s.local_id)
        }

        fn neighbors(&self) -> Result<Vec<Plan>, RouterError> {
            let s = self.state.lock().unwrap();
            if s.force_gone {
                return Err(RouterError::Gone("mock router forced gone".into()));
            }
            Ok(s.neighbors.clone())
        }

        fn insert_contact(
            &self,
            _region: u32,
            from_time: u64,
            to_time: u64,
            src: NodeId,
            dst: NodeId,
            _xmit_rate: u64,
            _confidence: f32,
        ) -> Result<InsertOutcome, RouterError> {
            let mut s = self.state.lock().unwrap();
            if s.force_gone {
                return Err(RouterError::Gone("mock router forced gone".into()));
            }
            let key = EdgeKey {
                src,
                dst,
                from_time,
                to_time,
            };
            if s.contacts.contains(&key) {
                return Ok(InsertOutcome::AlreadyExists);
            }
            s.contacts.insert(key);
            Ok(InsertOutcome::Inserted)
        }

        fn insert_range(
            &self,
            from_time: u64,
            to_time: u64,
            src: NodeId,
            dst: NodeId,
            _one_way_light_time_s: u32,
        ) -> Result<InsertOutcome, RouterError> {
            let mut s = self.state.lock().unwrap();
            if s.force_gone {
                return Err(RouterError::Gone("mock router forced gone".into()));
            }
            let key = EdgeKey {
                src,
                dst,
                from_time,
                to_time,
            };
            if s.ranges.contains(&key) {
                return Ok(InsertOutcome::AlreadyExists);
            }
            s.ranges.insert(key);
            Ok(InsertOutcome::Inserted)
        }

        fn is_available(&self) -> bool {
            self.state.lock().unwrap().available
        }

        fn list_contacts(&self) -> Result<Vec<ContactRecord>, RouterError> {
            let s = self.state.lock().unwrap();
            if s.force_gone {
                return Err(RouterError::Gone("mock router forced gone".into()));
            }
            Ok(s.contacts
                .iter()
                .map(|e| ContactRecord {
                    src: e.src,
                    dst: e.dst,
                    from_time: e.from_time,
                    to_time: e.to_time,
                })
                .collect())
        }
    }
}
