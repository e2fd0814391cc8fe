//! End-to-end scenarios exercising the engine across several simulated
//! nodes, wired together with the in-memory router/transport test doubles.

use dtnex::codec::{self, ContactAdvertisement, EnvelopeFields};
use dtnex::config::Config;
use dtnex::engine::Engine;
use dtnex::error::DtnexError;
use dtnex::router::mock::MockRouter;
use dtnex::router::Plan;
use dtnex::transport::fake::{FakeTransport, InMemoryNetwork};
use dtnex::Endpoint;

fn plan(node: u64) -> Plan {
    Plan {
        neighbor: node,
        observed_at: 0,
    }
}

fn build_engine(net: &InMemoryNetwork, local_id: u64, neighbors: &[u64]) -> Engine<MockRouter, FakeTransport> {
    let router = MockRouter::new(local_id, neighbors.iter().map(|&n| plan(n)).collect());
    let transport = net.register(Endpoint::dtnex(local_id));
    Engine::new(Config::default(), router, transport).unwrap()
}

/// A chain A - B - C: A sends a contact advertisement about (A, 999)
/// straight to B; B installs it and forwards to C (its only neighbor
/// besides A, the origin/from node it excludes); C installs it and has no
/// further neighbor to forward to. A never sees a copy of its own message
/// reflected back.
#[test]
fn three_node_chain_propagates_without_looping() {
    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;

    let net = InMemoryNetwork::new();
    let engine_a = build_engine(&net, A, &[B]);
    let engine_b = build_engine(&net, B, &[A, C]);
    let engine_c = build_engine(&net, C, &[B]);

    let t = 1_700_000_000u64;
    let fields = EnvelopeFields {
        timestamp: t,
        expire_time: t + 3600,
        origin: A,
        from: A,
        nonce: [7, 7, 7],
    };
    let contact = ContactAdvertisement {
        node_a: A,
        node_b: 999,
        duration_minutes: 60,
    };
    let bytes = codec::encode_contact(&fields, contact, "open").unwrap();

    engine_a.send_to_neighbor_for_test(B, &bytes);

    // B receives from A, installs the contact, forwards only to C.
    engine_b.recv_and_handle().unwrap();
    assert!(engine_b.router_for_test().has_contact(A, 999));
    assert!(engine_b.router_for_test().has_contact(999, A));

    // C receives the forward from B, installs it, and has no other
    // neighbor to forward to -- nothing further is sent anywhere.
    engine_c.recv_and_handle().unwrap();
    assert!(engine_c.router_for_test().has_contact(A, 999));

    // A never receives a copy of its own message back: engine_a's own
    // inbox would have a pending bundle if it had.
    assert!(engine_a.try_recv_for_test().is_none());
}

/// Redelivering identical bytes to the same engine has no further router
/// or forwarding side effects the second time.
#[test]
fn redelivering_identical_bytes_has_no_side_effects_the_second_time() {
    let net = InMemoryNetwork::new();
    let engine = build_engine(&net, 1, &[2, 3]);
    let rx2 = net.register(Endpoint::dtnex(2));
    let rx3 = net.register(Endpoint::dtnex(3));

    let t = 1_700_000_000u64;
    let fields = EnvelopeFields {
        timestamp: t,
        expire_time: t + 3600,
        origin: 100,
        from: 100,
        nonce: [1, 1, 1],
    };
    let contact = ContactAdvertisement {
        node_a: 100,
        node_b: 101,
        duration_minutes: 60,
    };
    let bytes = codec::encode_contact(&fields, contact, "open").unwrap();

    engine.handle_inbound(&bytes, Endpoint::dtnex(100)).unwrap();
    rx2.recv_blocking().unwrap();
    rx3.recv_blocking().unwrap();

    let second = engine.handle_inbound(&bytes, Endpoint::dtnex(100));
    assert!(matches!(second, Err(DtnexError::Duplicate { origin: 100 })));
}

/// Expiry is checked before authentication: an expired envelope sealed
/// under the wrong key still reports `Expired`, not `AuthFailed`.
#[test]
fn expiry_is_checked_before_authentication() {
    let net = InMemoryNetwork::new();
    let engine = build_engine(&net, 1, &[2]);

    let fields = EnvelopeFields {
        timestamp: 1000,
        expire_time: 1000,
        origin: 2,
        from: 2,
        nonce: [0, 0, 0],
    };
    let contact = ContactAdvertisement {
        node_a: 2,
        node_b: 3,
        duration_minutes: 1,
    };
    let bytes = codec::encode_contact(&fields, contact, "wrong-key").unwrap();
    let result = engine.handle_inbound(&bytes, Endpoint::dtnex(2));
    assert!(matches!(result, Err(DtnexError::Expired { .. })));
}

/// A fully originated broadcast round-trips through a second node's
/// `handle_inbound`, landing both directions of the contact and range in
/// its router.
#[test]
fn originate_then_accept_installs_both_directions() {
    let net = InMemoryNetwork::new();
    let origin_engine = build_engine(&net, 268484800, &[268484801, 268484802]);
    let peer_engine = build_engine(&net, 268484801, &[268484800]);

    origin_engine.originate_broadcast().unwrap();
    // two contact adverts land at 268484801 (one per neighbor in N), but
    // only one names (268484800, 268484801); the other names
    // (268484800, 268484802), which 268484801 also installs as a directed
    // edge on the router's behalf.
    peer_engine.recv_and_handle().unwrap();
    peer_engine.recv_and_handle().unwrap();

    assert!(peer_engine.router_for_test().has_contact(268484800, 268484801));
    assert!(peer_engine.router_for_test().has_contact(268484801, 268484800));
    assert!(peer_engine.router_for_test().has_contact(268484800, 268484802));
}
