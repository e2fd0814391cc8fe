//! Benchmarks for the envelope encoder and MAC computation.
//!
//! Run with: cargo bench --bench encode

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dtnex::codec::{encode_contact, encode_metadata, ContactAdvertisement, EnvelopeFields, MetadataRecord};
use dtnex::crypto::compute_mac;

fn fields() -> EnvelopeFields {
    EnvelopeFields {
        timestamp: 1_700_000_000,
        expire_time: 1_700_003_600,
        origin: 268484800,
        from: 268484800,
        nonce: [0xA1, 0xB2, 0xC3],
    }
}

fn bench_encode_contact(c: &mut Criterion) {
    let contact = ContactAdvertisement {
        node_a: 268484800,
        node_b: 268484801,
        duration_minutes: 60,
    };
    c.bench_function("encode contact envelope", |b| {
        b.iter(|| encode_contact(black_box(&fields()), black_box(contact), "open").unwrap());
    });
}

fn bench_encode_metadata(c: &mut Criterion) {
    let record = MetadataRecord {
        node_id: 268484800,
        name: "Gateway".into(),
        contact: "ops@example.org".into(),
        lat_udeg: Some(59_334_591),
        lon_udeg: Some(18_063_240),
    };
    c.bench_function("encode metadata envelope (with GPS)", |b| {
        b.iter(|| encode_metadata(black_box(&fields()), black_box(record.clone()), "open").unwrap());
    });
}

fn bench_compute_mac(c: &mut Criterion) {
    let msg = vec![0u8; 120];
    c.bench_function("compute truncated HMAC-SHA-256", |b| {
        b.iter(|| compute_mac(black_box("open"), black_box(&msg)));
    });
}

criterion_group!(benches, bench_encode_contact, bench_encode_metadata, bench_compute_mac);
criterion_main!(benches);
