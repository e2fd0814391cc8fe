//! Benchmarks for the envelope decoder.
//!
//! Run with: cargo bench --bench decode

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dtnex::codec::{decode, encode_contact, encode_metadata, ContactAdvertisement, EnvelopeFields, MetadataRecord};

fn contact_bytes() -> Vec<u8> {
    let fields = EnvelopeFields {
        timestamp: 1_700_000_000,
        expire_time: 1_700_003_600,
        origin: 268484800,
        from: 268484800,
        nonce: [0xA1, 0xB2, 0xC3],
    };
    let contact = ContactAdvertisement {
        node_a: 268484800,
        node_b: 268484801,
        duration_minutes: 60,
    };
    encode_contact(&fields, contact, "open").unwrap()
}

fn metadata_bytes() -> Vec<u8> {
    let fields = EnvelopeFields {
        timestamp: 1_700_000_000,
        expire_time: 1_700_003_600,
        origin: 268484800,
        from: 268484800,
        nonce: [0xA1, 0xB2, 0xC3],
    };
    let record = MetadataRecord {
        node_id: 268484800,
        name: "Gateway".into(),
        contact: "ops@example.org".into(),
        lat_udeg: Some(59_334_591),
        lon_udeg: Some(18_063_240),
    };
    encode_metadata(&fields, record, "open").unwrap()
}

fn bench_decode_contact(c: &mut Criterion) {
    let bytes = contact_bytes();
    c.bench_function("decode contact envelope", |b| {
        b.iter(|| decode(black_box(&bytes), false).unwrap());
    });
}

fn bench_decode_metadata(c: &mut Criterion) {
    let bytes = metadata_bytes();
    c.bench_function("decode metadata envelope (with GPS)", |b| {
        b.iter(|| decode(black_box(&bytes), false).unwrap());
    });
}

criterion_group!(benches, bench_decode_contact, bench_decode_metadata);
criterion_main!(benches);
