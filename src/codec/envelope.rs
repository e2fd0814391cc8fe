//! The authenticated outer envelope common to both message kinds.

use crate::codec::payload::{self, ContactAdvertisement, MetadataRecord};
use crate::crypto::{self, MAC_LEN, NONCE_LEN};
use crate::decoder::{Decodable, Decoder};
use crate::encoder::{Encodable, Encoder};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::NodeId;

/// Fixed wire version this codec speaks.
pub const VERSION: u8 = 2;

/// Maximum serialized envelope size.
pub const MAX_ENVELOPE_SIZE: usize = 128;

/// A nonce: 3 random bytes chosen once by the originator.
pub type Nonce = [u8; NONCE_LEN];

const TYPE_CONTACT: u8 = 1;
const TYPE_METADATA: u8 = 2;

/// The type-specific payload of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// a contact advertisement
    Contact(ContactAdvertisement),
    /// a node descriptor
    Metadata(MetadataRecord),
}

impl Payload {
    /// the wire tag for this payload's message kind
    pub fn type_tag(&self) -> u8 {
        match self {
            Payload::Contact(_) => TYPE_CONTACT,
            Payload::Metadata(_) => TYPE_METADATA,
        }
    }
}

/// Fields common to every envelope, supplied by the caller constructing one.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeFields {
    /// creation time, seconds since epoch
    pub timestamp: u64,
    /// absolute deadline past which the message is discarded unprocessed
    pub expire_time: u64,
    /// node that first constructed this envelope; immutable under forwarding
    pub origin: NodeId,
    /// most recent sender; rewritten on every forward
    pub from: NodeId,
    /// loop-suppression nonce chosen once by `origin`; immutable under forwarding
    pub nonce: Nonce,
}

/// A decoded, authenticated DTNEX envelope.
///
/// The `nonce` field is intentionally not publicly mutable: the only way to
/// produce a forwarded envelope is [`Envelope::forward`], which preserves
/// `origin` and `nonce` by construction and can only change `from`. There is
/// no API that lets a forwarder mint a new nonce -- regenerating it on
/// forward is what turns loop suppression into an amplifying loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    version: u8,
    timestamp: u64,
    expire_time: u64,
    origin: NodeId,
    from: NodeId,
    nonce: Nonce,
    payload: Payload,
    mac: [u8; MAC_LEN],
}

impl Envelope {
    /// the envelope's wire version
    pub fn version(&self) -> u8 {
        self.version
    }
    /// creation time, seconds since epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
    /// absolute deadline past which the message must be discarded
    pub fn expire_time(&self) -> u64 {
        self.expire_time
    }
    /// node that first constructed this envelope
    pub fn origin(&self) -> NodeId {
        self.origin
    }
    /// most recent sender
    pub fn from(&self) -> NodeId {
        self.from
    }
    /// the loop-suppression nonce; identical across every hop
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }
    /// the type-specific payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
    /// the truncated MAC as transmitted
    pub fn mac(&self) -> [u8; MAC_LEN] {
        self.mac
    }

    /// Returns `true` if `now` has reached or passed this envelope's
    /// `expire_time`. A well-formed message has `now < expire_time`; the
    /// boundary itself (`now == expire_time`) is discarded.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expire_time
    }

    /// Verify this envelope's MAC against `key`. Re-serializes the
    /// MAC-covered prefix and compares in constant time.
    pub fn verify(&self, key: &str) -> bool {
        match self.mac_covered_bytes() {
            Ok(bytes) => crypto::verify_mac(key, &bytes, &self.mac),
            Err(_) => false,
        }
    }

    fn mac_covered_bytes(&self) -> EncodeResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(MAX_ENVELOPE_SIZE);
        let mut e = Encoder::new(&mut buf);
        encode_prefix(
            &mut e,
            self.version,
            self.payload.type_tag(),
            self.timestamp,
            self.expire_time,
            self.origin,
            self.from,
            &self.nonce,
            &self.payload,
        )?;
        Ok(buf)
    }

    /// Produce the re-sealed wire bytes of this envelope forwarded onward
    /// from `local_id`. `origin`, `nonce`, `timestamp`, `expire_time`, and
    /// `payload` are carried over unchanged; only `from` changes, and the
    /// MAC is recomputed because `from` is inside the MAC-covered range.
    pub fn forward(&self, local_id: NodeId, key: &str) -> EncodeResult<Vec<u8>> {
        seal(
            self.version,
            self.timestamp,
            self.expire_time,
            self.origin,
            local_id,
            self.nonce,
            self.payload.clone(),
            key,
        )
    }
}

/// Seal a freshly originated Contact envelope into wire bytes.
pub fn encode_contact(
    fields: &EnvelopeFields,
    contact: ContactAdvertisement,
    key: &str,
) -> EncodeResult<Vec<u8>> {
    seal(
        VERSION,
        fields.timestamp,
        fields.expire_time,
        fields.origin,
        fields.from,
        fields.nonce,
        Payload::Contact(contact),
        key,
    )
}

/// Seal a freshly originated Metadata envelope into wire bytes.
pub fn encode_metadata(
    fields: &EnvelopeFields,
    metadata: MetadataRecord,
    key: &str,
) -> EncodeResult<Vec<u8>> {
    payload::validate_metadata(&metadata).map_err(|_| EncodeError::StringSizeTooBig {
        len: metadata.name.len().max(metadata.contact.len()),
    })?;
    seal(
        VERSION,
        fields.timestamp,
        fields.expire_time,
        fields.origin,
        fields.from,
        fields.nonce,
        Payload::Metadata(metadata),
        key,
    )
}

#[allow(clippy::too_many_arguments)]
fn seal(
    version: u8,
    timestamp: u64,
    expire_time: u64,
    origin: NodeId,
    from: NodeId,
    nonce: Nonce,
    payload: Payload,
    key: &str,
) -> EncodeResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(MAX_ENVELOPE_SIZE);
    {
        let mut e = Encoder::new(&mut buf);
        encode_prefix(
            &mut e,
            version,
            payload.type_tag(),
            timestamp,
            expire_time,
            origin,
            from,
            &nonce,
            &payload,
        )?;
    }
    let mac = crypto::compute_mac(key, &buf);
    buf.extend_from_slice(&mac);

    if buf.len() > MAX_ENVELOPE_SIZE {
        return Err(EncodeError::EnvelopeTooLarge {
            len: buf.len(),
            max: MAX_ENVELOPE_SIZE,
        });
    }
    Ok(buf)
}

#[allow(clippy::too_many_arguments)]
fn encode_prefix(
    e: &mut Encoder<'_>,
    version: u8,
    type_tag: u8,
    timestamp: u64,
    expire_time: u64,
    origin: NodeId,
    from: NodeId,
    nonce: &Nonce,
    payload: &Payload,
) -> EncodeResult<()> {
    e.write_u8(version)?;
    e.write_u8(type_tag)?;
    e.write_u64(timestamp)?;
    e.write_u64(expire_time)?;
    e.write_u64(origin)?;
    e.write_u64(from)?;
    e.write_u24(*nonce)?;
    match payload {
        Payload::Contact(c) => c.encode(e)?,
        Payload::Metadata(m) => m.encode(e)?,
    }
    Ok(())
}

/// Decode and structurally validate an envelope. Does not verify the MAC or
/// check expiry -- callers run [`Envelope::verify`] and [`Envelope::is_expired`]
/// themselves, since those are separate steps in the engine's processing
/// order.
///
/// `accept_legacy_metadata` gates acceptance of the pre-`node_id` metadata
/// wire form; when `false`, such a payload is treated as malformed.
pub fn decode(bytes: &[u8], accept_legacy_metadata: bool) -> DecodeResult<Envelope> {
    let mut d = Decoder::new(bytes);
    let version = d.read_u8()?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let type_tag = d.read_u8()?;
    let timestamp = d.read_u64()?;
    let expire_time = d.read_u64()?;
    let origin = d.read_u64()?;
    let from = d.read_u64()?;
    let nonce = d.read_u24()?;

    let payload = match type_tag {
        TYPE_CONTACT => Payload::Contact(ContactAdvertisement::decode(&mut d)?),
        TYPE_METADATA => {
            let (record, legacy) = payload::decode_metadata(&mut d, origin)?;
            if legacy && !accept_legacy_metadata {
                return Err(DecodeError::InvalidData(
                    0,
                    "legacy metadata payload rejected by configuration",
                ));
            }
            Payload::Metadata(record)
        }
        other => return Err(DecodeError::UnknownMessageType(other)),
    };

    let mac_slice = d.read::<MAC_LEN>()?;
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&mac_slice);

    Ok(Envelope {
        version,
        timestamp,
        expire_time,
        origin,
        from,
        nonce,
        payload,
        mac,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(origin: NodeId, from: NodeId) -> EnvelopeFields {
        EnvelopeFields {
            timestamp: 1_700_000_000,
            expire_time: 1_700_003_600,
            origin,
            from,
            nonce: [0xA1, 0xB2, 0xC3],
        }
    }

    #[test]
    fn contact_envelope_round_trips_and_verifies() {
        let contact = ContactAdvertisement {
            node_a: 268484800,
            node_b: 268484801,
            duration_minutes: 60,
        };
        let bytes = encode_contact(&fields(268484800, 268484800), contact, "open").unwrap();
        assert!(bytes.len() <= MAX_ENVELOPE_SIZE);

        let env = decode(&bytes, false).unwrap();
        assert_eq!(env.version(), VERSION);
        assert_eq!(env.origin(), 268484800);
        assert_eq!(env.from(), 268484800);
        assert_eq!(env.nonce(), [0xA1, 0xB2, 0xC3]);
        assert_eq!(env.mac().len(), MAC_LEN);
        assert!(env.verify("open"));
        assert!(!env.verify("wrong-key"));
        assert!(matches!(env.payload(), Payload::Contact(c) if c.duration_minutes == 60));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let contact = ContactAdvertisement {
            node_a: 1,
            node_b: 2,
            duration_minutes: 5,
        };
        let mut bytes = encode_contact(&fields(1, 1), contact, "open").unwrap();
        // payload's node_b low byte sits right after the 8-byte node_a field
        let idx = 1 + 1 + 8 + 8 + 8 + 8 + 3 + 8; // version,type,ts,exp,origin,from,nonce,node_a
        bytes[idx] ^= 0xFF;
        let env = decode(&bytes, false).unwrap();
        assert!(!env.verify("open"));
    }

    #[test]
    fn forward_preserves_origin_and_nonce_rewrites_from() {
        let contact = ContactAdvertisement {
            node_a: 1,
            node_b: 2,
            duration_minutes: 5,
        };
        let bytes = encode_contact(&fields(100, 100), contact, "open").unwrap();
        let env = decode(&bytes, false).unwrap();

        let forwarded_bytes = env.forward(200, "open").unwrap();
        let forwarded = decode(&forwarded_bytes, false).unwrap();

        assert_eq!(forwarded.origin(), env.origin());
        assert_eq!(forwarded.nonce(), env.nonce());
        assert_eq!(forwarded.from(), 200);
        assert_eq!(forwarded.timestamp(), env.timestamp());
        assert_eq!(forwarded.expire_time(), env.expire_time());
        assert_eq!(forwarded.payload(), env.payload());
        assert!(forwarded.verify("open"));
    }

    #[test]
    fn expiry_boundary() {
        let contact = ContactAdvertisement {
            node_a: 1,
            node_b: 2,
            duration_minutes: 5,
        };
        let f = EnvelopeFields {
            timestamp: 1000,
            expire_time: 1000,
            origin: 1,
            from: 1,
            nonce: [0, 0, 0],
        };
        let bytes = encode_contact(&f, contact, "open").unwrap();
        let env = decode(&bytes, false).unwrap();
        assert!(env.is_expired(1000)); // now == expire_time -> discarded
        assert!(!env.is_expired(999)); // now == expire_time - 1 -> accepted
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = encode_contact(
            &fields(1, 1),
            ContactAdvertisement {
                node_a: 1,
                node_b: 2,
                duration_minutes: 1,
            },
            "open",
        )
        .unwrap();
        bytes[0] = 9;
        assert!(matches!(
            decode(&bytes, false),
            Err(DecodeError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut bytes = encode_contact(
            &fields(1, 1),
            ContactAdvertisement {
                node_a: 1,
                node_b: 2,
                duration_minutes: 1,
            },
            "open",
        )
        .unwrap();
        bytes[1] = 99;
        assert!(matches!(
            decode(&bytes, false),
            Err(DecodeError::UnknownMessageType(99))
        ));
    }

    #[test]
    fn metadata_envelope_round_trips() {
        let record = MetadataRecord {
            node_id: 268484800,
            name: "Gateway".into(),
            contact: "ops@x".into(),
            lat_udeg: Some(59_334_591),
            lon_udeg: Some(18_063_240),
        };
        let bytes = encode_metadata(&fields(268484800, 268484800), record.clone(), "open").unwrap();
        let env = decode(&bytes, false).unwrap();
        assert!(env.verify("open"));
        assert_eq!(env.payload(), &Payload::Metadata(record));
    }
}
