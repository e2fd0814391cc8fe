//! Payload records carried inside a DTNEX envelope.

use crate::decoder::{Decodable, Decoder};
use crate::encoder::{Encodable, Encoder};
use crate::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::NodeId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum length in bytes of a metadata `name` or `contact` field.
pub const META_STRING_MAX: usize = 24;

/// A directional communication opportunity advertised between two nodes.
///
/// The pair is unordered semantically -- a receiver always installs both
/// `(node_a -> node_b)` and `(node_b -> node_a)` contacts.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactAdvertisement {
    /// first node of the pair
    pub node_a: NodeId,
    /// second node of the pair
    pub node_b: NodeId,
    /// non-negative duration of the contact opportunity, in minutes
    pub duration_minutes: u16,
}

impl Decodable for ContactAdvertisement {
    fn decode(decoder: &mut Decoder<'_>) -> DecodeResult<Self> {
        Ok(ContactAdvertisement {
            node_a: decoder.read_u64()?,
            node_b: decoder.read_u64()?,
            duration_minutes: decoder.read_u16()?,
        })
    }
}

impl Encodable for ContactAdvertisement {
    fn encode(&self, e: &mut Encoder<'_>) -> EncodeResult<()> {
        e.write_u64(self.node_a)?;
        e.write_u64(self.node_b)?;
        e.write_u16(self.duration_minutes)?;
        Ok(())
    }
}

/// A node's human-readable descriptor.
///
/// Presence of GPS coordinates is all-or-nothing: either both `lat_udeg`
/// and `lon_udeg` are set, or neither is.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// node this descriptor describes
    pub node_id: NodeId,
    /// human-readable name, at most [`META_STRING_MAX`] bytes
    pub name: String,
    /// contact string (e.g. an email or callsign), at most [`META_STRING_MAX`] bytes
    pub contact: String,
    /// latitude in decimal degrees times 1_000_000
    pub lat_udeg: Option<i32>,
    /// longitude in decimal degrees times 1_000_000
    pub lon_udeg: Option<i32>,
}

impl MetadataRecord {
    /// latitude in decimal degrees, reversing the wire scaling
    pub fn latitude(&self) -> Option<f64> {
        self.lat_udeg.map(|v| v as f64 / 1_000_000.0)
    }

    /// longitude in decimal degrees, reversing the wire scaling
    pub fn longitude(&self) -> Option<f64> {
        self.lon_udeg.map(|v| v as f64 / 1_000_000.0)
    }

    fn has_gps(&self) -> bool {
        self.lat_udeg.is_some() && self.lon_udeg.is_some()
    }
}

// flags byte bits
const FLAG_HAS_GPS: u8 = 0b01;
const FLAG_HAS_NODE_ID: u8 = 0b10;

impl Encodable for MetadataRecord {
    fn encode(&self, e: &mut Encoder<'_>) -> EncodeResult<()> {
        if self.lat_udeg.is_some() != self.lon_udeg.is_some() {
            // presence is all-or-nothing; a caller that hits this built the
            // record incorrectly, not a wire-level concern, so treat it as
            // though it were missing entirely rather than fail loudly.
            return Err(EncodeError::StringSizeTooBig { len: 0 });
        }
        let mut flags = FLAG_HAS_NODE_ID;
        if self.has_gps() {
            flags |= FLAG_HAS_GPS;
        }
        e.write_u8(flags)?;
        e.write_u64(self.node_id)?;
        e.write_string(&self.name, META_STRING_MAX)?;
        e.write_string(&self.contact, META_STRING_MAX)?;
        if let (Some(lat), Some(lon)) = (self.lat_udeg, self.lon_udeg) {
            e.write_i32(lat)?;
            e.write_i32(lon)?;
        }
        Ok(())
    }
}

/// Decode a [`MetadataRecord`], substituting `implicit_node_id` (the
/// envelope's `origin`) when the payload omits its own `node_id` field.
///
/// Returns whether the legacy (no leading `node_id`) form was used, so the
/// caller can apply its own compatibility policy.
pub fn decode_metadata(
    decoder: &mut Decoder<'_>,
    implicit_node_id: NodeId,
) -> DecodeResult<(MetadataRecord, bool)> {
    let flags = decoder.read_u8()?;
    let has_gps = flags & FLAG_HAS_GPS != 0;
    let has_node_id = flags & FLAG_HAS_NODE_ID != 0;

    let node_id = if has_node_id {
        decoder.read_u64()?
    } else {
        implicit_node_id
    };
    let name = decoder.read_string::<META_STRING_MAX>()?;
    let contact = decoder.read_string::<META_STRING_MAX>()?;
    let (lat_udeg, lon_udeg) = if has_gps {
        (Some(decoder.read_i32()?), Some(decoder.read_i32()?))
    } else {
        (None, None)
    };

    Ok((
        MetadataRecord {
            node_id,
            name,
            contact,
            lat_udeg,
            lon_udeg,
        },
        !has_node_id,
    ))
}

/// Validate field lengths before attempting to encode (used by the engine
/// to fail fast on originated records with a useful error).
pub fn validate_metadata(record: &MetadataRecord) -> Result<(), DecodeError> {
    if record.name.len() > META_STRING_MAX {
        return Err(DecodeError::InvalidData(
            record.name.len() as u32,
            "metadata name exceeds 24 bytes",
        ));
    }
    if record.contact.len() > META_STRING_MAX {
        return Err(DecodeError::InvalidData(
            record.contact.len() as u32,
            "metadata contact exceeds 24 bytes",
        ));
    }
    if record.lat_udeg.is_some() != record.lon_udeg.is_some() {
        return Err(DecodeError::IncompleteGps);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_round_trips() -> DecodeResult<()> {
        let c = ContactAdvertisement {
            node_a: 268484800,
            node_b: 268484801,
            duration_minutes: 60,
        };
        let mut buf = vec![];
        c.encode(&mut Encoder::new(&mut buf)).unwrap();
        let decoded = ContactAdvertisement::decode(&mut Decoder::new(&buf))?;
        assert_eq!(c, decoded);
        Ok(())
    }

    #[test]
    fn metadata_without_gps_round_trips() -> DecodeResult<()> {
        let m = MetadataRecord {
            node_id: 268484800,
            name: "Gateway".into(),
            contact: "ops@example.org".into(),
            lat_udeg: None,
            lon_udeg: None,
        };
        let mut buf = vec![];
        m.encode(&mut Encoder::new(&mut buf)).unwrap();
        let mut d = Decoder::new(&buf);
        let (decoded, legacy) = decode_metadata(&mut d, 0)?;
        assert!(!legacy);
        assert_eq!(m, decoded);
        Ok(())
    }

    #[test]
    fn metadata_with_gps_reverses_scaling() -> DecodeResult<()> {
        let m = MetadataRecord {
            node_id: 268484800,
            name: "Gateway".into(),
            contact: "ops@x".into(),
            lat_udeg: Some(59_334_591),
            lon_udeg: Some(18_063_240),
        };
        let mut buf = vec![];
        m.encode(&mut Encoder::new(&mut buf)).unwrap();
        let (decoded, _) = decode_metadata(&mut Decoder::new(&buf), 0)?;
        assert!((decoded.latitude().unwrap() - 59.334591).abs() < 1e-9);
        assert!((decoded.longitude().unwrap() - 18.063240).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn legacy_payload_substitutes_origin() -> DecodeResult<()> {
        // hand-build a legacy payload: flags(no node id, no gps), name, contact
        let mut buf = vec![];
        let mut e = Encoder::new(&mut buf);
        e.write_u8(0).unwrap(); // flags: neither bit set
        e.write_string("Legacy", META_STRING_MAX).unwrap();
        e.write_string("legacy@x", META_STRING_MAX).unwrap();

        let (decoded, legacy) = decode_metadata(&mut Decoder::new(&buf), 42)?;
        assert!(legacy);
        assert_eq!(decoded.node_id, 42);
        Ok(())
    }
}
