//! The wire codec: the outer envelope and its two payload kinds.

pub mod envelope;
pub mod payload;

pub use envelope::{decode, encode_contact, encode_metadata, Envelope, EnvelopeFields, Nonce, Payload, MAX_ENVELOPE_SIZE, VERSION};
pub use payload::{ContactAdvertisement, MetadataRecord, META_STRING_MAX};
