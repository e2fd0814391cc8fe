//! # dtnex
//!
//! An authenticated epidemic gossip agent for delay-tolerant-network (DTN)
//! contact and descriptor propagation.
//!
//! Each node runs one agent which advertises its directly configured
//! neighbor contacts and a small descriptor to its neighbors, accepts and
//! authenticates the same from peers, installs the described edges into an
//! external DTN router's contact/range tables, and forwards both message
//! kinds onward so the information floods the network. See the crate's
//! `DESIGN.md` for a module-by-module design rationale.
//!
//! ## Example - sealing and verifying an envelope
//!
//! ```rust
//! use dtnex::codec::{encode_contact, decode, ContactAdvertisement, EnvelopeFields};
//!
//! let fields = EnvelopeFields {
//!     timestamp: 1_700_000_000,
//!     expire_time: 1_700_003_600,
//!     origin: 268484800,
//!     from: 268484800,
//!     nonce: [0xA1, 0xB2, 0xC3],
//! };
//! let contact = ContactAdvertisement {
//!     node_a: 268484800,
//!     node_b: 268484801,
//!     duration_minutes: 60,
//! };
//! let bytes = encode_contact(&fields, contact, "open").unwrap();
//! let envelope = decode(&bytes, false).unwrap();
//! assert!(envelope.verify("open"));
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod replay;
pub mod router;
pub mod supervisor;
pub mod transport;

/// An IPN node identifier: wide enough for 64-bit IPN node numbers.
pub type NodeId = u64;

/// The IPN service number DTNEX payloads are addressed to.
pub const SERVICE_NUMBER_DTNEX: u16 = 12160;

/// The IPN service number of the echo responder (a separate daemon; not
/// implemented by this crate).
pub const SERVICE_NUMBER_ECHO: u16 = 12161;

/// An `ipn:<node>.<service>` endpoint address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// the node part of the address
    pub node: NodeId,
    /// the service part of the address
    pub service: u16,
}

impl Endpoint {
    /// construct an endpoint addressing the DTNEX gossip service on `node`
    pub fn dtnex(node: NodeId) -> Self {
        Endpoint {
            node,
            service: SERVICE_NUMBER_DTNEX,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ipn:{}.{}", self.node, self.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_displays_as_ipn_uri() {
        let e = Endpoint::dtnex(268484800);
        assert_eq!(e.to_string(), "ipn:268484800.12160");
    }
}
