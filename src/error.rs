//! Error types for encoding/decoding and for the protocol engine itself.

use std::str::Utf8Error;
use thiserror::Error;

/// Convenience type for decode errors
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Returned from types that decode
#[derive(Error, Debug)]
pub enum DecodeError {
    /// add overflow
    #[error("decoder checked_add failed")]
    AddOverflow,

    /// ran out of bytes
    #[error("parser ran out of data-- not enough bytes")]
    NotEnoughBytes,

    /// error converting to utf-8
    #[error("error converting to UTF-8 {0}")]
    Utf8Error(#[from] Utf8Error),

    /// invalid data error
    #[error("invalid data error {0} msg {1}")]
    InvalidData(u32, &'static str),

    /// envelope version byte did not match the supported wire version
    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    /// message type byte did not match a known payload kind
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// a metadata payload carried only one of latitude/longitude
    #[error("metadata payload has one GPS coordinate but not the other")]
    IncompleteGps,
}

/// Returned from types that encode
#[derive(Error, Debug)]
pub enum EncodeError {
    /// addition overflow
    #[error("encoder checked_add failed")]
    AddOverflow,

    /// string exceeds bounds
    #[error(
        "message is trying to write a string to the message that exceeds the max size of {len}"
    )]
    StringSizeTooBig {
        /// size of string
        len: usize,
    },

    /// the fully serialized envelope would exceed the wire size bound
    #[error("encoded envelope of {len} bytes exceeds the {max} byte bound")]
    EnvelopeTooLarge {
        /// size the envelope would have occupied
        len: usize,
        /// maximum permitted size
        max: usize,
    },
}

/// Convenience type for encode errors
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Crate-wide error, covering every failure kind the engine recognises.
///
/// Variants map one-to-one onto the policy table the engine follows: the
/// "silent discard" variants (`Malformed` through `SelfOrigin`) are normal,
/// expected outcomes of running a gossip protocol and are logged at
/// trace/debug by the caller rather than surfaced to a user; `RouterGone`
/// and `ConfigInvalid` are the only two that a supervisor or a process exit
/// code should ever react to.
#[derive(Error, Debug)]
pub enum DtnexError {
    /// decode failure, wrong version, or unknown message type
    #[error("malformed message: {0}")]
    Malformed(#[from] DecodeError),

    /// encode failure (oversized envelope, string limits exceeded)
    #[error("could not encode message: {0}")]
    Encode(#[from] EncodeError),

    /// `now > expire_time`
    #[error("envelope expired at {expire_time}, now is {now}")]
    Expired {
        /// envelope's expire_time field
        expire_time: u64,
        /// current wall-clock time
        now: u64,
    },

    /// MAC did not verify under the configured shared secret
    #[error("authentication failed")]
    AuthFailed,

    /// `(origin, nonce)` already present in the replay cache
    #[error("duplicate envelope from origin {origin}")]
    Duplicate {
        /// origin of the duplicate envelope
        origin: u64,
    },

    /// `origin == local_id`; an echo of our own message
    #[error("received our own envelope back (origin {origin})")]
    SelfOrigin {
        /// the local node id, echoed back as origin
        origin: u64,
    },

    /// a single router insertion failed, but the router is otherwise reachable
    #[error("router rejected an insertion, router still reachable: {0}")]
    RouterTransient(String),

    /// the router is unreachable or in an invalid state
    #[error("router is unreachable: {0}")]
    RouterGone(String),

    /// a send to one neighbor endpoint failed
    #[error("send to {endpoint} failed: {source}")]
    TransportSendFailed {
        /// destination endpoint the send targeted
        endpoint: String,
        /// underlying transport error
        source: String,
    },

    /// a required configuration field was unparseable or out of range
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}
