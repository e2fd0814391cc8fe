//! The engine's configuration surface.
//!
//! Reading configuration from a file (the daemon's usual deployment path)
//! is out of scope for this crate; the `Config` value itself, its defaults,
//! and a `clap`-derived command-line overlay for local testing live here.

use clap::Args as ClapArgs;
#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::codec::payload::META_STRING_MAX;
use crate::error::DtnexError;
use crate::NodeId;

/// Default `update_interval`, seconds between originate broadcasts.
pub const DEFAULT_UPDATE_INTERVAL: u64 = 600;
/// Default `contact_lifetime`, seconds.
pub const DEFAULT_CONTACT_LIFETIME: u64 = 3600;
/// Default `contact_time_tolerance`, seconds added to `expire_time`.
pub const DEFAULT_CONTACT_TIME_TOLERANCE: u64 = 1800;
/// Default `bundle_ttl`, seconds.
pub const DEFAULT_BUNDLE_TTL: u64 = 1800;
/// Default shared MAC key.
pub const DEFAULT_SHARED_KEY: &str = "open";
/// Default IPN service number for DTNEX payloads.
pub const DEFAULT_SERVICE_NUMBER: u16 = crate::SERVICE_NUMBER_DTNEX;

/// Every field the engine needs at startup.
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[derive(Debug, Clone)]
pub struct Config {
    /// seconds between originate broadcasts
    pub update_interval: u64,
    /// seconds; drives `duration_minutes` and `expire_time`
    pub contact_lifetime: u64,
    /// seconds added to `expire_time` for clock skew
    pub contact_time_tolerance: u64,
    /// seconds; passed to transport send
    pub bundle_ttl: u64,
    /// printable string; MAC key
    pub shared_key: String,
    /// local node descriptor name
    pub local_metadata_name: String,
    /// local node descriptor contact string
    pub local_metadata_contact: String,
    /// local node latitude, decimal degrees
    pub local_gps_lat: Option<f64>,
    /// local node longitude, decimal degrees
    pub local_gps_lon: Option<f64>,
    /// disables originating and accepting Metadata messages
    pub disable_metadata_exchange: bool,
    /// IPN service number for DTNEX payloads
    pub service_number: u16,
    /// accept the legacy 2-/4-element Metadata payload missing `node_id`
    /// (default rejects it; only turn this on for a network known to still
    /// run the old format)
    pub accept_legacy_metadata: bool,
    /// replay cache capacity
    pub replay_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            contact_lifetime: DEFAULT_CONTACT_LIFETIME,
            contact_time_tolerance: DEFAULT_CONTACT_TIME_TOLERANCE,
            bundle_ttl: DEFAULT_BUNDLE_TTL,
            shared_key: DEFAULT_SHARED_KEY.to_string(),
            local_metadata_name: String::new(),
            local_metadata_contact: String::new(),
            local_gps_lat: None,
            local_gps_lon: None,
            disable_metadata_exchange: false,
            service_number: DEFAULT_SERVICE_NUMBER,
            accept_legacy_metadata: false,
            replay_cache_capacity: crate::replay::DEFAULT_CAPACITY,
        }
    }
}

impl Config {
    /// Whether the local node has a descriptor worth originating: a name or
    /// a contact string set. Otherwise the local node has nothing to report.
    pub fn has_local_metadata(&self) -> bool {
        !self.local_metadata_name.is_empty() || !self.local_metadata_contact.is_empty()
    }

    /// Latitude scaled to the wire's integer microdegree representation.
    pub fn local_gps_lat_udeg(&self) -> Option<i32> {
        self.local_gps_lat.map(|v| (v * 1_000_000.0).round() as i32)
    }

    /// Longitude scaled to the wire's integer microdegree representation.
    pub fn local_gps_lon_udeg(&self) -> Option<i32> {
        self.local_gps_lon.map(|v| (v * 1_000_000.0).round() as i32)
    }

    /// Validate the fields a malformed config would break the engine on.
    /// Fatal at startup.
    pub fn validate(&self) -> Result<(), DtnexError> {
        if self.bundle_ttl < self.update_interval {
            return Err(DtnexError::ConfigInvalid(format!(
                "bundle_ttl ({}) must be >= update_interval ({})",
                self.bundle_ttl, self.update_interval
            )));
        }
        if self.local_metadata_name.len() > META_STRING_MAX {
            return Err(DtnexError::ConfigInvalid(format!(
                "local_metadata_name exceeds {META_STRING_MAX} bytes"
            )));
        }
        if self.local_metadata_contact.len() > META_STRING_MAX {
            return Err(DtnexError::ConfigInvalid(format!(
                "local_metadata_contact exceeds {META_STRING_MAX} bytes"
            )));
        }
        if self.local_gps_lat.is_some() != self.local_gps_lon.is_some() {
            return Err(DtnexError::ConfigInvalid(
                "local_gps_lat and local_gps_lon must be set together".into(),
            ));
        }
        if self.shared_key.is_empty() {
            return Err(DtnexError::ConfigInvalid("shared_key must not be empty".into()));
        }
        Ok(())
    }
}

/// Command-line overrides for local testing/dev-loop convenience. This is
/// explicitly a convenience shim, not the config-file reader a production
/// deployment would use.
#[derive(Debug, ClapArgs)]
pub struct Args {
    /// seconds between originate broadcasts
    #[arg(long)]
    pub update_interval: Option<u64>,

    /// seconds; drives duration_minutes and expire_time
    #[arg(long)]
    pub contact_lifetime: Option<u64>,

    /// seconds added to expire_time for clock skew
    #[arg(long)]
    pub contact_time_tolerance: Option<u64>,

    /// seconds; passed to transport send
    #[arg(long)]
    pub bundle_ttl: Option<u64>,

    /// printable string; MAC key
    #[arg(long)]
    pub shared_key: Option<String>,

    /// local node descriptor name
    #[arg(long)]
    pub local_metadata_name: Option<String>,

    /// local node descriptor contact string
    #[arg(long)]
    pub local_metadata_contact: Option<String>,

    /// local node latitude, decimal degrees
    #[arg(long)]
    pub local_gps_lat: Option<f64>,

    /// local node longitude, decimal degrees
    #[arg(long)]
    pub local_gps_lon: Option<f64>,

    /// disable originating and accepting Metadata messages
    #[arg(long)]
    pub disable_metadata_exchange: bool,

    /// IPN service number for DTNEX payloads
    #[arg(long)]
    pub service_number: Option<u16>,

    /// accept legacy metadata payloads missing a leading node_id
    #[arg(long)]
    pub accept_legacy_metadata: bool,

    /// this node's id, as read from the router at startup if unset
    #[arg(long)]
    pub local_node_id: Option<NodeId>,
}

impl Args {
    /// Layer these optional overrides onto `base`, returning a new `Config`.
    pub fn apply(&self, mut base: Config) -> Config {
        if let Some(v) = self.update_interval {
            base.update_interval = v;
        }
        if let Some(v) = self.contact_lifetime {
            base.contact_lifetime = v;
        }
        if let Some(v) = self.contact_time_tolerance {
            base.contact_time_tolerance = v;
        }
        if let Some(v) = self.bundle_ttl {
            base.bundle_ttl = v;
        }
        if let Some(v) = &self.shared_key {
            base.shared_key = v.clone();
        }
        if let Some(v) = &self.local_metadata_name {
            base.local_metadata_name = v.clone();
        }
        if let Some(v) = &self.local_metadata_contact {
            base.local_metadata_contact = v.clone();
        }
        if let Some(v) = self.local_gps_lat {
            base.local_gps_lat = Some(v);
        }
        if let Some(v) = self.local_gps_lon {
            base.local_gps_lon = Some(v);
        }
        if self.disable_metadata_exchange {
            base.disable_metadata_exchange = true;
        }
        if let Some(v) = self.service_number {
            base.service_number = v;
        }
        if self.accept_legacy_metadata {
            base.accept_legacy_metadata = true;
        }
        base
    }
}
