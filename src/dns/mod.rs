//! Hetzner DNS domain layer.
//!
//! Typed zones and records, their mapping to and from the Hetzner DNS API
//! representation, the HTTP client and the zone/record service facades used
//! by the provider.

mod client;
mod error;
#[cfg(test)]
pub(crate) mod mock;
mod record;
mod service;
mod zone;

use std::sync::Arc;

use serde::{Deserialize, Deserializer};

pub use client::{
    check_id, ApiRecord, ApiZone, DnsApi, HetznerDnsClient, RecordRequest, ZoneRequest,
    DEFAULT_BASE_URL,
};
pub use error::DnsError;
pub use record::{Record, RecordType, Records};
pub use service::{RecordService, ZoneService};
pub use zone::{Zone, ZoneStatus, Zones};

/// The zone and record services sharing one API client.
#[derive(Clone)]
pub struct DnsServices {
    zones: ZoneService,
    records: RecordService,
}

impl DnsServices {
    /// Build both services on top of the given API client.
    pub fn new(api: Arc<dyn DnsApi>) -> Self {
        Self {
            zones: ZoneService::new(Arc::clone(&api)),
            records: RecordService::new(api),
        }
    }

    /// Zone operations.
    pub fn zones(&self) -> &ZoneService {
        &self.zones
    }

    /// Record operations.
    pub fn records(&self) -> &RecordService {
        &self.records
    }
}

impl std::fmt::Debug for DnsServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsServices").finish_non_exhaustive()
    }
}

/// Treat an explicit JSON `null` like an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
