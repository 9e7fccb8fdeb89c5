//! Zone and record service facades.
//!
//! Each operation makes exactly one API call (a paginated list counts as one
//! logical call), maps the response through the entity's merge function and
//! hands client errors back unchanged.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::{DnsApi, DnsError, Record, Records, Zone, Zones};

/// Operations on DNS zones.
#[derive(Clone)]
pub struct ZoneService {
    api: Arc<dyn DnsApi>,
}

impl ZoneService {
    pub fn new(api: Arc<dyn DnsApi>) -> Self {
        Self { api }
    }

    /// Fill `zones.zones` with every zone whose name contains `zones.name`,
    /// or with all zones when no filter is set.
    #[instrument(skip_all, fields(filter = ?zones.name))]
    pub async fn list(&self, zones: &mut Zones) -> Result<(), DnsError> {
        let filter = zones.name.as_deref().filter(|name| !name.is_empty());
        let remote = self.api.list_zones(filter).await?;
        debug!(count = remote.len(), "zones listed");
        zones.reconcile(remote)
    }

    /// Refresh a zone by id, or look it up by name when no id is known.
    #[instrument(skip_all, fields(id = ?zone.id, name = ?zone.name))]
    pub async fn read(&self, zone: &mut Zone) -> Result<(), DnsError> {
        if let Some(id) = zone.known_id() {
            let remote = self.api.get_zone(id).await?;
            return zone.reconcile(remote);
        }

        let Some(name) = zone.known_name() else {
            return Err(DnsError::missing("ID or Name"));
        };

        let matches = self.api.list_zones(Some(name)).await?;
        let remote = Zone::resolve_by_name(name, matches)?;
        zone.reconcile(remote)
    }

    #[instrument(skip_all, fields(name = ?zone.name))]
    pub async fn create(&self, zone: &mut Zone) -> Result<(), DnsError> {
        let request = zone.to_remote()?;
        let remote = self.api.create_zone(&request).await?;
        zone.reconcile(remote)?;
        debug!(id = ?zone.id, "zone created");
        Ok(())
    }

    #[instrument(skip_all, fields(id = ?zone.id))]
    pub async fn update(&self, zone: &mut Zone) -> Result<(), DnsError> {
        let id = zone.known_id().ok_or_else(|| DnsError::missing("ID"))?.to_string();
        let request = zone.to_remote()?;
        let remote = self.api.update_zone(&id, &request).await?;
        zone.reconcile(remote)
    }

    #[instrument(skip_all, fields(id = ?zone.id))]
    pub async fn delete(&self, zone: &Zone) -> Result<(), DnsError> {
        let id = zone.known_id().ok_or_else(|| DnsError::missing("ID"))?;
        self.api.delete_zone(id).await
    }
}

/// Operations on DNS records.
#[derive(Clone)]
pub struct RecordService {
    api: Arc<dyn DnsApi>,
}

fn known(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl RecordService {
    pub fn new(api: Arc<dyn DnsApi>) -> Self {
        Self { api }
    }

    /// Fill `records.records` with every record of `records.zone_id`.
    #[instrument(skip_all, fields(zone_id = ?records.zone_id))]
    pub async fn list(&self, records: &mut Records) -> Result<(), DnsError> {
        let zone_id = known(&records.zone_id).ok_or_else(|| DnsError::missing("Zone ID"))?;
        let remote = self.api.list_records(zone_id).await?;
        debug!(count = remote.len(), "records listed");
        records.reconcile(remote)
    }

    #[instrument(skip_all, fields(id = ?record.id))]
    pub async fn read(&self, record: &mut Record) -> Result<(), DnsError> {
        let id = known(&record.id).ok_or_else(|| DnsError::missing("ID"))?;
        let remote = self.api.get_record(id).await?;
        record.reconcile(remote)
    }

    /// Create the record. The type is validated before the API is called and
    /// the submitted TTL is kept when the response omits one.
    #[instrument(skip_all, fields(record_type = ?record.record_type, name = ?record.name))]
    pub async fn create(&self, record: &mut Record) -> Result<(), DnsError> {
        let request = record.to_remote()?;
        let remote = self.api.create_record(&request).await?;
        record.reconcile(remote)?;
        debug!(id = ?record.id, "record created");
        Ok(())
    }

    /// Update the record in place, with the same validation and TTL rule as
    /// [`RecordService::create`].
    #[instrument(skip_all, fields(id = ?record.id))]
    pub async fn update(&self, record: &mut Record) -> Result<(), DnsError> {
        let id = known(&record.id).ok_or_else(|| DnsError::missing("ID"))?.to_string();
        let request = record.to_remote()?;
        let remote = self.api.update_record(&id, &request).await?;
        record.reconcile(remote)
    }

    #[instrument(skip_all, fields(id = ?record.id))]
    pub async fn delete(&self, record: &Record) -> Result<(), DnsError> {
        let id = known(&record.id).ok_or_else(|| DnsError::missing("ID"))?;
        self.api.delete_record(id).await
    }
}
