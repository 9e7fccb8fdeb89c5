//! In-memory [`DnsApi`] for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ApiRecord, ApiZone, DnsApi, DnsError, RecordRequest, ZoneRequest};

#[derive(Default)]
struct MockState {
    zones: Vec<ApiZone>,
    records: Vec<ApiRecord>,
    calls: Vec<String>,
    next_id: u32,
    failure: Option<(u16, String)>,
    omit_record_ttl: bool,
}

/// Records every call and serves zones and records from memory.
#[derive(Default)]
pub(crate) struct MockDnsApi {
    state: Mutex<MockState>,
}

pub(crate) fn zone(id: &str, name: &str) -> ApiZone {
    ApiZone {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        ttl: Some(86400),
        status: Some("verified".to_string()),
        paused: Some(false),
        ns: Some(vec![
            "hydrogen.ns.hetzner.com".to_string(),
            "oxygen.ns.hetzner.com".to_string(),
        ]),
    }
}

pub(crate) fn record(id: &str, zone_id: &str, record_type: &str, value: &str) -> ApiRecord {
    ApiRecord {
        id: Some(id.to_string()),
        record_type: Some(record_type.to_string()),
        name: Some("www".to_string()),
        value: Some(value.to_string()),
        zone_id: Some(zone_id.to_string()),
        ttl: Some(3600),
    }
}

fn not_found(entity: &str) -> DnsError {
    DnsError::Api {
        status: 404,
        message: format!("{} not found", entity),
    }
}

impl MockDnsApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_zone(self, zone: ApiZone) -> Self {
        self.state.lock().unwrap().zones.push(zone);
        self
    }

    pub(crate) fn with_record(self, record: ApiRecord) -> Self {
        self.state.lock().unwrap().records.push(record);
        self
    }

    /// Answer every call with the given HTTP error.
    pub(crate) fn failing(self, status: u16, message: &str) -> Self {
        self.state.lock().unwrap().failure = Some((status, message.to_string()));
        self
    }

    /// Strip the TTL from record responses, like the API sometimes does.
    pub(crate) fn omitting_record_ttl(self) -> Self {
        self.state.lock().unwrap().omit_record_ttl = true;
        self
    }

    /// Calls made so far, as `operation:argument` strings.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Records as stored on the "wire".
    pub(crate) fn stored_records(&self) -> Vec<ApiRecord> {
        self.state.lock().unwrap().records.clone()
    }

    fn begin(&self, call: String) -> Result<std::sync::MutexGuard<'_, MockState>, DnsError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some((status, message)) = state.failure.clone() {
            return Err(DnsError::Api { status, message });
        }
        Ok(state)
    }
}

impl MockState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn respond(&self, mut record: ApiRecord) -> ApiRecord {
        if self.omit_record_ttl {
            record.ttl = None;
        }
        record
    }
}

#[async_trait]
impl DnsApi for MockDnsApi {
    async fn list_zones(&self, search_name: Option<&str>) -> Result<Vec<ApiZone>, DnsError> {
        let state = self.begin(format!("list_zones:{}", search_name.unwrap_or("")))?;
        Ok(state
            .zones
            .iter()
            .filter(|z| match (search_name, z.name.as_deref()) {
                (Some(search), Some(name)) => name.contains(search),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect())
    }

    async fn get_zone(&self, id: &str) -> Result<ApiZone, DnsError> {
        let state = self.begin(format!("get_zone:{}", id))?;
        state
            .zones
            .iter()
            .find(|z| z.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| not_found("zone"))
    }

    async fn create_zone(&self, request: &ZoneRequest) -> Result<ApiZone, DnsError> {
        let mut state = self.begin(format!("create_zone:{}", request.name))?;
        let id = state.allocate_id("zone");
        let mut created = zone(&id, &request.name);
        created.status = Some("pending".to_string());
        created.ttl = request.ttl;
        state.zones.push(created.clone());
        Ok(created)
    }

    async fn update_zone(&self, id: &str, request: &ZoneRequest) -> Result<ApiZone, DnsError> {
        let mut state = self.begin(format!("update_zone:{}", id))?;
        let entry = state
            .zones
            .iter_mut()
            .find(|z| z.id.as_deref() == Some(id))
            .ok_or_else(|| not_found("zone"))?;
        entry.name = Some(request.name.clone());
        entry.ttl = request.ttl;
        Ok(entry.clone())
    }

    async fn delete_zone(&self, id: &str) -> Result<(), DnsError> {
        let mut state = self.begin(format!("delete_zone:{}", id))?;
        let before = state.zones.len();
        state.zones.retain(|z| z.id.as_deref() != Some(id));
        if state.zones.len() == before {
            return Err(not_found("zone"));
        }
        Ok(())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ApiRecord>, DnsError> {
        let state = self.begin(format!("list_records:{}", zone_id))?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.zone_id.as_deref() == Some(zone_id))
            .cloned()
            .map(|r| state.respond(r))
            .collect())
    }

    async fn get_record(&self, id: &str) -> Result<ApiRecord, DnsError> {
        let state = self.begin(format!("get_record:{}", id))?;
        let found = state
            .records
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| not_found("record"))?;
        Ok(state.respond(found))
    }

    async fn create_record(&self, request: &RecordRequest) -> Result<ApiRecord, DnsError> {
        let mut state = self.begin(format!("create_record:{}", request.name))?;
        let id = state.allocate_id("record");
        let created = ApiRecord {
            id: Some(id),
            record_type: Some(request.record_type.clone()),
            name: Some(request.name.clone()),
            value: Some(request.value.clone()),
            zone_id: Some(request.zone_id.clone()),
            ttl: request.ttl,
        };
        state.records.push(created.clone());
        Ok(state.respond(created))
    }

    async fn update_record(
        &self,
        id: &str,
        request: &RecordRequest,
    ) -> Result<ApiRecord, DnsError> {
        let mut state = self.begin(format!("update_record:{}", id))?;
        let entry = state
            .records
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id))
            .ok_or_else(|| not_found("record"))?;
        entry.record_type = Some(request.record_type.clone());
        entry.name = Some(request.name.clone());
        entry.value = Some(request.value.clone());
        entry.zone_id = Some(request.zone_id.clone());
        entry.ttl = request.ttl;
        let updated = entry.clone();
        Ok(state.respond(updated))
    }

    async fn delete_record(&self, id: &str) -> Result<(), DnsError> {
        let mut state = self.begin(format!("delete_record:{}", id))?;
        let before = state.records.len();
        state.records.retain(|r| r.id.as_deref() != Some(id));
        if state.records.len() == before {
            return Err(not_found("record"));
        }
        Ok(())
    }
}
