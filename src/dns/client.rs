//! Hetzner DNS API client.
//!
//! [`DnsApi`] is the seam between the mapping layer and the network. The
//! production implementation is [`HetznerDnsClient`]; tests substitute an
//! in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{null_as_default, DnsError};

/// Hetzner DNS API base URL.
pub const DEFAULT_BASE_URL: &str = "https://dns.hetzner.com/api/v1";

const AUTH_HEADER: &str = "Auth-API-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 100;

/// A zone as the API returns it. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiZone {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default)]
    pub ns: Option<Vec<String>>,
}

/// A record as the API returns it. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub ttl: Option<i64>,
}

/// Body of zone create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// Body of record create and update calls. `value` is already wire-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRequest {
    pub zone_id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// Operations the mapping layer needs from the Hetzner DNS API.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// List zones, optionally restricted to names containing `search_name`.
    async fn list_zones(&self, search_name: Option<&str>) -> Result<Vec<ApiZone>, DnsError>;

    async fn get_zone(&self, id: &str) -> Result<ApiZone, DnsError>;

    async fn create_zone(&self, request: &ZoneRequest) -> Result<ApiZone, DnsError>;

    async fn update_zone(&self, id: &str, request: &ZoneRequest) -> Result<ApiZone, DnsError>;

    async fn delete_zone(&self, id: &str) -> Result<(), DnsError>;

    /// List all records of a zone.
    async fn list_records(&self, zone_id: &str) -> Result<Vec<ApiRecord>, DnsError>;

    async fn get_record(&self, id: &str) -> Result<ApiRecord, DnsError>;

    async fn create_record(&self, request: &RecordRequest) -> Result<ApiRecord, DnsError>;

    async fn update_record(&self, id: &str, request: &RecordRequest)
        -> Result<ApiRecord, DnsError>;

    async fn delete_record(&self, id: &str) -> Result<(), DnsError>;
}

#[derive(Debug, Deserialize)]
struct ZoneEnvelope {
    zone: ApiZone,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    record: ApiRecord,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    last_page: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ZonesPage {
    #[serde(default, deserialize_with = "null_as_default")]
    zones: Vec<ApiZone>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    records: Vec<ApiRecord>,
    #[serde(default)]
    meta: Option<Meta>,
}

trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<Pagination>);
}

impl Page for ZonesPage {
    type Item = ApiZone;

    fn into_parts(self) -> (Vec<ApiZone>, Option<Pagination>) {
        (self.zones, self.meta.and_then(|m| m.pagination))
    }
}

impl Page for RecordsPage {
    type Item = ApiRecord;

    fn into_parts(self) -> (Vec<ApiRecord>, Option<Pagination>) {
        (self.records, self.meta.and_then(|m| m.pagination))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    #[serde(default)]
    error: Option<ApiErrorBody>,
    #[serde(default)]
    message: Option<String>,
}

/// Pick the most useful error text out of a failed response body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    parsed
        .and_then(|envelope| envelope.error.and_then(|e| e.message).or(envelope.message))
        .filter(|message| !message.is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

/// Check that `id` addresses exactly one object: a non-empty single path
/// segment with no reserved or whitespace characters.
pub fn check_id(id: &str) -> Result<&str, DnsError> {
    let reserved = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    if id.is_empty() || id == "." || id == ".." || id.contains(reserved) {
        return Err(DnsError::InvalidId(id.to_string()));
    }
    Ok(id)
}

/// HTTP client for the Hetzner DNS API.
#[derive(Clone)]
pub struct HetznerDnsClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl std::fmt::Debug for HetznerDnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetznerDnsClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl HetznerDnsClient {
    /// Create a client against the public Hetzner DNS API.
    pub fn new(token: impl Into<String>) -> Result<Self, DnsError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, DnsError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DnsError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| DnsError::Configuration(format!("Invalid API base URL: {}", base_url)))?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// `<base>/<collection>[/<id>]`, with the id encoded as one segment.
    fn url(&self, collection: &str, id: Option<&str>) -> Result<Url, DnsError> {
        let id = id.map(check_id).transpose()?;
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                DnsError::Configuration(format!("Invalid API base URL: {}", self.base_url))
            })?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        collection: &str,
        id: Option<&str>,
    ) -> Result<RequestBuilder, DnsError> {
        let url = self.url(collection, id)?;
        Ok(self.http.request(method, url).header(AUTH_HEADER, &self.token))
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: RequestBuilder, action: &'static str) -> Result<String, DnsError> {
        trace!(action, "sending request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DnsError::Timeout(format!("{}: {}", action, e))
            } else {
                DnsError::Network(format!("{}: {}", action, e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DnsError::Network(format!("{}: failed to read response body: {}", action, e)))?;

        if !status.is_success() {
            warn!(action, status = status.as_u16(), "request rejected by Hetzner DNS API");
            return Err(DnsError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        debug!(action, status = status.as_u16(), "request completed");
        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &'static str,
    ) -> Result<T, DnsError> {
        let body = self.execute(request, action).await?;
        serde_json::from_str(&body).map_err(|e| DnsError::Parse {
            context: action,
            detail: e.to_string(),
        })
    }

    /// Collect every page of a list endpoint.
    async fn fetch_all<P: Page>(
        &self,
        collection: &str,
        query: &[(&str, &str)],
        action: &'static str,
    ) -> Result<Vec<P::Item>, DnsError> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let page_param = page.to_string();
            let per_page = PAGE_SIZE.to_string();
            let request = self
                .request(Method::GET, collection, None)?
                .query(query)
                .query(&[("page", page_param.as_str()), ("per_page", per_page.as_str())]);

            let (mut batch, pagination) = self.fetch::<P>(request, action).await?.into_parts();
            items.append(&mut batch);

            match pagination {
                Some(p) if p.page >= page && p.page < p.last_page => page = p.page + 1,
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl DnsApi for HetznerDnsClient {
    async fn list_zones(&self, search_name: Option<&str>) -> Result<Vec<ApiZone>, DnsError> {
        let query: Vec<(&str, &str)> = search_name
            .map(|name| vec![("search_name", name)])
            .unwrap_or_default();
        self.fetch_all::<ZonesPage>("zones", &query, "list zones").await
    }

    async fn get_zone(&self, id: &str) -> Result<ApiZone, DnsError> {
        let request = self.request(Method::GET, "zones", Some(id))?;
        let envelope: ZoneEnvelope = self.fetch(request, "get zone").await?;
        Ok(envelope.zone)
    }

    async fn create_zone(&self, request: &ZoneRequest) -> Result<ApiZone, DnsError> {
        let request = self.request(Method::POST, "zones", None)?.json(request);
        let envelope: ZoneEnvelope = self.fetch(request, "create zone").await?;
        Ok(envelope.zone)
    }

    async fn update_zone(&self, id: &str, request: &ZoneRequest) -> Result<ApiZone, DnsError> {
        let request = self
            .request(Method::PUT, "zones", Some(id))?
            .json(request);
        let envelope: ZoneEnvelope = self.fetch(request, "update zone").await?;
        Ok(envelope.zone)
    }

    async fn delete_zone(&self, id: &str) -> Result<(), DnsError> {
        let request = self.request(Method::DELETE, "zones", Some(id))?;
        self.execute(request, "delete zone").await.map(|_| ())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<ApiRecord>, DnsError> {
        self.fetch_all::<RecordsPage>("records", &[("zone_id", zone_id)], "list records")
            .await
    }

    async fn get_record(&self, id: &str) -> Result<ApiRecord, DnsError> {
        let request = self.request(Method::GET, "records", Some(id))?;
        let envelope: RecordEnvelope = self.fetch(request, "get record").await?;
        Ok(envelope.record)
    }

    async fn create_record(&self, request: &RecordRequest) -> Result<ApiRecord, DnsError> {
        let request = self.request(Method::POST, "records", None)?.json(request);
        let envelope: RecordEnvelope = self.fetch(request, "create record").await?;
        Ok(envelope.record)
    }

    async fn update_record(
        &self,
        id: &str,
        request: &RecordRequest,
    ) -> Result<ApiRecord, DnsError> {
        let request = self
            .request(Method::PUT, "records", Some(id))?
            .json(request);
        let envelope: RecordEnvelope = self.fetch(request, "update record").await?;
        Ok(envelope.record)
    }

    async fn delete_record(&self, id: &str) -> Result<(), DnsError> {
        let request = self.request(Method::DELETE, "records", Some(id))?;
        self.execute(request, "delete record").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HetznerDnsClient {
        HetznerDnsClient::with_base_url("test-token", server.uri()).unwrap()
    }

    fn zone_json(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "ttl": 86400,
            "status": "verified",
            "paused": false,
            "ns": ["hydrogen.ns.hetzner.com", "oxygen.ns.hetzner.com"]
        })
    }

    #[tokio::test]
    async fn test_get_zone_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1"))
            .and(header("Auth-API-Token", "test-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"zone": zone_json("zone-1", "example.com")})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let zone = client(&server).get_zone("zone-1").await.unwrap();
        assert_eq!(zone.id.as_deref(), Some("zone-1"));
        assert_eq!(zone.name.as_deref(), Some("example.com"));
        assert_eq!(zone.ns.map(|ns| ns.len()), Some(2));
    }

    #[tokio::test]
    async fn test_list_zones_follows_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("search_name", "example"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "zones": [zone_json("zone-1", "example.com")],
                "meta": {"pagination": {"page": 1, "per_page": 1, "last_page": 2, "total_entries": 2}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("search_name", "example"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "zones": [zone_json("zone-2", "example.org")],
                "meta": {"pagination": {"page": 2, "per_page": 1, "last_page": 2, "total_entries": 2}}
            })))
            .mount(&server)
            .await;

        let zones = client(&server).list_zones(Some("example")).await.unwrap();
        let names: Vec<_> = zones.iter().filter_map(|z| z.name.as_deref()).collect();
        assert_eq!(names, vec!["example.com", "example.org"]);
    }

    #[tokio::test]
    async fn test_list_records_tolerates_null_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/records"))
            .and(query_param("zone_id", "zone-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": null})))
            .mount(&server)
            .await;

        let records = client(&server).list_records("zone-1").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_create_record_posts_wire_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/records"))
            .and(body_json(json!({
                "zone_id": "zone-1",
                "type": "TXT",
                "name": "@",
                "value": "\"hello\"",
                "ttl": 300
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "record": {
                    "id": "rec-1",
                    "type": "TXT",
                    "name": "@",
                    "value": "\"hello\"",
                    "zone_id": "zone-1"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = RecordRequest {
            zone_id: "zone-1".to_string(),
            record_type: "TXT".to_string(),
            name: "@".to_string(),
            value: "\"hello\"".to_string(),
            ttl: Some(300),
        };
        let record = client(&server).create_record(&request).await.unwrap();
        assert_eq!(record.id.as_deref(), Some("rec-1"));
        assert_eq!(record.ttl, None);
    }

    #[tokio::test]
    async fn test_error_status_carries_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/records/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "record not found", "code": 404}
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_record("missing").await.unwrap_err();
        match err {
            DnsError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "record not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_without_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/zones/zone-1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).delete_zone("zone-1").await.unwrap_err();
        assert!(matches!(err, DnsError::Api { status: 401, ref message } if message == "Unauthorized"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).get_zone("zone-1").await.unwrap_err();
        assert!(matches!(err, DnsError::Parse { context: "get zone", .. }));
    }

    #[tokio::test]
    async fn test_ids_outside_one_segment_never_reach_the_api() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let client = client(&server);

        let err = client.delete_zone("../records").await.unwrap_err();
        assert!(matches!(err, DnsError::InvalidId(ref id) if id == "../records"));

        for id in ["", "..", "rec-1/extra", "rec-1?zone_id=2", "rec-1#x", "rec%2F1", "rec 1"] {
            assert!(matches!(
                client.delete_record(id).await.unwrap_err(),
                DnsError::InvalidId(_)
            ));
        }
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_base_url_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/records/rec-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "record": {"id": "rec-1", "type": "A", "name": "www", "value": "1.2.3.4", "zone_id": "zone-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HetznerDnsClient::with_base_url("test-token", format!("{}/api/v1/", server.uri())).unwrap();
        let record = client.get_record("rec-1").await.unwrap();
        assert_eq!(record.zone_id.as_deref(), Some("zone-1"));
    }

    #[test]
    fn test_check_id() {
        assert_eq!(check_id("zone-1").unwrap(), "zone-1");
        assert!(check_id(".").is_err());
        assert!(HetznerDnsClient::with_base_url("t", "not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = HetznerDnsClient::new("secret-token").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains(DEFAULT_BASE_URL));
    }
}
