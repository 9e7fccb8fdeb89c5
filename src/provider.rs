//! The Hetzner provider: resources, data sources and their routing onto the
//! DNS services.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{DnsSettings, EnvDefaults, ProviderConfig};
use crate::dns::{
    check_id, DnsApi, DnsError, DnsServices, HetznerDnsClient, Record, Records, Zone, Zones,
};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

/// Provider type name.
pub const PROVIDER_TYPE_NAME: &str = "hetzner";

/// Managed DNS zone.
pub const ZONE_RESOURCE: &str = "hetzner_dns_zone";
/// Managed DNS record.
pub const RECORD_RESOURCE: &str = "hetzner_dns_record";
/// Single zone looked up by id or name.
pub const ZONE_DATA_SOURCE: &str = "hetzner_dns_zone";
/// Zones matching an optional name filter.
pub const ZONES_DATA_SOURCE: &str = "hetzner_dns_zones";
/// Records of one zone.
pub const RECORDS_DATA_SOURCE: &str = "hetzner_dns_records";

/// Builds an API client from a token.
pub type Connector = Box<dyn Fn(&str) -> Result<Arc<dyn DnsApi>, DnsError> + Send + Sync>;

fn connect_hetzner(token: &str) -> Result<Arc<dyn DnsApi>, DnsError> {
    Ok(Arc::new(HetznerDnsClient::new(token)?))
}

#[derive(Clone)]
enum DnsHandle {
    Unconfigured,
    Disabled,
    Ready(Arc<DnsServices>),
}

/// Hetzner DNS provider.
pub struct HetznerProvider {
    env: EnvDefaults,
    connector: Connector,
    dns: RwLock<DnsHandle>,
}

impl Default for HetznerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HetznerProvider {
    /// Provider talking to the public Hetzner DNS API, with environment
    /// fallbacks read from the process environment.
    pub fn new() -> Self {
        Self {
            env: EnvDefaults::from_env(),
            connector: Box::new(connect_hetzner),
            dns: RwLock::new(DnsHandle::Unconfigured),
        }
    }

    /// Replace the environment fallbacks.
    pub fn with_env(mut self, env: EnvDefaults) -> Self {
        self.env = env;
        self
    }

    /// Replace how the API client is built from the resolved token.
    pub fn with_connector<F>(mut self, connector: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<dyn DnsApi>, DnsError> + Send + Sync + 'static,
    {
        self.connector = Box::new(connector);
        self
    }

    async fn services(&self) -> Result<Arc<DnsServices>, ProviderError> {
        match &*self.dns.read().await {
            DnsHandle::Ready(services) => Ok(Arc::clone(services)),
            DnsHandle::Disabled => Err(DnsError::Disabled.into()),
            DnsHandle::Unconfigured => Err(ProviderError::FailedPrecondition(
                "provider has not been configured".to_string(),
            )),
        }
    }
}

fn decode<T: DeserializeOwned + Default>(value: Value) -> Result<T, ProviderError> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(value)?)
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(format!("Unknown resource type: {}", resource_type))
}

fn unknown_data_source(data_source_type: &str) -> ProviderError {
    ProviderError::UnknownResource(format!("Unknown data source type: {}", data_source_type))
}

#[async_trait::async_trait]
impl ProviderService for HetznerProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new(ProviderConfig::schema())
            .resource(ZONE_RESOURCE, Zone::resource_schema())
            .resource(RECORD_RESOURCE, Record::resource_schema())
            .data_source(ZONE_DATA_SOURCE, Zone::data_source_schema())
            .data_source(ZONES_DATA_SOURCE, Zones::data_source_schema())
            .data_source(RECORDS_DATA_SOURCE, Records::data_source_schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            resources: vec![ZONE_RESOURCE.to_string(), RECORD_RESOURCE.to_string()],
            data_sources: vec![
                ZONE_DATA_SOURCE.to_string(),
                ZONES_DATA_SOURCE.to_string(),
                RECORDS_DATA_SOURCE.to_string(),
            ],
            capabilities: Default::default(),
        }
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config: ProviderConfig = decode(config)?;
        debug!(?config, "configuring provider");

        let mut diagnostics = Vec::new();
        let settings = match config.resolve(&self.env) {
            Ok(settings) => settings,
            Err(problems) => {
                diagnostics.extend(problems);
                return Ok(diagnostics);
            }
        };

        let handle = match settings {
            DnsSettings::Enabled { token } => match (self.connector)(&token) {
                Ok(api) => DnsHandle::Ready(Arc::new(DnsServices::new(api))),
                Err(err) => {
                    diagnostics.push(
                        Diagnostic::error("DNS Client Initialization Error")
                            .with_detail(err.to_string()),
                    );
                    return Ok(diagnostics);
                }
            },
            DnsSettings::Disabled => {
                warn!("DNS API disabled by configuration");
                diagnostics.push(
                    Diagnostic::warning("DNS API Disabled")
                        .with_detail("DNS service is disabled and all DNS calls will fail"),
                );
                DnsHandle::Disabled
            }
        };

        info!(
            dns_api_enabled = matches!(handle, DnsHandle::Ready(_)),
            "provider configured"
        );
        *self.dns.write().await = handle;
        Ok(diagnostics)
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let schema = schema
            .data_sources
            .get(data_source_type)
            .ok_or_else(|| unknown_data_source(data_source_type))?;
        let mut diagnostics = validation::validate(schema, &config);

        if data_source_type == ZONE_DATA_SOURCE && !has_errors(&diagnostics) {
            let zone: Zone = decode(config)?;
            if zone.known_id().is_none() && zone.known_name().is_none() {
                diagnostics.push(
                    Diagnostic::error("Configuration Error")
                        .with_detail("ID or Name must be provided!"),
                );
            }
        }
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.schema();
        let schema = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| unknown_resource(resource_type))?;
        Ok(plan_resource(schema, prior_state.as_ref(), proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        match resource_type {
            ZONE_RESOURCE => {
                let mut zone: Zone = decode(planned_state)?;
                self.services().await?.zones().create(&mut zone).await?;
                encode(&zone)
            }
            RECORD_RESOURCE => {
                let mut record: Record = decode(planned_state)?;
                self.services().await?.records().create(&mut record).await?;
                encode(&record)
            }
            other => Err(unknown_resource(other)),
        }
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        match resource_type {
            ZONE_RESOURCE => {
                let mut zone: Zone = decode(current_state)?;
                self.services().await?.zones().read(&mut zone).await?;
                encode(&zone)
            }
            RECORD_RESOURCE => {
                let mut record: Record = decode(current_state)?;
                self.services().await?.records().read(&mut record).await?;
                encode(&record)
            }
            other => Err(unknown_resource(other)),
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let prior_id = prior_state
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);

        match resource_type {
            ZONE_RESOURCE => {
                let mut zone: Zone = decode(planned_state)?;
                zone.id = zone.id.or(prior_id);
                self.services().await?.zones().update(&mut zone).await?;
                encode(&zone)
            }
            RECORD_RESOURCE => {
                let mut record: Record = decode(planned_state)?;
                record.id = record.id.or(prior_id);
                self.services().await?.records().update(&mut record).await?;
                encode(&record)
            }
            other => Err(unknown_resource(other)),
        }
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        match resource_type {
            ZONE_RESOURCE => {
                let zone: Zone = decode(current_state)?;
                self.services().await?.zones().delete(&zone).await?;
            }
            RECORD_RESOURCE => {
                let record: Record = decode(current_state)?;
                self.services().await?.records().delete(&record).await?;
            }
            other => return Err(unknown_resource(other)),
        }
        Ok(())
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        if resource_type != ZONE_RESOURCE && resource_type != RECORD_RESOURCE {
            return Err(unknown_resource(resource_type));
        }
        let id = check_id(id)?;
        Ok(vec![ImportedResource::new(resource_type, json!({ "id": id }))])
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        match data_source_type {
            ZONE_DATA_SOURCE => {
                let mut zone: Zone = decode(config)?;
                self.services().await?.zones().read(&mut zone).await?;
                encode(&zone)
            }
            ZONES_DATA_SOURCE => {
                let mut zones: Zones = decode(config)?;
                self.services().await?.zones().list(&mut zones).await?;
                encode(&zones)
            }
            RECORDS_DATA_SOURCE => {
                let mut records: Records = decode(config)?;
                self.services().await?.records().list(&mut records).await?;
                encode(&records)
            }
            other => Err(unknown_data_source(other)),
        }
    }
}
