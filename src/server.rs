//! Plugin server.
//!
//! [`ProviderService`] is the typed provider interface; [`serve`] exposes an
//! implementation over gRPC, prints the handshake line on stdout and runs
//! until SIGTERM or SIGINT.
//!
//! On a shutdown signal the server stops accepting connections, waits up to
//! [`ServeOptions::shutdown_timeout`] for in-flight requests and then calls
//! [`ProviderService::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as proto;
use crate::schema::{has_errors, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{handshake_line, ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

/// Typed provider interface driven by the plugin server.
///
/// Validation hooks default to checking the configuration against the
/// advertised schema.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider block, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default the schema's names, sorted.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            type_name: String::new(),
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
            capabilities: Default::default(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&self.schema().provider, &config))
    }

    /// Configure the provider. Returned error diagnostics fail the call.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let schema = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validation::validate(schema, &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Turn an identifier into state for a subsequent Read. Unsupported by default.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
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
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        Ok(validation::validate(schema, &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;
}

fn decode_json(bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

fn encode_json(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_proto(operation: &str, subject: &str, err: ProviderError) -> Vec<proto::Diagnostic> {
    error!(operation, subject, error = %err, "operation failed");
    diagnostics_to_proto(err.into_diagnostics())
}

/// Log the outcome of a validation-style call and convert its diagnostics.
fn report(
    operation: &str,
    subject: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<proto::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if has_errors(&diagnostics) {
                warn!(operation, subject, diagnostics = diagnostics.len(), "completed with errors");
            } else {
                debug!(operation, subject, "completed");
            }
            diagnostics_to_proto(diagnostics)
        }
        Err(err) => error_to_proto(operation, subject, err),
    }
}

/// Convert a state-returning result into the `(state, diagnostics)` pair of a response.
fn state_response(
    operation: &str,
    subject: &str,
    result: Result<Value, ProviderError>,
) -> (Vec<u8>, Vec<proto::Diagnostic>) {
    match result {
        Ok(state) => {
            info!(operation, subject, "completed");
            (encode_json(&state), Vec::new())
        }
        Err(err) => (Vec::new(), error_to_proto(operation, subject, err)),
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    let attributes = schema
        .attributes
        .iter()
        .map(|(name, attr)| proto::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.value_type).unwrap_or_default(),
            required: attr.presence.is_required(),
            optional: attr.presence.is_optional(),
            computed: attr.presence.is_computed(),
            sensitive: attr.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            allowed_values: attr.allowed_values.clone(),
        })
        .collect();

    proto::Schema {
        version: schema.version as i64,
        block: Some(proto::Block {
            attributes,
            description: schema.description.clone().unwrap_or_default(),
        }),
    }
}

/// Adapter from the generated gRPC trait to [`ProviderService`].
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> proto::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<proto::GetMetadataRequest>,
    ) -> Result<tonic::Response<proto::GetMetadataResponse>, tonic::Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(tonic::Response::new(proto::GetMetadataResponse {
            server_capabilities: Some(proto::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: Vec::new(),
            type_name: metadata.type_name,
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<proto::GetSchemaRequest>,
    ) -> Result<tonic::Response<proto::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(tonic::Response::new(proto::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<proto::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateProviderConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config) {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(err) => Err(err),
        };
        Ok(tonic::Response::new(proto::ValidateProviderConfigResponse {
            diagnostics: report("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<proto::ConfigureRequest>,
    ) -> Result<tonic::Response<proto::ConfigureResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config) {
            Ok(config) => self.provider.configure(config).await,
            Err(err) => Err(err),
        };
        Ok(tonic::Response::new(proto::ConfigureResponse {
            diagnostics: report("Configure", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<proto::StopRequest>,
    ) -> Result<tonic::Response<proto::StopResponse>, tonic::Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(err) => {
                error!(error = %err, "Stop failed");
                err.to_string()
            }
        };
        Ok(tonic::Response::new(proto::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type = %request.get_ref().resource_type))]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<proto::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateResourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config) {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            }
            Err(err) => Err(err),
        };
        Ok(tonic::Response::new(proto::ValidateResourceConfigResponse {
            diagnostics: report("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type = %request.get_ref().resource_type))]
    async fn plan(
        &self,
        request: tonic::Request<proto::PlanRequest>,
    ) -> Result<tonic::Response<proto::PlanResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(is_create = req.prior_state.is_empty(), "Plan called");

        let result = async {
            let prior_state = decode_json(&req.prior_state)?;
            let prior_state = (!prior_state.is_null()).then_some(prior_state);
            let proposed_state = decode_json(&req.proposed_state)?;
            let config = decode_json(&req.config)?;
            self.provider
                .plan(&req.resource_type, prior_state, proposed_state, config)
                .await
        }
        .await;

        let response = match result {
            Ok(plan) => {
                info!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan completed"
                );
                proto::PlanResponse {
                    planned_state: encode_json(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: Vec::new(),
                }
            }
            Err(err) => proto::PlanResponse {
                planned_state: Vec::new(),
                changes: Vec::new(),
                requires_replace: false,
                diagnostics: error_to_proto("Plan", &req.resource_type, err),
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type = %request.get_ref().resource_type))]
    async fn create(
        &self,
        request: tonic::Request<proto::CreateRequest>,
    ) -> Result<tonic::Response<proto::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.planned_state) {
            Ok(planned) => self.provider.create(&req.resource_type, planned).await,
            Err(err) => Err(err),
        };
        let (state, diagnostics) = state_response("Create", &req.resource_type, result);
        Ok(tonic::Response::new(proto::CreateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type = %request.get_ref().resource_type))]
    async fn read(
        &self,
        request: tonic::Request<proto::ReadRequest>,
    ) -> Result<tonic::Response<proto::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.current_state) {
            Ok(current) => self.provider.read(&req.resource_type, current).await,
            Err(err) => Err(err),
        };
        let (state, diagnostics) = state_response("Read", &req.resource_type, result);
        Ok(tonic::Response::new(proto::ReadResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type = %request.get_ref().resource_type))]
    async fn update(
        &self,
        request: tonic::Request<proto::UpdateRequest>,
    ) -> Result<tonic::Response<proto::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = async {
            let prior = decode_json(&req.prior_state)?;
            let planned = decode_json(&req.planned_state)?;
            self.provider.update(&req.resource_type, prior, planned).await
        }
        .await;
        let (state, diagnostics) = state_response("Update", &req.resource_type, result);
        Ok(tonic::Response::new(proto::UpdateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type = %request.get_ref().resource_type))]
    async fn delete(
        &self,
        request: tonic::Request<proto::DeleteRequest>,
    ) -> Result<tonic::Response<proto::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.current_state) {
            Ok(current) => self.provider.delete(&req.resource_type, current).await,
            Err(err) => Err(err),
        };
        let diagnostics = match result {
            Ok(()) => {
                info!("Delete completed");
                Vec::new()
            }
            Err(err) => error_to_proto("Delete", &req.resource_type, err),
        };
        Ok(tonic::Response::new(proto::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type = %request.get_ref().resource_type, id = %request.get_ref().id))]
    async fn import_resource_state(
        &self,
        request: tonic::Request<proto::ImportResourceStateRequest>,
    ) -> Result<tonic::Response<proto::ImportResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(imported = imported.len(), "ImportResourceState completed");
                proto::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| proto::ImportedResource {
                            resource_type: r.resource_type,
                            state: encode_json(&r.state),
                        })
                        .collect(),
                    diagnostics: Vec::new(),
                }
            }
            Err(err) => proto::ImportResourceStateResponse {
                imported: Vec::new(),
                diagnostics: error_to_proto("ImportResourceState", &req.resource_type, err),
            },
        };
        Ok(tonic::Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type = %request.get_ref().data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<proto::ValidateDataSourceConfigRequest>,
    ) -> Result<tonic::Response<proto::ValidateDataSourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config) {
            Ok(config) => {
                self.provider
                    .validate_data_source_config(&req.data_source_type, config)
                    .await
            }
            Err(err) => Err(err),
        };
        Ok(tonic::Response::new(proto::ValidateDataSourceConfigResponse {
            diagnostics: report("ValidateDataSourceConfig", &req.data_source_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type = %request.get_ref().data_source_type))]
    async fn read_data_source(
        &self,
        request: tonic::Request<proto::ReadDataSourceRequest>,
    ) -> Result<tonic::Response<proto::ReadDataSourceResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = match decode_json(&req.config) {
            Ok(config) => {
                self.provider
                    .read_data_source(&req.data_source_type, config)
                    .await
            }
            Err(err) => Err(err),
        };
        let (state, diagnostics) = state_response("ReadDataSource", &req.data_source_type, result);
        Ok(tonic::Response::new(proto::ReadDataSourceResponse { state, diagnostics }))
    }
}

/// Options for running the plugin server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Wait for SIGTERM or SIGINT (CTRL+C elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("Received SIGINT, shutting down"),
                }
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "Failed to install signal handlers, waiting for CTRL+C");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        info!("Received CTRL+C, shutting down");
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// The handshake `PROVIDER_PLUGIN|<version>|<address>` is printed on stdout
/// once the port is bound.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), ProviderError> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve a provider on an ephemeral localhost port with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options).await
}

/// Serve a provider on a fixed address.
pub async fn serve_on<P: ProviderService>(provider: P, addr: SocketAddr) -> Result<(), ProviderError> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve a provider on a fixed address with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, options).await
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
) -> Result<(), ProviderError> {
    let addr = listener.local_addr()?;
    println!("{}", handshake_line(&addr));
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = proto::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                wait_for_shutdown_signal().await;
                let _ = signalled_tx.send(());
            },
        );
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        Ok(()) = signalled_rx => {
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(
                    timeout = ?options.shutdown_timeout,
                    "Shutdown timeout exceeded, dropping in-flight requests"
                ),
            }
        }
    }

    if let Err(err) = provider.stop().await {
        warn!(error = %err, "Provider stop returned an error");
    }

    info!("Provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Presence};

    #[test]
    fn test_decode_json() {
        assert_eq!(decode_json(b"").unwrap(), Value::Null);
        assert_eq!(decode_json(br#"{"id":"a"}"#).unwrap()["id"], "a");
        assert!(matches!(
            decode_json(b"{not json").unwrap_err(),
            ProviderError::Serialization(_)
        ));
    }

    #[test]
    fn test_diagnostics_to_proto() {
        let proto = diagnostics_to_proto(vec![
            Diagnostic::warning("DNS API Disabled"),
            Diagnostic::error("Invalid value for 'type'").with_attribute("type"),
        ]);
        assert_eq!(proto[0].severity, proto::diagnostic::Severity::Warning as i32);
        assert_eq!(proto[1].severity, proto::diagnostic::Severity::Error as i32);
        assert_eq!(proto[1].attribute, "type");
        assert!(proto[0].detail.is_empty());
    }

    #[test]
    fn test_error_to_proto_uses_category() {
        let proto = error_to_proto(
            "Read",
            "hetzner_dns_zone",
            ProviderError::PermissionDenied("HTTP 401: invalid token".to_string()),
        );
        assert_eq!(proto.len(), 1);
        assert_eq!(proto[0].summary, "Permission Denied");
        assert_eq!(proto[0].detail, "HTTP 401: invalid token");
    }

    #[test]
    fn test_schema_to_proto_is_sorted_and_keeps_allowed_values() {
        let schema = Schema::new("record")
            .attribute_named("value", Attribute::string(Presence::Required))
            .attribute_named(
                "type",
                Attribute::string(Presence::Required).one_of(["A", "TXT"]),
            )
            .attribute_named("id", Attribute::string(Presence::Computed));

        let proto = schema_to_proto(&schema);
        let block = proto.block.unwrap();
        let names: Vec<_> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "type", "value"]);
        assert_eq!(block.attributes[1].allowed_values, vec!["A", "TXT"]);
        assert_eq!(block.attributes[0].r#type, b"\"string\"");
        assert!(block.attributes[0].computed && !block.attributes[0].optional);
        assert_eq!(block.description, "record");
    }

    #[test]
    fn test_serve_options() {
        assert_eq!(ServeOptions::new().shutdown_timeout, Duration::from_secs(30));
        let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
    }
}
