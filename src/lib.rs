//! Hetzner DNS provider plugin.
//!
//! The plugin manages Hetzner DNS zones and records for an infrastructure
//! host that speaks the gRPC provider protocol in `proto/provider.proto`.
//!
//! # Layout
//!
//! - [`dns`]: the Hetzner DNS API client, the zone and record models and the
//!   services combining them
//! - [`provider`]: [`HetznerProvider`], routing resources and data sources to
//!   the DNS services
//! - [`server`]: the [`ProviderService`] trait and the gRPC server with its
//!   handshake
//! - [`schema`], [`validation`] and [`plan`]: schema description, checking of
//!   configuration against it and schema-driven planning
//! - [`config`]: the provider block and its environment fallbacks
//!
//! # Resources and data sources
//!
//! | Name | Kind |
//! |------|------|
//! | `hetzner_dns_zone` | resource, data source |
//! | `hetzner_dns_record` | resource |
//! | `hetzner_dns_zones` | data source |
//! | `hetzner_dns_records` | data source |
//!
//! # Handshake
//!
//! Once the port is bound the plugin prints one line on stdout:
//!
//! ```text
//! PROVIDER_PLUGIN|1|127.0.0.1:50051
//! ```
//!
//! Everything else, logs included, goes to stderr.
//!
//! # Embedding
//!
//! ```ignore
//! use hetzner_provider::{serve, HetznerProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hetzner_provider::ProviderError> {
//!     hetzner_provider::init_logging(false);
//!     serve(HetznerProvider::new()).await
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use config::{DnsSettings, EnvDefaults, ProviderConfig};
pub use error::ProviderError;
pub use logging::init_logging;
pub use provider::HetznerProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    handshake_line, AttributeChange, ImportedResource, PlanResult, ProviderMetadata,
    ServerCapabilities, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
