//! Provider configuration.
//!
//! The host sends the provider block as JSON. Every setting may also come
//! from the environment; a value set in the configuration always wins.

use serde::Deserialize;

use crate::schema::{Attribute, Diagnostic, Presence, Schema};

/// Environment variable that enables or disables the DNS API.
pub const ENV_DNS_API_ENABLED: &str = "HETZNER_DNS_API_ENABLED";

/// Environment variable holding the DNS API token.
pub const ENV_DNS_API_TOKEN: &str = "HETZNER_DNS_API_TOKEN";

/// The provider block as sent by the host.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub dns_api_enabled: Option<bool>,
    #[serde(default)]
    pub dns_api_token: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("dns_api_enabled", &self.dns_api_enabled)
            .field(
                "dns_api_token",
                &self.dns_api_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Raw values of the configuration environment variables.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvDefaults {
    pub dns_api_enabled: Option<String>,
    pub dns_api_token: Option<String>,
}

impl std::fmt::Debug for EnvDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvDefaults")
            .field("dns_api_enabled", &self.dns_api_enabled)
            .field(
                "dns_api_token",
                &self.dns_api_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl EnvDefaults {
    /// Capture the variables from the process environment.
    pub fn from_env() -> Self {
        Self {
            dns_api_enabled: std::env::var(ENV_DNS_API_ENABLED).ok(),
            dns_api_token: std::env::var(ENV_DNS_API_TOKEN).ok(),
        }
    }
}

/// How the DNS API is to be used after configuration.
#[derive(Clone, PartialEq, Eq)]
pub enum DnsSettings {
    Enabled { token: String },
    Disabled,
}

impl std::fmt::Debug for DnsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DnsSettings::Enabled { .. } => f.write_str("Enabled { token: <redacted> }"),
            DnsSettings::Disabled => f.write_str("Disabled"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::new("Hetzner provider configuration.")
            .attribute_named(
                "dns_api_enabled",
                Attribute::bool(Presence::Optional).described(format!(
                    "Enable the Hetzner DNS API. Defaults to true. Can also be set with {}.",
                    ENV_DNS_API_ENABLED
                )),
            )
            .attribute_named(
                "dns_api_token",
                Attribute::string(Presence::Optional)
                    .sensitive()
                    .described(format!(
                        "Hetzner DNS API token. Can also be set with {}.",
                        ENV_DNS_API_TOKEN
                    )),
            )
    }

    /// Combine the configuration with the environment.
    ///
    /// Every problem found is reported; any error diagnostic means no
    /// settings are produced.
    pub fn resolve(&self, env: &EnvDefaults) -> Result<DnsSettings, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let enabled = match (self.dns_api_enabled, env.dns_api_enabled.as_deref()) {
            (Some(enabled), _) => enabled,
            (None, Some(raw)) => parse_bool(raw).unwrap_or_else(|| {
                diagnostics.push(
                    Diagnostic::error("Invalid DNS API switch")
                        .with_detail(format!(
                            "{} must be true or false, got {:?}",
                            ENV_DNS_API_ENABLED, raw
                        ))
                        .with_attribute("dns_api_enabled"),
                );
                true
            }),
            (None, None) => true,
        };

        let token = self
            .dns_api_token
            .as_deref()
            .or(env.dns_api_token.as_deref())
            .map(str::trim)
            .filter(|token| !token.is_empty());

        if enabled && token.is_none() {
            diagnostics.push(
                Diagnostic::error("Missing Hetzner DNS API Token")
                    .with_detail(format!(
                        "The provider cannot create the Hetzner DNS API client because the token \
                         is missing or empty. Set dns_api_token in the provider configuration or \
                         the {} environment variable, or disable the DNS API with \
                         dns_api_enabled = false.",
                        ENV_DNS_API_TOKEN
                    ))
                    .with_attribute("dns_api_token"),
            );
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(match token {
            Some(token) if enabled => DnsSettings::Enabled {
                token: token.to_string(),
            },
            _ => DnsSettings::Disabled,
        })
    }
}
