//! DNS zone model and its mapping to the API representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{null_as_default, ApiZone, DnsError, ZoneRequest};
use crate::schema::{Attribute, AttributeType, Presence, Schema};

/// Verification state of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    Verified,
    Failed,
    Pending,
}

impl ZoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneStatus::Verified => "verified",
            ZoneStatus::Failed => "failed",
            ZoneStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneStatus {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(ZoneStatus::Verified),
            "failed" => Ok(ZoneStatus::Failed),
            "pending" => Ok(ZoneStatus::Pending),
            other => Err(DnsError::UnexpectedValue {
                entity: "zone",
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A DNS zone as held in host state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub status: Option<ZoneStatus>,
    #[serde(default)]
    pub paused: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ns: Vec<String>,
}

impl Zone {
    /// Non-empty local identifier, if any.
    pub fn known_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Non-empty local name, if any.
    pub fn known_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Build the create/update body.
    pub fn to_remote(&self) -> Result<ZoneRequest, DnsError> {
        let name = self.known_name().ok_or_else(|| DnsError::missing("Name"))?;
        Ok(ZoneRequest {
            name: name.to_string(),
            ttl: self.ttl,
        })
    }

    /// Merge an API zone into this one.
    ///
    /// The identifier is only taken from the response when no non-empty one
    /// is set locally. `name` and `status` must be present and every problem
    /// with them is reported together; `paused` defaults to false, `ns` to
    /// empty and `ttl` to the local value.
    pub fn reconcile(&mut self, remote: ApiZone) -> Result<(), DnsError> {
        let missing = |field: &'static str| DnsError::MissingField {
            entity: "zone",
            field,
        };
        let mut errors = Vec::new();

        let id = match self.known_id() {
            Some(id) => Some(id.to_string()),
            None => remote.id.filter(|id| !id.is_empty()),
        };
        if id.is_none() {
            errors.push(missing("id"));
        }
        if remote.name.is_none() {
            errors.push(missing("name"));
        }
        let status = match remote.status.as_deref().map(str::parse::<ZoneStatus>) {
            Some(Ok(status)) => Some(status),
            Some(Err(err)) => {
                errors.push(err);
                None
            }
            None => {
                errors.push(missing("status"));
                None
            }
        };
        DnsError::collect(errors)?;

        self.id = id;
        self.name = remote.name;
        self.status = status;
        self.ttl = remote.ttl.or(self.ttl);
        self.paused = Some(remote.paused.unwrap_or(false));
        self.ns = remote.ns.unwrap_or_default();
        Ok(())
    }

    /// Map an API zone with no local counterpart.
    pub fn from_remote(remote: ApiZone) -> Result<Zone, DnsError> {
        let mut zone = Zone::default();
        zone.reconcile(remote)?;
        Ok(zone)
    }

    /// Pick the single zone a name lookup is allowed to resolve to.
    pub fn resolve_by_name(name: &str, mut matches: Vec<ApiZone>) -> Result<ApiZone, DnsError> {
        match matches.len() {
            0 => Err(DnsError::ZoneNotFound(name.to_string())),
            1 => Ok(matches.remove(0)),
            count => Err(DnsError::AmbiguousZone {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// Schema of the `hetzner_dns_zone` resource.
    pub fn resource_schema() -> Schema {
        Self::provider_assigned(Schema::new("Hetzner DNS zone."))
            .attribute_named("id", Attribute::string(Presence::Computed).described("Zone identifier"))
            .attribute_named("name", Attribute::string(Presence::Required).described("Zone name"))
            .attribute_named(
                "ttl",
                Attribute::int64(Presence::Required).described("Default TTL of the zone records"),
            )
    }

    /// Schema of the `hetzner_dns_zone` data source.
    pub fn data_source_schema() -> Schema {
        let lookup = |description: &str| {
            Attribute::string(Presence::OptionalComputed).described(description)
        };

        Self::provider_assigned(Schema::new("Lookup of a Hetzner DNS zone."))
            .attribute_named("id", lookup("Zone identifier"))
            .attribute_named("name", lookup("Zone name"))
            .attribute_named(
                "ttl",
                Attribute::int64(Presence::Computed).described("Default TTL of the zone records"),
            )
    }

    fn provider_assigned(schema: Schema) -> Schema {
        schema
            .attribute_named(
                "ns",
                Attribute::list(AttributeType::String, Presence::Computed)
                    .described("Primary nameservers assigned to the zone by Hetzner"),
            )
            .attribute_named(
                "paused",
                Attribute::bool(Presence::Computed).described("Whether the zone is paused"),
            )
            .attribute_named(
                "status",
                Attribute::string(Presence::Computed)
                    .described("Verification status: verified, failed or pending"),
            )
    }
}

/// Zones matching an optional name filter, as exposed by the
/// `hetzner_dns_zones` data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zones {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub zones: Vec<Zone>,
}

impl Zones {
    /// Replace the list with the mapped remote zones, collecting every
    /// integrity error.
    pub fn reconcile(&mut self, remote: Vec<ApiZone>) -> Result<(), DnsError> {
        let mut zones = Vec::with_capacity(remote.len());
        let mut errors = Vec::new();

        for api_zone in remote {
            match Zone::from_remote(api_zone) {
                Ok(zone) => zones.push(zone),
                Err(err) => errors.push(err),
            }
        }

        DnsError::collect(errors)?;
        self.zones = zones;
        Ok(())
    }

    /// Schema of the `hetzner_dns_zones` data source.
    pub fn data_source_schema() -> Schema {
        Schema::new("Hetzner DNS zones matching a name.")
            .attribute_named(
                "name",
                Attribute::string(Presence::Optional)
                    .described("Full or partial zone name to filter on"),
            )
            .attribute_named(
                "zones",
                Attribute::list(Zone::data_source_schema().object_type(), Presence::Computed)
                    .described("Zones matching the given name"),
            )
    }
}
