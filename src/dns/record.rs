//! DNS record model and its mapping to the API representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{null_as_default, ApiRecord, DnsError, RecordRequest};
use crate::schema::{Attribute, Presence, Schema};

/// Record types accepted by the Hetzner DNS API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Ns,
    Mx,
    Cname,
    Rp,
    Txt,
    Soa,
    Hinfo,
    Srv,
    Dane,
    Tlsa,
    Ds,
    Caa,
}

impl RecordType {
    /// Every supported type, in the order they are advertised.
    pub const ALL: [RecordType; 14] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Ns,
        RecordType::Mx,
        RecordType::Cname,
        RecordType::Rp,
        RecordType::Txt,
        RecordType::Soa,
        RecordType::Hinfo,
        RecordType::Srv,
        RecordType::Dane,
        RecordType::Tlsa,
        RecordType::Ds,
        RecordType::Caa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Ns => "NS",
            RecordType::Mx => "MX",
            RecordType::Cname => "CNAME",
            RecordType::Rp => "RP",
            RecordType::Txt => "TXT",
            RecordType::Soa => "SOA",
            RecordType::Hinfo => "HINFO",
            RecordType::Srv => "SRV",
            RecordType::Dane => "DANE",
            RecordType::Tlsa => "TLSA",
            RecordType::Ds => "DS",
            RecordType::Caa => "CAA",
        }
    }

    /// The accepted set joined with commas, for error messages.
    pub fn supported_values() -> String {
        Self::ALL
            .iter()
            .map(RecordType::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Encode a local value for the wire.
    pub fn encode_value(&self, value: &str) -> String {
        match self {
            RecordType::Txt => format!("\"{}\"", value),
            _ => value.to_string(),
        }
    }

    /// Decode a wire value into its local form.
    pub fn decode_value<'a>(&self, value: &'a str) -> &'a str {
        match self {
            RecordType::Txt => {
                let value = value.strip_prefix('"').unwrap_or(value);
                value.strip_suffix('"').unwrap_or(value)
            }
            _ => value,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DnsError::InvalidRecordType {
                value: Some(s.to_string()),
            })
    }
}

/// A DNS record as held in host state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl Record {
    /// Parse the record type, rejecting unset and unsupported values.
    pub fn validated_type(&self) -> Result<RecordType, DnsError> {
        match self.record_type.as_deref() {
            Some(value) => value.parse(),
            None => Err(DnsError::InvalidRecordType { value: None }),
        }
    }

    /// Build the create/update body. TXT values are quoted.
    pub fn to_remote(&self) -> Result<RecordRequest, DnsError> {
        let record_type = self.validated_type()?;
        let zone_id = self.zone_id.clone().ok_or_else(|| DnsError::missing("Zone ID"))?;
        let name = self.name.clone().ok_or_else(|| DnsError::missing("Name"))?;
        let value = self.value.as_deref().ok_or_else(|| DnsError::missing("Value"))?;

        Ok(RecordRequest {
            zone_id,
            record_type: record_type.to_string(),
            name,
            value: record_type.encode_value(value),
            ttl: self.ttl,
        })
    }

    /// Map an API record into local form.
    ///
    /// Fails when any of `id`, `name`, `type`, `value` or `zone_id` is
    /// missing. The TTL is taken as returned and may be `None`.
    pub fn from_remote(remote: ApiRecord) -> Result<Record, DnsError> {
        let require = |value: Option<String>, field: &'static str| {
            value.ok_or(DnsError::MissingField {
                entity: "record",
                field,
            })
        };

        let id = require(remote.id, "id")?;
        let name = require(remote.name, "name")?;
        let record_type = require(remote.record_type, "type")?;
        let value = require(remote.value, "value")?;
        let zone_id = require(remote.zone_id, "zone_id")?;

        let value = match record_type.parse::<RecordType>() {
            Ok(t) => t.decode_value(&value).to_string(),
            Err(_) => value,
        };

        Ok(Record {
            id: Some(id),
            record_type: Some(record_type),
            zone_id: Some(zone_id),
            name: Some(name),
            value: Some(value),
            ttl: remote.ttl,
        })
    }

    /// Replace this record with the remote one, keeping the local TTL when
    /// the response omits it.
    pub fn reconcile(&mut self, remote: ApiRecord) -> Result<(), DnsError> {
        let mut mapped = Record::from_remote(remote)?;
        mapped.ttl = mapped.ttl.or(self.ttl);
        *self = mapped;
        Ok(())
    }

    /// Schema of the `hetzner_dns_record` resource.
    pub fn resource_schema() -> Schema {
        Schema::new("Hetzner DNS record.")
            .attribute_named(
                "id",
                Attribute::string(Presence::Computed).described("Record identifier"),
            )
            .attribute_named(
                "type",
                Attribute::string(Presence::Required)
                    .described(format!(
                        "Record type. Supported values: [{}]",
                        RecordType::supported_values()
                    ))
                    .one_of(RecordType::ALL.iter().map(RecordType::as_str)),
            )
            .attribute_named(
                "zone_id",
                Attribute::string(Presence::Required)
                    .described("Zone identifier that the record belongs to")
                    .force_new(),
            )
            .attribute_named("name", Attribute::string(Presence::Required).described("Record name"))
            .attribute_named("value", Attribute::string(Presence::Required).described("Record value"))
            .attribute_named("ttl", Attribute::int64(Presence::Required).described("Record TTL"))
    }

    /// Attributes of a record nested in the records data source.
    fn data_source_schema() -> Schema {
        let lookup = |description: &str| {
            Attribute::string(Presence::OptionalComputed).described(description)
        };

        Schema::default()
            .attribute_named("id", lookup("Record identifier"))
            .attribute_named("type", Attribute::string(Presence::Computed).described("Record type"))
            .attribute_named("zone_id", lookup("Zone identifier that the record belongs to"))
            .attribute_named("name", lookup("Record name"))
            .attribute_named("value", Attribute::string(Presence::Computed).described("Record value"))
            .attribute_named("ttl", Attribute::int64(Presence::Computed).described("Record TTL"))
    }
}

/// The records of one zone, as exposed by the `hetzner_dns_records` data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Records {
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub records: Vec<Record>,
}

impl Records {
    /// Replace the list with the mapped remote records.
    ///
    /// Every record is mapped; integrity errors are collected rather than
    /// stopping at the first one.
    pub fn reconcile(&mut self, remote: Vec<ApiRecord>) -> Result<(), DnsError> {
        let mut records = Vec::with_capacity(remote.len());
        let mut errors = Vec::new();

        for api_record in remote {
            match Record::from_remote(api_record) {
                Ok(record) => records.push(record),
                Err(err) => errors.push(err),
            }
        }

        DnsError::collect(errors)?;
        self.records = records;
        Ok(())
    }

    /// Schema of the `hetzner_dns_records` data source.
    pub fn data_source_schema() -> Schema {
        Schema::new("Records of a Hetzner DNS zone.")
            .attribute_named(
                "zone_id",
                Attribute::string(Presence::Required).described("Hetzner zone identifier"),
            )
            .attribute_named(
                "records",
                Attribute::list(Record::data_source_schema().object_type(), Presence::Computed)
                    .described("Records created in the zone"),
            )
    }
}
