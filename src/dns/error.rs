use thiserror::Error;

use super::RecordType;

/// Errors raised by the DNS mapping layer and the Hetzner API client.
#[derive(Debug, Error)]
pub enum DnsError {
    /// Local input is missing or inconsistent.
    #[error("{0}")]
    Configuration(String),

    /// The provider was configured with the DNS API switched off.
    #[error("DNS API is disabled, please enable it on the provider")]
    Disabled,

    /// A lookup by name matched no zone.
    #[error("Zone with name {0} can not be found")]
    ZoneNotFound(String),

    /// A lookup by name matched several zones.
    #[error("Found {count} zones containing {name}! Please provide the full domain name or the zone id")]
    AmbiguousZone { name: String, count: usize },

    /// The record type is unset or outside the supported set.
    #[error(
        "{}. Supported values: [{}]",
        describe_record_type(.value),
        RecordType::supported_values()
    )]
    InvalidRecordType { value: Option<String> },

    /// An identifier that cannot address exactly one API object.
    #[error("Invalid identifier {0:?}: expected a single path segment")]
    InvalidId(String),

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The request did not complete within the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request could not be sent or the response could not be received.
    #[error("request failed: {0}")]
    Network(String),

    /// A response body could not be decoded.
    #[error("failed to decode {context} response: {detail}")]
    Parse {
        context: &'static str,
        detail: String,
    },

    /// A response entity lacks a field the mapping requires.
    #[error("{entity} response is missing required field '{field}'")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    /// A response entity carries a value outside the known set.
    #[error("{entity} response carries unexpected {field} value {value:?}")]
    UnexpectedValue {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// Several errors collected while mapping a list.
    #[error("{} errors while mapping response", .0.len())]
    Multiple(Vec<DnsError>),
}

fn describe_record_type(value: &Option<String>) -> String {
    match value {
        Some(value) => format!("Unsupported record type {:?}", value),
        None => "Record type must be provided".to_string(),
    }
}

impl DnsError {
    /// Collapse a list of errors: none is `Ok`, one is itself, more are grouped.
    pub(crate) fn collect(mut errors: Vec<DnsError>) -> Result<(), DnsError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(DnsError::Multiple(errors)),
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        DnsError::Configuration(format!("{} must be provided!", field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_type_names_value_and_accepted_set() {
        let err = DnsError::InvalidRecordType {
            value: Some("PTR".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("\"PTR\""));
        assert!(message.contains("A,AAAA,NS,MX,CNAME,RP,TXT,SOA,HINFO,SRV,DANE,TLSA,DS,CAA"));

        let err = DnsError::InvalidRecordType { value: None };
        assert!(err.to_string().starts_with("Record type must be provided"));
    }

    #[test]
    fn test_ambiguous_zone_message() {
        let err = DnsError::AmbiguousZone {
            name: "example".to_string(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "Found 3 zones containing example! Please provide the full domain name or the zone id"
        );
    }

    #[test]
    fn test_collect() {
        assert!(DnsError::collect(Vec::new()).is_ok());

        let single = DnsError::collect(vec![DnsError::Disabled]).unwrap_err();
        assert!(matches!(single, DnsError::Disabled));

        let many = DnsError::collect(vec![DnsError::Disabled, DnsError::Disabled]).unwrap_err();
        assert!(matches!(many, DnsError::Multiple(ref errors) if errors.len() == 2));
    }
}
