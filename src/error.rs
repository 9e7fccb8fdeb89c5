//! Errors at the host boundary.
//!
//! Provider operations return [`ProviderError`]. The gRPC adapter turns it
//! into diagnostics whose summary is [`ProviderError::category`] and whose
//! detail is [`ProviderError::message`].

use thiserror::Error;

use crate::dns::DnsError;
use crate::schema::Diagnostic;

#[derive(Debug, Error)]
pub enum ProviderError {
    // Input problems, caught before the Hetzner API is called.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    UnknownResource(String),
    /// The provider was used before Configure succeeded.
    #[error("not ready: {0}")]
    FailedPrecondition(String),

    // Failures reported by the Hetzner API, by status.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("rate limited: {0}")]
    ResourceExhausted(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("timed out: {0}")]
    DeadlineExceeded(String),
    #[error("rejected: {0}")]
    InvalidRequest(String),
    #[error("Hetzner client error: {0}")]
    Remote(String),
    /// A response lacked a required field or could not be decoded.
    #[error("inconsistent response: {0}")]
    ResponseIntegrity(String),

    // Local plumbing.
    #[error("invalid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("gRPC transport: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("socket: {0}")]
    Io(#[from] std::io::Error),

    /// Every problem found by one operation.
    #[error("{} error(s) reported", .0.len())]
    Diagnostics(Vec<Diagnostic>),
}

impl ProviderError {
    /// The message without its category.
    pub fn message(&self) -> String {
        match self {
            Self::Configuration(msg)
            | Self::Validation(msg)
            | Self::UnknownResource(msg)
            | Self::FailedPrecondition(msg)
            | Self::NotFound(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::InvalidRequest(msg)
            | Self::Remote(msg)
            | Self::ResponseIntegrity(msg) => msg.clone(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
            Self::Io(err) => err.to_string(),
            Self::Diagnostics(diagnostics) => diagnostics
                .iter()
                .map(|d| d.summary.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Diagnostic summary shown by the host.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Configuration Error",
            Self::Validation(_) => "Validation Error",
            Self::UnknownResource(_) => "Unknown Resource Type",
            Self::FailedPrecondition(_) => "Failed Precondition",
            Self::NotFound(_) => "Resource Not Found",
            Self::AlreadyExists(_) => "Resource Already Exists",
            Self::PermissionDenied(_) => "Permission Denied",
            Self::ResourceExhausted(_) => "Rate Limit Exceeded",
            Self::Unavailable(_) => "Service Unavailable",
            Self::DeadlineExceeded(_) => "Deadline Exceeded",
            Self::InvalidRequest(_) => "Invalid Request",
            Self::Remote(_) => "Hetzner Client Error",
            Self::ResponseIntegrity(_) => "Inconsistent API Response",
            Self::Serialization(_) => "Serialization Error",
            Self::Transport(_) | Self::Io(_) => "Transport Error",
            Self::Diagnostics(_) => "Multiple Errors",
        }
    }

    pub fn code(&self) -> tonic::Code {
        use tonic::Code;
        match self {
            Self::Configuration(_) | Self::FailedPrecondition(_) => Code::FailedPrecondition,
            Self::Validation(_)
            | Self::InvalidRequest(_)
            | Self::Serialization(_)
            | Self::Diagnostics(_) => Code::InvalidArgument,
            Self::UnknownResource(_) | Self::NotFound(_) => Code::NotFound,
            Self::AlreadyExists(_) => Code::AlreadyExists,
            Self::PermissionDenied(_) => Code::PermissionDenied,
            Self::ResourceExhausted(_) => Code::ResourceExhausted,
            Self::Unavailable(_) | Self::Transport(_) | Self::Io(_) => Code::Unavailable,
            Self::DeadlineExceeded(_) => Code::DeadlineExceeded,
            Self::Remote(_) => Code::Unknown,
            Self::ResponseIntegrity(_) => Code::DataLoss,
        }
    }

    /// One diagnostic per problem.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::Diagnostics(diagnostics) => diagnostics,
            other => vec![Diagnostic::error(other.category()).with_detail(other.message())],
        }
    }
}

impl From<DnsError> for ProviderError {
    fn from(err: DnsError) -> Self {
        let message = err.to_string();
        match err {
            DnsError::Configuration(_)
            | DnsError::Disabled
            | DnsError::ZoneNotFound(_)
            | DnsError::AmbiguousZone { .. } => Self::Configuration(message),
            DnsError::InvalidRecordType { .. } | DnsError::InvalidId(_) => {
                Self::Validation(message)
            }
            DnsError::Api { status, .. } => match status {
                401 | 403 => Self::PermissionDenied(message),
                404 => Self::NotFound(message),
                409 => Self::AlreadyExists(message),
                400 | 422 => Self::InvalidRequest(message),
                429 => Self::ResourceExhausted(message),
                500..=599 => Self::Unavailable(message),
                _ => Self::Remote(message),
            },
            DnsError::Timeout(_) => Self::DeadlineExceeded(message),
            DnsError::Network(_) => Self::Remote(message),
            DnsError::Parse { .. } | DnsError::MissingField { .. } | DnsError::UnexpectedValue { .. } => {
                Self::ResponseIntegrity(message)
            }
            DnsError::Multiple(errors) => Self::Diagnostics(
                errors
                    .into_iter()
                    .flat_map(|e| Self::from(e).into_diagnostics())
                    .collect(),
            ),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        tonic::Status::new(err.code(), err.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> DnsError {
        DnsError::Api {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_display_keeps_remote_label() {
        let err = ProviderError::Remote("HTTP 418: teapot".to_string());
        assert_eq!(err.to_string(), "Hetzner client error: HTTP 418: teapot");

        let err = ProviderError::Diagnostics(vec![Diagnostic::error("a"), Diagnostic::error("b")]);
        assert_eq!(err.to_string(), "2 error(s) reported");
        assert_eq!(err.message(), "a; b");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ProviderError::NotFound("x".into()), tonic::Code::NotFound),
            (ProviderError::Configuration("x".into()), tonic::Code::FailedPrecondition),
            (ProviderError::ResponseIntegrity("x".into()), tonic::Code::DataLoss),
            (ProviderError::ResourceExhausted("x".into()), tonic::Code::ResourceExhausted),
            (ProviderError::Remote("x".into()), tonic::Code::Unknown),
        ];
        for (err, code) in cases {
            let status = tonic::Status::from(err);
            assert_eq!(status.code(), code);
            assert_eq!(status.message(), "x");
        }
    }

    #[test]
    fn test_into_diagnostics() {
        let diagnostics = ProviderError::Remote("HTTP 418: teapot".to_string()).into_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Hetzner Client Error");
        assert_eq!(diagnostics[0].detail.as_deref(), Some("HTTP 418: teapot"));
        assert!(diagnostics[0].is_error());

        let expanded =
            ProviderError::Diagnostics(vec![Diagnostic::error("first"), Diagnostic::error("second")])
                .into_diagnostics();
        assert_eq!(expanded[1].summary, "second");
    }

    #[test]
    fn test_api_status_categories() {
        assert!(matches!(ProviderError::from(api(401)), ProviderError::PermissionDenied(_)));
        assert!(matches!(ProviderError::from(api(403)), ProviderError::PermissionDenied(_)));
        assert!(matches!(ProviderError::from(api(404)), ProviderError::NotFound(_)));
        assert!(matches!(ProviderError::from(api(409)), ProviderError::AlreadyExists(_)));
        assert!(matches!(ProviderError::from(api(400)), ProviderError::InvalidRequest(_)));
        assert!(matches!(ProviderError::from(api(422)), ProviderError::InvalidRequest(_)));
        assert!(matches!(ProviderError::from(api(429)), ProviderError::ResourceExhausted(_)));
        assert!(matches!(ProviderError::from(api(503)), ProviderError::Unavailable(_)));
        assert!(matches!(ProviderError::from(api(418)), ProviderError::Remote(_)));
        assert!(matches!(
            ProviderError::from(DnsError::InvalidId("../records".into())),
            ProviderError::Validation(_)
        ));
        assert!(matches!(
            ProviderError::from(DnsError::Timeout("30s elapsed".into())),
            ProviderError::DeadlineExceeded(_)
        ));
    }

    #[test]
    fn test_api_message_is_verbatim() {
        let err = ProviderError::from(DnsError::Api {
            status: 404,
            message: "zone not found".to_string(),
        });
        assert_eq!(err.message(), "HTTP 404: zone not found");
    }

    #[test]
    fn test_configuration_and_integrity_categories() {
        let err = ProviderError::from(DnsError::AmbiguousZone {
            name: "example.com".to_string(),
            count: 2,
        });
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains("Found 2 zones"));

        let err = ProviderError::from(DnsError::MissingField {
            entity: "record",
            field: "zone_id",
        });
        assert!(matches!(err, ProviderError::ResponseIntegrity(_)));

        let err = ProviderError::from(DnsError::Multiple(vec![
            DnsError::MissingField {
                entity: "record",
                field: "id",
            },
            DnsError::MissingField {
                entity: "record",
                field: "value",
            },
        ]));
        assert_eq!(err.into_diagnostics().len(), 2);
    }
}
