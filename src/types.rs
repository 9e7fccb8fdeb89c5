//! Plain Rust counterparts of the protocol messages exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attribute whose planned value differs from the prior state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// Prior value; `None` when the attribute is being set.
    pub before: Option<Value>,
    /// Planned value; `None` when the attribute is being cleared.
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Whether the change replaces an existing value.
    pub fn is_modification(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }
}

fn encode_optional(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            before: decode_optional(&proto.before),
            after: decode_optional(&proto.after),
            path: proto.path,
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_optional(change.before),
            after: encode_optional(change.after),
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation. Null when the resource is destroyed.
    pub planned_state: Value,
    /// Attributes whose value differs from the prior state.
    pub changes: Vec<AttributeChange>,
    /// Whether a changed attribute forces the resource to be recreated.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves the resource untouched.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan carrying attribute changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// A resource produced by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state, refreshed by a subsequent Read.
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Names and capabilities answered by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Provider type name, the prefix of every resource and data source name.
    pub type_name: String,
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider is asked to plan destroy operations.
    pub plan_destroy: bool,
}

/// The protocol version announced in the handshake line.
pub const PROTOCOL_VERSION: u32 = 1;

/// The first field of the handshake line printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "PROVIDER_PLUGIN";

/// The full handshake line for a server listening on `addr`.
pub fn handshake_line(addr: &std::net::SocketAddr) -> String {
    format!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr)
}
