//! Schemas of the provider block, the resources and the data sources.
//!
//! A [`Schema`] is a flat set of named attributes. It drives validation of
//! configuration, planning and the schema advertised through GetSchema.
//! Attributes are kept in name order so every consumer sees them the same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value type of an attribute, serialized as the type descriptor sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit signed integer.
    Int64,
    /// A boolean value.
    Bool,
    /// A list whose elements share one type.
    List(Box<AttributeType>),
    /// An object with fixed, named members.
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    /// A list of `element`.
    pub fn list_of(element: AttributeType) -> Self {
        AttributeType::List(Box::new(element))
    }
}

/// Who sets an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be configured.
    Required,
    /// May be configured; stays unset otherwise.
    Optional,
    /// Set by the provider only.
    Computed,
    /// May be configured; filled in by the provider otherwise.
    OptionalComputed,
}

impl Presence {
    /// Whether configuration must set the value.
    pub fn is_required(self) -> bool {
        self == Presence::Required
    }

    /// Whether configuration may leave the value unset.
    pub fn is_optional(self) -> bool {
        matches!(self, Presence::Optional | Presence::OptionalComputed)
    }

    /// Whether the provider may fill the value in.
    pub fn is_computed(self) -> bool {
        matches!(self, Presence::Computed | Presence::OptionalComputed)
    }

    /// Whether configuration can never set the value.
    pub fn is_computed_only(self) -> bool {
        self == Presence::Computed
    }
}

/// One attribute of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Type of the value.
    #[serde(rename = "type")]
    pub value_type: AttributeType,
    /// Whether configuration or the provider sets the value.
    pub presence: Presence,
    /// The value is hidden from plan output and logs.
    #[serde(default)]
    pub sensitive: bool,
    /// A change to the value replaces the remote object.
    #[serde(default)]
    pub force_new: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Accepted string values. Empty means any value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

impl Attribute {
    /// An attribute of the given type with no flags set.
    pub fn new(value_type: AttributeType, presence: Presence) -> Self {
        Self {
            value_type,
            presence,
            sensitive: false,
            force_new: false,
            description: None,
            allowed_values: Vec::new(),
        }
    }

    /// A string attribute.
    pub fn string(presence: Presence) -> Self {
        Self::new(AttributeType::String, presence)
    }

    /// An integer attribute.
    pub fn int64(presence: Presence) -> Self {
        Self::new(AttributeType::Int64, presence)
    }

    /// A boolean attribute.
    pub fn bool(presence: Presence) -> Self {
        Self::new(AttributeType::Bool, presence)
    }

    /// A list attribute whose elements are `element`.
    pub fn list(element: AttributeType, presence: Presence) -> Self {
        Self::new(AttributeType::list_of(element), presence)
    }

    /// Set the description.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Changing the value replaces the remote object instead of updating it.
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Hide the value from plan output and logs.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Restrict a string attribute to `values`.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// Attributes of a resource, a data source or the provider block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// State version. Both resources are at version 0.
    #[serde(default)]
    pub version: u64,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// An empty schema with a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Add or replace the attribute `name`.
    pub fn attribute_named(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// The schema as the element type of a list attribute.
    pub fn object_type(&self) -> AttributeType {
        AttributeType::Object(
            self.attributes
                .iter()
                .map(|(name, attribute)| (name.clone(), attribute.value_type.clone()))
                .collect(),
        )
    }
}

/// Everything advertised by GetSchema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchema {
    /// Schema of the provider block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// A provider schema with no resources or data sources yet.
    pub fn new(provider: Schema) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Register a resource type.
    pub fn resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register a data source type.
    pub fn data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// How a diagnostic affects the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation failed.
    Error,
    /// The operation went ahead; the host shows the message.
    Warning,
}

/// A problem reported to the host, optionally tied to an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Short headline.
    pub summary: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path of the offending attribute, such as `zones.0.ttl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a detail message.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Tie the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence() {
        assert!(Presence::Required.is_required());
        assert!(!Presence::Required.is_computed());
        assert!(Presence::Computed.is_computed_only());
        assert!(Presence::OptionalComputed.is_optional());
        assert!(Presence::OptionalComputed.is_computed());
        assert!(!Presence::OptionalComputed.is_computed_only());
    }

    #[test]
    fn test_attribute_builders() {
        let zone_id = Attribute::string(Presence::Required)
            .described("Zone identifier that record belongs to")
            .force_new();
        assert_eq!(zone_id.value_type, AttributeType::String);
        assert!(zone_id.force_new);
        assert!(zone_id.allowed_values.is_empty());

        let record_type = Attribute::string(Presence::Required).one_of(["A", "TXT"]);
        assert_eq!(record_type.allowed_values, vec!["A", "TXT"]);
    }

    #[test]
    fn test_type_descriptor_json() {
        let descriptor = serde_json::to_value(AttributeType::list_of(AttributeType::String)).unwrap();
        assert_eq!(descriptor, serde_json::json!({"list": "string"}));
    }

    #[test]
    fn test_object_type_and_order() {
        let schema = Schema::new("record")
            .attribute_named("value", Attribute::string(Presence::Required))
            .attribute_named("ttl", Attribute::int64(Presence::Required));

        let names: Vec<_> = schema.attributes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ttl", "value"]);

        let AttributeType::Object(members) = schema.object_type() else {
            panic!("expected object type");
        };
        assert_eq!(members.get("ttl"), Some(&AttributeType::Int64));
    }

    #[test]
    fn test_provider_schema() {
        let schema = ProviderSchema::new(Schema::new("provider").attribute_named(
            "dns_api_token",
            Attribute::string(Presence::Optional).sensitive(),
        ))
        .resource("hetzner_dns_zone", Schema::default())
        .data_source("hetzner_dns_zones", Schema::default());

        assert!(schema.provider.attribute("dns_api_token").unwrap().sensitive);
        assert!(schema.resources.contains_key("hetzner_dns_zone"));
        assert!(schema.data_sources.contains_key("hetzner_dns_zones"));
    }

    #[test]
    fn test_has_errors() {
        let err = Diagnostic::error("Missing Hetzner DNS API Token").with_attribute("dns_api_token");
        assert!(has_errors(&[Diagnostic::warning("DNS API Disabled"), err]));
        assert!(!has_errors(&[Diagnostic::warning("DNS API Disabled")]));
    }
}
