//! Checking configuration documents against a [`Schema`].
//!
//! ```
//! use hetzner_provider::schema::{Attribute, Presence, Schema};
//! use hetzner_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new("record")
//!     .attribute_named("type", Attribute::string(Presence::Required).one_of(["A", "TXT"]))
//!     .attribute_named("ttl", Attribute::int64(Presence::Required));
//!
//! assert!(validate(&schema, &json!({"type": "TXT", "ttl": 300})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"type": "PTR", "ttl": 300}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("type"));
//! ```

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};

/// Check `document` against `schema`, one diagnostic per problem, in
/// attribute name order.
///
/// A `Null` document counts as an empty object. Computed-only attributes are
/// never checked.
pub fn validate(schema: &Schema, document: &Value) -> Vec<Diagnostic> {
    let empty = serde_json::Map::new();
    let object = match document {
        Value::Object(object) => object,
        Value::Null => &empty,
        other => {
            return vec![Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", kind(other)))]
        }
    };

    let mut diagnostics = Vec::new();
    for (name, attribute) in &schema.attributes {
        if attribute.presence.is_computed_only() {
            continue;
        }
        match object.get(name).filter(|v| !v.is_null()) {
            None if attribute.presence.is_required() => {
                diagnostics.push(missing(name, attribute));
            }
            None => {}
            Some(value) => {
                let before = diagnostics.len();
                check_type(&attribute.value_type, value, name, &mut diagnostics);
                if diagnostics.len() == before {
                    if let Some(diagnostic) = unsupported(name, attribute, value) {
                        diagnostics.push(diagnostic);
                    }
                }
            }
        }
    }
    diagnostics
}

/// [`validate`], as a `Result`.
pub fn validate_result(schema: &Schema, document: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, document);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

pub fn is_valid(schema: &Schema, document: &Value) -> bool {
    validate(schema, document).is_empty()
}

fn missing(name: &str, attribute: &Attribute) -> Diagnostic {
    let detail = if attribute.allowed_values.is_empty() {
        "This attribute is required and must be provided".to_string()
    } else {
        format!(
            "Please provide supported value for the field. Supported values: [{}]",
            attribute.allowed_values.join(",")
        )
    };
    Diagnostic::error(format!("Missing required attribute '{}'", name))
        .with_detail(detail)
        .with_attribute(name)
}

fn unsupported(name: &str, attribute: &Attribute, value: &Value) -> Option<Diagnostic> {
    let value = value.as_str()?;
    if attribute.allowed_values.is_empty() || attribute.allowed_values.iter().any(|v| v == value) {
        return None;
    }
    Some(
        Diagnostic::error(format!("Invalid value for '{}'", name))
            .with_detail(format!(
                "Please provide supported value for the field. Current Value: {}, Supported values: [{}]",
                value,
                attribute.allowed_values.join(",")
            ))
            .with_attribute(name),
    )
}

fn check_type(expected: &AttributeType, value: &Value, path: &str, out: &mut Vec<Diagnostic>) {
    let matches = match (expected, value) {
        (AttributeType::String, Value::String(_)) | (AttributeType::Bool, Value::Bool(_)) => true,
        // 3600.0 is refused: state decodes integers as i64
        (AttributeType::Int64, Value::Number(n)) => n.is_i64(),
        (AttributeType::List(element), Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                check_type(element, item, &format!("{}.{}", path, index), out);
            }
            true
        }
        (AttributeType::Object(members), Value::Object(object)) => {
            // members carry no presence, unset and null are both fine
            for (name, member) in members {
                if let Some(item) = object.get(name).filter(|v| !v.is_null()) {
                    check_type(member, item, &format!("{}.{}", path, name), out);
                }
            }
            true
        }
        _ => false,
    };

    if !matches {
        out.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!("Expected {}, got {}", type_name(expected), kind(value)))
                .with_attribute(path),
        );
    }
}

fn type_name(expected: &AttributeType) -> &'static str {
    match expected {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Object(_) => "object",
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::schema::Presence;

    fn required_name() -> Schema {
        Schema::new("zone").attribute_named("name", Attribute::string(Presence::Required))
    }

    #[test]
    fn test_required_string() {
        let schema = required_name();
        assert!(validate(&schema, &json!({"name": "example.com"})).is_empty());
        assert_eq!(validate(&schema, &json!({})).len(), 1);
        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics[0].summary, "Invalid type for attribute 'name'");
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected string, got number"));
    }

    #[test]
    fn test_computed_only_is_ignored() {
        let schema = Schema::new("zone").attribute_named("id", Attribute::string(Presence::Computed));
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_int64() {
        let schema = Schema::new("zone").attribute_named("ttl", Attribute::int64(Presence::Required));
        assert!(validate(&schema, &json!({"ttl": 86400})).is_empty());
        assert!(validate(&schema, &json!({"ttl": -1})).is_empty());
        assert_eq!(validate(&schema, &json!({"ttl": 300.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"ttl": u64::MAX})).len(), 1);

        let diagnostics = validate(&schema, &json!({"ttl": 3600.0}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("ttl"));
        assert_eq!(validate(&schema, &json!({"ttl": "300"})).len(), 1);
    }

    #[test]
    fn test_allowed_values() {
        let schema = Schema::new("record").attribute_named(
            "type",
            Attribute::string(Presence::Required).one_of(["A", "AAAA", "TXT"]),
        );
        assert!(validate(&schema, &json!({"type": "AAAA"})).is_empty());

        let diagnostics = validate(&schema, &json!({"type": "PTR"}));
        assert_eq!(diagnostics.len(), 1);
        let detail = diagnostics[0].detail.as_deref().unwrap();
        assert!(detail.contains("Current Value: PTR"));
        assert!(detail.contains("[A,AAAA,TXT]"));

        let diagnostics = validate(&schema, &json!({}));
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("[A,AAAA,TXT]"));
    }

    #[test]
    fn test_nested_paths() {
        let mut members = BTreeMap::new();
        members.insert("name".to_string(), AttributeType::String);
        members.insert("ttl".to_string(), AttributeType::Int64);
        let schema = Schema::new("zones")
            .attribute_named("ns", Attribute::list(AttributeType::String, Presence::Optional))
            .attribute_named(
                "zones",
                Attribute::list(AttributeType::Object(members), Presence::Optional),
            );

        assert!(validate(&schema, &json!({"zones": [{"name": "a.com", "ttl": null}]})).is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"ns": ["a", 1], "zones": [{"name": "a.com", "ttl": "x"}]}),
        );
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(paths, vec!["ns.1", "zones.0.ttl"]);
    }

    #[test]
    fn test_null_document_and_order() {
        let schema = Schema::new("record")
            .attribute_named("zone_id", Attribute::string(Presence::Required))
            .attribute_named("name", Attribute::string(Presence::Required))
            .attribute_named("records", Attribute::list(AttributeType::String, Presence::Computed));

        let diagnostics = validate(&schema, &Value::Null);
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(paths, vec!["name", "zone_id"]);
    }

    #[test]
    fn test_non_object_document() {
        let diagnostics = validate(&required_name(), &json!("example.com"));
        assert_eq!(diagnostics[0].summary, "Expected object");
        assert!(!is_valid(&required_name(), &json!([])));
        assert!(validate_result(&required_name(), &json!({"name": "a"})).is_ok());
    }
}
