//! Schema-driven planning.
//!
//! The planned state is the proposed configuration with provider-computed
//! attributes carried over from the prior state where they stay valid.

use serde_json::{Map, Value};

use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult};

/// Attribute that identifies the remote object and survives in-place updates.
const ID_ATTRIBUTE: &str = "id";

fn non_null(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

/// Plan the transition from `prior` to `proposed` for a resource.
///
/// A `Null` proposal plans destruction and a missing prior state plans
/// creation. Changing a `force_new` attribute requires replacement, which
/// also discards every computed-only value.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null()).and_then(Value::as_object);

    if proposed.is_null() {
        let changes = prior
            .map(|prior| {
                schema
                    .attributes
                    .keys()
                    .filter_map(|name| {
                        non_null(prior.get(name.as_str()))
                            .map(|before| AttributeChange::new(name.as_str(), Some(before), None))
                    })
                    .collect()
            })
            .unwrap_or_default();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let proposed = proposed.as_object().cloned().unwrap_or_default();
    let empty = Map::new();
    let prior_attrs = prior.unwrap_or(&empty);

    let mut planned = Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.attributes {
        if attr.presence.is_computed_only() {
            continue;
        }

        let before = non_null(prior_attrs.get(name.as_str()));
        let mut after = non_null(proposed.get(name.as_str()));
        if after.is_none() && attr.presence.is_computed() {
            after = before.clone();
        }

        if before != after {
            requires_replace |= prior.is_some() && attr.force_new;
            changes.push(AttributeChange::new(name.as_str(), before, after.clone()));
        }
        planned.insert(name.clone(), after.unwrap_or(Value::Null));
    }

    let unchanged = changes.is_empty();
    for (name, attr) in &schema.attributes {
        if !attr.presence.is_computed_only() {
            continue;
        }

        let keep = prior.is_some()
            && !requires_replace
            && (unchanged || name.as_str() == ID_ATTRIBUTE);
        let value = if keep {
            non_null(prior_attrs.get(name.as_str())).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        planned.insert(name.clone(), value);
    }

    let planned = Value::Object(planned);
    if unchanged {
        PlanResult::no_change(planned)
    } else {
        PlanResult::with_changes(planned, changes, requires_replace)
    }
}
