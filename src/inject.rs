//! `$schema` property injection into component schemas.

use serde_json::{json, Map, Value};

use crate::links::{base_name, join_path};
use crate::openapi::OpenApi;
use crate::types::{LinkOptions, FALLBACK_SERVER, SCHEMA_FIELD, TYPE_OBJECT, TYPE_STRING};

/// Outcome of [`inject_schema_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    /// The property was added; the schema's type needs a descriptor.
    Added,
    /// The schema already declares `$schema`.
    AlreadyPresent,
    /// Inline, foreign, unresolvable or non-object schema.
    NotApplicable,
}

impl Injection {
    pub fn is_added(self) -> bool {
        self == Injection::Added
    }
}

/// Make the component schema behind `reference` advertise a `$schema` property.
///
/// Only object schemas reachable through a local reference are touched. The
/// property is read-only and carries an example URL built from the first
/// declared server so readers of the documentation can find the schema.
pub fn inject_schema_field(
    oapi: &mut OpenApi,
    reference: &str,
    options: &LinkOptions,
) -> Injection {
    if !reference.starts_with(options.ref_prefix.as_str()) {
        return Injection::NotApplicable;
    }

    let server = oapi
        .servers
        .iter()
        .map(|s| s.url.as_str())
        .find(|url| !url.is_empty())
        .unwrap_or(FALLBACK_SERVER);
    let example = format!(
        "{}{}.json",
        server.trim_end_matches('/'),
        join_path(&options.schemas_path, base_name(reference))
    );

    let Some(Value::Object(schema)) = oapi.components.schemas.schema_from_ref_mut(reference) else {
        return Injection::NotApplicable;
    };
    if schema.get("type").and_then(Value::as_str) != Some(TYPE_OBJECT) {
        return Injection::NotApplicable;
    }

    let properties = schema
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(properties) = properties else {
        return Injection::NotApplicable;
    };
    if properties.contains_key(SCHEMA_FIELD) {
        return Injection::AlreadyPresent;
    }

    // Keep `$schema` first so it reads first in rendered documentation.
    let mut reordered = Map::with_capacity(properties.len() + 1);
    reordered.insert(
        SCHEMA_FIELD.to_string(),
        json!({
            "type": TYPE_STRING,
            "format": "uri",
            "description": "A URL to the JSON Schema for this object.",
            "readOnly": true,
            "examples": [example],
        }),
    );
    reordered.extend(std::mem::take(properties));
    *properties = reordered;

    Injection::Added
}

/// Inject `$schema` into every request and response body schema of every
/// operation in the document. Returns the number of schemas changed.
pub fn annotate_document(oapi: &mut OpenApi, options: &LinkOptions) -> usize {
    let references: Vec<String> = oapi
        .operations()
        .flat_map(|(_, _, op)| {
            let requests = op.request_body.iter().flat_map(|body| body.content.values());
            let responses = op.responses.values().flat_map(|resp| resp.content.values());
            requests.chain(responses)
        })
        .filter_map(|media| media.schema_ref().map(String::from))
        .collect();

    references
        .iter()
        .filter(|reference| inject_schema_field(oapi, reference, options).is_added())
        .count()
}
