//! Core types and constants shared by the injector and the transformer.

use serde_json::Value;

/// Name of the field added to schemas and response bodies.
pub const SCHEMA_FIELD: &str = "$schema";

/// JSON Schema type names.
pub const TYPE_OBJECT: &str = "object";
pub const TYPE_STRING: &str = "string";

/// Conventional prefix of local component schema references.
pub const DEFAULT_REF_PREFIX: &str = "#/components/schemas/";

/// Default path under which schema documents are served.
pub const DEFAULT_SCHEMAS_PATH: &str = "/schemas";

/// Server used for documentation examples when the document declares none.
pub const FALLBACK_SERVER: &str = "https://example.com";

/// Returns the JSON type name for log and error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Configuration of a schema-link transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Prefix every resolvable schema reference starts with.
    pub ref_prefix: String,
    /// Path under which the JSON Schema documents are served, e.g. `/schemas`.
    pub schemas_path: String,
}

impl LinkOptions {
    /// Create options with an explicit reference prefix and schemas path.
    pub fn new(ref_prefix: impl Into<String>, schemas_path: impl Into<String>) -> Self {
        Self {
            ref_prefix: ref_prefix.into(),
            schemas_path: schemas_path.into(),
        }
    }

    /// Set the schemas path.
    pub fn schemas_path(mut self, schemas_path: impl Into<String>) -> Self {
        self.schemas_path = schemas_path.into();
        self
    }

    /// Set the reference prefix.
    pub fn ref_prefix(mut self, ref_prefix: impl Into<String>) -> Self {
        self.ref_prefix = ref_prefix.into();
        self
    }
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self::new(DEFAULT_REF_PREFIX, DEFAULT_SCHEMAS_PATH)
    }
}
