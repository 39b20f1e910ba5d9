//! Minimal OpenAPI document model.
//!
//! Only the parts the schema-link transformer reads or mutates are typed;
//! everything else is carried through `extra` so a document round-trips.

use std::collections::{BTreeMap, HashMap};

use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::binding::TypeBinding;
use crate::types::DEFAULT_REF_PREFIX;

/// Root of an OpenAPI document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenApi {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpenApi {
    /// Every operation declared under `paths`, in path then method order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &str, &Operation)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.operations
                .iter()
                .map(move |(method, op)| (path.as_str(), method.as_str(), op))
        })
    }
}

/// A server entry; only the URL matters here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Server {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }
}

/// HTTP methods that name operations inside a path item.
const METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Operations of one path, keyed by lowercase HTTP method.
///
/// Path-level keys that are not operations (`parameters`, `summary`) are kept
/// in `extra`.
#[derive(Debug, Clone, Default)]
pub struct PathItem {
    pub operations: BTreeMap<String, Operation>,
    pub extra: Map<String, Value>,
}

impl Serialize for PathItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.extra.len() + self.operations.len();
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        for (method, op) in &self.operations {
            map.serialize_entry(method, op)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PathItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut item = PathItem::default();
        for (key, value) in raw {
            if METHODS.contains(&key.as_str()) {
                let op = Operation::deserialize(value).map_err(de::Error::custom)?;
                item.operations.insert(key, op);
            } else {
                item.extra.insert(key, value);
            }
        }
        Ok(item)
    }
}

/// A single API operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub responses: BTreeMap<String, Response>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Operation {
    /// Operation whose `status` response is `application/json` of `schema_ref`.
    pub fn returning(status: &str, schema_ref: &str) -> Self {
        let mut responses = BTreeMap::new();
        responses.insert(status.to_string(), Response::json(schema_ref));
        Self {
            responses,
            ..Self::default()
        }
    }

    /// Set an `application/json` request body referencing `schema_ref`.
    pub fn accepting(mut self, schema_ref: &str) -> Self {
        self.request_body = Some(RequestBody {
            content: json_content(schema_ref),
            extra: Map::new(),
        });
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    pub fn json(schema_ref: &str) -> Self {
        Self {
            description: "OK".to_string(),
            content: json_content(schema_ref),
            extra: Map::new(),
        }
    }
}

/// Content entry of a request or response body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaType {
    /// The `$ref` of the body schema, when the schema is a reference node.
    pub fn schema_ref(&self) -> Option<&str> {
        self.schema.as_ref()?.get("$ref")?.as_str()
    }
}

fn json_content(schema_ref: &str) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(
        "application/json".to_string(),
        MediaType {
            schema: Some(serde_json::json!({ "$ref": schema_ref })),
            extra: Map::new(),
        },
    );
    content
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: SchemaRegistry,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Component schemas plus the runtime types bound to them.
///
/// Serializes as the plain `components.schemas` map; bindings exist only in
/// the running process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    schemas: Map<String, Value>,
    #[serde(skip)]
    bindings: HashMap<String, TypeBinding>,
    #[serde(skip, default = "default_prefix")]
    prefix: String,
}

fn default_prefix() -> String {
    DEFAULT_REF_PREFIX.to_string()
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self {
            schemas: Map::new(),
            bindings: HashMap::new(),
            prefix: default_prefix(),
        }
    }
}

impl SchemaRegistry {
    /// Set the prefix references must carry to resolve against this registry.
    pub fn set_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Reference string for a component name.
    pub fn ref_for(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Insert a schema document under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, schema: Value) {
        self.schemas.insert(name.into(), schema);
    }

    /// Bind the runtime type `T` to the component `name`.
    pub fn bind<T: JsonSchema + 'static>(&mut self, name: impl Into<String>) {
        self.bindings.insert(name.into(), TypeBinding::of::<T>());
    }

    /// Generate the schema for `T`, store it under `name`, and bind `T` to it.
    ///
    /// Definitions the schema depends on are stored as sibling components and
    /// their references rewritten to point there. Returns the reference.
    pub fn register<T: JsonSchema + 'static>(&mut self, name: impl Into<String>) -> String {
        let name = name.into();
        let binding = TypeBinding::of::<T>();
        let mut schema = binding.schema();

        if let Value::Object(map) = &mut schema {
            map.remove("$schema");
            if let Some(Value::Object(defs)) = map.remove("$defs") {
                for (def_name, mut def) in defs {
                    rewrite_def_refs(&mut def, &self.prefix);
                    self.schemas.entry(def_name).or_insert(def);
                }
            }
        }
        rewrite_def_refs(&mut schema, &self.prefix);

        self.schemas.insert(name.clone(), schema);
        self.bindings.insert(name.clone(), binding);
        self.ref_for(&name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Component name a reference points at, if it is one of ours.
    pub fn name_from_ref<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference
            .strip_prefix(self.prefix.as_str())
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }

    /// Resolve a reference to its schema document.
    pub fn schema_from_ref(&self, reference: &str) -> Option<&Value> {
        self.schemas.get(self.name_from_ref(reference)?)
    }

    pub fn schema_from_ref_mut(&mut self, reference: &str) -> Option<&mut Value> {
        let name = self.name_from_ref(reference)?;
        self.schemas.get_mut(name)
    }

    /// Resolve a reference to the runtime type bound to it.
    pub fn type_from_ref(&self, reference: &str) -> Option<&TypeBinding> {
        self.bindings.get(self.name_from_ref(reference)?)
    }
}

/// Point `#/$defs/X` references at sibling components instead.
fn rewrite_def_refs(value: &mut Value, prefix: &str) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                if let Some(name) = reference.strip_prefix("#/$defs/") {
                    *reference = format!("{}{}", prefix, name);
                }
            }
            for child in map.values_mut() {
                rewrite_def_refs(child, prefix);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_def_refs(item, prefix);
            }
        }
        _ => {}
    }
}
