//! Schema-link transformer.
//!
//! Adds a `$schema` field to record-shaped responses and a `Link` header
//! pointing at the JSON Schema that describes them. Editors such as VS Code
//! use the field for as-you-type validation and completion of HTTP resources.
//!
//! The transformer has two entry points:
//!
//! - [`SchemaLinkTransformer::on_add_operation`] runs once per operation while
//!   the API is assembled. It injects the `$schema` property into response
//!   and request body schemas and precomputes a [`TypeDescriptor`] for each
//!   response body type.
//! - [`SchemaLinkTransformer::transform`] runs once per outgoing response. It
//!   looks the value's type up and, when a descriptor exists, returns an
//!   [`AugmentedBody`] and appends the `Link` header.
//!
//! Registration needs `&mut self` and serving only `&self`: build the
//! transformer during startup, then share it behind an `Arc`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::binding::CopiedField;
use crate::context::ResponseContext;
use crate::inject::inject_schema_field;
use crate::links::{
    effective_schemas_path, link_header, public_host, schema_ref_path, write_schema_url,
};
use crate::openapi::{OpenApi, Operation};
use crate::pool::BufferPool;
use crate::types::{json_type_name, LinkOptions, SCHEMA_FIELD};

/// Name of the response header carrying the schema link.
pub const LINK_HEADER: &str = "Link";

static BUFFERS: BufferPool = BufferPool::new(128);

/// Precomputed linking information for one response body type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_name: String,
    /// Fields copied into the augmented body, after `$schema`.
    pub fields: Vec<CopiedField>,
    /// Write-only fields, never reproduced even when they serialize.
    pub omitted: Vec<String>,
    /// Absolute path of the schema document, e.g. `/schemas/Book.json`.
    pub schema_ref: String,
    /// Value of the `Link` header sent with every augmented response.
    pub header: String,
}

#[derive(Debug, Default)]
pub struct SchemaLinkTransformer {
    options: LinkOptions,
    types: HashMap<TypeId, Arc<TypeDescriptor>>,
}

impl SchemaLinkTransformer {
    pub fn new(options: LinkOptions) -> Self {
        Self {
            options,
            types: HashMap::new(),
        }
    }

    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    /// Descriptor registered for `T`, if responses of that type are linked.
    pub fn descriptor<T: 'static>(&self) -> Option<&TypeDescriptor> {
        self.types.get(&TypeId::of::<T>()).map(Arc::as_ref)
    }

    /// Number of distinct linked types.
    pub fn len(&self) -> usize {
        let mut seen: Vec<*const TypeDescriptor> =
            self.types.values().map(Arc::as_ptr).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Hook for every operation added to the API.
    ///
    /// Never fails: schemas it cannot augment are left alone and types it
    /// cannot project are logged and served unlinked.
    pub fn on_add_operation(&mut self, oapi: &mut OpenApi, op: &Operation) {
        if let Some(body) = &op.request_body {
            for reference in body.content.values().filter_map(|c| c.schema_ref()) {
                inject_schema_field(oapi, reference, &self.options);
            }
        }

        // A sub-router or a gateway consuming part of the path moves the
        // schema documents under the servers' path prefix.
        let schemas_path = effective_schemas_path(&oapi.servers, &self.options.schemas_path);

        for (status, response) in &op.responses {
            for (media_type, content) in &response.content {
                let Some(reference) = content.schema_ref() else {
                    debug!(%status, %media_type, "inline response schema, not linking");
                    continue;
                };
                if !inject_schema_field(oapi, reference, &self.options).is_added() {
                    continue;
                }
                let Some(binding) = oapi.components.schemas.type_from_ref(reference) else {
                    debug!(%reference, "no runtime type bound to schema, not linking");
                    continue;
                };

                let shape = match binding.synthesize() {
                    Ok(shape) => shape,
                    Err(error) => {
                        warn!(
                            type_name = binding.type_name(),
                            %error,
                            "unable to create schema link for type"
                        );
                        continue;
                    }
                };
                if !shape.omitted.is_empty() {
                    debug!(
                        type_name = binding.type_name(),
                        omitted = ?shape.omitted,
                        "write-only fields are left out of linked responses"
                    );
                }

                let schema_ref = schema_ref_path(&schemas_path, reference);
                let descriptor = Arc::new(TypeDescriptor {
                    type_name: binding.type_name().to_string(),
                    fields: shape.fields,
                    omitted: shape.omitted,
                    header: link_header(&schema_ref),
                    schema_ref,
                });
                debug!(
                    type_name = %descriptor.type_name,
                    schema = %descriptor.schema_ref,
                    "linked response type"
                );
                for id in binding.type_ids() {
                    self.types.insert(*id, Arc::clone(&descriptor));
                }
            }
        }
    }

    /// Run [`Self::on_add_operation`] and add the operation to the document.
    pub fn register(&mut self, oapi: &mut OpenApi, path: &str, method: &str, op: Operation) {
        self.on_add_operation(oapi, &op);
        oapi.paths
            .entry(path.to_string())
            .or_default()
            .operations
            .insert(method.to_ascii_lowercase(), op);
    }

    /// Hook for every outgoing response value.
    ///
    /// Returns the value untouched unless its type was registered and it
    /// serializes as a record. Augmented responses get a `Link` header
    /// appended; existing `Link` values are kept. `host_override` is the
    /// public base URL when the service sits behind a gateway.
    pub fn transform<'a, T, C>(
        &self,
        ctx: &mut C,
        status: u16,
        value: &'a T,
        host_override: Option<&str>,
    ) -> Transformed<'a, T>
    where
        T: Serialize + 'static,
        C: ResponseContext + ?Sized,
    {
        let Some(info) = self.types.get(&TypeId::of::<T>()) else {
            return Transformed::Unchanged(value);
        };

        let mut record = match serde_json::to_value(value) {
            Ok(Value::Object(record)) => record,
            Ok(other) => {
                trace!(
                    type_name = %info.type_name,
                    kind = json_type_name(&other),
                    "not a record, not linking"
                );
                return Transformed::Unchanged(value);
            }
            Err(error) => {
                warn!(
                    type_name = %info.type_name,
                    %error,
                    "cannot serialize response, not linking"
                );
                return Transformed::Unchanged(value);
            }
        };

        let schema = {
            let mut buf = BUFFERS.acquire();
            let host = public_host(ctx.host(), host_override);
            write_schema_url(&mut buf, host, &info.schema_ref);
            buf.as_str().to_owned()
        };
        ctx.append_header(LINK_HEADER, &info.header);

        let values = info
            .fields
            .iter()
            .map(|field| record.shift_remove(&field.name))
            .collect();
        // Keys the schema does not list, such as flattened maps, follow the
        // listed fields unchanged.
        record.shift_remove(SCHEMA_FIELD);
        for name in &info.omitted {
            record.shift_remove(name);
        }

        trace!(status, type_name = %info.type_name, %schema, "linked response");
        Transformed::Linked(AugmentedBody {
            schema,
            descriptor: Arc::clone(info),
            values,
            rest: record,
        })
    }
}

/// Result of [`SchemaLinkTransformer::transform`].
#[derive(Debug)]
pub enum Transformed<'a, T> {
    Unchanged(&'a T),
    Linked(AugmentedBody),
}

impl<T> Transformed<'_, T> {
    pub fn is_linked(&self) -> bool {
        matches!(self, Transformed::Linked(_))
    }

    pub fn linked(&self) -> Option<&AugmentedBody> {
        match self {
            Transformed::Linked(body) => Some(body),
            Transformed::Unchanged(_) => None,
        }
    }
}

impl<T: Serialize> Serialize for Transformed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Transformed::Unchanged(value) => value.serialize(serializer),
            Transformed::Linked(body) => body.serialize(serializer),
        }
    }
}

/// A response record with a leading `$schema` field.
///
/// Slot `i` of `values` holds copied field `i` of the descriptor; fields the
/// record skipped while serializing stay absent. Serialized keys the
/// descriptor does not list are kept in `rest`, in their original order.
#[derive(Debug, Clone)]
pub struct AugmentedBody {
    schema: String,
    descriptor: Arc<TypeDescriptor>,
    values: Vec<Option<Value>>,
    rest: Map<String, Value>,
}

impl AugmentedBody {
    /// Absolute URL of the schema describing this body.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Copied fields in output order, without `$schema`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.descriptor
            .fields
            .iter()
            .zip(&self.values)
            .filter_map(|(field, value)| Some((field.name.as_str(), value.as_ref()?)))
            .chain(self.rest.iter().map(|(name, value)| (name.as_str(), value)))
    }
}

impl Serialize for AugmentedBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(SCHEMA_FIELD, &self.schema)?;
        for (name, value) in self.entries() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
