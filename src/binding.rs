//! Runtime type handles and augmented shape synthesis.
//!
//! A [`TypeBinding`] ties a component schema name to a Rust type. At
//! registration time it is projected into an [`AugmentedShape`]: the plan for
//! copying the type's serialized fields behind a leading `$schema` field.

use std::any::TypeId;
use std::rc::Rc;
use std::sync::Arc;

use schemars::{JsonSchema, SchemaGenerator};
use serde_json::Value;

use crate::error::ShapeError;
use crate::types::{json_type_name, SCHEMA_FIELD, TYPE_OBJECT};

/// Handle on a runtime type bound to a component schema.
#[derive(Clone)]
pub struct TypeBinding {
    type_name: &'static str,
    /// The concrete type first, then the pointer-like wrappers that resolve to it.
    type_ids: Vec<TypeId>,
    schema: fn() -> Value,
}

impl TypeBinding {
    /// Capture the handle for `T`.
    pub fn of<T: JsonSchema + 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_ids: vec![
                TypeId::of::<T>(),
                TypeId::of::<Box<T>>(),
                TypeId::of::<Rc<T>>(),
                TypeId::of::<Arc<T>>(),
                TypeId::of::<Option<T>>(),
                TypeId::of::<Option<Box<T>>>(),
                TypeId::of::<Option<Arc<T>>>(),
            ],
            schema: structural_schema::<T>,
        }
    }

    /// Fully qualified name of the bound type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identity of the concrete type.
    pub fn type_id(&self) -> TypeId {
        self.type_ids[0]
    }

    /// Identities under which values of the bound type may reach a response.
    pub fn type_ids(&self) -> &[TypeId] {
        &self.type_ids
    }

    /// Structural schema of the bound type, as generated from its definition.
    pub fn schema(&self) -> Value {
        (self.schema)()
    }

    /// Project the bound type into its augmented shape.
    ///
    /// # Errors
    ///
    /// Returns `ShapeError` when the type does not serialize as a record or
    /// already carries a `$schema` field of its own.
    pub fn synthesize(&self) -> Result<AugmentedShape, ShapeError> {
        let schema = self.schema();

        match schema.get("type") {
            Some(Value::String(t)) if t == TYPE_OBJECT => {}
            Some(other) => {
                return Err(ShapeError::NotARecord {
                    type_name: self.type_name.to_string(),
                    actual: describe_type(other),
                })
            }
            None => {
                return Err(ShapeError::NotARecord {
                    type_name: self.type_name.to_string(),
                    actual: "untyped".to_string(),
                })
            }
        }

        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            // Maps and newtypes over maps carry keys only known at runtime.
            return match schema.get("additionalProperties") {
                None | Some(Value::Bool(false)) => Ok(AugmentedShape::default()),
                Some(_) => Err(ShapeError::NotARecord {
                    type_name: self.type_name.to_string(),
                    actual: "map".to_string(),
                }),
            };
        };

        if properties.contains_key(SCHEMA_FIELD) {
            return Err(ShapeError::ConflictingField {
                type_name: self.type_name.to_string(),
            });
        }

        let mut shape = AugmentedShape::default();
        for (index, (name, property)) in properties.iter().enumerate() {
            if is_write_only(property) {
                shape.omitted.push(name.clone());
                continue;
            }
            shape.fields.push(CopiedField {
                index,
                name: name.clone(),
            });
        }
        Ok(shape)
    }
}

impl std::fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeBinding")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A field of the original record that is carried into the augmented body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedField {
    /// Position of the field in the original record.
    pub index: usize,
    /// Serialized name of the field.
    pub name: String,
}

/// Copy plan for one augmented type.
///
/// Field `i` of the augmented body is `fields[i - 1]`; position 0 is `$schema`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AugmentedShape {
    pub fields: Vec<CopiedField>,
    /// Write-only fields that are never reproduced in responses.
    pub omitted: Vec<String>,
}

fn structural_schema<T: JsonSchema>() -> Value {
    SchemaGenerator::default()
        .into_root_schema_for::<T>()
        .to_value()
}

fn is_write_only(property: &Value) -> bool {
    property
        .get("writeOnly")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn describe_type(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("|"),
        other => json_type_name(other).to_string(),
    }
}
