//! Schema Link
//!
//! Advertises the JSON Schema of every REST response.
//!
//! When an operation is registered, each object schema its bodies reference
//! gains a read-only `$schema` property. At response time, values of the bound
//! Rust types are rewritten to carry a leading `$schema` URL, and a
//! `Link: </schemas/Book.json>; rel="describedBy"` header is appended.
//!
//! # Example
//!
//! ```
//! use schema_link::{
//!     LinkOptions, OpenApi, Operation, RecordedResponse, SchemaLinkTransformer,
//! };
//! use schemars::JsonSchema;
//! use serde::Serialize;
//! use serde_json::json;
//!
//! #[derive(Serialize, JsonSchema)]
//! struct Book {
//!     id: String,
//!     name: String,
//! }
//!
//! let mut api = OpenApi::default();
//! let book_ref = api.components.schemas.register::<Book>("Book");
//!
//! let mut links = SchemaLinkTransformer::new(LinkOptions::default());
//! links.register(&mut api, "/api/books/{bookId}", "get", Operation::returning("200", &book_ref));
//!
//! let mut ctx = RecordedResponse::new("127.0.0.1:8888");
//! let book = Book { id: "Gen".into(), name: "Genesis".into() };
//! let body = links.transform(&mut ctx, 200, &book, None);
//!
//! assert_eq!(
//!     serde_json::to_value(&body).unwrap(),
//!     json!({
//!         "$schema": "http://127.0.0.1:8888/schemas/Book.json",
//!         "id": "Gen",
//!         "name": "Genesis"
//!     })
//! );
//! assert_eq!(ctx.headers("Link"), vec![r#"</schemas/Book.json>; rel="describedBy""#]);
//! ```
//!
//! # Which responses are linked
//!
//! | Response value | `$schema` field | `Link` header |
//! |----------------|-----------------|---------------|
//! | Registered record type (or `Box`, `Arc`, `Option` of it) | Added | Appended |
//! | `None` of a registered type | No | No |
//! | Unregistered type, map, sequence, primitive | No | No |
//!
//! Fields the record does not serialize (`#[serde(skip)]`,
//! `#[serde(skip_serializing)]`) never appear in linked responses.

mod binding;
mod context;
mod error;
mod inject;
mod links;
mod loader;
mod openapi;
mod pool;
mod transformer;
mod types;

pub use binding::{AugmentedShape, CopiedField, TypeBinding};
pub use context::{RecordedResponse, ResponseContext};
pub use error::{LoadError, ShapeError};
pub use inject::{annotate_document, inject_schema_field, Injection};
pub use links::{
    api_prefix, effective_schemas_path, join_path, link_header, public_host, schema_ref_path,
    scheme_for, write_schema_url,
};
pub use loader::{is_url, load_document, load_document_auto, load_document_str};
pub use openapi::{
    Components, MediaType, OpenApi, Operation, PathItem, RequestBody, Response, SchemaRegistry,
    Server,
};
pub use pool::{BufferPool, PooledBuffer};
pub use transformer::{
    AugmentedBody, SchemaLinkTransformer, Transformed, TypeDescriptor, LINK_HEADER,
};
pub use types::{LinkOptions, DEFAULT_REF_PREFIX, DEFAULT_SCHEMAS_PATH, SCHEMA_FIELD};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
