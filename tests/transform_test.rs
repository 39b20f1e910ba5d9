//! Integration tests for operation registration and response linking.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;

use schema_link::{
    LinkOptions, OpenApi, Operation, RecordedResponse, ResponseContext, SchemaLinkTransformer,
    Server, Transformed,
};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct Chapter {
    chapter: i32,
    id: String,
    osis_end: String,
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
struct Book {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Order")]
    order: i32,
    #[serde(rename = "Testament")]
    testament: String,
    #[serde(rename = "Chapters")]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[allow(non_snake_case)]
struct Secretive {
    ID: String,
    Name: String,
    #[serde(skip)]
    #[allow(dead_code)]
    secretUnexported: i32,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
struct Verse {
    id: String,
    text: String,
    #[serde(skip_serializing)]
    #[allow(dead_code)]
    clean_text: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
enum Testament {
    Old,
    New,
}

fn book() -> Book {
    Book {
        id: "Gen".into(),
        ..Book::default()
    }
}

/// API with `Book` registered under `GET /api/books/{bookId}`.
fn book_api(servers: &[&str]) -> (SchemaLinkTransformer, OpenApi) {
    let mut oapi = OpenApi::default();
    oapi.servers = servers.iter().map(|url| Server::new(*url)).collect();
    let reference = oapi.components.schemas.register::<Book>("Book");

    let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
    transformer.register(
        &mut oapi,
        "/api/books/{bookId}",
        "get",
        Operation::returning("200", &reference),
    );
    (transformer, oapi)
}

// === Registration ===

mod registration {
    use super::*;

    #[test]
    fn registered_type_gets_descriptor_and_schema_property() {
        let (transformer, oapi) = book_api(&[]);

        let info = transformer.descriptor::<Book>().expect("descriptor for Book");
        assert_eq!(info.schema_ref, "/schemas/Book.json");
        assert_eq!(info.header, r#"</schemas/Book.json>; rel="describedBy""#);
        let names: Vec<&str> = info.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "Name", "Order", "Testament", "Chapters"]);

        let prop = &oapi.components.schemas.get("Book").unwrap()["properties"]["$schema"];
        assert_eq!(prop["type"], "string");
        assert_eq!(prop["format"], "uri");
        assert_eq!(prop["readOnly"], true);
    }

    #[test]
    fn registering_twice_does_not_duplicate() {
        let (mut transformer, mut oapi) = book_api(&[]);
        let before = oapi.components.schemas.get("Book").cloned();

        transformer.register(
            &mut oapi,
            "/api/books",
            "get",
            Operation::returning("200", "#/components/schemas/Book"),
        );

        assert_eq!(oapi.components.schemas.get("Book").cloned(), before);
        assert_eq!(transformer.len(), 1);
        assert!(transformer.descriptor::<Book>().is_some());
    }

    #[test]
    fn server_path_prefixes_schema_path() {
        let (transformer, oapi) = book_api(&["https://ajph.execute-api.us-west-2.amazonaws.com/dev"]);

        let info = transformer.descriptor::<Book>().unwrap();
        assert_eq!(info.schema_ref, "/dev/schemas/Book.json");
        assert_eq!(info.header, r#"</dev/schemas/Book.json>; rel="describedBy""#);
        assert_eq!(
            oapi.components.schemas.get("Book").unwrap()["properties"]["$schema"]["examples"][0],
            "https://ajph.execute-api.us-west-2.amazonaws.com/dev/schemas/Book.json"
        );
    }

    #[test]
    fn custom_schemas_path() {
        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<Book>("Book");
        let mut transformer =
            SchemaLinkTransformer::new(LinkOptions::default().schemas_path("/json-schemas"));
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));

        assert_eq!(
            transformer.descriptor::<Book>().unwrap().schema_ref,
            "/json-schemas/Book.json"
        );
    }

    #[test]
    fn request_bodies_are_annotated_without_descriptors() {
        let mut oapi = OpenApi::default();
        let input = oapi.components.schemas.register::<Chapter>("ChapterInput");
        let output = oapi.components.schemas.register::<Book>("Book");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());

        transformer.on_add_operation(
            &mut oapi,
            &Operation::returning("200", &output).accepting(&input),
        );

        assert!(oapi.components.schemas.get("ChapterInput").unwrap()["properties"]["$schema"]
            .is_object());
        assert!(transformer.descriptor::<Chapter>().is_none());
        assert!(transformer.descriptor::<Book>().is_some());
    }

    #[test]
    fn schema_already_declaring_schema_field_is_skipped() {
        let mut oapi = OpenApi::default();
        oapi.components.schemas.insert(
            "Book",
            json!({
                "type": "object",
                "properties": {
                    "$schema": { "type": "string" },
                    "ID": { "type": "string" }
                }
            }),
        );
        oapi.components.schemas.bind::<Book>("Book");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());

        transformer.on_add_operation(
            &mut oapi,
            &Operation::returning("200", "#/components/schemas/Book"),
        );

        assert!(transformer.is_empty());
        assert_eq!(
            oapi.components.schemas.get("Book").unwrap()["properties"]["$schema"],
            json!({ "type": "string" })
        );
    }

    #[test]
    fn inline_and_foreign_schemas_are_skipped() {
        let mut oapi = OpenApi::default();
        let mut op = Operation::returning("200", "https://example.com/schemas/Book.json");
        op.responses.get_mut("200").unwrap().content.insert(
            "text/plain".to_string(),
            schema_link::MediaType {
                schema: Some(json!({ "type": "string" })),
                ..Default::default()
            },
        );
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());

        transformer.on_add_operation(&mut oapi, &op);

        assert!(transformer.is_empty());
        assert!(oapi.components.schemas.is_empty());
    }

    #[test]
    fn unsupported_shape_degrades_to_unlinked() {
        // The document says object, the bound Rust type is an enum.
        let mut oapi = OpenApi::default();
        oapi.components.schemas.insert(
            "Testament",
            json!({ "type": "object", "properties": { "name": { "type": "string" } } }),
        );
        oapi.components.schemas.bind::<Testament>("Testament");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());

        transformer.on_add_operation(
            &mut oapi,
            &Operation::returning("200", "#/components/schemas/Testament"),
        );

        assert!(transformer.descriptor::<Testament>().is_none());
        // The document is still annotated.
        assert!(oapi.components.schemas.get("Testament").unwrap()["properties"]["$schema"]
            .is_object());

        let mut ctx = RecordedResponse::new("localhost:8888");
        let out = transformer.transform(&mut ctx, 200, &Testament::Old, None);
        assert!(!out.is_linked());
        assert_eq!(serde_json::to_value(&out).unwrap(), json!("Old"));
        assert!(ctx.headers("Link").is_empty());
    }

    #[test]
    fn unbound_schema_gets_no_descriptor() {
        let mut oapi = OpenApi::default();
        oapi.components
            .schemas
            .insert("Book", json!({ "type": "object", "properties": {} }));
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());

        transformer.on_add_operation(
            &mut oapi,
            &Operation::returning("200", "#/components/schemas/Book"),
        );

        assert!(transformer.is_empty());
    }
}

// === Response rewrite ===

mod rewrite {
    use super::*;

    #[test]
    fn end_to_end_book() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("127.0.0.1:8888");
        let value = book();

        let out = transformer.transform(&mut ctx, 200, &value, None);

        let body = serde_json::to_value(&out).unwrap();
        assert_eq!(body["$schema"], "http://127.0.0.1:8888/schemas/Book.json");
        assert_eq!(body["ID"], "Gen");
        assert_eq!(body["Chapters"], json!([]));
        assert_eq!(
            ctx.headers("Link"),
            vec![r#"</schemas/Book.json>; rel="describedBy""#]
        );
    }

    #[test]
    fn unexported_fields_never_leak() {
        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<Secretive>("Secretive");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));

        let mut ctx = RecordedResponse::new("localhost:8888");
        let value = Secretive {
            ID: "Gen".into(),
            Name: "Genesis".into(),
            secretUnexported: 42,
        };
        let out = transformer.transform(&mut ctx, 200, &value, None);

        let text = serde_json::to_string(&out).unwrap();
        let body: Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["$schema", "ID", "Name"]);
        assert!(!text.contains("secretUnexported"));
    }

    #[test]
    fn write_only_fields_are_not_copied() {
        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<Verse>("Verse");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));

        let names: Vec<&str> = transformer
            .descriptor::<Verse>()
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "text"]);

        let mut ctx = RecordedResponse::new("localhost:8888");
        let verse = Verse {
            id: "Gen.1.1".into(),
            text: "En el principio".into(),
            clean_text: "en el principio".into(),
        };
        let body = serde_json::to_value(transformer.transform(&mut ctx, 200, &verse, None)).unwrap();
        assert!(body.get("clean_text").is_none());
        assert_eq!(body["text"], "En el principio");
    }

    #[test]
    fn host_scheme_rule() {
        let (transformer, _) = book_api(&[]);
        let value = book();

        let mut ctx = RecordedResponse::new("localhost:8888");
        let out = transformer.transform(&mut ctx, 200, &value, None);
        assert_eq!(
            out.linked().unwrap().schema(),
            "http://localhost:8888/schemas/Book.json"
        );

        let mut ctx = RecordedResponse::new("api.example.com");
        let out = transformer.transform(&mut ctx, 200, &value, None);
        assert_eq!(
            out.linked().unwrap().schema(),
            "https://api.example.com/schemas/Book.json"
        );
    }

    #[test]
    fn override_host_wins_and_loses_its_scheme() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("10.0.3.7:8888");
        let value = book();

        let out = transformer.transform(&mut ctx, 200, &value, Some("https://public.example.com"));

        assert_eq!(
            out.linked().unwrap().schema(),
            "https://public.example.com/schemas/Book.json"
        );
    }

    #[test]
    fn one_link_header_per_response_and_existing_values_kept() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("api.example.com");
        ctx.append_header("Link", r#"</openapi.json>; rel="service-desc""#);

        transformer.transform(&mut ctx, 200, &book(), None);

        assert_eq!(
            ctx.headers("Link"),
            vec![
                r#"</openapi.json>; rel="service-desc""#,
                r#"</schemas/Book.json>; rel="describedBy""#,
            ]
        );
    }

    #[test]
    fn unregistered_types_pass_through() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("api.example.com");
        let chapter = Chapter {
            chapter: 1,
            id: "Gen.1".into(),
            osis_end: "Gen.1.31".into(),
        };

        let out = transformer.transform(&mut ctx, 200, &chapter, None);

        assert!(matches!(out, Transformed::Unchanged(_)));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            serde_json::to_value(&chapter).unwrap()
        );
        assert!(ctx.all_headers().is_empty());
    }

    #[test]
    fn absent_and_non_record_values_pass_through() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("api.example.com");

        let none: Option<Book> = None;
        let out = transformer.transform(&mut ctx, 200, &none, None);
        assert!(!out.is_linked());
        assert_eq!(serde_json::to_value(&out).unwrap(), Value::Null);

        let books = vec![book()];
        let out = transformer.transform(&mut ctx, 200, &books, None);
        assert!(!out.is_linked());

        let out = transformer.transform(&mut ctx, 200, &42_i64, None);
        assert_eq!(serde_json::to_value(&out).unwrap(), json!(42));

        assert!(ctx.all_headers().is_empty());
    }

    #[test]
    fn map_types_pass_through_unchanged() {
        #[derive(Serialize, JsonSchema)]
        struct VerseIndex(BTreeMap<String, String>);

        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<VerseIndex>("VerseIndex");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));
        assert!(transformer.descriptor::<VerseIndex>().is_none());

        let mut ctx = RecordedResponse::new("localhost:8888");
        let index = VerseIndex(BTreeMap::from([(
            "Gen.1.1".to_string(),
            "En el principio".to_string(),
        )]));
        let out = transformer.transform(&mut ctx, 200, &index, None);

        assert!(!out.is_linked());
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "Gen.1.1": "En el principio" })
        );
        assert!(ctx.headers("Link").is_empty());
    }

    #[test]
    fn flattened_keys_survive_linking() {
        #[derive(Serialize, JsonSchema)]
        struct Catalog {
            id: String,
            #[serde(flatten)]
            extra: BTreeMap<String, String>,
        }

        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<Catalog>("Catalog");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));

        let mut ctx = RecordedResponse::new("localhost:8888");
        let catalog = Catalog {
            id: "Gen".into(),
            extra: BTreeMap::from([("testament".to_string(), "old".to_string())]),
        };
        let out = transformer.transform(&mut ctx, 200, &catalog, None);

        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "$schema": "http://localhost:8888/schemas/Catalog.json",
                "id": "Gen",
                "testament": "old"
            })
        );
        assert_eq!(ctx.headers("Link").len(), 1);
    }

    #[test]
    fn unserializable_values_pass_through_without_header() {
        #[derive(Serialize, JsonSchema)]
        struct Grid {
            name: String,
            cells: HashMap<(i32, i32), String>,
        }

        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<Grid>("Grid");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));
        assert!(transformer.descriptor::<Grid>().is_some());

        let mut ctx = RecordedResponse::new("localhost:8888");
        let grid = Grid {
            name: "Gen".into(),
            cells: HashMap::from([((1, 1), "En el principio".to_string())]),
        };
        let out = transformer.transform(&mut ctx, 200, &grid, None);

        assert!(matches!(out, Transformed::Unchanged(value) if std::ptr::eq(value, &grid)));
        assert!(ctx.headers("Link").is_empty());
    }

    #[test]
    fn pointer_wrapped_values_are_linked() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("api.example.com");

        let boxed = Box::new(book());
        assert!(transformer.transform(&mut ctx, 200, &boxed, None).is_linked());

        let shared = Arc::new(book());
        assert!(transformer.transform(&mut ctx, 200, &shared, None).is_linked());

        let some = Some(book());
        let out = transformer.transform(&mut ctx, 200, &some, None);
        assert_eq!(serde_json::to_value(&out).unwrap()["ID"], "Gen");

        assert_eq!(ctx.headers("Link").len(), 3);
    }

    #[test]
    fn original_value_is_untouched() {
        let (transformer, _) = book_api(&[]);
        let mut ctx = RecordedResponse::new("api.example.com");
        let value = book();
        let before = serde_json::to_value(&value).unwrap();

        let out = transformer.transform(&mut ctx, 200, &value, None);
        drop(out);

        assert_eq!(serde_json::to_value(&value).unwrap(), before);
        assert!(before.get("$schema").is_none());
    }

    #[test]
    fn concurrent_rewrites_share_the_registry() {
        let (transformer, _) = book_api(&[]);
        let transformer = Arc::new(transformer);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let transformer = Arc::clone(&transformer);
                thread::spawn(move || {
                    let host = format!("node{}.example.com", i);
                    let value = book();
                    for _ in 0..50 {
                        let mut ctx = RecordedResponse::new(host.clone());
                        let out = transformer.transform(&mut ctx, 200, &value, None);
                        assert_eq!(
                            out.linked().unwrap().schema(),
                            format!("https://{}/schemas/Book.json", host)
                        );
                        assert_eq!(ctx.headers("Link").len(), 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

// === Augmented bodies validate against the annotated schema ===

mod conformance {
    use super::*;

    #[test]
    fn linked_body_matches_annotated_component() {
        let mut oapi = OpenApi::default();
        let reference = oapi.components.schemas.register::<Chapter>("Chapter");
        let mut transformer = SchemaLinkTransformer::new(LinkOptions::default());
        transformer.on_add_operation(&mut oapi, &Operation::returning("200", &reference));

        let mut ctx = RecordedResponse::new("localhost:8888");
        let chapter = Chapter {
            chapter: 3,
            id: "Gen.3".into(),
            osis_end: "Gen.3.24".into(),
        };
        let body = serde_json::to_value(transformer.transform(&mut ctx, 200, &chapter, None)).unwrap();

        let mut schema = oapi.components.schemas.get("Chapter").unwrap().clone();
        schema["additionalProperties"] = json!(false);
        let validator = jsonschema::validator_for(&schema).unwrap();
        assert!(validator.is_valid(&body), "{body}");

        let mut unlinked = body.clone();
        unlinked["$schema"] = json!(7);
        assert!(!validator.is_valid(&unlinked));
    }
}

