//! Schema Link CLI
//!
//! Annotates OpenAPI documents with `$schema` properties and reports the
//! schema links their responses carry.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schema_link::{
    annotate_document, effective_schemas_path, link_header, load_document_auto, public_host,
    schema_ref_path, write_schema_url, LinkOptions, OpenApi, DEFAULT_REF_PREFIX,
    DEFAULT_SCHEMAS_PATH, SCHEMA_FIELD,
};
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-link")]
#[command(about = "Add $schema links to OpenAPI documents and responses")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a read-only $schema property to every body schema of every operation
    Annotate {
        /// OpenAPI document: file path or URL (http:// or https://)
        document: String,

        #[command(flatten)]
        link: LinkArgs,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the schema URL and Link header of every linkable response schema
    Links {
        /// OpenAPI document: file path or URL (http:// or https://)
        document: String,

        #[command(flatten)]
        link: LinkArgs,

        /// Host the requests arrive on
        #[arg(long, default_value = "localhost:8888")]
        host: String,

        /// Public base URL when serving behind a gateway (scheme is dropped)
        #[arg(long)]
        host_override: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct LinkArgs {
    /// Path under which schema documents are served
    #[arg(long, default_value = DEFAULT_SCHEMAS_PATH)]
    schemas_path: String,

    /// Prefix of component schema references
    #[arg(long, default_value = DEFAULT_REF_PREFIX)]
    ref_prefix: String,
}

impl LinkArgs {
    fn options(&self) -> LinkOptions {
        LinkOptions::new(&self.ref_prefix, &self.schemas_path)
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Annotate {
            document,
            link,
            output,
            pretty,
        } => run_annotate(&document, &link.options(), output, pretty),

        Commands::Links {
            document,
            link,
            host,
            host_override,
            json,
        } => run_links(
            &document,
            &link.options(),
            &host,
            host_override.as_deref(),
            json,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("tracing init failed: {}", e);
    }
}

fn load(source: &str, options: &LinkOptions) -> Result<OpenApi, u8> {
    let mut oapi = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    oapi.components.schemas.set_prefix(options.ref_prefix.as_str());
    Ok(oapi)
}

fn run_annotate(
    source: &str,
    options: &LinkOptions,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let mut oapi = load(source, options)?;

    let changed = annotate_document(&mut oapi, options);
    if changed == 0 {
        warn!(document = source, "no schema needed a $schema property");
    }

    let json_output = if pretty {
        serde_json::to_string_pretty(&oapi)
    } else {
        serde_json::to_string(&oapi)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_links(
    source: &str,
    options: &LinkOptions,
    host: &str,
    host_override: Option<&str>,
    json_output: bool,
) -> Result<(), u8> {
    let oapi = load(source, options)?;
    let schemas_path = effective_schemas_path(&oapi.servers, &options.schemas_path);
    let host = public_host(host, host_override);

    let references: BTreeSet<&str> = oapi
        .operations()
        .flat_map(|(_, _, op)| op.responses.values())
        .flat_map(|response| response.content.values())
        .filter_map(|media| media.schema_ref())
        .filter(|reference| is_linkable(&oapi, options, reference))
        .collect();

    let links: Vec<Value> = references
        .iter()
        .map(|reference| {
            let path = schema_ref_path(&schemas_path, reference);
            let mut url = String::new();
            write_schema_url(&mut url, host, &path);
            serde_json::json!({
                "ref": reference,
                "schema": path,
                "url": url,
                "link": link_header(&path),
            })
        })
        .collect();

    if json_output {
        println!("{}", Value::Array(links));
    } else if links.is_empty() {
        println!("No linkable response schemas");
    } else {
        for link in &links {
            println!(
                "{}\n  url:  {}\n  Link: {}",
                link["ref"].as_str().unwrap_or_default(),
                link["url"].as_str().unwrap_or_default(),
                link["link"].as_str().unwrap_or_default(),
            );
        }
    }

    Ok(())
}

/// Whether responses referencing `reference` would carry a schema link:
/// a local object schema that does not declare `$schema` itself.
fn is_linkable(oapi: &OpenApi, options: &LinkOptions, reference: &str) -> bool {
    if !reference.starts_with(options.ref_prefix.as_str()) {
        return false;
    }
    let Some(schema) = oapi.components.schemas.schema_from_ref(reference) else {
        return false;
    };
    schema.get("type").and_then(Value::as_str) == Some("object")
        && schema
            .get("properties")
            .and_then(|props| props.get(SCHEMA_FIELD))
            .is_none()
}
