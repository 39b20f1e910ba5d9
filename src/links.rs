//! Schema document paths, `Link` header values and public schema URLs.

use url::{ParseError, Url};

use crate::openapi::Server;

/// Path component of the first server URL that carries one.
///
/// A gateway or sub-router mounted under `/dev` declares a server such as
/// `https://api.example.com/dev`; schema documents then live under `/dev` too.
/// Relative server URLs (`/api`) count as paths.
pub fn api_prefix(servers: &[Server]) -> Option<String> {
    servers.iter().find_map(|server| {
        let path = match Url::parse(&server.url) {
            Ok(url) => url.path().to_string(),
            Err(ParseError::RelativeUrlWithoutBase) if server.url.starts_with('/') => {
                server.url.clone()
            }
            Err(_) => return None,
        };
        let path = path.trim_end_matches('/');
        (!path.is_empty()).then(|| path.to_string())
    })
}

/// Join two URL paths with exactly one slash between them.
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return if base.is_empty() { "/".to_string() } else { base.to_string() };
    }
    format!("{}/{}", base, path)
}

/// Schemas path after applying the servers' path prefix, if any.
pub fn effective_schemas_path(servers: &[Server], schemas_path: &str) -> String {
    match api_prefix(servers) {
        Some(prefix) => join_path(&prefix, schemas_path),
        None => schemas_path.to_string(),
    }
}

/// Last segment of a schema reference, e.g. `Book` for `#/components/schemas/Book`.
pub fn base_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// Path of the JSON Schema document describing `reference`.
pub fn schema_ref_path(schemas_path: &str, reference: &str) -> String {
    format!(
        "{}/{}.json",
        schemas_path.trim_end_matches('/'),
        base_name(reference)
    )
}

/// `Link` header value pointing at a schema document.
pub fn link_header(schema_path: &str) -> String {
    format!("<{}>; rel=\"describedBy\"", schema_path)
}

/// Host advertised to clients.
///
/// An override (the public URL of a gateway in front of the service) wins
/// over the host the request arrived on; its scheme is dropped.
pub fn public_host<'a>(request_host: &'a str, host_override: Option<&'a str>) -> &'a str {
    match host_override.filter(|h| !h.is_empty()) {
        Some(url) => {
            let host = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .unwrap_or(url);
            host.trim_end_matches('/')
        }
        None => request_host,
    }
}

/// Scheme clients should use to reach `host`.
///
/// Loopback development hosts are plain HTTP; everything else is HTTPS.
pub fn scheme_for(host: &str) -> &'static str {
    if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    }
}

/// Append `<scheme>://<host><schema_path>` to `buf`.
pub fn write_schema_url(buf: &mut String, host: &str, schema_path: &str) {
    buf.push_str(scheme_for(host));
    buf.push_str("://");
    buf.push_str(host);
    buf.push_str(schema_path);
}
