//! Request/response context seen by the response rewrite.

/// What the transformer needs from the HTTP layer serving a response.
pub trait ResponseContext {
    /// Host the request was addressed to, e.g. `api.example.com` or `localhost:8888`.
    fn host(&self) -> &str;

    /// Add a header value, keeping any values already set under `name`.
    fn append_header(&mut self, name: &str, value: &str);
}

/// In-memory response context: a host and an ordered multi-value header list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedResponse {
    host: String,
    headers: Vec<(String, String)>,
}

impl RecordedResponse {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            headers: Vec::new(),
        }
    }

    /// Values recorded under `name` (case-insensitive), in insertion order.
    pub fn headers(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Every recorded header, in insertion order.
    pub fn all_headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

impl ResponseContext for RecordedResponse {
    fn host(&self) -> &str {
        &self.host
    }

    fn append_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}
