//! Per-request context shared by matching, selection, and rendering.

use serde_json::Value;
use std::collections::HashMap;

/// Ephemeral snapshot of one inbound request.
///
/// Header keys are lowercased at construction; `path_params` is filled in by
/// the dispatcher after path matching.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub path_params: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(
        method: &str,
        path: &str,
        query: HashMap<String, String>,
        headers: HashMap<String, String>,
        body: Value,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        Self {
            method: method.to_string(),
            path: path.to_string(),
            query,
            headers,
            body,
            path_params: HashMap::new(),
        }
    }

    /// Header lookup by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|v| v.as_str())
    }
}

/// Parse a raw query string into a map, URL-decoding values.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                let decoded = urlencoding::decode(value).unwrap_or_default().to_string();
                params.insert(key.to_string(), decoded);
            } else if !pair.is_empty() {
                params.insert(pair.to_string(), String::new());
            }
        }
    }
    params
}
