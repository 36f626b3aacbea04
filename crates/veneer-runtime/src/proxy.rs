//! Transparent reverse-proxy forwarding for proxy-configured endpoints.
//!
//! The incoming request is relayed to the configured upstream with a
//! rewritten header set and a bounded per-request timeout. A timeout aborts
//! the outbound call and surfaces as [`RuntimeError::ProxyTimeout`],
//! distinct from other transport failures.

use crate::catalog::types::{ProxyConfig, ProxyHeaderRules};
use crate::context::RequestContext;
use crate::error::RuntimeError;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Result of one forwarded request.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

pub struct ProxyForwarder {
    client: reqwest::Client,
}

impl Default for ProxyForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyForwarder {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Relay the request to the configured upstream.
    pub async fn forward(
        &self,
        config: &ProxyConfig,
        ctx: &RequestContext,
    ) -> Result<ForwardedResponse, RuntimeError> {
        let target_url = build_target_url(&config.target, &ctx.path, &ctx.query);
        let headers = merge_headers(&ctx.headers, &config.headers);

        let method = reqwest::Method::from_bytes(ctx.method.to_uppercase().as_bytes())
            .map_err(|e| RuntimeError::ProxyFailure(e.to_string()))?;

        debug!(method = %ctx.method, url = %target_url, "proxying request");

        let mut request = self
            .client
            .request(method, &target_url)
            .timeout(Duration::from_millis(config.timeout_ms));

        for (name, value) in &headers {
            request = request.header(name, value);
        }

        // Body is forwarded verbatim for non-GET methods.
        if !ctx.body.is_null() && !ctx.method.eq_ignore_ascii_case("GET") {
            request = request.json(&ctx.body);
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %target_url, error = %e, "proxy request failed");
            if e.is_timeout() {
                RuntimeError::ProxyTimeout
            } else {
                RuntimeError::ProxyFailure(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|value| (k.as_str().to_string(), value.to_string()))
            })
            .collect();

        let is_json = response_headers
            .get("content-type")
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                RuntimeError::ProxyTimeout
            } else {
                RuntimeError::ProxyFailure(e.to_string())
            }
        })?;

        // JSON content types get parsed, falling back to the raw text when
        // the upstream lies about its payload.
        let body = if is_json {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        };

        debug!(status, "proxy response received");

        Ok(ForwardedResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// Concatenate the upstream base URL (trailing slash stripped) with the
/// incoming path, then append the incoming query parameters.
pub fn build_target_url(base: &str, path: &str, query: &HashMap<String, String>) -> String {
    let base = base.trim_end_matches('/');
    let mut url = format!("{base}{path}");

    if !query.is_empty() {
        let mut pairs: Vec<(&String, &String)> = query.iter().collect();
        pairs.sort();
        let encoded: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        url.push('?');
        url.push_str(&encoded.join("&"));
    }

    url
}

/// Apply the header rewrite pipeline: remove deny-listed names, add
/// configured names only if absent, override unconditionally, and always
/// strip `host` and `connection`.
pub fn merge_headers(
    incoming: &HashMap<String, String>,
    rules: &ProxyHeaderRules,
) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = incoming
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect();

    for name in &rules.remove {
        headers.remove(&name.to_lowercase());
    }

    for (name, value) in &rules.add {
        let key = name.to_lowercase();
        headers.entry(key).or_insert_with(|| value.clone());
    }

    for (name, value) in &rules.override_ {
        headers.insert(name.to_lowercase(), value.clone());
    }

    headers.remove("host");
    headers.remove("connection");

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_target_url_strips_trailing_slash() {
        let url = build_target_url("https://api.example.com/", "/users/1", &HashMap::new());
        assert_eq!(url, "https://api.example.com/users/1");
    }

    #[test]
    fn test_target_url_appends_query() {
        let query = incoming(&[("page", "2"), ("q", "a b")]);
        let url = build_target_url("https://api.example.com", "/search", &query);
        assert_eq!(url, "https://api.example.com/search?page=2&q=a%20b");
    }

    #[test]
    fn test_header_pipeline_remove_add_override() {
        let rules = ProxyHeaderRules {
            remove: vec!["x-secret".to_string()],
            add: [("x-forwarded".to_string(), "v".to_string())]
                .into_iter()
                .collect(),
            override_: [("x-env".to_string(), "mock".to_string())]
                .into_iter()
                .collect(),
        };

        // Client without x-forwarded: add kicks in; x-secret removed;
        // x-env clobbered.
        let headers = merge_headers(
            &incoming(&[("x-secret", "s"), ("x-env", "prod"), ("accept", "*/*")]),
            &rules,
        );
        assert!(!headers.contains_key("x-secret"));
        assert_eq!(headers.get("x-forwarded"), Some(&"v".to_string()));
        assert_eq!(headers.get("x-env"), Some(&"mock".to_string()));
        assert_eq!(headers.get("accept"), Some(&"*/*".to_string()));

        // Client-supplied x-forwarded survives the add stage.
        let headers = merge_headers(&incoming(&[("X-Forwarded", "client")]), &rules);
        assert_eq!(headers.get("x-forwarded"), Some(&"client".to_string()));
    }

    #[test]
    fn test_host_and_connection_always_stripped() {
        let headers = merge_headers(
            &incoming(&[("Host", "mock.local"), ("Connection", "keep-alive")]),
            &ProxyHeaderRules::default(),
        );
        assert!(headers.is_empty());
    }

    #[test]
    fn test_remove_is_case_insensitive() {
        let rules = ProxyHeaderRules {
            remove: vec!["X-Secret".to_string()],
            ..Default::default()
        };
        let headers = merge_headers(&incoming(&[("x-SECRET", "s")]), &rules);
        assert!(headers.is_empty());
    }
}
