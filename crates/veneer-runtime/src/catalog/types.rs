//! Catalog data model: endpoints, response rules, proxy and cache settings.
//!
//! These are the wire shapes a catalog is authored in (camelCase JSON/YAML).
//! A loaded catalog is immutable for the duration of one cache lease; the
//! runtime only ever reads it behind an `Arc`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A loaded endpoint catalog, keyed by (tenant, slug).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub id: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// One configured (method, path template) route within a catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub method: String,
    /// Path template with `:name` segments, e.g. `/users/:id`
    pub path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub responses: Vec<ResponseRule>,
    /// Simulated latency applied once before responding
    #[serde(default)]
    pub delay_ms: u64,
    /// Validation contract handed to the external validator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub deduplication_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub kind: EndpointKind,
    /// GraphQL operation name when `kind` is GraphQL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// "query" | "mutation" | "subscription" when `kind` is GraphQL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
}

/// REST route or GraphQL operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointKind {
    #[default]
    Rest,
    GraphQl,
}

/// One candidate response attached to an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRule {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_condition: Option<MatchCondition>,
}

/// Conditions gating a response rule. All present sub-conditions must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCondition {
    /// Query equality, compared by string coercion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<HashMap<String, Value>>,
    /// Header equality, names compared case-insensitively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Deep structural equality against the request body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_equals: Option<Value>,
}

/// Reverse-proxy settings for an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Upstream base URL the incoming path is appended to
    pub target: String,
    #[serde(default)]
    pub headers: ProxyHeaderRules,
    /// Per-request timeout for the outbound call
    #[serde(default = "default_proxy_timeout_ms")]
    pub timeout_ms: u64,
}

/// Header rewrite rules applied before forwarding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHeaderRules {
    /// Added only if the client did not already send the header
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub add: HashMap<String, String>,
    /// Deny-listed header names, removed unconditionally
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    /// Set unconditionally, clobbering any client value
    #[serde(
        rename = "override",
        default,
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub override_: HashMap<String, String>,
}

impl ProxyHeaderRules {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.override_.is_empty()
    }
}

/// Response caching headers configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub visibility: CacheVisibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheVisibility {
    #[default]
    Public,
    Private,
}

impl CacheVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheVisibility::Public => "public",
            CacheVisibility::Private => "private",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_status() -> u16 {
    200
}

fn default_proxy_timeout_ms() -> u64 {
    5000
}

fn default_cache_ttl_secs() -> u64 {
    60
}
