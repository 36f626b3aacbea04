//! GraphQL mock traffic: operation matching and response shaping.
//!
//! GraphQL arrives as a single POST carrying `{query, operationName?,
//! variables?}`. The configured operation is chosen by `operationName`
//! first, then by extracting an operation name from the query text, then by
//! falling back to the first enabled GraphQL endpoint.

use crate::catalog::types::{Endpoint, EndpointKind};
use crate::dispatcher::{MockResponse, RequestDispatcher};
use crate::error::RuntimeError;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Wire shape of an inbound GraphQL request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
}

static OPERATION_REGEX: OnceLock<Regex> = OnceLock::new();

/// Extract an operation name from GraphQL query text.
///
/// This is a deliberate text-pattern approximation rather than an AST
/// parse; queries with unusual whitespace or comments can mis-extract.
/// Catalog behavior depends on it, so it stays.
pub fn extract_operation_name(query: &str) -> Option<&str> {
    let regex = OPERATION_REGEX
        .get_or_init(|| Regex::new(r"(?:query|mutation|subscription)\s+(\w+)").unwrap());
    regex
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pick the GraphQL endpoint for a request from the enabled candidates.
pub fn match_operation<'a>(
    endpoints: &[&'a Endpoint],
    request: &GraphQlRequest,
) -> Option<&'a Endpoint> {
    if let Some(name) = &request.operation_name {
        if let Some(endpoint) = endpoints
            .iter()
            .find(|e| e.operation_name.as_deref() == Some(name.as_str()))
            .copied()
        {
            return Some(endpoint);
        }
    }

    if let Some(extracted) = extract_operation_name(&request.query) {
        if let Some(endpoint) = endpoints
            .iter()
            .find(|e| e.operation_name.as_deref() == Some(extracted))
            .copied()
        {
            return Some(endpoint);
        }
    }

    endpoints.first().copied()
}

impl RequestDispatcher {
    /// Handle one inbound GraphQL request.
    pub async fn handle_graphql(
        &self,
        tenant: Option<&str>,
        api_slug: &str,
        request: GraphQlRequest,
    ) -> Result<MockResponse, RuntimeError> {
        let catalog = self.catalog_store().fetch(tenant, api_slug).await?;

        let candidates: Vec<&Endpoint> = catalog
            .endpoints
            .iter()
            .filter(|e| e.enabled && e.kind == EndpointKind::GraphQl)
            .collect();

        if candidates.is_empty() {
            return Err(RuntimeError::EndpointNotFound);
        }

        let endpoint = match_operation(&candidates, &request)
            .ok_or(RuntimeError::EndpointNotFound)?;

        let rule = endpoint
            .responses
            .iter()
            .find(|r| r.is_default)
            .or_else(|| endpoint.responses.first())
            .ok_or(RuntimeError::NoResponseDefined)?;

        if endpoint.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(endpoint.delay_ms)).await;
        }

        let body = rule.body.clone().unwrap_or(Value::Null);

        Ok(MockResponse {
            status: 200,
            headers: HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
            body: json!({ "data": body }),
        })
    }
}
