//! The request-handling pipeline.
//!
//! One dispatcher instance serves all traffic. Per request the steps run in
//! strict order: catalog resolution, method + path matching, dedup probe
//! (replay short-circuits everything downstream), proxy delegation, schema
//! validation, response selection, the simulated delay, template rendering,
//! and finally the fire-and-forget side effects (dedup store, notification,
//! analytics) that must never delay or fail the response.

use crate::analytics::{AnalyticsSink, RequestOutcome, RequestSummary};
use crate::catalog::types::{Endpoint, EndpointKind};
use crate::catalog::CatalogStore;
use crate::context::RequestContext;
use crate::dedup::{CachedResponse, CanonicalRequest, ReplayCache};
use crate::error::RuntimeError;
use crate::matcher::{normalize_path, PathTemplate};
use crate::notify::{
    EndpointSummary, NotificationDispatcher, NotificationEvent, RequestSnapshot, ResponseSnapshot,
};
use crate::proxy::ProxyForwarder;
use crate::selector::select_response;
use crate::template;
use crate::validate::{RequestParts, RequestValidator};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Marker header set on responses replayed from the dedup cache.
pub const REPLAYED_HEADER: &str = "x-veneer-replayed";
/// Marker header set on responses relayed from a live upstream.
pub const PROXIED_HEADER: &str = "x-veneer-proxied";

/// Event type dispatched for every mocked response.
pub const REQUEST_RECEIVED_EVENT: &str = "request.received";

/// The response triple handed back to the adapter.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

pub struct RequestDispatcher {
    catalog_store: Arc<dyn CatalogStore>,
    validator: Arc<dyn RequestValidator>,
    replay_cache: Arc<ReplayCache>,
    forwarder: ProxyForwarder,
    notifier: Arc<NotificationDispatcher>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl RequestDispatcher {
    pub fn new(
        catalog_store: Arc<dyn CatalogStore>,
        validator: Arc<dyn RequestValidator>,
        replay_cache: Arc<ReplayCache>,
        notifier: Arc<NotificationDispatcher>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            catalog_store,
            validator,
            replay_cache,
            forwarder: ProxyForwarder::new(),
            notifier,
            analytics,
        }
    }

    pub(crate) fn catalog_store(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog_store
    }

    /// Handle one inbound mock request end to end.
    pub async fn handle(
        &self,
        tenant: Option<&str>,
        api_slug: &str,
        mut ctx: RequestContext,
    ) -> Result<MockResponse, RuntimeError> {
        let catalog = self.catalog_store.fetch(tenant, api_slug).await?;

        // Endpoints are walked in catalog declaration order; the first
        // structural path match wins.
        let method = ctx.method.clone();
        let mut matched: Option<&Endpoint> = None;
        for endpoint in catalog
            .endpoints
            .iter()
            .filter(|e| e.enabled && e.kind == EndpointKind::Rest)
            .filter(|e| e.method.eq_ignore_ascii_case(&method))
        {
            if let Some(params) = PathTemplate::compile(&endpoint.path).match_path(&ctx.path) {
                ctx.path_params = params;
                matched = Some(endpoint);
                break;
            }
        }
        let endpoint = matched.ok_or(RuntimeError::EndpointNotFound)?;

        debug!(
            endpoint = %endpoint.id,
            method = %endpoint.method,
            path = %endpoint.path,
            "endpoint matched"
        );

        // Dedup probe: a hit replays the stored triple and bypasses
        // validation, delay, proxying, and rendering entirely.
        let canonical = endpoint
            .deduplication_enabled
            .then(|| canonical_request(&ctx));
        if let Some(canonical) = &canonical {
            if let Some(cached) = self.replay_cache.probe(&endpoint.id, canonical) {
                let mut headers = cached.headers;
                headers.insert(REPLAYED_HEADER.to_string(), "true".to_string());
                self.record_analytics(tenant, api_slug, endpoint, &ctx, cached.status, RequestOutcome::Replayed);
                return Ok(MockResponse {
                    status: cached.status,
                    headers,
                    body: cached.body,
                });
            }
        }

        // Proxy-configured endpoints delegate to the forwarder.
        if let Some(proxy) = &endpoint.proxy {
            let forwarded = self.forwarder.forward(proxy, &ctx).await?;
            let mut headers = forwarded.headers;
            headers.insert(PROXIED_HEADER.to_string(), "true".to_string());
            self.record_analytics(tenant, api_slug, endpoint, &ctx, forwarded.status, RequestOutcome::Proxied);
            return Ok(MockResponse {
                status: forwarded.status,
                headers,
                body: forwarded.body,
            });
        }

        if let Some(schema) = &endpoint.request_schema {
            let report = self.validator.validate(
                schema,
                &RequestParts {
                    query: &ctx.query,
                    body: &ctx.body,
                    headers: &ctx.headers,
                },
            );
            if !report.valid() {
                return Err(RuntimeError::ValidationFailed {
                    errors: report.errors,
                });
            }
        }

        let rule = select_response(&endpoint.responses, &ctx)
            .ok_or(RuntimeError::NoResponseDefined)?;

        // The single intentional latency injection point.
        if endpoint.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(endpoint.delay_ms)).await;
        }

        let body = rule
            .body
            .as_ref()
            .map(|b| template::render(b, &ctx))
            .unwrap_or(Value::Null);

        let mut headers = match &rule.headers {
            Some(configured) => template::render_headers(configured, &ctx),
            None => HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]),
        };

        if let Some(cache) = endpoint.cache.as_ref().filter(|c| c.enabled) {
            headers.insert(
                "Cache-Control".to_string(),
                format!("{}, max-age={}", cache.visibility.as_str(), cache.ttl_secs),
            );
            headers.insert("ETag".to_string(), content_etag(&body));
        }

        let response = MockResponse {
            status: rule.status,
            headers,
            body,
        };

        // Fire-and-forget side effects: the response is already decided.
        if let Some(canonical) = canonical {
            let cache = Arc::clone(&self.replay_cache);
            let endpoint_id = endpoint.id.clone();
            let entry = CachedResponse {
                status: response.status,
                headers: response.headers.clone(),
                body: response.body.clone(),
            };
            tokio::spawn(async move {
                cache.store(&endpoint_id, &canonical, entry);
            });
        }

        self.dispatch_notification(tenant, api_slug, endpoint, &ctx, &response);
        self.record_analytics(tenant, api_slug, endpoint, &ctx, response.status, RequestOutcome::Mocked);

        Ok(response)
    }

    fn dispatch_notification(
        &self,
        tenant: Option<&str>,
        api_slug: &str,
        endpoint: &Endpoint,
        ctx: &RequestContext,
        response: &MockResponse,
    ) {
        let event = NotificationEvent {
            event: REQUEST_RECEIVED_EVENT.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            workspace_id: tenant.map(|t| t.to_string()),
            api_slug: api_slug.to_string(),
            endpoint: Some(EndpointSummary {
                id: endpoint.id.clone(),
                method: endpoint.method.clone(),
                path: endpoint.path.clone(),
            }),
            request: RequestSnapshot {
                method: ctx.method.clone(),
                path: ctx.path.clone(),
                headers: ctx.headers.clone(),
                query: ctx.query.clone(),
                body: ctx.body.clone(),
            },
            response: ResponseSnapshot {
                status_code: response.status,
                headers: response.headers.clone(),
                body: response.body.clone(),
            },
        };

        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.dispatch(REQUEST_RECEIVED_EVENT, event).await;
        });
    }

    fn record_analytics(
        &self,
        tenant: Option<&str>,
        api_slug: &str,
        endpoint: &Endpoint,
        ctx: &RequestContext,
        status: u16,
        outcome: RequestOutcome,
    ) {
        let summary = RequestSummary {
            tenant: tenant.map(|t| t.to_string()),
            api_slug: api_slug.to_string(),
            endpoint_id: Some(endpoint.id.clone()),
            method: ctx.method.clone(),
            path: ctx.path.clone(),
            status,
            outcome,
        };
        let sink = Arc::clone(&self.analytics);
        tokio::spawn(async move {
            sink.record(summary).await;
        });
    }
}

fn canonical_request(ctx: &RequestContext) -> CanonicalRequest {
    CanonicalRequest {
        method: ctx.method.to_uppercase(),
        path: normalize_path(&ctx.path),
        query: ctx.query.clone(),
        body: ctx.body.clone(),
    }
}

/// Deterministic content hash of the rendered body, used as the ETag.
fn content_etag(body: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    format!("\"{hex}\"")
}
