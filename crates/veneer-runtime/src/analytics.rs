//! Best-effort analytics sink.
//!
//! Recording must never affect the response path: implementations swallow
//! their own failures, and the dispatcher invokes the sink without awaiting
//! anything beyond the call itself.

use async_trait::async_trait;

/// Summary of one handled request.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub tenant: Option<String>,
    pub api_slug: String,
    pub endpoint_id: Option<String>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub outcome: RequestOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Mocked,
    Replayed,
    Proxied,
    Failed,
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, summary: RequestSummary);
}

/// Default sink: structured log lines only.
#[derive(Debug, Default)]
pub struct TracingAnalyticsSink;

#[async_trait]
impl AnalyticsSink for TracingAnalyticsSink {
    async fn record(&self, summary: RequestSummary) {
        tracing::info!(
            tenant = summary.tenant.as_deref().unwrap_or("-"),
            api = %summary.api_slug,
            endpoint = summary.endpoint_id.as_deref().unwrap_or("-"),
            method = %summary.method,
            path = %summary.path,
            status = summary.status,
            outcome = ?summary.outcome,
            "request handled"
        );
    }
}
