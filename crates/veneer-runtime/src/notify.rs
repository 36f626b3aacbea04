//! Webhook notification dispatch.
//!
//! Delivery happens entirely off the response path: the dispatcher is
//! invoked without being awaited, each subscription gets its own spawned
//! delivery task with retry and exponential backoff, and exhausted failures
//! are logged and dropped. One slow or failing target never delays the
//! rest.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Event payload delivered to listeners. Immutable once constructed; there
/// is no identity beyond the payload and delivery is best-effort.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub event: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub api_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointSummary>,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub id: String,
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// One registered listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub event_type: String,
    pub target_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// External subscription store collaborator.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Active subscriptions for an event type, optionally scoped to a tenant.
    async fn find_active(&self, event_type: &str, tenant: Option<&str>) -> Vec<Subscription>;
}

/// In-memory store used by tests and the demo server.
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: RwLock::new(subscriptions),
        }
    }

    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.write().push(subscription);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_active(&self, event_type: &str, tenant: Option<&str>) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.active && s.event_type == event_type)
            .filter(|s| match tenant {
                Some(t) => s.tenant.as_deref() == Some(t),
                None => true,
            })
            .cloned()
            .collect()
    }
}

/// Retry policy for webhook delivery.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

pub struct NotificationDispatcher {
    store: Arc<dyn SubscriptionStore>,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn SubscriptionStore>, policy: RetryPolicy) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
            policy,
        }
    }

    /// Deliver an event to every matching subscription. Never returns an
    /// error; the caller invokes this inside a spawned task and does not
    /// await individual deliveries.
    pub async fn dispatch(&self, event_type: &str, payload: NotificationEvent) {
        let subscriptions = self
            .store
            .find_active(event_type, payload.workspace_id.as_deref())
            .await;

        if subscriptions.is_empty() {
            return;
        }

        debug!(
            event = %event_type,
            targets = subscriptions.len(),
            "dispatching notifications"
        );

        for subscription in subscriptions {
            let client = self.client.clone();
            let policy = self.policy;
            let payload = payload.clone();
            tokio::spawn(async move {
                deliver_with_retry(client, policy, subscription, payload).await;
            });
        }
    }
}

async fn deliver_with_retry(
    client: reqwest::Client,
    policy: RetryPolicy,
    subscription: Subscription,
    payload: NotificationEvent,
) {
    for attempt in 1..=policy.max_attempts {
        match deliver(&client, &subscription, &payload).await {
            Ok(()) => {
                debug!(url = %subscription.target_url, attempt, "webhook delivered");
                return;
            }
            Err(e) if attempt == policy.max_attempts => {
                error!(
                    url = %subscription.target_url,
                    attempts = policy.max_attempts,
                    error = %e,
                    "webhook delivery failed, dropping event"
                );
                return;
            }
            Err(e) => {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = policy.base_delay * 2u32.pow(attempt - 1);
                warn!(
                    url = %subscription.target_url,
                    attempt,
                    max = policy.max_attempts,
                    error = %e,
                    "webhook attempt failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn deliver(
    client: &reqwest::Client,
    subscription: &Subscription,
    payload: &NotificationEvent,
) -> Result<(), String> {
    let mut request = client
        .post(&subscription.target_url)
        .header("content-type", "application/json")
        .json(payload);

    if let Some(secret) = &subscription.secret {
        request = request.header("x-webhook-secret", secret);
    }

    let response = request.send().await.map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(id: &str, event_type: &str, tenant: Option<&str>, active: bool) -> Subscription {
        Subscription {
            id: id.to_string(),
            event_type: event_type.to_string(),
            target_url: format!("http://listener.test/{id}"),
            secret: None,
            tenant: tenant.map(|t| t.to_string()),
            active,
        }
    }

    #[tokio::test]
    async fn test_find_active_filters_event_type_and_state() {
        let store = InMemorySubscriptionStore::new(vec![
            subscription("a", "request.received", None, true),
            subscription("b", "request.received", None, false),
            subscription("c", "catalog.updated", None, true),
        ]);

        let found = store.find_active("request.received", None).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[tokio::test]
    async fn test_find_active_tenant_scoping() {
        let store = InMemorySubscriptionStore::new(vec![
            subscription("a", "request.received", Some("ws-1"), true),
            subscription("b", "request.received", Some("ws-2"), true),
            subscription("c", "request.received", None, true),
        ]);

        // Tenant-scoped lookup matches that tenant's subscriptions only.
        let found = store.find_active("request.received", Some("ws-1")).await;
        let ids: Vec<&str> = found.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);

        // Unscoped lookup sees everything active.
        let found = store.find_active("request.received", None).await;
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = (1..policy.max_attempts)
            .map(|attempt| policy.base_delay * 2u32.pow(attempt - 1))
            .collect();
        assert_eq!(
            delays,
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = NotificationEvent {
            event: "request.received".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            workspace_id: Some("ws-1".to_string()),
            api_slug: "orders".to_string(),
            endpoint: Some(EndpointSummary {
                id: "ep-1".to_string(),
                method: "GET".to_string(),
                path: "/orders/:id".to_string(),
            }),
            request: RequestSnapshot {
                method: "GET".to_string(),
                path: "/orders/9".to_string(),
                headers: HashMap::new(),
                query: HashMap::new(),
                body: Value::Null,
            },
            response: ResponseSnapshot {
                status_code: 200,
                headers: HashMap::new(),
                body: Value::Null,
            },
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["workspaceId"], "ws-1");
        assert_eq!(json["apiSlug"], "orders");
        assert_eq!(json["response"]["statusCode"], 200);
    }
}
