//! Webhook delivery against a live local receiver: independent
//! per-subscription delivery and the secret header.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Response;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use veneer_runtime::notify::{
    InMemorySubscriptionStore, NotificationDispatcher, NotificationEvent, RequestSnapshot,
    ResponseSnapshot, RetryPolicy, Subscription,
};

/// Bind an ephemeral-port receiver that counts requests and records the
/// last secret header it saw.
async fn spawn_receiver() -> (String, Arc<AtomicUsize>, Arc<parking_lot::Mutex<Option<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let secret_seen = Arc::new(parking_lot::Mutex::new(None));

    let hits_clone = Arc::clone(&hits);
    let secret_clone = Arc::clone(&secret_seen);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let hits = Arc::clone(&hits_clone);
            let secret = Arc::clone(&secret_clone);
            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    let hits = Arc::clone(&hits);
                    let secret = Arc::clone(&secret);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        if let Some(value) = req.headers().get("x-webhook-secret") {
                            *secret.lock() = value.to_str().ok().map(|s| s.to_string());
                        }
                        Ok::<_, Infallible>(Response::new(Full::new(Bytes::from("ok"))))
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (format!("http://{addr}/hooks"), hits, secret_seen)
}

fn event() -> NotificationEvent {
    NotificationEvent {
        event: "request.received".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        workspace_id: None,
        api_slug: "demo".to_string(),
        endpoint: None,
        request: RequestSnapshot {
            method: "GET".to_string(),
            path: "/users/1".to_string(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Value::Null,
        },
        response: ResponseSnapshot {
            status_code: 200,
            headers: HashMap::new(),
            body: Value::Null,
        },
    }
}

fn subscription(id: &str, target_url: &str, secret: Option<&str>) -> Subscription {
    Subscription {
        id: id.to_string(),
        event_type: "request.received".to_string(),
        target_url: target_url.to_string(),
        secret: secret.map(|s| s.to_string()),
        tenant: None,
        active: true,
    }
}

#[tokio::test]
async fn reachable_target_succeeds_despite_failing_sibling() {
    let (url, hits, _) = spawn_receiver().await;

    // Nothing listens on port 9; that subscription burns through its
    // retries while the reachable one succeeds on the first attempt.
    let store = InMemorySubscriptionStore::new(vec![
        subscription("dead", "http://127.0.0.1:9/hooks", None),
        subscription("live", &url, None),
    ]);
    let dispatcher = NotificationDispatcher::new(
        Arc::new(store),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(20),
        },
    );

    dispatcher.dispatch("request.received", event()).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn secret_is_sent_as_header() {
    let (url, hits, secret_seen) = spawn_receiver().await;

    let store = InMemorySubscriptionStore::new(vec![subscription(
        "with-secret",
        &url,
        Some("s3cret"),
    )]);
    let dispatcher = NotificationDispatcher::new(Arc::new(store), RetryPolicy::default());

    dispatcher.dispatch("request.received", event()).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(secret_seen.lock().as_deref(), Some("s3cret"));
}

#[tokio::test]
async fn no_subscriptions_is_a_no_op() {
    let dispatcher = NotificationDispatcher::new(
        Arc::new(InMemorySubscriptionStore::default()),
        RetryPolicy::default(),
    );
    // Must simply return; nothing to deliver and nothing to await.
    dispatcher.dispatch("request.received", event()).await;
}
