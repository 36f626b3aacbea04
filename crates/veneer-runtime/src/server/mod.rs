//! HTTP adapter: accepts live traffic and drives the dispatcher.
//!
//! Routes:
//! - `ANY /mock/{slug}/{path...}`: REST mock namespace. The tenant comes
//!   from the `x-workspace-id` header or the `workspaceId` query parameter.
//! - `POST /graphql/{slug}`: GraphQL mock namespace.

use crate::config::Config;
use crate::context::{parse_query_string, RequestContext};
use crate::dispatcher::{MockResponse, RequestDispatcher};
use crate::error::RuntimeError;
use crate::graphql::GraphQlRequest;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct MockServer {
    config: Config,
    dispatcher: Arc<RequestDispatcher>,
}

impl MockServer {
    pub fn new(config: Config, dispatcher: Arc<RequestDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr: SocketAddr =
            format!("{}:{}", self.config.listen.host, self.config.listen.port).parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("Listening on http://{}", addr);

        let dispatcher = self.dispatcher;
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let dispatcher = Arc::clone(&dispatcher);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move { handle_connection(req, dispatcher).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

async fn handle_connection(
    req: Request<Incoming>,
    dispatcher: Arc<RequestDispatcher>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let uri = req.uri().clone();
    let path = uri.path().to_string();
    let query = parse_query_string(uri.query());

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|value| (k.as_str().to_lowercase(), value.to_string()))
        })
        .collect();

    let body = collect_body(req).await;

    // Tenant comes from the header first, the query parameter second.
    let tenant = headers
        .get("x-workspace-id")
        .cloned()
        .or_else(|| query.get("workspaceId").cloned());

    let result = if let Some(rest) = path.strip_prefix("/mock/") {
        let (slug, mock_path) = split_namespace(rest);
        let ctx = RequestContext::new(&method, &mock_path, query, headers, body);
        dispatcher.handle(tenant.as_deref(), &slug, ctx).await
    } else if let Some(rest) = path.strip_prefix("/graphql/") {
        let (slug, _) = split_namespace(rest);
        if method != "POST" {
            return Ok(plain_error(
                StatusCode::METHOD_NOT_ALLOWED,
                "GraphQL endpoint only accepts POST",
            ));
        }
        match serde_json::from_value::<GraphQlRequest>(body) {
            Ok(request) => dispatcher.handle_graphql(tenant.as_deref(), &slug, request).await,
            Err(_) => {
                return Ok(plain_error(
                    StatusCode::BAD_REQUEST,
                    "Invalid GraphQL request body",
                ))
            }
        }
    } else {
        return Ok(plain_error(StatusCode::NOT_FOUND, "Not Found"));
    };

    Ok(match result {
        Ok(response) => to_http_response(response),
        Err(err) => error_response(&err),
    })
}

/// Split `{slug}/{rest...}` into the catalog slug and the mock-relative path.
fn split_namespace(rest: &str) -> (String, String) {
    match rest.split_once('/') {
        Some((slug, mock_path)) => (slug.to_string(), format!("/{mock_path}")),
        None => (rest.to_string(), "/".to_string()),
    }
}

async fn collect_body(req: Request<Incoming>) -> Value {
    match req.into_body().collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
            }
        }
        Err(_) => Value::Null,
    }
}

fn to_http_response(response: MockResponse) -> Response<Full<Bytes>> {
    let payload = match &response.body {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK));
    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    builder
        .body(Full::new(Bytes::from(payload)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

fn error_response(err: &RuntimeError) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(err.to_body().to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

fn plain_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = format!(r#"{{"error": "{message}"}}"#);
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}
