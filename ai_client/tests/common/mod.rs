//! Scripted stand-in for the completion service.
//!
//! Every `POST /chat` pops the next [`Scripted`] reply and records what the
//! client sent, so tests can assert on both sides of the exchange. `/loop`
//! redirects to itself forever.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_client::{AiClient, ClientConfig, ResponseMode, RetryPolicy};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::Router;
use tokio::net::TcpListener;

pub const STATUS_BACKOFF: Duration = Duration::from_millis(200);
pub const NETWORK_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct Scripted {
    status: u16,
    content_type: &'static str,
    body: String,
    delay: Option<Duration>,
}

impl Scripted {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
            delay: None,
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200, "application/json", body)
    }

    pub fn status(status: u16) -> Self {
        Self::new(status, "text/plain", "upstream says no")
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct ServerState {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl ServerState {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn chat(State(state): State<ServerState>, headers: HeaderMap, body: String) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(Recorded {
        accept: header_value(&headers, header::ACCEPT),
        content_type: header_value(&headers, header::CONTENT_TYPE),
        body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
    });

    let next = state.script.lock().unwrap().pop_front();
    let Some(reply) = next else {
        return (StatusCode::GONE, "script exhausted").into_response();
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    (
        StatusCode::from_u16(reply.status).unwrap(),
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
        .into_response()
}

async fn redirect_loop(State(state): State<ServerState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FOUND, [(header::LOCATION, "/loop")]).into_response()
}

/// Binds to 127.0.0.1:0 and serves the script. Returns the `/chat` URL.
pub async fn start(script: Vec<Scripted>) -> (String, ServerState) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let state = ServerState {
        script: Arc::new(Mutex::new(script.into())),
        ..Default::default()
    };
    let app = Router::new()
        .route("/chat", post(chat))
        .route("/loop", any(redirect_loop))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to port 0");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("http://{addr}/chat"), state)
}

/// Address nothing listens on.
pub async fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to port 0");
    let addr = listener.local_addr().expect("get local addr");
    drop(listener);
    format!("http://{addr}/chat")
}

pub fn client(mode: ResponseMode, timeout: Duration) -> AiClient {
    AiClient::new(ClientConfig {
        timeout,
        retry: RetryPolicy {
            max_attempts: 3,
            status_backoff: STATUS_BACKOFF,
            network_backoff: NETWORK_BACKOFF,
        },
        mode,
    })
    .expect("build client")
}

pub fn json_client() -> AiClient {
    client(ResponseMode::Json, Duration::from_secs(5))
}
