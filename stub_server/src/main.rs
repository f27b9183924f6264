use anyhow::Result;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::instrument;

#[derive(Parser, Debug)]
#[clap(about = "Local stand-in for the AI completion service")]
struct Args {
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    address: String,
    /// Answer 503 to this many requests before serving replies.
    #[clap(short, long, env = "FLAKY_REQUESTS", default_value = "0")]
    flaky_requests: u32,
}

#[derive(serde::Deserialize, Debug)]
struct ChatRequest {
    #[serde(rename = "userInput")]
    user_input: String,
    model: Option<String>,
}

struct Shared {
    failures_left: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Json,
    EventStream,
    PlainText,
}

impl Encoding {
    fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(value) if value.contains("text/event-stream") => Encoding::EventStream,
            Some(value) if value.contains("application/json") => Encoding::Json,
            _ => Encoding::PlainText,
        }
    }
}

fn reply_text(request: &ChatRequest) -> String {
    format!(
        "Response for [{}] from {}",
        request.user_input,
        request.model.as_deref().unwrap_or("default")
    )
}

/// Returns the content type and body carrying `content` in `encoding`.
fn render(encoding: Encoding, content: &str) -> (&'static str, String) {
    match encoding {
        Encoding::Json => (
            "application/json",
            serde_json::json!({ "content": content }).to_string(),
        ),
        Encoding::EventStream => {
            let mut body = String::new();
            for word in content.split_inclusive(' ') {
                body.push_str(&format!(
                    "data: {}\n\n",
                    serde_json::json!({ "content": word })
                ));
            }
            body.push_str("data: [DONE]\n\n");
            ("text/event-stream", body)
        }
        Encoding::PlainText => ("text/plain; charset=utf-8", content.to_owned()),
    }
}

#[instrument(skip_all, fields(model, encoding))]
async fn chat(
    State(shared): State<Arc<Shared>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let span = tracing::Span::current();

    if shared
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        tracing::warn!("Simulating an unavailable service");
        return (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response();
    }

    let encoding = Encoding::from_accept(
        headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok()),
    );
    span.record("model", request.model.as_deref().unwrap_or("default"));
    span.record("encoding", tracing::field::debug(encoding));

    let (content_type, body) = render(encoding, &reply_text(&request));
    tracing::info!("SUCCESS");
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    tracing::info!("Starting stub AI service with Args={:?}", args);

    let shared = Arc::new(Shared {
        failures_left: AtomicU32::new(args.flaky_requests),
    });
    let app = Router::new()
        .route("/", get(|| async { "Stub AI service is running" }))
        .route("/chat", post(chat))
        .with_state(shared);

    tracing::info!("Listening on {}", &args.address);
    let listener = TcpListener::bind(&args.address).await?;

    axum::serve(listener, app).await?;
    tracing::info!("Server shutdown");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::{normalize, ContentKind};

    fn request(model: Option<&str>) -> ChatRequest {
        ChatRequest {
            user_input: "what is rust".to_string(),
            model: model.map(str::to_owned),
        }
    }

    #[test]
    fn test_encoding_from_accept() {
        assert_eq!(
            Encoding::from_accept(Some("text/event-stream")),
            Encoding::EventStream
        );
        assert_eq!(
            Encoding::from_accept(Some("application/json")),
            Encoding::Json
        );
        assert_eq!(Encoding::from_accept(Some("*/*")), Encoding::PlainText);
        assert_eq!(Encoding::from_accept(None), Encoding::PlainText);
    }

    #[test]
    fn test_rendered_replies_decode_to_the_same_text() {
        let content = reply_text(&request(Some("gemma")));
        assert_eq!(content, "Response for [what is rust] from gemma");

        for encoding in [Encoding::Json, Encoding::EventStream, Encoding::PlainText] {
            let (content_type, body) = render(encoding, &content);
            let kind = ContentKind::from_content_type(Some(content_type));
            assert_eq!(normalize(kind, &body).unwrap(), content, "{encoding:?}");
        }
    }

    #[test]
    fn test_event_stream_ends_with_done() {
        let (_, body) = render(Encoding::EventStream, "a b");
        assert_eq!(
            body,
            "data: {\"content\":\"a \"}\n\ndata: {\"content\":\"b\"}\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn test_flaky_requests_answer_503_first() {
        let shared = Arc::new(Shared {
            failures_left: AtomicU32::new(1),
        });
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "application/json".parse().unwrap());

        let first = chat(State(shared.clone()), headers.clone(), Json(request(None))).await;
        assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);

        let second = chat(State(shared), headers, Json(request(None))).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(
            second.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
