use std::fmt::Debug;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::Serialize;
use tracing::instrument;

use crate::error::ClientError;
use crate::normalize::{
    api_error, normalize, or_empty_placeholder, ContentKind, FORMAT_ERROR, INTERNAL_ERROR,
    SERVICE_UNAVAILABLE,
};
use crate::retry::{AttemptOutcome, RetryPolicy, RetryReason};
use crate::sse::EventStreamDecoder;

/// Which encoding the client asks the service for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    #[default]
    Json,
    Stream,
}

impl ResponseMode {
    pub fn accept(&self) -> &'static str {
        match self {
            ResponseMode::Json => "application/json",
            ResponseMode::Stream => "text/event-stream",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Overall timeout of one HTTP attempt, body included.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub mode: ResponseMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            mode: ResponseMode::Json,
        }
    }
}

/// One user message on its way to the completion service.
#[derive(Debug, Clone)]
pub struct ReplyRequest {
    text: String,
    endpoint: Url,
    model: Option<String>,
}

impl ReplyRequest {
    pub fn new(
        text: impl Into<String>,
        endpoint: Url,
        model: Option<String>,
    ) -> Result<Self, ClientError> {
        let text = text.into();
        if text.is_empty() {
            return Err(ClientError::EmptyText);
        }
        Ok(Self {
            text,
            endpoint: check_scheme(endpoint)?,
            model,
        })
    }

    pub fn parse(
        text: impl Into<String>,
        endpoint: &str,
        model: Option<String>,
    ) -> Result<Self, ClientError> {
        Self::new(text, parse_endpoint(endpoint)?, model)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

/// Parses and checks an endpoint URL. Only `http` and `https` are accepted.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, ClientError> {
    check_scheme(Url::parse(endpoint)?)
}

fn check_scheme(url: Url) -> Result<Url, ClientError> {
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::UnsupportedScheme(other.to_string())),
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    #[serde(rename = "userInput")]
    user_input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

impl<'a> From<&'a ReplyRequest> for ChatPayload<'a> {
    fn from(request: &'a ReplyRequest) -> Self {
        Self {
            user_input: &request.text,
            model: request.model.as_deref(),
        }
    }
}

#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("config", &self.config)
            .finish()
    }
}

impl AiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validates the arguments and relays `text` to `endpoint`.
    ///
    /// Only invalid arguments produce an `Err`; every upstream failure ends up
    /// as a placeholder string in `Ok`.
    pub async fn fetch_reply(
        &self,
        text: &str,
        endpoint: &str,
        model: Option<&str>,
    ) -> Result<String, ClientError> {
        let request = ReplyRequest::parse(text, endpoint, model.map(str::to_owned))?;
        Ok(self.send(&request).await)
    }

    /// Runs the retry loop for an already validated request.
    #[instrument(skip_all, fields(endpoint = %request.endpoint, model = ?request.model, attempts))]
    pub async fn send(&self, request: &ReplyRequest) -> String {
        let span = tracing::Span::current();
        let policy = &self.config.retry;
        let attempts = policy.attempts();

        for attempt in 1..=attempts {
            span.record("attempts", attempt);

            match self.attempt(request).await {
                AttemptOutcome::Success(text) => return text,
                AttemptOutcome::TerminalFailure(message) => return message,
                AttemptOutcome::RetryableFailure(reason) => {
                    tracing::warn!("Attempt {attempt}/{attempts} failed: {reason}");
                    if attempt < attempts {
                        tokio::time::sleep(policy.delay(&reason, attempt)).await;
                    }
                }
            }
        }

        tracing::error!("Giving up after {attempts} attempts");
        SERVICE_UNAVAILABLE.to_owned()
    }

    async fn attempt(&self, request: &ReplyRequest) -> AttemptOutcome {
        let response = match self
            .http
            .post(request.endpoint.clone())
            .header(ACCEPT, self.config.mode.accept())
            .json(&ChatPayload::from(request))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();
        if status.is_server_error() {
            return AttemptOutcome::RetryableFailure(RetryReason::Status(status));
        }
        if !status.is_success() {
            tracing::error!("Upstream rejected the request with {status}");
            return AttemptOutcome::TerminalFailure(api_error(status.as_u16()));
        }

        let kind = ContentKind::from_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
        );
        tracing::debug!("Reading {kind:?} reply");

        if kind == ContentKind::EventStream {
            return read_event_stream(response).await;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return classify_transport_error(&e),
        };
        match normalize(kind, &body) {
            Ok(text) => AttemptOutcome::Success(text),
            Err(e) => {
                tracing::error!("Failed to decode reply: {e}");
                AttemptOutcome::TerminalFailure(FORMAT_ERROR.to_owned())
            }
        }
    }
}

/// Reads the body chunk by chunk and stops at the `[DONE]` marker without
/// waiting for the connection to close.
async fn read_event_stream(mut response: reqwest::Response) -> AttemptOutcome {
    let mut decoder = EventStreamDecoder::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if decoder.push(&chunk) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => return classify_transport_error(&e),
        }
    }
    AttemptOutcome::Success(or_empty_placeholder(decoder.finish()))
}

fn classify_transport_error(err: &reqwest::Error) -> AttemptOutcome {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() || err.is_decode()
    {
        AttemptOutcome::RetryableFailure(RetryReason::Transport(err.to_string()))
    } else {
        tracing::error!("Unexpected HTTP client error: {err:?}");
        AttemptOutcome::TerminalFailure(INTERNAL_ERROR.to_owned())
    }
}
