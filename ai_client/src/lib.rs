//! HTTP client for the AI completion service.
//!
//! [`AiClient::fetch_reply`] posts `{"userInput": .., "model": ..}` to the
//! service, retries transient failures with backoff and turns whatever comes
//! back (JSON, an event stream or plain text) into a single string. Upstream
//! failures never surface as errors: the caller always gets something it can
//! show to the user.

mod client;
mod error;
mod normalize;
mod retry;
mod sse;

pub use client::{parse_endpoint, AiClient, ClientConfig, ReplyRequest, ResponseMode};
pub use error::ClientError;
pub use normalize::{
    api_error, normalize, ContentKind, NormalizeError, EMPTY_RESPONSE, FORMAT_ERROR,
    INTERNAL_ERROR, SERVICE_UNAVAILABLE,
};
pub use retry::{AttemptOutcome, RetryPolicy, RetryReason};
pub use sse::{parse_data_line, EventStreamDecoder, DONE_MARKER};

/// Relays `text` with the default configuration (60 s timeout, 3 attempts,
/// 5 s backoff, JSON mode).
pub async fn fetch_reply(
    text: &str,
    endpoint: &str,
    model: Option<&str>,
) -> Result<String, ClientError> {
    AiClient::new(ClientConfig::default())?
        .fetch_reply(text, endpoint, model)
        .await
}
