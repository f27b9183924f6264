use serde::Deserialize;
use thiserror::Error;

use crate::sse::EventStreamDecoder;

pub const EMPTY_RESPONSE: &str = "Empty response";
pub const FORMAT_ERROR: &str = "Response format error";
pub const SERVICE_UNAVAILABLE: &str = "Service temporarily unavailable, please try again later";
pub const INTERNAL_ERROR: &str = "Internal error";

pub fn api_error(status: u16) -> String {
    format!("API error: {status}")
}

/// Body encodings understood by [`normalize`], picked from the declared
/// `Content-Type` of a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    EventStream,
    PlainText,
}

impl ContentKind {
    pub fn from_content_type(value: Option<&str>) -> Self {
        let essence = value
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase());

        match essence.as_deref() {
            Some("application/json") => ContentKind::Json,
            Some("text/event-stream") => ContentKind::EventStream,
            _ => ContentKind::PlainText,
        }
    }
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("malformed JSON body: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct JsonReply {
    content: Option<String>,
}

/// Turns a complete response body into the text shown to the user.
pub fn normalize(kind: ContentKind, body: &str) -> Result<String, NormalizeError> {
    let text = match kind {
        ContentKind::Json => serde_json::from_str::<JsonReply>(body)?
            .content
            .unwrap_or_default(),
        ContentKind::EventStream => {
            let mut decoder = EventStreamDecoder::new();
            decoder.push(body.as_bytes());
            decoder.finish()
        }
        ContentKind::PlainText => body.to_owned(),
    };
    Ok(or_empty_placeholder(text))
}

pub(crate) fn or_empty_placeholder(text: String) -> String {
    if text.trim().is_empty() {
        EMPTY_RESPONSE.to_owned()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_from_header() {
        assert_eq!(
            ContentKind::from_content_type(Some("application/json")),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::from_content_type(Some("Application/JSON; charset=utf-8")),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::from_content_type(Some("text/event-stream;charset=UTF-8")),
            ContentKind::EventStream
        );
        assert_eq!(
            ContentKind::from_content_type(Some("text/plain")),
            ContentKind::PlainText
        );
        assert_eq!(ContentKind::from_content_type(None), ContentKind::PlainText);
    }

    #[test]
    fn test_json_content() {
        let text = normalize(ContentKind::Json, r#"{"content": "X", "usage": 12}"#).unwrap();
        assert_eq!(text, "X");
    }

    #[test]
    fn test_json_without_content_is_empty_placeholder() {
        assert_eq!(
            normalize(ContentKind::Json, r#"{"answer": "X"}"#).unwrap(),
            EMPTY_RESPONSE
        );
        assert_eq!(
            normalize(ContentKind::Json, r#"{"content": null}"#).unwrap(),
            EMPTY_RESPONSE
        );
    }

    #[test]
    fn test_json_malformed() {
        assert!(normalize(ContentKind::Json, "{\"content\": ").is_err());
        assert!(normalize(ContentKind::Json, "[1, 2]").is_err());
        assert!(normalize(ContentKind::Json, r#"{"content": 42}"#).is_err());
    }

    #[test]
    fn test_event_stream_body() {
        let body = "data: {\"content\":\"a\"}\ndata: {\"content\":\"b\"}\ndata: [DONE]\n";
        assert_eq!(normalize(ContentKind::EventStream, body).unwrap(), "ab");
        assert_eq!(
            normalize(ContentKind::EventStream, "data: [DONE]\n").unwrap(),
            EMPTY_RESPONSE
        );
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(
            normalize(ContentKind::PlainText, "just <b>text</b>").unwrap(),
            "just <b>text</b>"
        );
        assert_eq!(normalize(ContentKind::PlainText, "  \n").unwrap(), EMPTY_RESPONSE);
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(api_error(404), "API error: 404");
    }
}
