use thiserror::Error;

/// Errors returned for invalid input. Upstream failures never show up here,
/// they are turned into placeholder replies instead.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("user text is empty")]
    EmptyText,

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
