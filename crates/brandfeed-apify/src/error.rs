use std::time::Duration;

use thiserror::Error;

/// Errors returned by the Apify API client.
#[derive(Debug, Error)]
pub enum ApifyError {
    /// Network or TLS failure, or a non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429. `retry_after` is the server's `Retry-After`, when it sent one.
    #[error("rate limited by Apify")]
    RateLimited { retry_after: Option<Duration> },

    /// The client was built with an unusable setting.
    #[error("Apify client misconfigured: {0}")]
    Config(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApifyError {
    /// HTTP status carried by the error, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::RateLimited { .. } => Some(429),
            Self::Config(_) | Self::Deserialize { .. } => None,
        }
    }
}
