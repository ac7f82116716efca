use thiserror::Error;

/// Errors a [`Broker`](super::Broker) can return for one fetch.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The vendor could not be reached (refused, reset, timed out).
    #[error("connection to data provider failed: {message}")]
    Connection { message: String },

    /// The vendor answered, but has no bars for the request.
    #[error("no data for {request}")]
    NoData { request: String },

    /// The vendor rejected the request (bad key, unknown symbol, throttled, ...).
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The request cannot be expressed for this vendor.
    #[error("invalid parameters for provider: {0}")]
    Validation(String),

    /// The response body did not match the expected schema.
    #[error("could not decode provider response: {0}")]
    Decode(String),

    /// Any other HTTP failure.
    #[error("API request failed: {0}")]
    Request(reqwest::Error),
}

impl ProviderError {
    /// True for transient failures that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::NoData { .. } | Self::Validation(_) | Self::Decode(_) | Self::Request(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Connection {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}
