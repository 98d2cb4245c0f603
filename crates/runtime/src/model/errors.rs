use thiserror::Error;

/// Errors from LLM provider calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The provider rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider throttled the request.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// The call exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The provider returned a non-success status.
    #[error("provider api: {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Whether the loop may retry this fault with backoff.
    ///
    /// Authentication and malformed-response faults are terminal; throttling,
    /// timeouts, and transient network failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::Timeout | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_classes() {
        assert!(ModelError::Timeout.is_retryable());
        assert!(ModelError::RateLimit("429".into()).is_retryable());
        assert!(ModelError::Network("reset".into()).is_retryable());
        assert!(!ModelError::Auth("bad key".into()).is_retryable());
        assert!(!ModelError::InvalidResponse("truncated".into()).is_retryable());
        assert!(
            !ModelError::Api {
                status: 500,
                body: "oops".into()
            }
            .is_retryable()
        );
    }
}
