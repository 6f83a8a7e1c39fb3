//! Error kinds reported to the caller of a fetch session
use thiserror::Error;

use crate::session_gateway::GatewayError;

/// Platform error code of "Rate limit exceeded"
/// ref: <https://developer.twitter.com/en/support/twitter-api/error-troubleshooting>
pub const RATE_LIMIT_EXCEEDED_CODE: i64 = 88;
const TOO_MANY_REQUESTS: u16 = 429;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TwitterError {
    #[error("No active session, the user credential is not loaded")]
    NotAuthenticated,
    #[error("Rate limit of the Twitter API is exceeded")]
    RateLimitExceeded,
    #[error("Invalid response from the Twitter API")]
    InvalidResponse,
    #[error("Unexpected failure: {0}")]
    Unknown(String),
}

impl TwitterError {
    /// Classify a failure of the gateway
    /// Only the rate limit is told apart, any other transport failure is an invalid response
    pub fn from_gateway(error: GatewayError) -> Self {
        match error {
            GatewayError::Transport(transport)
                if transport.code == Some(RATE_LIMIT_EXCEEDED_CODE)
                    || transport.status == Some(TOO_MANY_REQUESTS) =>
            {
                TwitterError::RateLimitExceeded
            }
            GatewayError::Transport(_) => TwitterError::InvalidResponse,
            GatewayError::Internal(message) => TwitterError::Unknown(message),
        }
    }
}

impl From<GatewayError> for TwitterError {
    fn from(error: GatewayError) -> Self {
        TwitterError::from_gateway(error)
    }
}
