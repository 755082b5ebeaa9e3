use thiserror::Error;

/// Errors surfaced by a venue client, before any retry decision is made
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VenueError {
    /// Venue understood the request and refused it (bad params, unknown order, ...)
    #[error("venue error {code}: {message}")]
    Business { code: i64, message: String },

    /// Network level failure (connect, reset, 5xx)
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Response body could not be understood
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl VenueError {
    pub fn business(code: i64, message: impl Into<String>) -> Self {
        VenueError::Business {
            code,
            message: message.into(),
        }
    }

    /// Transient failures worth another attempt. Binance reports overload and
    /// disconnects through a handful of business codes that also qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            VenueError::Transport(_) | VenueError::Timeout | VenueError::RateLimited { .. } => true,
            VenueError::Business { code, .. } => {
                matches!(code, -1000 | -1001 | -1003 | -1015 | -1016)
            }
            VenueError::Malformed(_) => false,
        }
    }

    /// Parse a Binance style `{"code": -2010, "msg": "..."}` body.
    /// Returns `None` when the body is not in that shape.
    pub fn from_api_body(body: &str) -> Option<Self> {
        #[derive(serde::Deserialize)]
        struct ApiError {
            code: i64,
            msg: String,
        }

        serde_json::from_str::<ApiError>(body)
            .ok()
            .map(|err| VenueError::business(err.code, err.msg))
    }
}

impl From<reqwest::Error> for VenueError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VenueError::Timeout
        } else if err.is_decode() {
            VenueError::Malformed(err.to_string())
        } else {
            VenueError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for VenueError {
    fn from(err: serde_json::Error) -> Self {
        VenueError::Malformed(err.to_string())
    }
}
