use std::fmt;

use thiserror::Error;

/// Failure classes the retry policy and callers dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, timeout or body-read failure. Always retryable.
    TransientNetwork,
    /// Throttling or temporary service unavailability.
    RetryableExchange,
    /// The exchange could not tell whether the request was executed.
    AmbiguousExecution,
    /// Any other non-2xx answer from the exchange.
    RejectedExchange,
    /// Bad input, missing credentials, disabled feature or mode mismatch.
    Validation,
}

/// HTTP status plus the exchange's application error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: u16,
    pub code: i64,
    pub msg: String,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http {}, code {}: {}", self.status, self.code, self.msg)
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("exchange temporarily unavailable ({0})")]
    RetryableExchange(ApiFailure),

    #[error("execution state unknown ({0}); query the order before resubmitting")]
    AmbiguousExecution(ApiFailure),

    #[error("exchange rejected request ({0})")]
    RejectedExchange(ApiFailure),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl ExchangeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ExchangeError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExchangeError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            ExchangeError::RetryableExchange(_) => ErrorKind::RetryableExchange,
            ExchangeError::AmbiguousExecution(_) => ErrorKind::AmbiguousExecution,
            ExchangeError::RejectedExchange(_) => ErrorKind::RejectedExchange,
            ExchangeError::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientNetwork | ErrorKind::RetryableExchange
        )
    }

    /// Exchange payload, if the error came from an HTTP answer
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            ExchangeError::RetryableExchange(f)
            | ExchangeError::AmbiguousExecution(f)
            | ExchangeError::RejectedExchange(f) => Some(f),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::TransientNetwork(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure() -> ApiFailure {
        ApiFailure {
            status: 503,
            code: -1008,
            msg: "Request throttled".to_string(),
        }
    }

    #[test]
    fn test_kind_and_retryability() {
        assert!(ExchangeError::TransientNetwork("timeout".into()).is_retryable());
        assert!(ExchangeError::RetryableExchange(failure()).is_retryable());
        assert!(!ExchangeError::AmbiguousExecution(failure()).is_retryable());
        assert!(!ExchangeError::RejectedExchange(failure()).is_retryable());
        assert!(!ExchangeError::validation("bad").is_retryable());

        assert_eq!(
            ExchangeError::AmbiguousExecution(failure()).kind(),
            ErrorKind::AmbiguousExecution
        );
    }

    #[test]
    fn test_display_carries_exchange_payload() {
        let err = ExchangeError::RejectedExchange(ApiFailure {
            status: 400,
            code: -1111,
            msg: "Precision is over the maximum defined for this asset.".to_string(),
        });
        let text = err.to_string();
        assert!(text.contains("http 400"));
        assert!(text.contains("-1111"));
        assert_eq!(err.api_failure().map(|f| f.code), Some(-1111));
    }
}
