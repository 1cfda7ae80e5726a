//! Classification of model backend errors and retry backoff.
//!
//! Providers surface failures as `anyhow::Error` carrying the HTTP status and
//! response body in the message, so classification works on the rendered text.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverableError {
    RateLimit,
    NetworkError,
    ServerError,
    ModelBusy,
    Timeout,
    TokenLimit,
    ContextLengthExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Recoverable(RecoverableError),
    NonRecoverable,
}

impl ErrorType {
    /// Whether a plain retry of the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorType::Recoverable(
                RecoverableError::RateLimit
                    | RecoverableError::NetworkError
                    | RecoverableError::ServerError
                    | RecoverableError::ModelBusy
                    | RecoverableError::Timeout
            )
        )
    }

    /// Whether the request may succeed once the conversation is smaller.
    pub fn needs_smaller_context(&self) -> bool {
        matches!(
            self,
            ErrorType::Recoverable(
                RecoverableError::TokenLimit | RecoverableError::ContextLengthExceeded
            )
        )
    }
}

pub fn classify_error(error: &anyhow::Error) -> ErrorType {
    classify_message(&format!("{:#}", error))
}

pub fn classify_message(message: &str) -> ErrorType {
    let msg = message.to_lowercase();

    if msg.contains("rate limit") || msg.contains("rate_limit") || msg.contains("429")
        || msg.contains("too many requests")
    {
        return ErrorType::Recoverable(RecoverableError::RateLimit);
    }

    // Context overflow arrives as a 400, which must not be mistaken for a
    // generic bad request.
    if (msg.contains("400") || msg.contains("bad request"))
        && (msg.contains("context_length_exceeded")
            || msg.contains("context length")
            || msg.contains("prompt is too long"))
    {
        return ErrorType::Recoverable(RecoverableError::ContextLengthExceeded);
    }

    if msg.contains("token") && (msg.contains("limit") || msg.contains("exceeded")) {
        return ErrorType::Recoverable(RecoverableError::TokenLimit);
    }

    if msg.contains("overloaded") || msg.contains("model is busy") || msg.contains("529") {
        return ErrorType::Recoverable(RecoverableError::ModelBusy);
    }

    if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
        return ErrorType::Recoverable(RecoverableError::Timeout);
    }

    if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
        || msg.contains("internal server error")
        || msg.contains("bad gateway")
        || msg.contains("service unavailable")
        || msg.contains("server error")
    {
        return ErrorType::Recoverable(RecoverableError::ServerError);
    }

    if msg.contains("connection")
        || msg.contains("network")
        || msg.contains("dns")
        || msg.contains("broken pipe")
        || msg.contains("error sending request")
    {
        return ErrorType::Recoverable(RecoverableError::NetworkError);
    }

    ErrorType::NonRecoverable
}

/// Exponential backoff with up to 25% jitter, capped at `max`.
///
/// `attempt` is 1-based: the first retry waits roughly `base`.
pub fn calculate_retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base_ms = base.as_millis() as u64;
    let delay_ms = base_ms.saturating_mul(1u64 << exponent);
    let jitter_ms = if delay_ms >= 4 {
        rand::thread_rng().gen_range(0..=delay_ms / 4)
    } else {
        0
    };
    Duration::from_millis(delay_ms.saturating_add(jitter_ms)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_bad_request_is_not_context_overflow() {
        assert_eq!(
            classify_message("400 Bad Request: invalid model"),
            ErrorType::NonRecoverable
        );
    }

    #[test]
    fn test_context_overflow_needs_smaller_context() {
        let t = classify_message("Anthropic API error 400 Bad Request: prompt is too long");
        assert!(t.needs_smaller_context());
        assert!(!t.is_retryable());
    }

    #[test]
    fn test_delay_is_capped() {
        let delay = calculate_retry_delay(30, Duration::from_millis(500), Duration::from_secs(2));
        assert!(delay <= Duration::from_secs(2));
    }

    #[test]
    fn test_zero_base_delay() {
        assert_eq!(
            calculate_retry_delay(3, Duration::ZERO, Duration::from_secs(1)),
            Duration::ZERO
        );
    }
}
