//! Failure classification and the retry state machine.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Timeout,
    Connect,
    Dns,
    ServerError,
    Throttled,
    NotFound,
    Unauthorized,
    MalformedUrl,
    ClientError,
    Other,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Connect | FailureKind::Dns | FailureKind::ServerError | FailureKind::Throttled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connect => "connection failed",
            FailureKind::Dns => "dns lookup failed",
            FailureKind::ServerError => "server error",
            FailureKind::Throttled => "throttled",
            FailureKind::NotFound => "endpoint not found",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::MalformedUrl => "malformed url",
            FailureKind::ClientError => "client error",
            FailureKind::Other => "request failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure class for a non-200 HTTP status. `None` means success.
pub fn classify_status(code: u16) -> Option<FailureKind> {
    match code {
        200 => None,
        401 | 403 => Some(FailureKind::Unauthorized),
        404 => Some(FailureKind::NotFound),
        408 => Some(FailureKind::Timeout),
        429 => Some(FailureKind::Throttled),
        500..=599 => Some(FailureKind::ServerError),
        _ => Some(FailureKind::ClientError),
    }
}

/// Failure class for a transport error.
pub fn classify_error(err: &reqwest::Error) -> FailureKind {
    if err.is_builder() {
        return FailureKind::MalformedUrl;
    }
    if err.is_timeout() {
        return FailureKind::Timeout;
    }
    let chain = error_text(err).to_lowercase();
    if chain.contains("dns error") || chain.contains("failed to lookup") || chain.contains("name or service not known") {
        return FailureKind::Dns;
    }
    if err.is_connect() || err.is_request() || err.is_body() {
        return FailureKind::Connect;
    }
    FailureKind::Other
}

/// Full source chain of an error on one line.
pub fn error_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut src = err.source();
    while let Some(s) = src {
        let text = s.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        src = s.source();
    }
    parts.join(": ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    Success,
    NonStandardPayload,
    RetriesExhausted,
    Terminal,
}

/// Probe state. Attempts are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Attempt(u32),
    Done(Termination),
}

/// Transition after attempt `attempt` failed with `kind`.
/// Retryable failures continue while `attempt <= max_retries`, so a call makes
/// at most `max_retries + 1` attempts; terminal failures stop immediately.
pub fn after_failure(attempt: u32, max_retries: u32, kind: FailureKind) -> Step {
    if !kind.is_retryable() {
        Step::Done(Termination::Terminal)
    } else if attempt <= max_retries {
        Step::Attempt(attempt + 1)
    } else {
        Step::Done(Termination::RetriesExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(max_retries: u32, kind: FailureKind) -> (u32, Termination) {
        let mut step = Step::Attempt(1);
        let mut attempts = 0;
        loop {
            match step {
                Step::Attempt(n) => {
                    attempts = n;
                    step = after_failure(n, max_retries, kind);
                }
                Step::Done(t) => return (attempts, t),
            }
        }
    }

    #[test]
    fn transient_failures_make_retries_plus_one_attempts() {
        assert_eq!(run(2, FailureKind::Timeout), (3, Termination::RetriesExhausted));
        assert_eq!(run(1, FailureKind::ServerError), (2, Termination::RetriesExhausted));
        assert_eq!(run(0, FailureKind::Connect), (1, Termination::RetriesExhausted));
    }

    #[test]
    fn terminal_failures_stop_at_first_attempt() {
        assert_eq!(run(2, FailureKind::NotFound), (1, Termination::Terminal));
        assert_eq!(run(5, FailureKind::Unauthorized), (1, Termination::Terminal));
        assert_eq!(run(5, FailureKind::MalformedUrl), (1, Termination::Terminal));
    }

    #[test]
    fn status_classes() {
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(404), Some(FailureKind::NotFound));
        assert_eq!(classify_status(401), Some(FailureKind::Unauthorized));
        assert_eq!(classify_status(403), Some(FailureKind::Unauthorized));
        assert_eq!(classify_status(503), Some(FailureKind::ServerError));
        assert_eq!(classify_status(302), Some(FailureKind::ClientError));
        assert!(classify_status(500).unwrap().is_retryable());
        assert!(!classify_status(400).unwrap().is_retryable());
    }
}
