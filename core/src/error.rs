use thiserror::Error;

/// Failure taxonomy shared by every check. Each variant is converted into a
/// result record at the check boundary; none of them aborts a run.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("terminal failure: {0}")]
    Terminal(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CheckError {
    /// Short stable label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckError::NotFound(_) => "not-found",
            CheckError::Parse(_) => "parse",
            CheckError::PermissionDenied(_) => "permission-denied",
            CheckError::Timeout(_) => "timeout",
            CheckError::Transient(_) => "transient",
            CheckError::Terminal(_) => "terminal",
            CheckError::Other(_) => "other",
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckError::Timeout(_) | CheckError::Transient(_))
    }
}

/// Render an error chain on one line (`outer: inner: root`).
pub fn error_chain(err: &anyhow::Error) -> String {
    err.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn retryable_kinds() {
        assert!(CheckError::Timeout("x".into()).is_retryable());
        assert!(CheckError::Transient("x".into()).is_retryable());
        assert!(!CheckError::Terminal("x".into()).is_retryable());
        assert!(!CheckError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn chain_joins_context() {
        let err = Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
            .context("reading web.config")
            .unwrap_err();
        assert_eq!(error_chain(&err), "reading web.config: disk gone");
    }

    #[test]
    fn messages_carry_detail() {
        let e = CheckError::PermissionDenied("C:\\inetpub".into());
        assert_eq!(e.to_string(), "permission denied: C:\\inetpub");
        assert_eq!(e.kind(), "permission-denied");
    }
}
