//! The router's top-level error sum type.
//!
//! Every dependency crate keeps its own `thiserror` enum; at the router's
//! public boundary each of those converges to [`RouterError`] via a single
//! `From` impl per source type, so the mapping to the tool protocol stays a
//! single function rather than scattered `match`es.

use thiserror::Error;

/// Errors surfaced by the router's public API.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The requested resource (agent, skill, job, MCP server, ...) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied malformed or incomplete input.
    #[error("bad input: {0}")]
    BadInput(String),

    /// The caller attempted to touch a job/resource owned by a different session.
    #[error("foreign session: {0}")]
    ForeignSession(String),

    /// A transient failure (network, retryable HTTP status) that exhausted its retries.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A programmer-level or unrecoverable failure (storage corruption, unopened store).
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl RouterError {
    /// Short machine-readable kind, used when wrapping results for the tool
    /// protocol (`{chatos: {status: "error", ...}}` payloads).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadInput(_) => "bad_input",
            Self::ForeignSession(_) => "foreign_session",
            Self::Transient(_) => "transient",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// Result alias for router operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_per_variant() {
        assert_eq!(RouterError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(RouterError::BadInput("x".into()).kind(), "bad_input");
        assert_eq!(
            RouterError::ForeignSession("x".into()).kind(),
            "foreign_session"
        );
        assert_eq!(RouterError::Transient("x".into()).kind(), "transient");
        assert_eq!(RouterError::Fatal("x".into()).kind(), "fatal");
    }
}
