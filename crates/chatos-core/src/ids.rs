//! Identifier generation and name normalization.
//!
//! `SessionId`/`RunId` are process-wide identifiers created once at startup
//! (from CLI/env overrides or generated) and threaded explicitly through
//! every constructor that needs them — never read from global state.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A process-wide session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

/// A process-wide run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

macro_rules! process_id {
    ($ty:ident, $env_var:literal) => {
        impl $ty {
            /// Resolve from the matching environment variable, or generate a
            /// new random id if unset.
            #[must_use]
            pub fn resolve() -> Self {
                std::env::var($env_var)
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(Self)
                    .unwrap_or_else(Self::generate)
            }

            /// Generate a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wrap an explicit value (used by tests and CLI overrides).
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

process_id!(SessionId, "MODEL_CLI_SESSION_ID");
process_id!(RunId, "MODEL_CLI_RUN_ID");

/// Slugify a name: lowercase, replace any run of non-`[a-z0-9_-]` characters
/// with a single `-`, then trim leading/trailing `-`.
///
/// Idempotent: `slugify(slugify(x)) == slugify(x)`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut last_was_sep = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Task Manager"), "task-manager");
        assert_eq!(slugify("  Spaced Out  "), "spaced-out");
        assert_eq!(slugify("a/b/c"), "a-b-c");
        assert_eq!(slugify("already-slug_123"), "already-slug_123");
    }

    #[test]
    fn slugify_is_idempotent() {
        for input in ["Task Manager", "  multi   space ", "a___b--c", "", "---"] {
            let once = slugify(input);
            let twice = slugify(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn session_id_new_and_display() {
        let id = SessionId::new("abc-123");
        assert_eq!(id.as_str(), "abc-123");
        assert_eq!(id.to_string(), "abc-123");
    }

    #[test]
    fn run_id_generate_is_nonempty() {
        let id = RunId::generate();
        assert!(!id.as_str().is_empty());
    }
}
