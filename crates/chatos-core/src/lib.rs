//! Core types shared across the sub-agent router: identifiers, state-directory
//! resolution, the top-level error sum type, retry-decision logic, and output
//! truncation helpers.
//!
//! Every other crate in the workspace depends on this one; it has no internal
//! dependencies of its own.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod dirs;
pub mod error;
pub mod ids;
pub mod retry;
pub mod truncate;

pub use dirs::{ServerPaths, StateRoot};
pub use error::RouterError;
pub use ids::{RunId, SessionId, slugify};
pub use retry::{RetryDecision, RetryPolicy};
pub use truncate::truncate_at_char_boundary;
