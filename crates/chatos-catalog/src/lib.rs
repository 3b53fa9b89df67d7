//! Marketplace/registry agent catalog and sub-agent selector (§4.2–§4.4).
//!
//! [`load_marketplace`] turns an effective manifest file into agent and
//! skill specs; [`Catalog`] merges those with a local registry file and
//! serves lookups and memoized content reads; [`select`]/[`select_with_llm`]
//! pick the best agent for a task, deterministically or with a model's
//! help.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod catalog;
mod loader;
mod selector;

pub use catalog::Catalog;
pub use loader::load_marketplace;
pub use selector::{Selection, SelectQuery, select, select_with_llm, tokenize};
