//! Embedded persistence for the sub-agent router.
//!
//! Provides [`KvStore`]: raw byte-level `get`/`set`/`delete` over an
//! embedded `SurrealKV` engine, used for the config store's JSON-blob
//! settings map and, via namespaced keys, the job/event/model-route tables
//! (§4.9).
//!
//! "Embedded key/value + relational store" (§4.1) is realized as a single
//! `SurrealKV` engine: the relational tables are modeled as key-prefixed
//! scans rather than a separate SurrealQL query layer, since nothing in
//! this workspace needs ad-hoc queries beyond what the typed stores in
//! `chatos-config`/`chatos-jobs` already expose.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvEntry, KvStore, MemoryKvStore, ScopedKvStore, SurrealKvStore};
