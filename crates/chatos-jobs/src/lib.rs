//! Durable job/event/model-route log and in-memory job supervision for the
//! sub-agent router (§3, §4.9, §5).
//!
//! [`JobStore`] is the single entry point for durable state: `createJob`,
//! `updateJobStatus`, `appendEvent`, `listJobs`, `listSessions`, and
//! `appendModelRoute`, all persisted through a
//! [`chatos_storage::KvStore`](chatos_storage::KvStore). [`JobSupervisor`]
//! is the in-memory counterpart that lets `cancel_sub_agent_job` reach a
//! job that is still running.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod store;
mod supervision;
mod types;

pub use error::{JobsError, JobsResult};
pub use store::{JobStore, ListJobsQuery};
pub use supervision::JobSupervisor;
pub use types::{Job, JobEvent, JobEventKind, JobStatus, ModelRoute};
