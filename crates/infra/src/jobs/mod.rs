//! Durable job storage.
//!
//! ## Design
//!
//! - The store is the only reader/writer of job state; there is no cache
//! - `create`, `delete`, `delete_all` and `record_outcome` are each atomic
//! - Keyword rows belong to their job and are removed together with it
//!
//! ## Components
//!
//! - `JobStore`: async storage boundary used by the coordinator
//! - `InMemoryJobStore`: single-lock implementation for tests/dev
//! - `PostgresJobStore`: SQLx/Postgres implementation

pub mod postgres;
pub mod store;

pub use postgres::PostgresJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError, MAX_LIST_LIMIT};
