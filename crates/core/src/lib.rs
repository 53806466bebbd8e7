//! `textgate-core`: job lifecycle domain types.
//!
//! This crate contains **pure domain** primitives (no storage or transport
//! concerns): identifiers, the job record and its status machine, and
//! submission text validation.

pub mod error;
pub mod id;
pub mod job;
pub mod text;

pub use error::{DomainError, DomainResult};
pub use id::JobId;
pub use job::{Job, JobOutcome, JobResults, JobStatus, JobSummary};
pub use text::JobText;
