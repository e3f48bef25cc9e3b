//! Domain entities and business logic
//!
//! This module contains the core domain types for ChatRelay:
//! - Newtypes for validated identifiers and tokens
//! - Raw change entries as delivered by upstream feeds
//! - Task statuses and their terminal classification
//! - Notification candidates derived from raw entries
//! - Route rules and the route table
//! - Dispatch results and run summaries
//! - Domain-specific error types

pub mod candidate;
pub mod change;
pub mod errors;
pub mod newtypes;
pub mod route;
pub mod status;
pub mod summary;

// Re-export commonly used types
pub use candidate::{CandidateKind, EntityDetails, NotificationCandidate};
pub use change::{
    DeletionEntry, FileEntry, FolderEntry, RawChangeEntry, TaskChange, TaskChangeKind,
};
pub use errors::DomainError;
pub use newtypes::*;
pub use route::{RouteRule, RouteTable};
pub use status::{StatusKind, TaskStatus};
pub use summary::{DispatchFailure, DispatchResult, RunOutcome, RunRecord, SyncSummary};
