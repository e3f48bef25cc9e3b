//! Use cases (interactors) for ChatRelay
//!
//! Use cases are thin coordinators that delegate business rules to domain
//! methods and I/O to ports. The sync loop itself lives in `chatrelay-sync`.
//!
//! ## Use Cases
//!
//! - [`StatusReportUseCase`] - Aggregate task counts per status, optionally posted to chat

pub mod status_report;

pub use status_report::{StatusCount, StatusReport, StatusReportUseCase};
