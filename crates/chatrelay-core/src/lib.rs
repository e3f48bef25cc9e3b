//! ChatRelay Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RawChangeEntry`, `NotificationCandidate`, `RouteTable`, `SyncSummary`
//! - **Use cases** - `StatusReportUseCase`
//! - **Port definitions** - Traits for adapters: `IChangeFeed`, `ICursorStore`,
//!   `IMessagingSink`, `IMessageRenderer`, `IRunHistory`, `ITaskDirectory`
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O. Route
//! resolution in particular is a pure function over the configured rule set.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
