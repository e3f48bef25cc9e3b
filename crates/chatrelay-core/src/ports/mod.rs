//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IChangeFeed`] - Paginated upstream change feeds (file storage, task tracker)
//! - [`ICursorStore`] - Durable per-feed cursor positions
//! - [`IMessagingSink`] / [`IMessageRenderer`] - Outbound chat messages
//! - [`IRunHistory`] - Record of finished and aborted runs
//! - [`ITaskDirectory`] - Task listing for on-demand status reports

pub mod change_feed;
pub mod cursor_store;
pub mod messaging;
pub mod run_history;
pub mod task_directory;

pub use change_feed::{ChangePage, FetchError, IChangeFeed};
pub use cursor_store::{CursorConflict, ICursorStore};
pub use messaging::{IMessageRenderer, IMessagingSink, RenderedMessage};
pub use run_history::IRunHistory;
pub use task_directory::{ITaskDirectory, TaskSummary};
