//! Integration tests for chatrelay-providers
//!
//! Uses wiremock to stand in for the storage, task-tracker and chat APIs.

mod common;

mod test_chat;
mod test_storage;
mod test_tasks;
