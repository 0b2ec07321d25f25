//! Shared library for the mastiff intake tool.
//!
//! This crate provides the pieces the command-line front end builds on:
//! - Configuration management
//! - Queue database setup and migrations
//! - The durable job queue
//! - Queue location and path utilities
//! - Logging infrastructure
//! - Shared data models and error types

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod paths;
pub mod queue;

// Re-export commonly used types
pub use config::{Config, FailurePolicy};
pub use db::Database;
pub use error::QueueError;
pub use logging::LogConfig;
pub use models::*;
pub use paths::QueuePaths;
pub use queue::JobQueue;

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
