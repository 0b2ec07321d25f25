//! Intake and orchestration for static file analysis.
//!
//! Turns file and directory submissions into queued analysis jobs, keeps the
//! queue across runs, and drains it one file at a time through the external
//! analysis engine.

pub mod dispatch;
pub mod mode;
pub mod orchestrator;
pub mod submission;

pub use dispatch::{Analyzer, DispatchError, EngineCommand};
pub use mode::{ModeFlags, OperatingMode, UsageError};
pub use orchestrator::{Orchestrator, Outcome};
pub use submission::{Submission, SubmissionError};
