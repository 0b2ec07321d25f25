//! Orchestration of one invocation.
//!
//! The orchestrator carries out a resolved [`OperatingMode`]: it expands
//! submissions, moves paths through the job queue, and hands files to the
//! [`Analyzer`] one at a time.
//!
//! Dispatch is at-most-once. An entry is removed from the queue (and the
//! removal committed) before it is analyzed, so a crash mid-analysis loses
//! that one entry and never analyzes it twice. When an analysis fails the
//! configured [`FailurePolicy`] decides whether the drain continues; an
//! engine that cannot be started stops the drain under either policy.

use crate::dispatch::{Analyzer, DispatchError};
use crate::mode::OperatingMode;
use crate::submission::Submission;
use anyhow::{Context, Result};
use shared::{AnalysisOptions, DrainStats, FailurePolicy, JobQueue};
use std::io::Write;
use std::path::Path;
use tracing::{error, info, warn};

/// What an invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    PluginsListed,
    Cleared { removed: usize },
    Listed { entries: usize },
    /// Files analyzed directly, bypassing the queue
    Analyzed(DrainStats),
    /// Files queued with no drain this run
    Queued { added: usize },
    Drained(DrainStats),
}

/// Drives the queue and the analyzer for one invocation
pub struct Orchestrator<'a, A: Analyzer, W: Write> {
    analyzer: &'a mut A,
    options: AnalysisOptions,
    policy: FailurePolicy,
    out: W,
}

impl<'a, A: Analyzer, W: Write> Orchestrator<'a, A, W> {
    /// Create an orchestrator that builds every directive from `options` and
    /// writes user-facing listings to `out`
    pub fn new(
        analyzer: &'a mut A,
        options: AnalysisOptions,
        policy: FailurePolicy,
        out: W,
    ) -> Self {
        Self {
            analyzer,
            options,
            policy,
            out,
        }
    }

    /// Carry out `mode`
    ///
    /// `open_queue` is only called by modes that use the queue, so listing
    /// plugins or bypassing the queue never creates a queue database. Invalid
    /// submissions are rejected before the queue is opened.
    pub fn run<F>(&mut self, mode: &OperatingMode, open_queue: F) -> Result<Outcome>
    where
        F: FnOnce() -> Result<JobQueue>,
    {
        match mode {
            OperatingMode::ListPlugins(kind) => {
                self.analyzer.list_plugins(*kind)?;
                Ok(Outcome::PluginsListed)
            }
            OperatingMode::ClearQueue => {
                info!("Clearing job queue");
                let mut queue = open_queue()?;
                let removed = queue.clear().context("Failed to clear job queue")?;
                info!(removed, "Job queue cleared");
                Ok(Outcome::Cleared { removed })
            }
            OperatingMode::ListQueue => {
                let queue = open_queue()?;
                let entries = self.print_queue(&queue)?;
                Ok(Outcome::Listed { entries })
            }
            OperatingMode::IgnoreQueue(path) => {
                let submission = Submission::new(path)?;
                info!(path = %submission.root().display(), "Ignoring job queue");
                let stats = self.analyze_directly(&submission)?;
                Ok(Outcome::Analyzed(stats))
            }
            OperatingMode::Intake {
                submission,
                append_only,
            } => {
                let submission = Submission::new(submission)?;
                let mut queue = open_queue()?;
                let added = self.enqueue(&mut queue, &submission)?;
                if *append_only {
                    info!(added, "Files added to job queue, not processing this run");
                    return Ok(Outcome::Queued { added });
                }
                Ok(Outcome::Drained(self.drain(&mut queue)?))
            }
            OperatingMode::Resume => {
                let mut queue = open_queue()?;
                Ok(Outcome::Drained(self.drain(&mut queue)?))
            }
        }
    }

    /// Append every file of the submission at the tail of the queue
    pub fn enqueue(&mut self, queue: &mut JobQueue, submission: &Submission) -> Result<usize> {
        if submission.is_directory() {
            info!(path = %submission.root().display(), "Adding directory to job queue");
        }

        let paths: Vec<_> = submission.paths().collect();
        if paths.is_empty() {
            warn!(path = %submission.root().display(), "Submission contains no files");
        }

        let added = queue.append_all(&paths).with_context(|| {
            format!(
                "Failed to add {} to job queue",
                submission.root().display()
            )
        })?;

        info!(added, "Files added to job queue");
        Ok(added)
    }

    /// Pop and analyze entries until the queue is empty
    pub fn drain(&mut self, queue: &mut JobQueue) -> Result<DrainStats> {
        let mut stats = DrainStats::default();

        while queue.len()? > 0 {
            let entry = queue
                .pop_front()
                .context("Failed to take next job from queue")?;

            let result = self.dispatch(&entry.path, &mut stats);
            let remaining = queue.len()?;

            if let Err(e) = result {
                return Err(anyhow::Error::new(e).context(format!(
                    "Queue processing stopped with {} jobs left",
                    remaining
                )));
            }

            info!(remaining, "There are {} jobs in the queue", remaining);
        }

        info!(
            dispatched = stats.dispatched,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Job queue is empty"
        );

        Ok(stats)
    }

    /// Analyze every file of the submission without touching the queue
    fn analyze_directly(&mut self, submission: &Submission) -> Result<DrainStats> {
        let mut stats = DrainStats::default();

        for path in submission.paths() {
            self.dispatch(&path, &mut stats)?;
        }

        info!(
            dispatched = stats.dispatched,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Direct analysis finished"
        );

        Ok(stats)
    }

    /// Analyze one file and apply the failure policy
    ///
    /// Returns an error only when the caller must stop.
    fn dispatch(&mut self, path: &Path, stats: &mut DrainStats) -> Result<(), DispatchError> {
        stats.dispatched += 1;

        match self.analyzer.analyze(&self.options.directive_for(path)) {
            Ok(()) => {
                stats.succeeded += 1;
                Ok(())
            }
            Err(e) => {
                stats.failed += 1;
                error!(path = %path.display(), error = %e, "Analysis failed");

                if e.is_engine_unavailable() || self.policy == FailurePolicy::Abort {
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    fn print_queue(&mut self, queue: &JobQueue) -> Result<usize> {
        let entries = queue.list().context("Failed to read job queue")?;

        if entries.is_empty() {
            info!("Job queue is empty");
            writeln!(self.out, "Job queue is empty.")?;
            return Ok(0);
        }

        info!(entries = entries.len(), "Job queue has {} entries", entries.len());
        writeln!(self.out, "\nEnqueued (UTC)       File Name")?;
        writeln!(self.out, "-------------------  ---------")?;
        for entry in &entries {
            writeln!(
                self.out,
                "{}  {}",
                entry.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
                entry.path.display()
            )?;
        }
        self.out.flush()?;

        Ok(entries.len())
    }
}
