//! Data models for the project.
//!
//! This module defines the structures that flow between the queue, the
//! orchestrator and the analysis engine: queued entries, per-dispatch
//! directives and configuration overrides.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A single pending unit of analysis work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEntry {
    pub id: i64,                  // Queue sequence id (FIFO key)
    pub path: PathBuf,            // Absolute path of the file to analyze
    pub enqueued_at: DateTime<Utc>,
}

/// Plugin family listed by `--list`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Analysis,
    Cat,
    Output,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginKind::Analysis => write!(f, "analysis"),
            PluginKind::Cat => write!(f, "cat"),
            PluginKind::Output => write!(f, "output"),
        }
    }
}

impl std::str::FromStr for PluginKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analysis" => Ok(PluginKind::Analysis),
            "cat" => Ok(PluginKind::Cat),
            "output" => Ok(PluginKind::Output),
            _ => Err(anyhow::anyhow!(
                "Invalid plugin type: {} (expected analysis, cat or output)",
                s
            )),
        }
    }
}

/// A single `Section.Key=Value` override forwarded to the analysis engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverride {
    pub section: String,
    pub key: String,
    pub value: String,
}

impl std::fmt::Display for ConfigOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}={}", self.section, self.key, self.value)
    }
}

impl std::str::FromStr for ConfigOverride {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, value) = s
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Override must look like Section.Key=Value: {}", s))?;
        let (section, key) = target
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("Override must look like Section.Key=Value: {}", s))?;

        let section = section.trim();
        let key = key.trim();
        if section.is_empty() || key.is_empty() {
            return Err(anyhow::anyhow!(
                "Override section and key must not be empty: {}",
                s
            ));
        }

        Ok(ConfigOverride {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Startup options applied to every dispatch of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Forced file category (e.g. EXE, PDF)
    pub file_type: Option<String>,
    /// Restrict analysis to this plugin
    pub plugin: Option<String>,
    pub overrides: Vec<ConfigOverride>,
}

impl AnalysisOptions {
    /// Build the directive for one target file
    pub fn directive_for(&self, path: impl AsRef<Path>) -> AnalysisDirective {
        AnalysisDirective {
            path: path.as_ref().to_path_buf(),
            file_type: self.file_type.clone(),
            plugin: self.plugin.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

/// Everything the analysis engine needs for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisDirective {
    pub path: PathBuf,
    pub file_type: Option<String>,
    pub plugin: Option<String>,
    pub overrides: Vec<ConfigOverride>,
}

/// Counters for one drain of the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}
