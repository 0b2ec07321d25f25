//! Queue location utilities.
//!
//! Every configuration file gets its own job queue. This module maps a
//! configuration file path to the queue database that belongs to it.

use crate::Config;
use std::path::{Path, PathBuf};

/// Suffix appended to the configuration file stem to name its queue database
pub const QUEUE_DB_SUFFIX: &str = "queue.db";

/// Path manager for the queue that belongs to one configuration file
#[derive(Debug, Clone)]
pub struct QueuePaths {
    config_file: PathBuf,
}

impl QueuePaths {
    /// Create a new QueuePaths for the given configuration file
    pub fn new(config_file: impl AsRef<Path>) -> Self {
        Self {
            config_file: config_file.as_ref().to_path_buf(),
        }
    }

    /// Get the queue database that sits next to the configuration file
    ///
    /// `conf/mastiff.toml` maps to `conf/mastiff.queue.db`.
    pub fn default_queue_db(&self) -> PathBuf {
        let stem = self
            .config_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mastiff".to_string());

        let file_name = format!("{}.{}", stem, QUEUE_DB_SUFFIX);
        match self.config_file.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Get the queue database for this configuration, preferring an explicit
    /// `queue.path` setting over the default location
    pub fn queue_db(&self, config: &Config) -> PathBuf {
        config
            .queue_path()
            .unwrap_or_else(|| self.default_queue_db())
    }

    /// Create the directory that will hold the queue database
    pub fn create_dirs(&self, config: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.queue_db(config).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
