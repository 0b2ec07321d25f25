//! Analysis dispatch.
//!
//! The orchestrator only knows the [`Analyzer`] trait. The shipped
//! implementation, [`EngineCommand`], runs the external analysis engine once
//! per file and waits for it to finish.

use shared::config::EngineConfig;
use shared::{AnalysisDirective, PluginKind};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The engine process could not be started at all
    #[error("Failed to start analysis engine {program}: {source}")]
    EngineUnavailable {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Analysis of {} failed: {reason}", .path.display())]
    AnalysisFailed { path: PathBuf, reason: String },

    #[error("Listing {kind} plugins failed: {reason}")]
    ListFailed { kind: PluginKind, reason: String },
}

impl DispatchError {
    /// Whether the engine itself is missing or not executable
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, DispatchError::EngineUnavailable { .. })
    }
}

/// Something that can analyze one file at a time
pub trait Analyzer {
    /// Analyze the file named by the directive, blocking until done
    fn analyze(&mut self, directive: &AnalysisDirective) -> Result<(), DispatchError>;

    /// Print the available plugins of one kind
    fn list_plugins(&mut self, kind: PluginKind) -> Result<(), DispatchError>;
}

/// Runs the external analysis engine as a child process
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: String,
    base_args: Vec<String>,
    config_file: PathBuf,
}

impl EngineCommand {
    /// Create an engine runner that passes `config_file` through to the engine
    pub fn new(engine: &EngineConfig, config_file: impl AsRef<Path>) -> Self {
        Self {
            program: engine.program.clone(),
            base_args: engine.args.clone(),
            config_file: config_file.as_ref().to_path_buf(),
        }
    }

    /// Arguments for analyzing one file:
    /// `<args..> --conf <config> [--type T] [--plugin P] [--option S.K=V ..] <file>`
    pub fn analysis_args(&self, directive: &AnalysisDirective) -> Vec<OsString> {
        let mut args = self.common_args();

        if let Some(ref file_type) = directive.file_type {
            args.push("--type".into());
            args.push(file_type.into());
        }
        if let Some(ref plugin) = directive.plugin {
            args.push("--plugin".into());
            args.push(plugin.into());
        }
        for o in &directive.overrides {
            args.push("--option".into());
            args.push(o.to_string().into());
        }

        args.push(directive.path.clone().into_os_string());
        args
    }

    /// Arguments for listing plugins: `<args..> --conf <config> --list <kind>`
    pub fn list_args(&self, kind: PluginKind) -> Vec<OsString> {
        let mut args = self.common_args();
        args.push("--list".into());
        args.push(kind.to_string().into());
        args
    }

    fn common_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.base_args.iter().map(OsString::from).collect();
        args.push("--conf".into());
        args.push(self.config_file.clone().into_os_string());
        args
    }

    fn run(&self, args: &[OsString]) -> Result<ExitStatus, DispatchError> {
        debug!(program = %self.program, ?args, "Running analysis engine");

        Command::new(&self.program)
            .args(args)
            .status()
            .map_err(|source| DispatchError::EngineUnavailable {
                program: self.program.clone(),
                source,
            })
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("engine exited with code {}", code),
        None => "engine was terminated by a signal".to_string(),
    }
}

impl Analyzer for EngineCommand {
    fn analyze(&mut self, directive: &AnalysisDirective) -> Result<(), DispatchError> {
        info!(path = %directive.path.display(), "Starting analysis");

        if let Some(ref file_type) = directive.file_type {
            info!(file_type = %file_type, "Forcing file type");
        }

        let status = self.run(&self.analysis_args(directive))?;
        if !status.success() {
            return Err(DispatchError::AnalysisFailed {
                path: directive.path.clone(),
                reason: describe(status),
            });
        }

        Ok(())
    }

    fn list_plugins(&mut self, kind: PluginKind) -> Result<(), DispatchError> {
        let status = self.run(&self.list_args(kind))?;
        if !status.success() {
            return Err(DispatchError::ListFailed {
                kind,
                reason: describe(status),
            });
        }
        Ok(())
    }
}
