//! mastiff command-line front end.
//!
//! Queues files and directories for static analysis and feeds them to the
//! analysis engine one at a time. The queue lives next to the configuration
//! file, so an interrupted batch can be resumed by a later run.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use mastiff::{EngineCommand, ModeFlags, OperatingMode, Orchestrator};
use shared::{AnalysisOptions, Config, ConfigOverride, JobQueue, PluginKind, QueuePaths};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_version_flag = true)]
struct Args {
    /// File or directory to analyze
    #[arg(value_name = "FILE|DIRECTORY")]
    path: Option<PathBuf>,

    /// Use an alternate config file
    #[arg(short, long, default_value = "./mastiff.toml")]
    conf: PathBuf,

    /// List all available plug-ins of the specified type and exit
    #[arg(short, long, value_name = "PLUGIN_TYPE")]
    list: Option<PluginKind>,

    /// Override a config file option, given as 'Section.Key=Value'. May be repeated
    #[arg(short, long = "option", value_name = "SECTION.KEY=VALUE")]
    overrides: Vec<ConfigOverride>,

    /// Only run the specified analysis plug-in
    #[arg(short, long, value_name = "NAME")]
    plugin: Option<String>,

    /// Force the file to be analyzed with plug-ins from this category (e.g. EXE, PDF)
    #[arg(short = 't', long = "type", value_name = "CATEGORY")]
    file_type: Option<String>,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print verbose logs
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Append file or directory to the job queue and exit
    #[arg(long, help_heading = "Queue Options")]
    append_queue: bool,

    /// Clear the job queue and exit
    #[arg(long, help_heading = "Queue Options")]
    clear_queue: bool,

    /// Ignore the job queue and just process the file
    #[arg(long, help_heading = "Queue Options")]
    ignore_queue: bool,

    /// List the contents of the job queue and exit
    #[arg(long, help_heading = "Queue Options")]
    list_queue: bool,

    /// Continue processing the job queue
    #[arg(long, help_heading = "Queue Options")]
    resume_queue: bool,
}

impl Args {
    fn mode_flags(&self) -> ModeFlags {
        ModeFlags {
            submission: self.path.clone(),
            list_plugins: self.list,
            clear_queue: self.clear_queue,
            list_queue: self.list_queue,
            ignore_queue: self.ignore_queue,
            append_only: self.append_queue,
            resume: self.resume_queue,
        }
    }

    fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            file_type: self.file_type.clone(),
            plugin: self.plugin.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Resolve the mode before any side effect
    let mode = match OperatingMode::resolve(&args.mode_flags()) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("error: {}\n", e);
            Args::command().print_help()?;
            return Ok(ExitCode::FAILURE);
        }
    };

    // Load configuration
    let config = Config::from_file(&args.conf)
        .with_context(|| format!("Failed to load config from {}", args.conf.display()))?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else if args.quiet {
        tracing::Level::ERROR
    } else {
        config.log_level()?
    };

    shared::logging::init(shared::LogConfig {
        log_dir: config.log_dir(),
        component: "mastiff".to_string(),
        default_level: log_level,
        console: config.logging.console,
        file: config.logging.file,
        json_format: config.logging.json_format,
    })?;

    if running_as_root() {
        warn!("Running as root. Analyzing untrusted files with elevated privileges is dangerous");
    }

    let paths = QueuePaths::new(&args.conf);
    let queue_db = paths.queue_db(&config);

    info!(mode = %mode, config_file = %args.conf.display(), "mastiff starting");
    if mode.uses_queue() {
        debug!(queue_db = %queue_db.display(), "Using job queue");
    }
    debug!(
        engine = %config.engine.program,
        on_failure = %config.queue.on_failure,
        "Runtime configuration"
    );

    let mut engine = EngineCommand::new(&config.engine, &args.conf);
    let stdout = std::io::stdout();
    let mut orchestrator = Orchestrator::new(
        &mut engine,
        args.analysis_options(),
        config.queue.on_failure,
        stdout.lock(),
    );

    let outcome = orchestrator.run(&mode, || {
        paths
            .create_dirs(&config)
            .context("Failed to create queue directory")?;
        JobQueue::open(&queue_db, Duration::from_millis(config.queue.busy_timeout_ms))
            .with_context(|| format!("Failed to open job queue at {}", queue_db.display()))
    })?;

    debug!(?outcome, "mastiff finished");

    Ok(ExitCode::SUCCESS)
}
