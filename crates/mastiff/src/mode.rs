//! Operating mode resolution.
//!
//! The command line carries a submission path and a handful of independent
//! flags. They are folded into exactly one [`OperatingMode`] before anything
//! touches the queue or the engine. Precedence, highest first:
//!
//! | flag / input        | mode          |
//! |---------------------|---------------|
//! | `--list KIND`       | `ListPlugins` |
//! | `--clear-queue`     | `ClearQueue`  |
//! | `--list-queue`      | `ListQueue`   |
//! | `--ignore-queue`    | `IgnoreQueue` |
//! | submission given    | `Intake`      |
//! | `--resume-queue`    | `Resume`      |
//! | none of the above   | usage error   |

use shared::PluginKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UsageError {
    #[error("A FILE or DIRECTORY is required unless a queue or listing option is given")]
    MissingSubmission,

    #[error("--ignore-queue requires a FILE or DIRECTORY to analyze")]
    IgnoreQueueWithoutSubmission,
}

/// Raw mode inputs as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ModeFlags {
    pub submission: Option<PathBuf>,
    pub list_plugins: Option<PluginKind>,
    pub clear_queue: bool,
    pub list_queue: bool,
    pub ignore_queue: bool,
    pub append_only: bool,
    pub resume: bool,
}

/// The single behavior selected for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatingMode {
    /// Print the engine's plugin inventory; the queue is never opened
    ListPlugins(PluginKind),
    ClearQueue,
    ListQueue,
    /// Analyze the submission right away without going through the queue
    IgnoreQueue(PathBuf),
    /// Queue the submission, then drain unless `append_only`
    Intake {
        submission: PathBuf,
        append_only: bool,
    },
    /// Drain whatever is already queued
    Resume,
}

impl OperatingMode {
    pub fn resolve(flags: &ModeFlags) -> Result<Self, UsageError> {
        if let Some(kind) = flags.list_plugins {
            return Ok(OperatingMode::ListPlugins(kind));
        }
        if flags.clear_queue {
            return Ok(OperatingMode::ClearQueue);
        }
        if flags.list_queue {
            return Ok(OperatingMode::ListQueue);
        }
        if flags.ignore_queue {
            return flags
                .submission
                .clone()
                .map(OperatingMode::IgnoreQueue)
                .ok_or(UsageError::IgnoreQueueWithoutSubmission);
        }
        if let Some(ref submission) = flags.submission {
            return Ok(OperatingMode::Intake {
                submission: submission.clone(),
                append_only: flags.append_only,
            });
        }
        if flags.resume {
            return Ok(OperatingMode::Resume);
        }
        Err(UsageError::MissingSubmission)
    }

    /// Whether this mode opens the job queue database
    pub fn uses_queue(&self) -> bool {
        !matches!(
            self,
            OperatingMode::ListPlugins(_) | OperatingMode::IgnoreQueue(_)
        )
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingMode::ListPlugins(_) => write!(f, "list-plugins"),
            OperatingMode::ClearQueue => write!(f, "clear-queue"),
            OperatingMode::ListQueue => write!(f, "list-queue"),
            OperatingMode::IgnoreQueue(_) => write!(f, "ignore-queue"),
            OperatingMode::Intake {
                append_only: true, ..
            } => write!(f, "append-only"),
            OperatingMode::Intake { .. } => write!(f, "normal"),
            OperatingMode::Resume => write!(f, "resume"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_file() -> ModeFlags {
        ModeFlags {
            submission: Some(PathBuf::from("sample.exe")),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_input_is_usage_error() {
        assert_eq!(
            OperatingMode::resolve(&ModeFlags::default()),
            Err(UsageError::MissingSubmission)
        );
    }

    #[test]
    fn test_append_only_without_submission_is_usage_error() {
        let flags = ModeFlags {
            append_only: true,
            ..Default::default()
        };
        assert_eq!(
            OperatingMode::resolve(&flags),
            Err(UsageError::MissingSubmission)
        );
    }

    #[test]
    fn test_list_plugins_beats_everything() {
        let flags = ModeFlags {
            list_plugins: Some(PluginKind::Analysis),
            clear_queue: true,
            list_queue: true,
            ignore_queue: true,
            append_only: true,
            resume: true,
            ..with_file()
        };
        assert_eq!(
            OperatingMode::resolve(&flags),
            Ok(OperatingMode::ListPlugins(PluginKind::Analysis))
        );
    }

    #[test]
    fn test_clear_beats_list_and_submission() {
        let flags = ModeFlags {
            clear_queue: true,
            list_queue: true,
            ..with_file()
        };
        assert_eq!(OperatingMode::resolve(&flags), Ok(OperatingMode::ClearQueue));
    }

    #[test]
    fn test_list_queue_beats_ignore_queue() {
        let flags = ModeFlags {
            list_queue: true,
            ignore_queue: true,
            ..with_file()
        };
        assert_eq!(OperatingMode::resolve(&flags), Ok(OperatingMode::ListQueue));
    }

    #[test]
    fn test_ignore_queue_needs_submission() {
        let flags = ModeFlags {
            ignore_queue: true,
            resume: true,
            ..Default::default()
        };
        assert_eq!(
            OperatingMode::resolve(&flags),
            Err(UsageError::IgnoreQueueWithoutSubmission)
        );

        let flags = ModeFlags {
            ignore_queue: true,
            append_only: true,
            ..with_file()
        };
        assert_eq!(
            OperatingMode::resolve(&flags),
            Ok(OperatingMode::IgnoreQueue(PathBuf::from("sample.exe")))
        );
    }

    #[test]
    fn test_submission_with_resume_is_intake() {
        let flags = ModeFlags {
            resume: true,
            ..with_file()
        };
        assert_eq!(
            OperatingMode::resolve(&flags),
            Ok(OperatingMode::Intake {
                submission: PathBuf::from("sample.exe"),
                append_only: false,
            })
        );
    }

    #[test]
    fn test_resume_alone() {
        let flags = ModeFlags {
            resume: true,
            ..Default::default()
        };
        let mode = OperatingMode::resolve(&flags).unwrap();
        assert_eq!(mode, OperatingMode::Resume);
        assert!(mode.uses_queue());
    }

    #[test]
    fn test_mode_names() {
        let append = OperatingMode::resolve(&ModeFlags {
            append_only: true,
            ..with_file()
        })
        .unwrap();
        assert_eq!(append.to_string(), "append-only");
        assert!(!OperatingMode::ListPlugins(PluginKind::Output).uses_queue());
    }
}
