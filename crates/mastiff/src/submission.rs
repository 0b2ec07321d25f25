//! Submission expansion.
//!
//! A submission is a single file or a directory tree. Expanding it yields the
//! absolute path of every file that should become a job.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Submission is neither a file nor a directory: {}", .0.display())]
    Invalid(PathBuf),

    #[error("Failed to resolve absolute path for {}: {source}", .path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A validated file or directory submission rooted at an absolute path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    File(PathBuf),
    Directory(PathBuf),
}

impl Submission {
    /// Classify `path` and make it absolute
    ///
    /// Symlinks are followed for the submitted path itself, so a link to a
    /// file counts as a file. Anything that is not an existing file or
    /// directory is rejected.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let path = path.as_ref();

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Submission cannot be read");
                return Err(SubmissionError::Invalid(path.to_path_buf()));
            }
        };

        let absolute = std::path::absolute(path).map_err(|source| SubmissionError::Resolve {
            path: path.to_path_buf(),
            source,
        })?;

        if metadata.is_file() {
            Ok(Submission::File(absolute))
        } else if metadata.is_dir() {
            Ok(Submission::Directory(absolute))
        } else {
            Err(SubmissionError::Invalid(path.to_path_buf()))
        }
    }

    /// The absolute submitted path
    pub fn root(&self) -> &Path {
        match self {
            Submission::File(path) | Submission::Directory(path) => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Submission::Directory(_))
    }

    /// Lazily yield the absolute path of every file in the submission
    ///
    /// Each call starts a fresh walk. Directory symlinks are not descended
    /// into, so link cycles cannot make the walk run forever. Within one walk
    /// entries are visited in file-name order.
    pub fn paths(&self) -> Box<dyn Iterator<Item = PathBuf> + '_> {
        match self {
            Submission::File(path) => Box::new(std::iter::once(path.clone())),
            Submission::Directory(root) => Box::new(walk_files(root)),
        }
    }
}

fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if is_regular_file(&entry) => Some(entry.into_path()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
}

/// Regular files, plus symlinks that point at a regular file
fn is_regular_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    if file_type.is_symlink() {
        return std::fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false);
    }
    false
}
