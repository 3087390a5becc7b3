//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to the repository for
//! interdeps. It reads manifests at HEAD and in the index, writes staged
//! blobs, and lists staged paths, normalizing git2 errors into [`GitError`].
//!
//! # Example
//!
//! ```ignore
//! use interdeps::git::{ContentRef, Git, Vcs};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let committed = git.read_at(ContentRef::Head, Path::new("packages/a/package.json"))?;
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::traits::{ContentRef, Vcs};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Git operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Blob content is not valid UTF-8.
    #[error("content of {path} is not valid UTF-8")]
    InvalidUtf8 {
        /// The revision-style path of the blob
        path: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::ObjectNotFound {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// State of in-progress Git operations.
///
/// Rewriting the index while one of these is in progress would mix version
/// fixes into conflict resolution, so fix mode refuses to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use interdeps::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// The Git interface.
///
/// Wraps a `git2::Repository` with a working directory. No other module
/// imports `git2`.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Working directory
    root: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        let root = repo
            .workdir()
            .ok_or(GitError::BareRepo)?
            .components()
            .collect::<PathBuf>();

        Ok(Self { repo, root })
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Fail with [`GitError::OperationInProgress`] unless the state is clean.
    pub fn ensure_clean_state(&self) -> Result<(), GitError> {
        match self.state() {
            GitState::Clean => Ok(()),
            operation => Err(GitError::OperationInProgress { operation }),
        }
    }

    // =========================================================================
    // Content Access
    // =========================================================================

    /// The tree of HEAD, or `None` on an unborn branch.
    fn head_tree(&self) -> Result<Option<git2::Tree<'_>>, GitError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                return Ok(None)
            }
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };
        let tree = head
            .peel_to_tree()
            .map_err(|e| GitError::from_git2(e, "HEAD^{tree}"))?;
        Ok(Some(tree))
    }

    fn blob_text(&self, oid: git2::Oid, display: &str) -> Result<String, GitError> {
        let blob = self
            .repo
            .find_blob(oid)
            .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
        String::from_utf8(blob.content().to_vec()).map_err(|_| GitError::InvalidUtf8 {
            path: display.to_string(),
        })
    }

    fn index_path(path: &Path) -> Vec<u8> {
        path.to_string_lossy().replace('\\', "/").into_bytes()
    }
}

impl Vcs for Git {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_at(&self, at: ContentRef, path: &Path) -> Result<Option<String>, GitError> {
        let display = format!("{}{}", at.prefix(), path.display());

        let oid = match at {
            ContentRef::Head => {
                let Some(tree) = self.head_tree()? else {
                    return Ok(None);
                };
                let entry = match tree.get_path(path) {
                    Ok(entry) => entry,
                    Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
                    Err(e) => return Err(GitError::from_git2(e, &display)),
                };
                if entry.kind() != Some(git2::ObjectType::Blob) {
                    return Ok(None);
                }
                entry.id()
            }
            ContentRef::Index => {
                let index = self.repo.index()?;
                match index.get_path(path, 0) {
                    Some(entry) => entry.id,
                    None => return Ok(None),
                }
            }
        };

        self.blob_text(oid, &display).map(Some)
    }

    fn write_staged(&self, path: &Path, content: &str) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        let entry = index
            .get_path(path, 0)
            .unwrap_or_else(|| git2::IndexEntry {
                ctime: git2::IndexTime::new(0, 0),
                mtime: git2::IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: 0o100644,
                uid: 0,
                gid: 0,
                file_size: 0,
                id: git2::Oid::zero(),
                flags: 0,
                flags_extended: 0,
                path: Self::index_path(path),
            });

        index
            .add_frombuffer(&entry, content.as_bytes())
            .map_err(|e| GitError::from_git2(e, &format!(":{}", path.display())))?;
        index.write().map_err(|e| GitError::AccessError {
            message: format!("failed to write index: {}", e.message()),
        })?;
        Ok(())
    }

    fn staged_paths(&self) -> Result<Vec<PathBuf>, GitError> {
        let tree = self.head_tree()?;
        let index = self.repo.index()?;
        let diff = self
            .repo
            .diff_tree_to_index(tree.as_ref(), Some(&index), None)?;

        Ok(diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(Path::to_path_buf)
            })
            .collect())
    }
}
