//! git::traits
//!
//! The version-control boundary used by the workspace.
//!
//! Everything above this module reads committed and staged content through
//! [`Vcs`], so tests can swap the real repository for [`super::MockVcs`].

use std::path::{Path, PathBuf};

use super::GitError;

/// Which stored state of a file to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentRef {
    /// The tree of the current HEAD commit
    Head,
    /// The index (staging area), stage 0
    Index,
}

impl ContentRef {
    /// Revision-style prefix, as in `HEAD:path` or `:path`.
    pub fn prefix(self) -> &'static str {
        match self {
            ContentRef::Head => "HEAD:",
            ContentRef::Index => ":",
        }
    }
}

/// Read and write access to a repository's committed and staged content.
///
/// All paths are relative to [`Vcs::root`] and use `/` separators.
pub trait Vcs {
    /// Absolute path of the working directory.
    fn root(&self) -> &Path;

    /// Content of `path` at `at`, or `None` when the file does not exist there.
    fn read_at(&self, at: ContentRef, path: &Path) -> Result<Option<String>, GitError>;

    /// Store `content` as a blob and point the index entry for `path` at it.
    fn write_staged(&self, path: &Path, content: &str) -> Result<(), GitError>;

    /// Paths whose staged content differs from HEAD.
    fn staged_paths(&self) -> Result<Vec<PathBuf>, GitError>;
}
