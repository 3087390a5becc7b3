//! git::mock
//!
//! In-memory [`Vcs`] for deterministic testing.
//!
//! # Design
//!
//! The mock keeps a HEAD tree and an index as path-to-content maps. The
//! working directory is a real directory supplied by the caller (usually a
//! `tempfile::TempDir`), since working-copy snapshots read and write the
//! filesystem directly. Failures can be injected per operation and every
//! call is recorded.
//!
//! # Example
//!
//! ```
//! use interdeps::git::{ContentRef, MockVcs, Vcs};
//! use std::path::Path;
//!
//! let vcs = MockVcs::new("/tmp/repo")
//!     .with_committed("packages/a/package.json", "{\"name\":\"a\"}");
//!
//! let staged = vcs.read_at(ContentRef::Index, Path::new("packages/a/package.json")).unwrap();
//! assert_eq!(staged.as_deref(), Some("{\"name\":\"a\"}"));
//! assert!(vcs.staged_paths().unwrap().is_empty());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::traits::{ContentRef, Vcs};
use super::GitError;

/// Mock repository for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockVcs {
    /// Working directory
    root: PathBuf,
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockVcsInner>>,
}

#[derive(Debug, Default)]
struct MockVcsInner {
    /// Committed content by path.
    head: BTreeMap<PathBuf, String>,
    /// Staged content by path.
    index: BTreeMap<PathBuf, String>,
    /// Operation to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    /// Fail reads at the given ref.
    ReadAt(ContentRef),
    /// Fail every staged write.
    WriteStaged,
    /// Fail staged path listing.
    StagedPaths,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    ReadAt { at: ContentRef, path: PathBuf },
    WriteStaged { path: PathBuf, content: String },
    StagedPaths,
}

impl MockVcs {
    /// Create an empty mock rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            inner: Arc::new(Mutex::new(MockVcsInner::default())),
        }
    }

    /// Add a file to both HEAD and the index.
    pub fn with_committed(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        {
            let path = path.into();
            let content = content.into();
            let mut inner = self.inner.lock().unwrap();
            inner.head.insert(path.clone(), content.clone());
            inner.index.insert(path, content);
        }
        self
    }

    /// Add a file to the index only.
    pub fn with_staged(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.set_staged(path, content);
        self
    }

    /// Configure an operation to fail.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear any configured failure.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Replace the staged content of `path`.
    pub fn set_staged(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.index.insert(path.into(), content.into());
    }

    /// Remove `path` from the index.
    pub fn remove_staged(&self, path: impl AsRef<Path>) {
        let mut inner = self.inner.lock().unwrap();
        inner.index.remove(path.as_ref());
    }

    /// Staged content of `path`, without recording an operation.
    pub fn staged(&self, path: impl AsRef<Path>) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.index.get(path.as_ref()).cloned()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Paths written through [`Vcs::write_staged`], in call order.
    pub fn staged_writes(&self) -> Vec<PathBuf> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOperation::WriteStaged { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    fn check_fail(&self, op: &FailOn) -> Result<(), GitError> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_on.as_ref() == Some(op) {
            return Err(GitError::AccessError {
                message: format!("mock failure on {:?}", op),
            });
        }
        Ok(())
    }
}

impl Vcs for MockVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_at(&self, at: ContentRef, path: &Path) -> Result<Option<String>, GitError> {
        self.record(MockOperation::ReadAt {
            at,
            path: path.to_path_buf(),
        });
        self.check_fail(&FailOn::ReadAt(at))?;

        let inner = self.inner.lock().unwrap();
        let store = match at {
            ContentRef::Head => &inner.head,
            ContentRef::Index => &inner.index,
        };
        Ok(store.get(path).cloned())
    }

    fn write_staged(&self, path: &Path, content: &str) -> Result<(), GitError> {
        self.record(MockOperation::WriteStaged {
            path: path.to_path_buf(),
            content: content.to_string(),
        });
        self.check_fail(&FailOn::WriteStaged)?;

        let mut inner = self.inner.lock().unwrap();
        inner.index.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn staged_paths(&self) -> Result<Vec<PathBuf>, GitError> {
        self.record(MockOperation::StagedPaths);
        self.check_fail(&FailOn::StagedPaths)?;

        let inner = self.inner.lock().unwrap();
        let keys: BTreeSet<&PathBuf> = inner.head.keys().chain(inner.index.keys()).collect();
        Ok(keys
            .into_iter()
            .filter(|path| inner.head.get(*path) != inner.index.get(*path))
            .cloned()
            .collect())
    }
}
