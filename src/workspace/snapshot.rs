//! workspace::snapshot
//!
//! The three views of a package manifest.
//!
//! # Architecture
//!
//! | View | Reads from | Persists to |
//! |------|-----------|-------------|
//! | [`CommittedSnapshot`] | HEAD tree | never (read-only) |
//! | [`StagedSnapshot`] | index | blob + index entry |
//! | [`WorkingSnapshot`] | file on disk | file on disk |
//!
//! Each snapshot loads its base content at most once. Edits go to a
//! copy-on-write pending manifest and mark the snapshot dirty only when the
//! content actually changes; [`ManifestSnapshot::save`] persists a dirty
//! snapshot once and reports whether it wrote anything.
//!
//! # Example
//!
//! ```
//! use interdeps::core::semver::Semver;
//! use interdeps::git::{MockVcs, Vcs};
//! use interdeps::workspace::snapshot::{ManifestSnapshot, StagedSnapshot};
//! use std::rc::Rc;
//!
//! let vcs = MockVcs::new("/repo")
//!     .with_committed("packages/a/package.json", r#"{"name":"a","version":"1.0.0"}"#);
//! let staged = StagedSnapshot::new(Rc::new(vcs.clone()), "packages/a/package.json", 2);
//!
//! staged.set_version(&Semver::new(1, 1, 0)).unwrap();
//! assert!(staged.save().unwrap());
//! assert!(!staged.save().unwrap());
//! assert!(vcs.staged("packages/a/package.json").unwrap().contains("1.1.0"));
//! ```

use std::cell::{Cell, OnceCell, RefCell};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

use crate::core::manifest::{DependencyBlock, Manifest, ManifestError};
use crate::core::semver::{Semver, SemverError};
use crate::core::types::{BlocName, SnapshotView};
use crate::git::{ContentRef, GitError, Vcs};

/// Errors from reading, editing or persisting a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Attempt to modify the committed view.
    #[error("{path} at HEAD is read-only")]
    ReadOnly {
        /// Repository-relative manifest path
        path: PathBuf,
    },

    /// Content exists but is not a valid manifest.
    #[error("failed to parse {path} ({view}): {message}")]
    Parse {
        view: SnapshotView,
        path: PathBuf,
        message: String,
    },

    /// Edit of a snapshot that has no base content.
    #[error("{path} does not exist in the {view}")]
    Missing { view: SnapshotView, path: PathBuf },

    /// A required field is absent or not a string.
    #[error("{path} ({view}) has no \"{field}\" field")]
    MissingField {
        view: SnapshotView,
        path: PathBuf,
        field: &'static str,
    },

    /// A version field that does not parse.
    #[error("{path} ({view}): {source}")]
    Version {
        view: SnapshotView,
        path: PathBuf,
        #[source]
        source: SemverError,
    },

    /// Filesystem failure on the working view.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Manifest could not be serialized.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    /// Version-control failure on the committed or staged view.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Capability shared by the three manifest views.
///
/// Implementors provide loading, editing and persistence; the typed
/// accessors are derived from those.
pub trait ManifestSnapshot {
    /// Which view this is.
    fn view(&self) -> SnapshotView;

    /// Path used in messages (repository-relative, or absolute on disk).
    fn path(&self) -> &Path;

    /// Current content: the pending edit if any, otherwise the base.
    ///
    /// A file absent from this view is `Ok(None)`.
    fn load(&self) -> Result<Option<Manifest>, SnapshotError>;

    /// Apply `change` to the pending copy of the manifest.
    fn edit(&self, change: &mut dyn FnMut(&mut Manifest)) -> Result<(), SnapshotError>;

    /// Persist pending edits. Returns `true` when a write happened.
    fn save(&self) -> Result<bool, SnapshotError>;

    /// Whether an unsaved edit is pending.
    fn is_dirty(&self) -> bool;

    /// The `name` field.
    fn name(&self) -> Result<Option<String>, SnapshotError> {
        Ok(self
            .load()?
            .and_then(|manifest| manifest.name().map(str::to_string)))
    }

    /// The `version` field as written.
    fn raw_version(&self) -> Result<Option<String>, SnapshotError> {
        Ok(self
            .load()?
            .and_then(|manifest| manifest.version().map(str::to_string)))
    }

    /// The parsed `version` field, or `None` when the manifest is absent.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::MissingField`] when the manifest has no version and
    /// [`SnapshotError::Version`] when it does not parse.
    fn version(&self) -> Result<Option<Semver>, SnapshotError> {
        let Some(manifest) = self.load()? else {
            return Ok(None);
        };
        let raw = manifest.version().ok_or_else(|| SnapshotError::MissingField {
            view: self.view(),
            path: self.path().to_path_buf(),
            field: "version",
        })?;
        Semver::parse(raw)
            .map(Some)
            .map_err(|source| SnapshotError::Version {
                view: self.view(),
                path: self.path().to_path_buf(),
                source,
            })
    }

    /// String entries of a dependency block; empty when absent.
    fn dependencies(&self, bloc: BlocName) -> Result<DependencyBlock, SnapshotError> {
        Ok(self
            .load()?
            .and_then(|manifest| manifest.dependencies(bloc))
            .unwrap_or_default())
    }

    /// One dependency declaration.
    fn dependency(&self, bloc: BlocName, dep: &str) -> Result<Option<String>, SnapshotError> {
        Ok(self
            .load()?
            .and_then(|manifest| manifest.dependency(bloc, dep).map(str::to_string)))
    }

    /// Set the `version` field.
    fn set_version(&self, version: &Semver) -> Result<(), SnapshotError> {
        let text = version.to_string();
        self.edit(&mut |manifest| manifest.set_version(&text))
    }

    /// Set one dependency declaration.
    fn set_dependency(&self, bloc: BlocName, dep: &str, range: &str) -> Result<(), SnapshotError> {
        self.edit(&mut |manifest| manifest.set_dependency(bloc, dep, range))
    }
}

/// Memoized base plus copy-on-write pending edit.
///
/// The parse outcome is kept either way; a read failure is not, so the next
/// access reads again.
#[derive(Debug, Default)]
struct SnapshotCache {
    base: OnceCell<Result<Option<Manifest>, String>>,
    pending: RefCell<Option<Manifest>>,
    dirty: Cell<bool>,
}

impl SnapshotCache {
    fn base(
        &self,
        view: SnapshotView,
        path: &Path,
        read: impl FnOnce() -> Result<Option<String>, SnapshotError>,
    ) -> Result<&Option<Manifest>, SnapshotError> {
        let parsed = match self.base.get() {
            Some(parsed) => parsed,
            None => {
                let parsed = match read()? {
                    None => Ok(None),
                    Some(text) => Manifest::parse(&text).map(Some).map_err(|e| e.to_string()),
                };
                tracing::debug!(
                    %view,
                    path = %path.display(),
                    present = matches!(parsed, Ok(Some(_))),
                    valid = parsed.is_ok(),
                    "loaded manifest"
                );
                self.base.get_or_init(|| parsed)
            }
        };

        parsed.as_ref().map_err(|message| SnapshotError::Parse {
            view,
            path: path.to_path_buf(),
            message: message.clone(),
        })
    }

    fn current(&self, base: &Option<Manifest>) -> Option<Manifest> {
        self.pending.borrow().clone().or_else(|| base.clone())
    }

    fn edit(
        &self,
        view: SnapshotView,
        path: &Path,
        base: &Option<Manifest>,
        change: &mut dyn FnMut(&mut Manifest),
    ) -> Result<(), SnapshotError> {
        let mut pending = self.pending.borrow_mut();
        if pending.is_none() {
            *pending = base.clone();
        }
        let Some(manifest) = pending.as_mut() else {
            return Err(SnapshotError::Missing {
                view,
                path: path.to_path_buf(),
            });
        };

        let before = manifest.clone();
        change(manifest);
        if *manifest != before {
            self.dirty.set(true);
        }
        Ok(())
    }

    /// The pending manifest if dirty; clears the flag.
    fn take_dirty(&self) -> Option<Manifest> {
        if !self.dirty.get() {
            return None;
        }
        self.dirty.set(false);
        self.pending.borrow().clone()
    }
}

fn serialize(manifest: &Manifest, path: &Path, indent: usize) -> Result<String, SnapshotError> {
    manifest
        .to_json_string(indent)
        .map_err(|source| SnapshotError::Serialize {
            path: path.to_path_buf(),
            source,
        })
}

// =============================================================================
// Committed
// =============================================================================

/// Manifest content at HEAD. Read-only.
pub struct CommittedSnapshot {
    vcs: Rc<dyn Vcs>,
    rel_path: PathBuf,
    cache: SnapshotCache,
}

impl CommittedSnapshot {
    /// Snapshot of `rel_path` at HEAD.
    pub fn new(vcs: Rc<dyn Vcs>, rel_path: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            rel_path: rel_path.into(),
            cache: SnapshotCache::default(),
        }
    }

    fn base(&self) -> Result<&Option<Manifest>, SnapshotError> {
        self.cache.base(self.view(), &self.rel_path, || {
            Ok(self.vcs.read_at(ContentRef::Head, &self.rel_path)?)
        })
    }
}

impl ManifestSnapshot for CommittedSnapshot {
    fn view(&self) -> SnapshotView {
        SnapshotView::Committed
    }

    fn path(&self) -> &Path {
        &self.rel_path
    }

    fn load(&self) -> Result<Option<Manifest>, SnapshotError> {
        Ok(self.base()?.clone())
    }

    fn edit(&self, _change: &mut dyn FnMut(&mut Manifest)) -> Result<(), SnapshotError> {
        Err(SnapshotError::ReadOnly {
            path: self.rel_path.clone(),
        })
    }

    fn save(&self) -> Result<bool, SnapshotError> {
        if self.cache.dirty.get() {
            return Err(SnapshotError::ReadOnly {
                path: self.rel_path.clone(),
            });
        }
        Ok(false)
    }

    fn is_dirty(&self) -> bool {
        false
    }
}

// =============================================================================
// Staged
// =============================================================================

/// Manifest content in the index.
pub struct StagedSnapshot {
    vcs: Rc<dyn Vcs>,
    rel_path: PathBuf,
    indent: usize,
    cache: SnapshotCache,
}

impl StagedSnapshot {
    /// Snapshot of `rel_path` in the index, rewritten with `indent` spaces.
    pub fn new(vcs: Rc<dyn Vcs>, rel_path: impl Into<PathBuf>, indent: usize) -> Self {
        Self {
            vcs,
            rel_path: rel_path.into(),
            indent,
            cache: SnapshotCache::default(),
        }
    }

    fn base(&self) -> Result<&Option<Manifest>, SnapshotError> {
        self.cache.base(self.view(), &self.rel_path, || {
            Ok(self.vcs.read_at(ContentRef::Index, &self.rel_path)?)
        })
    }
}

impl ManifestSnapshot for StagedSnapshot {
    fn view(&self) -> SnapshotView {
        SnapshotView::Staged
    }

    fn path(&self) -> &Path {
        &self.rel_path
    }

    fn load(&self) -> Result<Option<Manifest>, SnapshotError> {
        let base = self.base()?;
        Ok(self.cache.current(base))
    }

    fn edit(&self, change: &mut dyn FnMut(&mut Manifest)) -> Result<(), SnapshotError> {
        let base = self.base()?;
        self.cache.edit(self.view(), &self.rel_path, base, change)
    }

    fn save(&self) -> Result<bool, SnapshotError> {
        let Some(manifest) = self.cache.take_dirty() else {
            return Ok(false);
        };
        let text = serialize(&manifest, &self.rel_path, self.indent)?;
        if let Err(e) = self.vcs.write_staged(&self.rel_path, &text) {
            self.cache.dirty.set(true);
            return Err(e.into());
        }
        tracing::debug!(path = %self.rel_path.display(), "wrote staged manifest");
        Ok(true)
    }

    fn is_dirty(&self) -> bool {
        self.cache.dirty.get()
    }
}

// =============================================================================
// Working
// =============================================================================

/// Manifest content on disk.
pub struct WorkingSnapshot {
    path: PathBuf,
    indent: usize,
    cache: SnapshotCache,
}

impl WorkingSnapshot {
    /// Snapshot of the file at `path`, rewritten with `indent` spaces.
    pub fn new(path: impl Into<PathBuf>, indent: usize) -> Self {
        Self {
            path: path.into(),
            indent,
            cache: SnapshotCache::default(),
        }
    }

    fn base(&self) -> Result<&Option<Manifest>, SnapshotError> {
        self.cache
            .base(self.view(), &self.path, || match fs::read_to_string(&self.path) {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(SnapshotError::Io {
                    path: self.path.clone(),
                    source,
                }),
            })
    }
}

impl ManifestSnapshot for WorkingSnapshot {
    fn view(&self) -> SnapshotView {
        SnapshotView::Working
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<Manifest>, SnapshotError> {
        let base = self.base()?;
        Ok(self.cache.current(base))
    }

    fn edit(&self, change: &mut dyn FnMut(&mut Manifest)) -> Result<(), SnapshotError> {
        let base = self.base()?;
        self.cache.edit(self.view(), &self.path, base, change)
    }

    fn save(&self) -> Result<bool, SnapshotError> {
        let Some(manifest) = self.cache.take_dirty() else {
            return Ok(false);
        };
        let text = serialize(&manifest, &self.path, self.indent)?;
        if let Err(source) = fs::write(&self.path, text) {
            self.cache.dirty.set(true);
            return Err(SnapshotError::Io {
                path: self.path.clone(),
                source,
            });
        }
        tracing::debug!(path = %self.path.display(), "wrote working manifest");
        Ok(true)
    }

    fn is_dirty(&self) -> bool {
        self.cache.dirty.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::{FailOn, MockOperation};
    use crate::git::MockVcs;
    use tempfile::TempDir;

    const REL: &str = "packages/a/package.json";
    const BASE: &str = r#"{"name":"a","version":"1.0.0","dependencies":{"b":"^1.0.0"}}"#;

    fn vcs() -> MockVcs {
        MockVcs::new("/repo").with_committed(REL, BASE)
    }

    mod committed {
        use super::*;

        #[test]
        fn reads_head() {
            let vcs = vcs().with_staged(REL, r#"{"name":"a","version":"2.0.0"}"#);
            let snap = CommittedSnapshot::new(Rc::new(vcs), REL);
            assert_eq!(snap.version().unwrap(), Some(Semver::new(1, 0, 0)));
        }

        #[test]
        fn writes_are_rejected() {
            let snap = CommittedSnapshot::new(Rc::new(vcs()), REL);
            let err = snap.set_version(&Semver::new(2, 0, 0)).unwrap_err();
            assert!(matches!(err, SnapshotError::ReadOnly { .. }));
            assert!(!snap.save().unwrap());
        }

        #[test]
        fn absent_file_is_none() {
            let snap = CommittedSnapshot::new(Rc::new(MockVcs::new("/repo")), REL);
            assert!(snap.load().unwrap().is_none());
            assert!(snap.version().unwrap().is_none());
        }

        #[test]
        fn parse_failure_is_read_once() {
            let vcs = MockVcs::new("/repo").with_committed(REL, r#"{"name":"a","version":"#);
            let snap = CommittedSnapshot::new(Rc::new(vcs.clone()), REL);

            assert!(matches!(snap.load(), Err(SnapshotError::Parse { .. })));
            assert!(matches!(snap.version(), Err(SnapshotError::Parse { .. })));
            assert!(matches!(snap.name(), Err(SnapshotError::Parse { .. })));

            let reads = vcs
                .operations()
                .into_iter()
                .filter(|op| matches!(op, MockOperation::ReadAt { .. }))
                .count();
            assert_eq!(reads, 1);
        }
    }

    mod staged {
        use super::*;

        #[test]
        fn base_is_loaded_once() {
            let vcs = vcs();
            let snap = StagedSnapshot::new(Rc::new(vcs.clone()), REL, 2);
            snap.name().unwrap();
            snap.version().unwrap();
            snap.dependencies(BlocName::Dependencies).unwrap();

            let reads = vcs
                .operations()
                .into_iter()
                .filter(|op| matches!(op, crate::git::mock::MockOperation::ReadAt { .. }))
                .count();
            assert_eq!(reads, 1);
        }

        #[test]
        fn edits_are_pending_until_save() {
            let vcs = vcs();
            let snap = StagedSnapshot::new(Rc::new(vcs.clone()), REL, 2);

            snap.set_dependency(BlocName::Dependencies, "b", "^2.0.0").unwrap();
            assert!(snap.is_dirty());
            assert_eq!(
                snap.dependency(BlocName::Dependencies, "b").unwrap().as_deref(),
                Some("^2.0.0")
            );
            assert_eq!(vcs.staged(REL).as_deref(), Some(BASE));

            assert!(snap.save().unwrap());
            assert!(vcs.staged(REL).unwrap().contains("\"^2.0.0\""));
        }

        #[test]
        fn save_is_idempotent() {
            let vcs = vcs();
            let snap = StagedSnapshot::new(Rc::new(vcs.clone()), REL, 2);
            snap.set_version(&Semver::new(1, 0, 1)).unwrap();

            assert!(snap.save().unwrap());
            assert!(!snap.save().unwrap());
            assert_eq!(vcs.staged_writes().len(), 1);
        }

        #[test]
        fn unchanged_edit_is_not_dirty() {
            let snap = StagedSnapshot::new(Rc::new(vcs()), REL, 2);
            snap.set_version(&Semver::new(1, 0, 0)).unwrap();
            assert!(!snap.is_dirty());
            assert!(!snap.save().unwrap());
        }

        #[test]
        fn serialized_with_indent_and_newline() {
            let vcs = vcs();
            let snap = StagedSnapshot::new(Rc::new(vcs.clone()), REL, 4);
            snap.set_version(&Semver::new(1, 1, 0)).unwrap();
            snap.save().unwrap();

            let text = vcs.staged(REL).unwrap();
            assert!(text.starts_with("{\n    \"name\": \"a\""));
            assert!(text.ends_with("}\n"));
        }

        #[test]
        fn malformed_content_reports_view_and_path() {
            let vcs = MockVcs::new("/repo").with_staged(REL, "{ not json");
            let snap = StagedSnapshot::new(Rc::new(vcs), REL, 2);

            match snap.load().unwrap_err() {
                SnapshotError::Parse { view, path, .. } => {
                    assert_eq!(view, SnapshotView::Staged);
                    assert_eq!(path, PathBuf::from(REL));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn invalid_version_is_reported() {
            let vcs = MockVcs::new("/repo").with_staged(REL, r#"{"version":"one"}"#);
            let snap = StagedSnapshot::new(Rc::new(vcs), REL, 2);
            assert!(matches!(
                snap.version().unwrap_err(),
                SnapshotError::Version { .. }
            ));
        }

        #[test]
        fn missing_version_field() {
            let vcs = MockVcs::new("/repo").with_staged(REL, r#"{"name":"a"}"#);
            let snap = StagedSnapshot::new(Rc::new(vcs), REL, 2);
            assert!(matches!(
                snap.version().unwrap_err(),
                SnapshotError::MissingField { field: "version", .. }
            ));
        }

        #[test]
        fn editing_missing_manifest_fails() {
            let snap = StagedSnapshot::new(Rc::new(MockVcs::new("/repo")), REL, 2);
            assert!(matches!(
                snap.set_version(&Semver::new(1, 0, 0)).unwrap_err(),
                SnapshotError::Missing { .. }
            ));
        }

        #[test]
        fn failed_write_stays_dirty() {
            let vcs = vcs().fail_on(FailOn::WriteStaged);
            let snap = StagedSnapshot::new(Rc::new(vcs.clone()), REL, 2);
            snap.set_version(&Semver::new(2, 0, 0)).unwrap();

            assert!(snap.save().is_err());
            assert!(snap.is_dirty());

            vcs.clear_fail_on();
            assert!(snap.save().unwrap());
        }

        #[test]
        fn unknown_fields_round_trip_in_order() {
            let text = r#"{"name":"a","zeta":1,"version":"1.0.0","alpha":{"x":[1,2]}}"#;
            let vcs = MockVcs::new("/repo").with_committed(REL, text);
            let snap = StagedSnapshot::new(Rc::new(vcs.clone()), REL, 2);
            snap.set_version(&Semver::new(1, 0, 1)).unwrap();
            snap.save().unwrap();

            let written = vcs.staged(REL).unwrap();
            let zeta = written.find("zeta").unwrap();
            let version = written.find("version").unwrap();
            let alpha = written.find("alpha").unwrap();
            assert!(zeta < version && version < alpha);
        }
    }

    mod working {
        use super::*;

        #[test]
        fn reads_and_writes_disk() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("package.json");
            fs::write(&path, BASE).unwrap();

            let snap = WorkingSnapshot::new(&path, 2);
            assert_eq!(snap.name().unwrap().as_deref(), Some("a"));

            snap.set_version(&Semver::new(3, 0, 0)).unwrap();
            assert!(snap.save().unwrap());

            let written = fs::read_to_string(&path).unwrap();
            assert!(written.contains("\"version\": \"3.0.0\""));
        }

        #[test]
        fn absent_file_is_none() {
            let temp = TempDir::new().unwrap();
            let snap = WorkingSnapshot::new(temp.path().join("package.json"), 2);
            assert!(snap.load().unwrap().is_none());
        }
    }
}
