//! workspace::package
//!
//! One package directory and its three manifest views.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::snapshot::{
    CommittedSnapshot, ManifestSnapshot, SnapshotError, StagedSnapshot, WorkingSnapshot,
};
use crate::core::types::SnapshotView;
use crate::git::Vcs;

/// A package in the workspace.
///
/// Identity is the package directory. Records are created once per
/// [`super::Workspace`] and shared, so every caller sees the same pending
/// edits.
pub struct PackageRecord {
    dir: PathBuf,
    manifest_path: PathBuf,
    rel_manifest_path: PathBuf,
    committed: CommittedSnapshot,
    staged: StagedSnapshot,
    working: WorkingSnapshot,
}

impl std::fmt::Debug for PackageRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageRecord")
            .field("dir", &self.dir)
            .field("manifest", &self.rel_manifest_path)
            .finish()
    }
}

impl PackageRecord {
    /// Record for the package at `dir`.
    ///
    /// `rel_manifest_path` is the manifest path relative to the repository
    /// root, as the index addresses it.
    pub fn new(
        vcs: Rc<dyn Vcs>,
        dir: PathBuf,
        manifest_name: &str,
        rel_manifest_path: PathBuf,
        indent: usize,
    ) -> Self {
        let manifest_path = dir.join(manifest_name);
        Self {
            committed: CommittedSnapshot::new(Rc::clone(&vcs), rel_manifest_path.clone()),
            staged: StagedSnapshot::new(vcs, rel_manifest_path.clone(), indent),
            working: WorkingSnapshot::new(manifest_path.clone(), indent),
            dir,
            manifest_path,
            rel_manifest_path,
        }
    }

    /// Package directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute manifest path.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Manifest path relative to the repository root.
    pub fn rel_manifest_path(&self) -> &Path {
        &self.rel_manifest_path
    }

    pub fn committed(&self) -> &CommittedSnapshot {
        &self.committed
    }

    pub fn staged(&self) -> &StagedSnapshot {
        &self.staged
    }

    pub fn working(&self) -> &WorkingSnapshot {
        &self.working
    }

    /// The snapshot for `view`.
    pub fn snapshot(&self, view: SnapshotView) -> &dyn ManifestSnapshot {
        match view {
            SnapshotView::Committed => &self.committed,
            SnapshotView::Staged => &self.staged,
            SnapshotView::Working => &self.working,
        }
    }

    /// Package name, taken from the staged manifest.
    pub fn name(&self) -> Result<Option<String>, SnapshotError> {
        self.staged.name()
    }

    /// Name for messages: the staged name, else the committed one, else the
    /// directory name.
    pub fn display_name(&self) -> String {
        let named = |snap: &dyn ManifestSnapshot| snap.name().ok().flatten();
        named(self.snapshot(SnapshotView::Staged))
            .or_else(|| named(self.snapshot(SnapshotView::Committed)))
            .unwrap_or_else(|| {
                self.dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| self.dir.display().to_string())
            })
    }

    /// Whether `path` (absolute) lies inside this package.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    /// Persist every dirty snapshot. Returns how many writes happened.
    pub fn save(&self) -> Result<usize, SnapshotError> {
        let mut writes = 0;
        for view in [SnapshotView::Staged, SnapshotView::Working] {
            if self.snapshot(view).save()? {
                writes += 1;
            }
        }
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::semver::Semver;
    use crate::git::MockVcs;
    use std::fs;
    use tempfile::TempDir;

    fn record(temp: &TempDir, vcs: &MockVcs) -> PackageRecord {
        let dir = temp.path().join("packages/a");
        fs::create_dir_all(&dir).unwrap();
        PackageRecord::new(
            Rc::new(vcs.clone()),
            dir,
            "package.json",
            PathBuf::from("packages/a/package.json"),
            2,
        )
    }

    #[test]
    fn name_comes_from_staged() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new(temp.path())
            .with_committed("packages/a/package.json", r#"{"name":"old"}"#)
            .with_staged("packages/a/package.json", r#"{"name":"new"}"#);
        let pkg = record(&temp, &vcs);

        assert_eq!(pkg.name().unwrap().as_deref(), Some("new"));
        assert_eq!(pkg.display_name(), "new");
    }

    #[test]
    fn display_name_falls_back_to_directory() {
        let temp = TempDir::new().unwrap();
        let vcs = MockVcs::new(temp.path());
        let pkg = record(&temp, &vcs);
        assert_eq!(pkg.display_name(), "a");
    }

    #[test]
    fn contains_files_below_directory() {
        let temp = TempDir::new().unwrap();
        let pkg = record(&temp, &MockVcs::new(temp.path()));
        assert!(pkg.contains(&temp.path().join("packages/a/src/index.js")));
        assert!(!pkg.contains(&temp.path().join("packages/ab/index.js")));
    }

    #[test]
    fn save_writes_dirty_views() {
        let temp = TempDir::new().unwrap();
        let text = r#"{"name":"a","version":"1.0.0"}"#;
        let vcs = MockVcs::new(temp.path()).with_committed("packages/a/package.json", text);
        let pkg = record(&temp, &vcs);
        fs::write(pkg.manifest_path(), text).unwrap();

        pkg.staged().set_version(&Semver::new(1, 0, 1)).unwrap();
        pkg.working().set_version(&Semver::new(1, 0, 1)).unwrap();

        assert_eq!(pkg.save().unwrap(), 2);
        assert_eq!(pkg.save().unwrap(), 0);
    }
}
