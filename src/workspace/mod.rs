//! workspace
//!
//! Registry of the packages in a repository.
//!
//! # Architecture
//!
//! Package directories are the immediate children of the configured
//! workspace root (default `packages/`) that contain a manifest file and are
//! not excluded by configuration. Each directory maps to one
//! [`PackageRecord`], created on first access and shared for the lifetime of
//! the [`Workspace`]. The name index is built lazily, once.
//!
//! # Example
//!
//! ```ignore
//! use interdeps::core::config::Config;
//! use interdeps::git::{Git, Vcs};
//! use interdeps::workspace::Workspace;
//! use std::rc::Rc;
//!
//! let git = Git::open(Path::new("."))?;
//! let config = Config::load(git.root())?.config;
//! let workspace = Workspace::new(Rc::new(git), &config, tracing::info_span!("interdeps"));
//!
//! for pkg in workspace.all_packages()? {
//!     println!("{}", pkg.display_name());
//! }
//! ```

pub mod package;
pub mod snapshot;

pub use package::PackageRecord;
pub use snapshot::{
    CommittedSnapshot, ManifestSnapshot, SnapshotError, StagedSnapshot, WorkingSnapshot,
};

use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn, Span};

use crate::core::config::Config;
use crate::git::{GitError, Vcs};

/// Errors from workspace discovery.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The workspace root could not be listed.
    #[error("failed to read workspace root '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// The set of packages under the workspace root.
pub struct Workspace {
    vcs: Rc<dyn Vcs>,
    repo_root: PathBuf,
    root: PathBuf,
    manifest: String,
    indent: usize,
    exclude: BTreeSet<String>,
    span: Span,
    packages: RefCell<BTreeMap<PathBuf, Rc<PackageRecord>>>,
    all: OnceCell<Vec<Rc<PackageRecord>>>,
    by_name: OnceCell<BTreeMap<String, Rc<PackageRecord>>>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("repo_root", &self.repo_root)
            .field("root", &self.root)
            .field("manifest", &self.manifest)
            .finish()
    }
}

impl Workspace {
    /// Workspace over the repository behind `vcs`, laid out per `config`.
    ///
    /// All logging from the workspace happens inside `span`.
    pub fn new(vcs: Rc<dyn Vcs>, config: &Config, span: Span) -> Self {
        let repo_root = vcs.root().to_path_buf();
        let root = repo_root.join(config.workspace_root());
        Self {
            vcs,
            repo_root,
            root,
            manifest: config.manifest().to_string(),
            indent: config.indent(),
            exclude: config.exclude().iter().cloned().collect(),
            span,
            packages: RefCell::new(BTreeMap::new()),
            all: OnceCell::new(),
            by_name: OnceCell::new(),
        }
    }

    /// The version-control collaborator.
    pub fn vcs(&self) -> &dyn Vcs {
        self.vcs.as_ref()
    }

    /// Repository root.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Directory holding the packages.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Span for logging on behalf of this workspace.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The record for the package at `dir`, created on first request.
    pub fn package(&self, dir: &Path) -> Rc<PackageRecord> {
        let mut packages = self.packages.borrow_mut();
        if let Some(pkg) = packages.get(dir) {
            return Rc::clone(pkg);
        }

        let rel_dir = dir.strip_prefix(&self.repo_root).unwrap_or(dir);
        let rel_manifest_path = rel_dir.join(&self.manifest);
        let pkg = Rc::new(PackageRecord::new(
            Rc::clone(&self.vcs),
            dir.to_path_buf(),
            &self.manifest,
            rel_manifest_path,
            self.indent,
        ));
        packages.insert(dir.to_path_buf(), Rc::clone(&pkg));
        pkg
    }

    /// Every package directory under the root, sorted by path.
    ///
    /// # Errors
    ///
    /// [`WorkspaceError::ReadDir`] when the workspace root cannot be listed.
    pub fn all_packages(&self) -> Result<&[Rc<PackageRecord>], WorkspaceError> {
        if let Some(all) = self.all.get() {
            return Ok(all);
        }

        let _enter = self.span.enter();
        let entries = fs::read_dir(&self.root).map_err(|source| WorkspaceError::ReadDir {
            path: self.root.clone(),
            source,
        })?;

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| WorkspaceError::ReadDir {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.exclude.contains(&name) {
                debug!(package = %name, "excluded by configuration");
                continue;
            }
            if !path.join(&self.manifest).is_file() {
                continue;
            }
            dirs.push(path);
        }
        dirs.sort();

        let all: Vec<_> = dirs.iter().map(|dir| self.package(dir)).collect();
        debug!(count = all.len(), root = %self.root.display(), "discovered packages");
        Ok(self.all.get_or_init(|| all))
    }

    /// The package containing `path`.
    ///
    /// `path` may be absolute or relative to the repository root. Files
    /// outside every discovered package yield `None`.
    pub fn package_for_file(
        &self,
        path: &Path,
    ) -> Result<Option<Rc<PackageRecord>>, WorkspaceError> {
        let absolute = normalize(&self.repo_root.join(path));
        Ok(self
            .all_packages()?
            .iter()
            .find(|pkg| pkg.contains(&absolute))
            .cloned())
    }

    /// The package whose manifest declares `name`.
    ///
    /// Packages whose manifest cannot be read are skipped here; they report
    /// their own failure when evaluated.
    pub fn package_by_name(&self, name: &str) -> Result<Option<Rc<PackageRecord>>, WorkspaceError> {
        if self.by_name.get().is_none() {
            let index = self.build_name_index()?;
            let _ = self.by_name.set(index);
        }
        Ok(self
            .by_name
            .get()
            .and_then(|index| index.get(name))
            .cloned())
    }

    /// Whether `name` is a package of this workspace.
    pub fn is_in_repo(&self, name: &str) -> Result<bool, WorkspaceError> {
        Ok(self.package_by_name(name)?.is_some())
    }

    fn build_name_index(&self) -> Result<BTreeMap<String, Rc<PackageRecord>>, WorkspaceError> {
        let _enter = self.span.enter();
        let mut index: BTreeMap<String, Rc<PackageRecord>> = BTreeMap::new();

        for pkg in self.all_packages()? {
            let name = match pkg.name() {
                Ok(Some(name)) => name,
                Ok(None) => match pkg.committed().name() {
                    Ok(Some(name)) => name,
                    _ => continue,
                },
                Err(e) => {
                    warn!(package = %pkg.dir().display(), error = %e, "cannot read package name");
                    continue;
                }
            };

            if let Some(existing) = index.get(&name) {
                warn!(
                    name = %name,
                    first = %existing.dir().display(),
                    second = %pkg.dir().display(),
                    "duplicate package name, keeping the first"
                );
                continue;
            }
            index.insert(name, Rc::clone(pkg));
        }
        Ok(index)
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RepoConfig;
    use crate::git::MockVcs;
    use tempfile::TempDir;

    fn write_package(temp: &TempDir, dir: &str, manifest: &str) {
        let path = temp.path().join("packages").join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("package.json"), manifest).unwrap();
    }

    fn workspace(vcs: &MockVcs, config: &Config) -> Workspace {
        Workspace::new(Rc::new(vcs.clone()), config, Span::none())
    }

    mod discovery {
        use super::*;

        #[test]
        fn immediate_children_with_manifest() {
            let temp = TempDir::new().unwrap();
            write_package(&temp, "b", r#"{"name":"b"}"#);
            write_package(&temp, "a", r#"{"name":"a"}"#);
            fs::create_dir_all(temp.path().join("packages/no-manifest")).unwrap();
            fs::write(temp.path().join("packages/README.md"), "x").unwrap();

            let vcs = MockVcs::new(temp.path());
            let ws = workspace(&vcs, &Config::default());
            let dirs: Vec<_> = ws
                .all_packages()
                .unwrap()
                .iter()
                .map(|p| p.dir().file_name().unwrap().to_string_lossy().into_owned())
                .collect();

            assert_eq!(dirs, vec!["a", "b"]);
        }

        #[test]
        fn excluded_directories_skipped() {
            let temp = TempDir::new().unwrap();
            write_package(&temp, "a", r#"{"name":"a"}"#);
            write_package(&temp, "legacy", r#"{"name":"legacy"}"#);

            let config = Config {
                repo: Some(RepoConfig {
                    exclude: Some(vec!["legacy".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            };
            let vcs = MockVcs::new(temp.path());
            let ws = workspace(&vcs, &config);

            assert_eq!(ws.all_packages().unwrap().len(), 1);
        }

        #[test]
        fn missing_root_is_an_error() {
            let temp = TempDir::new().unwrap();
            let vcs = MockVcs::new(temp.path());
            let ws = workspace(&vcs, &Config::default());
            assert!(matches!(
                ws.all_packages(),
                Err(WorkspaceError::ReadDir { .. })
            ));
        }

        #[test]
        fn records_are_shared() {
            let temp = TempDir::new().unwrap();
            write_package(&temp, "a", r#"{"name":"a"}"#);
            let vcs = MockVcs::new(temp.path());
            let ws = workspace(&vcs, &Config::default());

            let first = ws.package(&temp.path().join("packages/a"));
            let second = ws.package(&temp.path().join("packages/a"));
            assert!(Rc::ptr_eq(&first, &second));
            assert_eq!(
                first.rel_manifest_path(),
                Path::new("packages/a/package.json")
            );
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn by_file_path() {
            let temp = TempDir::new().unwrap();
            write_package(&temp, "a", r#"{"name":"a"}"#);
            write_package(&temp, "ab", r#"{"name":"ab"}"#);
            let vcs = MockVcs::new(temp.path());
            let ws = workspace(&vcs, &Config::default());

            let pkg = ws
                .package_for_file(Path::new("packages/ab/src/index.js"))
                .unwrap()
                .unwrap();
            assert!(pkg.dir().ends_with("packages/ab"));

            assert!(ws
                .package_for_file(Path::new("README.md"))
                .unwrap()
                .is_none());
        }

        #[test]
        fn by_name_uses_staged_manifest() {
            let temp = TempDir::new().unwrap();
            write_package(&temp, "a", r#"{"name":"@scope/a"}"#);
            let vcs = MockVcs::new(temp.path())
                .with_committed("packages/a/package.json", r#"{"name":"@scope/a"}"#);
            let ws = workspace(&vcs, &Config::default());

            assert!(ws.package_by_name("@scope/a").unwrap().is_some());
            assert!(!ws.is_in_repo("lodash").unwrap());
        }

        #[test]
        fn unreadable_manifest_is_skipped() {
            let temp = TempDir::new().unwrap();
            write_package(&temp, "a", "{");
            write_package(&temp, "b", r#"{"name":"b"}"#);
            let vcs = MockVcs::new(temp.path())
                .with_committed("packages/a/package.json", "{")
                .with_committed("packages/b/package.json", r#"{"name":"b"}"#);
            let ws = workspace(&vcs, &Config::default());

            assert!(ws.package_by_name("b").unwrap().is_some());
        }
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(
            normalize(Path::new("/repo/./packages/a/../b")),
            PathBuf::from("/repo/packages/b")
        );
    }
}
