//! engine::classify
//!
//! Separates real manifest edits from dependency-only edits, and finds staged
//! files whose package was not bumped.
//!
//! A dependency-only edit is one the cascade accounts for on its own: the
//! package's bump is derived from what changed in its dependencies. Anything
//! else in the manifest (scripts, entry points, metadata) counts as a real
//! change that needs at least a patch bump.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::diff::{diff_manifests, DiffEntry, DiffKind};
use crate::core::manifest::json_kind;
use crate::core::semver::Bump;
use crate::core::types::BlocName;
use crate::workspace::{ManifestSnapshot, PackageRecord, SnapshotError, Workspace, WorkspaceError};

/// How a package's manifest changed between HEAD and the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No difference, or the package is new or deleted.
    Unmodified,
    /// Only dependency declarations changed.
    DependencyOnly,
    /// Something outside the dependency blocks changed.
    Real,
    /// A dependency block changed in a way that is not understood.
    Unrecognized(String),
}

impl Classification {
    /// Whether the change needs its own version bump.
    ///
    /// Unrecognized changes are treated as real.
    pub fn is_real(&self) -> bool {
        matches!(self, Classification::Real | Classification::Unrecognized(_))
    }
}

/// Classify the manifest delta of `pkg`.
pub fn classify(pkg: &PackageRecord) -> Result<Classification, SnapshotError> {
    let (Some(committed), Some(staged)) = (pkg.committed().load()?, pkg.staged().load()?) else {
        return Ok(Classification::Unmodified);
    };

    let entries = diff_manifests(&committed, &staged);
    if entries.is_empty() {
        return Ok(Classification::Unmodified);
    }

    let mut unrecognized = None;
    for entry in &entries {
        let Some(bloc) = entry.top_level().and_then(BlocName::from_key) else {
            debug!(package = %pkg.display_name(), path = %entry.dotted_path(), "real manifest change");
            return Ok(Classification::Real);
        };
        if unrecognized.is_none() {
            unrecognized = unrecognized_shape(bloc, entry);
        }
    }

    match unrecognized {
        Some(reason) => {
            warn!(
                package = %pkg.display_name(),
                reason = %reason,
                "unrecognized dependency change, treating as a real change"
            );
            Ok(Classification::Unrecognized(reason))
        }
        None => Ok(Classification::DependencyOnly),
    }
}

/// Whether `pkg` has a manifest change that needs its own bump.
pub fn is_real_change(pkg: &PackageRecord) -> Result<bool, SnapshotError> {
    Ok(classify(pkg)?.is_real())
}

/// Describe why `entry` inside `bloc` has a shape the classifier does not
/// understand, or `None` if it is an ordinary declaration change.
fn unrecognized_shape(bloc: BlocName, entry: &DiffEntry) -> Option<String> {
    match entry.path.len() {
        1 => match entry.kind {
            DiffKind::Added | DiffKind::Removed => {
                let value = entry.new.as_ref().or(entry.old.as_ref())?;
                match value {
                    Value::Object(entries) => entries
                        .iter()
                        .find(|(_, range)| !range.is_string())
                        .map(|(name, range)| {
                            format!("{}.{} is a {}", bloc, name, json_kind(range))
                        }),
                    other => Some(format!("{} is a {}", bloc, json_kind(other))),
                }
            }
            DiffKind::Changed => Some(format!("{} is not an object", bloc)),
        },
        2 => [entry.old.as_ref(), entry.new.as_ref()]
            .into_iter()
            .flatten()
            .find(|value| !value.is_string())
            .map(|value| format!("{} is a {}", entry.dotted_path(), json_kind(value))),
        _ => Some(format!("{} is nested", entry.dotted_path())),
    }
}

/// Staged real changes per package directory, bumped or not.
///
/// Source files always count; the manifest counts only when its delta is a
/// real change. A manifest that cannot be classified counts as real; its
/// package reports the failure when evaluated.
pub fn staged_edits(
    workspace: &Workspace,
) -> Result<BTreeMap<PathBuf, Vec<PathBuf>>, WorkspaceError> {
    let _enter = workspace.span().enter();
    let mut edits: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for path in workspace.vcs().staged_paths()? {
        let Some(pkg) = workspace.package_for_file(&path)? else {
            continue;
        };

        if path == pkg.rel_manifest_path() {
            match is_real_change(&pkg) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => warn!(package = %pkg.display_name(), error = %e, "cannot classify manifest"),
            }
        }

        edits.entry(pkg.dir().to_path_buf()).or_default().push(path);
    }

    Ok(edits)
}

/// Staged files belonging to a package whose version was not increased.
///
/// The manifest itself is only reported when its delta is a real change.
/// Files outside every package are ignored.
pub fn collect_real_changes(workspace: &Workspace) -> Result<Vec<PathBuf>, WorkspaceError> {
    let mut changes = Vec::new();

    for (dir, files) in staged_edits(workspace)? {
        let pkg = workspace.package(&dir);
        match version_increased(&pkg) {
            Ok(true) => debug!(package = %pkg.display_name(), "package already bumped"),
            Ok(false) => changes.extend(files),
            Err(e) => warn!(package = %pkg.display_name(), error = %e, "cannot read package version"),
        }
    }

    Ok(changes)
}

/// Whether the staged version is greater than the committed one.
///
/// New and deleted packages count as increased; they are never required to
/// bump.
pub fn version_increased(pkg: &PackageRecord) -> Result<bool, SnapshotError> {
    let (Some(committed), Some(staged)) = (pkg.committed().version()?, pkg.staged().version()?)
    else {
        return Ok(true);
    };
    Ok(committed.increase_type(&staged).map_or(false, Bump::is_some))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::git::MockVcs;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    const REL: &str = "packages/a/package.json";

    fn setup(committed: &str, staged: &str) -> (TempDir, MockVcs, Workspace) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("packages/a");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), staged).unwrap();

        let vcs = MockVcs::new(temp.path())
            .with_committed(REL, committed)
            .with_staged(REL, staged);
        let ws = Workspace::new(Rc::new(vcs.clone()), &Config::default(), tracing::Span::none());
        (temp, vcs, ws)
    }

    fn classify_pair(committed: &str, staged: &str) -> Classification {
        let (temp, _vcs, ws) = setup(committed, staged);
        let pkg = ws.package(&temp.path().join("packages/a"));
        classify(&pkg).unwrap()
    }

    mod classification {
        use super::*;

        #[test]
        fn identical_is_unmodified() {
            let text = r#"{"name":"a","version":"1.0.0"}"#;
            assert_eq!(classify_pair(text, text), Classification::Unmodified);
        }

        #[test]
        fn dependency_version_change() {
            assert_eq!(
                classify_pair(
                    r#"{"name":"a","dependencies":{"b":"1.0.0"}}"#,
                    r#"{"name":"a","dependencies":{"b":"2.0.0"}}"#,
                ),
                Classification::DependencyOnly
            );
        }

        #[test]
        fn dependency_added_and_block_added() {
            assert_eq!(
                classify_pair(
                    r#"{"name":"a","dependencies":{"b":"1.0.0"}}"#,
                    r#"{"name":"a","dependencies":{"b":"1.0.0","c":"^1.0.0"},"devDependencies":{"d":"*"}}"#,
                ),
                Classification::DependencyOnly
            );
        }

        #[test]
        fn other_field_is_real() {
            let result = classify_pair(
                r#"{"name":"a","main":"index.js","dependencies":{"b":"1.0.0"}}"#,
                r#"{"name":"a","main":"lib/index.js","dependencies":{"b":"2.0.0"}}"#,
            );
            assert_eq!(result, Classification::Real);
            assert!(result.is_real());
        }

        #[test]
        fn version_bump_alone_is_real() {
            assert_eq!(
                classify_pair(r#"{"version":"1.0.0"}"#, r#"{"version":"1.0.1"}"#),
                Classification::Real
            );
        }

        #[test]
        fn non_string_entry_is_unrecognized() {
            let result = classify_pair(
                r#"{"dependencies":{"b":"1.0.0"}}"#,
                r#"{"dependencies":{"b":{"version":"1.0.0"}}}"#,
            );
            assert!(matches!(result, Classification::Unrecognized(_)));
            assert!(result.is_real());
        }

        #[test]
        fn block_turned_into_array_is_unrecognized() {
            let result = classify_pair(
                r#"{"dependencies":{"b":"1.0.0"}}"#,
                r#"{"dependencies":["b"]}"#,
            );
            assert!(matches!(result, Classification::Unrecognized(_)));
        }

        #[test]
        fn new_package_is_unmodified() {
            let temp = TempDir::new().unwrap();
            let vcs = MockVcs::new(temp.path()).with_staged(REL, r#"{"name":"a"}"#);
            let ws = Workspace::new(Rc::new(vcs), &Config::default(), tracing::Span::none());
            let pkg = ws.package(&temp.path().join("packages/a"));
            assert_eq!(classify(&pkg).unwrap(), Classification::Unmodified);
        }
    }

    mod real_changes {
        use super::*;

        #[test]
        fn unbumped_source_change_is_reported() {
            let text = r#"{"name":"a","version":"1.0.0"}"#;
            let (_temp, vcs, ws) = setup(text, text);
            vcs.set_staged("packages/a/src/index.js", "export {}");

            let changes = collect_real_changes(&ws).unwrap();
            assert_eq!(changes, vec![PathBuf::from("packages/a/src/index.js")]);
        }

        #[test]
        fn bumped_package_is_skipped() {
            let (_temp, vcs, ws) = setup(
                r#"{"name":"a","version":"1.0.0"}"#,
                r#"{"name":"a","version":"1.0.1"}"#,
            );
            vcs.set_staged("packages/a/src/index.js", "export {}");

            assert!(collect_real_changes(&ws).unwrap().is_empty());
        }

        #[test]
        fn dependency_only_manifest_is_skipped() {
            let (_temp, _vcs, ws) = setup(
                r#"{"name":"a","version":"1.0.0","dependencies":{"b":"1.0.0"}}"#,
                r#"{"name":"a","version":"1.0.0","dependencies":{"b":"1.1.0"}}"#,
            );
            assert!(collect_real_changes(&ws).unwrap().is_empty());
        }

        #[test]
        fn real_manifest_change_is_reported() {
            let (_temp, _vcs, ws) = setup(
                r#"{"name":"a","version":"1.0.0","main":"a.js"}"#,
                r#"{"name":"a","version":"1.0.0","main":"b.js"}"#,
            );
            assert_eq!(
                collect_real_changes(&ws).unwrap(),
                vec![PathBuf::from(REL)]
            );
        }

        #[test]
        fn files_outside_packages_are_ignored() {
            let text = r#"{"name":"a","version":"1.0.0"}"#;
            let (_temp, vcs, ws) = setup(text, text);
            vcs.set_staged("README.md", "docs");
            vcs.set_staged(Path::new("tools/build.js"), "x");

            assert!(collect_real_changes(&ws).unwrap().is_empty());
        }
    }
}
