//! Scenario tests for full runs over an in-memory repository.
//!
//! Committed and staged content live in a `MockVcs`; working copies are real
//! files in a temporary directory.

use std::fs;
use std::rc::Rc;

use tempfile::TempDir;

use interdeps::core::config::{Config, RepoConfig};
use interdeps::core::semver::{Bump, Semver};
use interdeps::engine::{self, AppliedFix, RunOptions, Violation, ViolationKind};
use interdeps::git::mock::FailOn;
use interdeps::git::MockVcs;
use interdeps::workspace::Workspace;

struct Repo {
    temp: TempDir,
    vcs: MockVcs,
    config: Config,
}

impl Repo {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("packages")).unwrap();
        let vcs = MockVcs::new(temp.path());
        Self {
            temp,
            vcs,
            config: Config::default(),
        }
    }

    fn rel(name: &str) -> String {
        format!("packages/{}/package.json", name)
    }

    /// Commit `manifest` for package `name`; index and working copy match.
    fn commit(self, name: &str, manifest: &str) -> Self {
        self.write_working(name, manifest);
        let vcs = self.vcs.clone().with_committed(Self::rel(name), manifest);
        Self { vcs, ..self }
    }

    /// Stage `manifest` for package `name`; the working copy follows.
    fn stage(self, name: &str, manifest: &str) -> Self {
        self.write_working(name, manifest);
        self.vcs.set_staged(Self::rel(name), manifest);
        self
    }

    fn write_working(&self, name: &str, manifest: &str) {
        let dir = self.temp.path().join("packages").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), manifest).unwrap();
    }

    fn working(&self, name: &str) -> String {
        fs::read_to_string(self.temp.path().join(Self::rel(name))).unwrap()
    }

    fn staged(&self, name: &str) -> String {
        self.vcs.staged(Self::rel(name)).unwrap()
    }

    fn workspace(&self) -> Workspace {
        Workspace::new(Rc::new(self.vcs.clone()), &self.config, tracing::Span::none())
    }

    fn check(&self) -> engine::RunOutcome {
        engine::run(&self.workspace(), RunOptions::check()).unwrap()
    }

    fn fix(&self) -> engine::RunOutcome {
        engine::run(&self.workspace(), RunOptions::fix()).unwrap()
    }

    /// Make the index the new HEAD.
    fn commit_index(&self) {
        for name in ["a", "b", "c", "d"] {
            if let Some(text) = self.vcs.staged(Self::rel(name)) {
                let _ = self.vcs.clone().with_committed(Self::rel(name), text);
            }
        }
    }
}

fn a_depends_on_b() -> Repo {
    Repo::new()
        .commit("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"1.0.0"}}"#)
        .commit("b", r#"{"name":"b","version":"1.0.0"}"#)
}

mod scenarios {
    use super::*;

    #[test]
    fn major_dependency_bump_requires_major() {
        let repo = a_depends_on_b().stage("b", r#"{"name":"b","version":"2.0.0"}"#);

        let outcome = repo.check();
        let a = outcome
            .requirements
            .iter()
            .find(|req| req.package == "a")
            .unwrap();
        assert_eq!(a.required, Bump::Major);
        assert!(!outcome.is_clean());

        let rendered = outcome.violations.render();
        assert!(rendered.starts_with("Cannot accept the commit because of the following:"));
        assert!(rendered.contains("\"a\""));
    }

    #[test]
    fn fix_sets_version_and_declaration() {
        let repo = a_depends_on_b().stage("b", r#"{"name":"b","version":"2.0.0"}"#);

        let outcome = repo.fix();
        assert!(outcome.is_clean(), "{}", outcome.violations.render());
        assert!(outcome.applied.iter().any(|fix| matches!(
            fix,
            AppliedFix::Version { package, to, .. } if package == "a" && *to == Semver::new(2, 0, 0)
        )));

        let staged = repo.staged("a");
        assert!(staged.contains("\"version\": \"2.0.0\""));
        assert!(staged.contains("\"b\": \"2.0.0\""));
        assert!(repo.working("a").contains("\"b\": \"2.0.0\""));
    }

    #[test]
    fn fix_is_idempotent_after_commit() {
        let repo = Repo::new()
            .commit("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"^1.0.0"}}"#)
            .commit("b", r#"{"name":"b","version":"1.0.0","dependencies":{"c":"~1.0.0"}}"#)
            .commit("c", r#"{"name":"c","version":"1.0.0"}"#)
            .stage("c", r#"{"name":"c","version":"1.1.0"}"#);

        let first = repo.fix();
        assert!(first.is_clean(), "{}", first.violations.render());
        assert!(repo.staged("a").contains("\"version\": \"1.1.0\""));
        assert!(repo.staged("a").contains("\"b\": \"^1.1.0\""));
        assert!(repo.staged("b").contains("\"c\": \"~1.1.0\""));

        repo.commit_index();
        let second = repo.check();
        assert!(second.is_clean(), "{}", second.violations.render());
        assert!(repo.fix().applied.is_empty());
    }

    #[test]
    fn wildcard_pinned_to_sibling_version_is_accepted() {
        let repo = Repo::new()
            .commit("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"*"}}"#)
            .commit("b", r#"{"name":"b","version":"1.2.3"}"#)
            .stage("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"1.2.3"}}"#);

        let outcome = repo.check();
        assert!(outcome.is_clean(), "{}", outcome.violations.render());
    }

    #[test]
    fn lowered_range_is_a_major_regression() {
        let repo = Repo::new()
            .commit("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"^2.0.0"}}"#)
            .commit("b", r#"{"name":"b","version":"2.0.0"}"#)
            .stage("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"^1.0.0"}}"#);

        let outcome = repo.check();
        let regression = outcome
            .violations
            .of_kind(ViolationKind::Regression)
            .next()
            .unwrap();
        assert_eq!(regression.package(), "a");

        let a = outcome
            .requirements
            .iter()
            .find(|req| req.package == "a")
            .unwrap();
        assert_eq!(a.required, Bump::Major);
    }

    #[test]
    fn regression_covered_by_major_bump_is_accepted() {
        let repo = Repo::new()
            .commit("a", r#"{"name":"a","version":"1.0.0","dependencies":{"b":"^2.0.0"}}"#)
            .commit("b", r#"{"name":"b","version":"2.0.0"}"#)
            .stage("a", r#"{"name":"a","version":"2.0.0","dependencies":{"b":"^1.0.0"}}"#);

        let outcome = repo.check();
        assert!(outcome.violations.of_kind(ViolationKind::Regression).next().is_none());
        assert!(outcome
            .violations
            .of_kind(ViolationKind::InsufficientBump)
            .next()
            .is_none());
        // The declaration still lags behind its dependency
        assert!(outcome
            .violations
            .of_kind(ViolationKind::DependencyDrift)
            .any(|v| v.package() == "a"));
    }

    #[test]
    fn unbumped_source_change_is_reported() {
        let repo = a_depends_on_b();
        repo.vcs.set_staged("packages/b/src/index.js", "export default 1");

        let outcome = repo.check();
        let unbumped: Vec<&Violation> = outcome
            .violations
            .of_kind(ViolationKind::UnbumpedChange)
            .collect();
        assert_eq!(unbumped.len(), 1);
        assert_eq!(unbumped[0].package(), "b");
        assert!(outcome
            .violations
            .of_kind(ViolationKind::InsufficientBump)
            .all(|v| v.package() != "b"));
    }

    #[test]
    fn fix_bumps_unbumped_source_change() {
        let repo = a_depends_on_b();
        repo.vcs.set_staged("packages/b/src/index.js", "export default 1");

        let outcome = repo.fix();
        assert!(outcome.is_clean(), "{}", outcome.violations.render());
        assert!(repo.staged("b").contains("\"version\": \"1.0.1\""));
        assert!(repo.staged("a").contains("\"version\": \"1.0.1\""));
    }
}

mod isolation {
    use super::*;

    #[test]
    fn broken_manifest_does_not_hide_others() {
        let repo = a_depends_on_b()
            .commit("c", r#"{"name":"c","version":"1.0.0"}"#)
            .stage("c", r#"{"name":"c","version":"#)
            .stage("b", r#"{"name":"b","version":"1.1.0"}"#);

        let outcome = repo.check();
        assert!(outcome
            .violations
            .of_kind(ViolationKind::Failure)
            .any(|v| v.package() == "c"));
        assert!(outcome
            .violations
            .of_kind(ViolationKind::InsufficientBump)
            .any(|v| v.package() == "a"));
    }

    #[test]
    fn excluded_package_is_not_evaluated() {
        let mut repo = a_depends_on_b().stage("b", r#"{"name":"b","version":"2.0.0"}"#);
        repo.config.repo = Some(RepoConfig {
            exclude: Some(vec!["a".to_string()]),
            ..RepoConfig::default()
        });

        let outcome = repo.check();
        assert!(outcome.is_clean(), "{}", outcome.violations.render());
        assert!(outcome.requirements.iter().all(|req| req.package != "a"));
    }

    #[test]
    fn failed_index_write_aborts_fix() {
        let repo = a_depends_on_b().stage("b", r#"{"name":"b","version":"2.0.0"}"#);
        let vcs = repo.vcs.clone().fail_on(FailOn::WriteStaged);
        let workspace = Workspace::new(Rc::new(vcs), &repo.config, tracing::Span::none());

        let result = engine::run(&workspace, RunOptions::fix());
        assert!(matches!(result, Err(engine::EngineError::Persist { .. })));
    }
}
