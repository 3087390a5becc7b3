//! engine::cascade
//!
//! Propagation of required version bumps through the dependency graph.
//!
//! # Architecture
//!
//! Every package carries a required bump on the scale
//! `none < patch < minor < major`. It starts as the join of the package's
//! own signals (staged edits, changed declarations) and only ever grows.
//! From the requirement follows the package's *resolved* version: its staged
//! version when the existing increase already covers the requirement,
//! otherwise the committed version increased by the requirement.
//!
//! Each in-repo declaration becomes an edge from the dependency to the
//! declaring package. Whenever a package's resolved version moves, its
//! subscribers compare their declaration with it and join the resulting
//! signal into their own requirement. The worklist stops once no requirement
//! grows; since the scale has four levels and every update is a strict
//! increase, it always terminates, and the result does not depend on the
//! order events are processed in.
//!
//! # Example
//!
//! ```ignore
//! let edits = classify::staged_edits(&workspace)?;
//! let mut engine = CascadeEngine::new(&workspace, &edits, span)?;
//! engine.solve();
//!
//! for req in engine.requirements() {
//!     println!("{}: {} required", req.package, req.required);
//! }
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, info, warn, Span};

use super::report::{Cause, Violation, ViolationTree};
use super::EngineError;
use crate::core::semver::{Bump, Semver, SemverError};
use crate::core::types::BlocName;
use crate::workspace::{ManifestSnapshot, PackageRecord, Workspace};

/// What the engine does with the fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report violations without touching anything.
    Check,
    /// Write the required versions and declarations.
    Fix,
}

/// A change written in fix mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedFix {
    /// A package version was increased.
    Version {
        package: String,
        from: Semver,
        to: Semver,
        causes: Vec<Cause>,
        /// Whether the working copy was updated too
        working: bool,
    },
    /// A dependency declaration was moved to the dependency's version.
    Declaration {
        package: String,
        bloc: BlocName,
        dep: String,
        from: String,
        to: String,
        /// Whether the working copy was updated too
        working: bool,
    },
}

impl fmt::Display for AppliedFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliedFix::Version {
                package,
                from,
                to,
                causes,
                ..
            } => {
                write!(f, "{}: {} => {}", package, from, to)?;
                if !causes.is_empty() {
                    let causes: Vec<String> = causes.iter().map(ToString::to_string).collect();
                    write!(f, "\nBecause {}", causes.join(", "))?;
                }
                Ok(())
            }
            AppliedFix::Declaration {
                package,
                bloc,
                dep,
                from,
                to,
                ..
            } => write!(f, "{}[{}.{}]: {} => {}", package, bloc, dep, from, to),
        }
    }
}

/// Final state of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub package: String,
    /// Version at HEAD; `None` for a new package
    pub committed: Option<Semver>,
    /// Version in the index before the run
    pub staged: Semver,
    /// Increase already present between committed and staged
    pub actual: Bump,
    /// Increase the changes call for
    pub required: Bump,
    /// Version the package ends up with
    pub resolved: Semver,
    pub causes: Vec<Cause>,
}

impl Requirement {
    /// Whether the staged version already satisfies the requirement.
    pub fn is_covered(&self) -> bool {
        self.actual >= self.required
    }
}

/// Where a declared dependency points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Not a package of this workspace.
    External,
    /// An evaluated package, by state index.
    Package(usize),
    /// A package of this workspace that could not be evaluated.
    Unavailable,
}

/// Declaring package `subscriber` depends on the edge's source.
#[derive(Debug, Clone)]
struct Edge {
    subscriber: usize,
    bloc: BlocName,
    dep: String,
    declared: Semver,
    declared_raw: String,
}

#[derive(Debug, Clone)]
struct RegressionRecord {
    bloc: BlocName,
    dep: String,
    from: String,
    to: String,
    bump: Bump,
}

struct PackageState {
    record: Rc<PackageRecord>,
    name: String,
    committed: Option<Semver>,
    staged: Semver,
    actual: Bump,
    required: Bump,
    resolved: Semver,
    causes: Vec<Cause>,
    regressions: Vec<RegressionRecord>,
    failed: bool,
}

impl PackageState {
    fn resolve(&self) -> Result<Semver, SemverError> {
        match &self.committed {
            Some(committed) if self.actual < self.required => committed.increase(self.required),
            _ => Ok(self.staged.clone()),
        }
    }

    fn requirement(&self) -> Requirement {
        Requirement {
            package: self.name.clone(),
            committed: self.committed.clone(),
            staged: self.staged.clone(),
            actual: self.actual,
            required: self.required,
            resolved: self.resolved.clone(),
            causes: self.causes.clone(),
        }
    }
}

/// A planned declaration rewrite.
struct DeclarationPlan {
    idx: usize,
    bloc: BlocName,
    dep: String,
    from: String,
    to: String,
    working: bool,
}

/// The bump propagation engine for one run.
pub struct CascadeEngine<'w> {
    workspace: &'w Workspace,
    span: Span,
    states: Vec<PackageState>,
    by_dir: BTreeMap<PathBuf, usize>,
    subscribers: BTreeMap<usize, Vec<Edge>>,
    failures: Vec<Violation>,
}

impl<'w> CascadeEngine<'w> {
    /// Load every package and seed its requirement.
    ///
    /// `edits` maps package directories to their staged real changes. A
    /// package that cannot be loaded is recorded as a failure and left out
    /// of the graph; the others are evaluated normally.
    ///
    /// # Errors
    ///
    /// Only workspace discovery errors are fatal.
    pub fn new(
        workspace: &'w Workspace,
        edits: &BTreeMap<PathBuf, Vec<PathBuf>>,
        span: Span,
    ) -> Result<Self, EngineError> {
        let mut engine = Self {
            workspace,
            span: span.clone(),
            states: Vec::new(),
            by_dir: BTreeMap::new(),
            subscribers: BTreeMap::new(),
            failures: Vec::new(),
        };
        let _enter = span.enter();

        for pkg in workspace.all_packages()? {
            engine.load_package(pkg);
        }
        for idx in 0..engine.states.len() {
            engine.seed(idx, edits)?;
        }

        debug!(
            packages = engine.states.len(),
            edges = engine.subscribers.values().map(Vec::len).sum::<usize>(),
            failures = engine.failures.len(),
            "cascade seeded"
        );
        Ok(engine)
    }

    fn load_package(&mut self, pkg: &Rc<PackageRecord>) {
        let name = pkg.display_name();
        match load_versions(pkg) {
            Ok(Some((committed, staged, actual))) => {
                self.by_dir.insert(pkg.dir().to_path_buf(), self.states.len());
                self.states.push(PackageState {
                    record: Rc::clone(pkg),
                    name,
                    resolved: staged.clone(),
                    committed,
                    staged,
                    actual,
                    required: Bump::None,
                    causes: Vec::new(),
                    regressions: Vec::new(),
                    failed: false,
                });
            }
            Ok(None) => debug!(package = %name, "not in the index, skipped"),
            Err(message) => self.fail(&name, message),
        }
    }

    fn fail(&mut self, package: &str, message: String) {
        warn!(package = %package, error = %message, "package evaluation failed");
        self.failures.push(Violation::Failure {
            package: package.to_string(),
            message,
        });
    }

    fn target(&self, dep: &str) -> Result<Target, EngineError> {
        Ok(match self.workspace.package_by_name(dep)? {
            None => Target::External,
            Some(record) => match self.by_dir.get(record.dir()) {
                Some(idx) => Target::Package(*idx),
                None => Target::Unavailable,
            },
        })
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    fn seed(
        &mut self,
        idx: usize,
        edits: &BTreeMap<PathBuf, Vec<PathBuf>>,
    ) -> Result<(), EngineError> {
        // New packages are never required to bump
        if self.states[idx].committed.is_none() {
            return Ok(());
        }

        let record = Rc::clone(&self.states[idx].record);
        if let Some(files) = edits.get(record.dir()) {
            self.raise(
                idx,
                Cause::DirectEdit {
                    files: files.clone(),
                },
            );
        }

        for bloc in BlocName::ALL {
            let staged = record.staged().dependencies(bloc);
            let committed = record.committed().dependencies(bloc);
            let (staged, committed) = match (staged, committed) {
                (Ok(staged), Ok(committed)) => (staged, committed),
                (Err(e), _) | (_, Err(e)) => {
                    let name = self.states[idx].name.clone();
                    self.fail(&name, e.to_string());
                    continue;
                }
            };

            for (dep, staged_raw) in &staged {
                let target = self.target(dep)?;
                let committed_raw = committed.get(dep).map(String::as_str);
                self.seed_entry(idx, bloc, dep, staged_raw, committed_raw, target);
            }

            for (dep, range) in &committed {
                if !staged.contains_key(dep) {
                    self.raise(
                        idx,
                        Cause::DeclarationRemoved {
                            bloc,
                            dep: dep.clone(),
                            range: range.clone(),
                        },
                    );
                }
            }
        }

        Ok(())
    }

    fn seed_entry(
        &mut self,
        idx: usize,
        bloc: BlocName,
        dep: &str,
        staged_raw: &str,
        committed_raw: Option<&str>,
        target: Target,
    ) {
        let in_repo = target != Target::External;

        let Some(committed_raw) = committed_raw else {
            self.raise(
                idx,
                Cause::DeclarationAdded {
                    bloc,
                    dep: dep.to_string(),
                    range: staged_raw.to_string(),
                },
            );
            self.subscribe(idx, bloc, dep, staged_raw, target);
            return;
        };

        if committed_raw != staged_raw {
            let (bump, regression) = match compare_declarations(committed_raw, staged_raw) {
                Ok(result) => result,
                Err(e) if in_repo => {
                    let name = self.states[idx].name.clone();
                    self.fail(&name, format!("[{}.{}] {}", bloc, dep, e));
                    return;
                }
                // Ranges this tool cannot read are fine outside the repo
                Err(_) => (Bump::Patch, false),
            };
            let bump = if !in_repo && !regression && bump.is_some() {
                Bump::Patch
            } else {
                bump
            };

            if regression {
                self.states[idx].regressions.push(RegressionRecord {
                    bloc,
                    dep: dep.to_string(),
                    from: committed_raw.to_string(),
                    to: staged_raw.to_string(),
                    bump,
                });
            }
            self.raise(
                idx,
                Cause::DeclarationChanged {
                    bloc,
                    dep: dep.to_string(),
                    from: committed_raw.to_string(),
                    to: staged_raw.to_string(),
                    bump,
                    regression,
                },
            );
        }

        if matches!(Semver::parse(staged_raw), Ok(v) if v.is_wildcard()) {
            return;
        }
        self.subscribe(idx, bloc, dep, committed_raw, target);
    }

    /// Register `idx` as depending on `target` through `declared_raw`.
    fn subscribe(
        &mut self,
        idx: usize,
        bloc: BlocName,
        dep: &str,
        declared_raw: &str,
        target: Target,
    ) {
        let Target::Package(source) = target else {
            return;
        };

        let declared = match Semver::parse(declared_raw) {
            Ok(declared) if declared.is_wildcard() => return,
            Ok(declared) => declared,
            Err(e) => {
                let name = self.states[idx].name.clone();
                self.fail(&name, format!("[{}.{}] {}", bloc, dep, e));
                return;
            }
        };
        if let Err(e) = declared.is_lower_than(&self.states[source].staged) {
            let name = self.states[idx].name.clone();
            self.fail(&name, format!("[{}.{}] {}", bloc, dep, e));
            return;
        }

        self.subscribers.entry(source).or_default().push(Edge {
            subscriber: idx,
            bloc,
            dep: dep.to_string(),
            declared,
            declared_raw: declared_raw.to_string(),
        });
    }

    /// Join `cause` into the requirement of `idx`.
    ///
    /// Returns `true` when the resolved version moved.
    fn raise(&mut self, idx: usize, cause: Cause) -> bool {
        let state = &mut self.states[idx];
        let bump = cause.bump();
        if !bump.is_some() || state.failed {
            return false;
        }

        if let Cause::DependencyBumped { bloc, dep, .. } = &cause {
            state.causes.retain(|c| {
                !matches!(c, Cause::DependencyBumped { bloc: b, dep: d, .. } if b == bloc && d == dep)
            });
        }
        state.causes.push(cause);

        let required = state.required.join(bump);
        if required == state.required {
            return false;
        }
        state.required = required;

        let resolved = match state.resolve() {
            Ok(resolved) => resolved,
            Err(e) => {
                // The package stays in the graph with its staged version
                state.failed = true;
                let name = state.name.clone();
                self.fail(&name, e.to_string());
                return false;
            }
        };
        if resolved == state.resolved {
            return false;
        }
        debug!(package = %state.name, %required, %resolved, "requirement raised");
        state.resolved = resolved;
        true
    }

    // =========================================================================
    // Fixed point
    // =========================================================================

    /// Run the worklist to its fixed point.
    pub fn solve(&mut self) {
        self.solve_in_order(0..self.states.len());
    }

    /// Run the worklist, publishing packages initially in `order`.
    ///
    /// Indices refer to [`CascadeEngine::requirements`]. Packages missing
    /// from `order` are published after it. The fixed point is the same for
    /// every order.
    pub fn solve_in_order(&mut self, order: impl IntoIterator<Item = usize>) {
        let span = self.span.clone();
        let _enter = span.enter();

        let count = self.states.len();
        let mut queued = vec![false; count];
        let mut queue = VecDeque::with_capacity(count);
        for idx in order.into_iter().chain(0..count) {
            if idx < count && !queued[idx] {
                queued[idx] = true;
                queue.push_back(idx);
            }
        }

        let mut events = 0usize;
        while let Some(source) = queue.pop_front() {
            queued[source] = false;
            events += 1;

            let version = self.states[source].resolved.clone();
            let from = self.states[source].committed.clone();
            let edges = self.subscribers.get(&source).cloned().unwrap_or_default();

            for edge in edges {
                if !matches!(edge.declared.is_lower_than(&version), Ok(true)) {
                    continue;
                }
                let bump = edge.declared.update_type(&version).unwrap_or(Bump::None);
                let cause = Cause::DependencyBumped {
                    bloc: edge.bloc,
                    dep: edge.dep.clone(),
                    declared: edge.declared_raw.clone(),
                    from: from.clone(),
                    to: version.clone(),
                    bump,
                };
                if self.raise(edge.subscriber, cause) && !queued[edge.subscriber] {
                    queued[edge.subscriber] = true;
                    queue.push_back(edge.subscriber);
                }
            }
        }

        debug!(events, "cascade reached its fixed point");
    }

    /// Every evaluated package, in discovery order.
    pub fn requirements(&self) -> Vec<Requirement> {
        self.states.iter().map(PackageState::requirement).collect()
    }

    /// The requirement of the package named `name`.
    pub fn requirement(&self, name: &str) -> Option<Requirement> {
        self.states
            .iter()
            .find(|state| state.name == name)
            .map(PackageState::requirement)
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Violations left after the fixed point.
    ///
    /// In check mode that includes every requirement the staged versions do
    /// not cover. In fix mode those were written, so only failures and
    /// declarations that could not be aligned remain.
    pub fn violations(&self, mode: Mode) -> Result<ViolationTree, EngineError> {
        let mut tree = ViolationTree::new();
        tree.extend(self.failures.iter().cloned());

        if mode == Mode::Check {
            for state in &self.states {
                let Some(committed) = &state.committed else {
                    continue;
                };
                if state.failed {
                    continue;
                }

                for regression in &state.regressions {
                    if state.actual < regression.bump {
                        tree.push(Violation::Regression {
                            package: state.name.clone(),
                            bloc: regression.bloc,
                            dep: regression.dep.clone(),
                            from: regression.from.clone(),
                            to: regression.to.clone(),
                        });
                    }
                }

                if state.actual >= state.required {
                    continue;
                }
                let causes: Vec<Cause> = state
                    .causes
                    .iter()
                    .filter(|cause| cause.bump() > state.actual)
                    .cloned()
                    .collect();
                // Reported as an unbumped change instead
                if causes.iter().all(Cause::is_direct_edit) {
                    continue;
                }
                tree.push(Violation::InsufficientBump {
                    package: state.name.clone(),
                    from: committed.clone(),
                    to: state.staged.clone(),
                    actual: state.actual,
                    required: state.required,
                    causes,
                });
            }
        }

        for state in &self.states {
            self.drift(state, &mut tree)?;
        }
        Ok(tree)
    }

    /// Declarations that do not match their dependency's staged version.
    fn drift(&self, state: &PackageState, tree: &mut ViolationTree) -> Result<(), EngineError> {
        for bloc in BlocName::ALL {
            let Ok(deps) = state.record.staged().dependencies(bloc) else {
                continue;
            };
            for (dep, raw) in deps {
                let Target::Package(source) = self.target(&dep)? else {
                    continue;
                };
                let Ok(declared) = Semver::parse(&raw) else {
                    continue;
                };
                if declared.is_wildcard() || declared.is_compound() {
                    continue;
                }
                let Ok(Some(current)) = self.states[source].record.staged().version() else {
                    continue;
                };
                if !declared.same_release(&current) {
                    tree.push(Violation::DependencyDrift {
                        package: state.name.clone(),
                        bloc,
                        dep,
                        declared: raw,
                        current,
                    });
                }
            }
        }
        Ok(())
    }

    /// Write resolved versions and aligned declarations, then save.
    ///
    /// The working copy of a version or declaration is only updated when it
    /// matched the staged one before the run.
    ///
    /// # Errors
    ///
    /// [`EngineError::Persist`] when a manifest cannot be written. Writes
    /// already made to other packages are kept.
    pub fn apply(&mut self) -> Result<Vec<AppliedFix>, EngineError> {
        let span = self.span.clone();
        let _enter = span.enter();

        let version_sync: Vec<bool> = self
            .states
            .iter()
            .map(|state| version_in_sync(&state.record))
            .collect();
        let plans = self.plan_declarations()?;

        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for (idx, state) in self.states.iter().enumerate() {
            let Some(committed) = &state.committed else {
                continue;
            };
            if state.failed || state.actual >= state.required {
                continue;
            }

            if let Err(e) = state.record.staged().set_version(&state.resolved) {
                failed.push((state.name.clone(), e.to_string()));
                continue;
            }
            let working = version_sync[idx];
            if working {
                if let Err(e) = state.record.working().set_version(&state.resolved) {
                    warn!(package = %state.name, error = %e, "working copy not updated");
                }
            }

            let causes: Vec<Cause> = state
                .causes
                .iter()
                .filter(|cause| cause.bump() == state.required)
                .cloned()
                .collect();
            let fix = AppliedFix::Version {
                package: state.name.clone(),
                from: committed.clone(),
                to: state.resolved.clone(),
                causes,
                working,
            };
            info!(package = %state.name, from = %committed, to = %state.resolved, "version increased");
            applied.push(fix);
        }

        for plan in plans {
            let state = &self.states[plan.idx];
            if let Err(e) = state
                .record
                .staged()
                .set_dependency(plan.bloc, &plan.dep, &plan.to)
            {
                failed.push((state.name.clone(), e.to_string()));
                continue;
            }
            if plan.working {
                if let Err(e) = state
                    .record
                    .working()
                    .set_dependency(plan.bloc, &plan.dep, &plan.to)
                {
                    warn!(package = %state.name, error = %e, "working copy not updated");
                }
            }
            info!(
                package = %state.name,
                bloc = %plan.bloc,
                dep = %plan.dep,
                from = %plan.from,
                to = %plan.to,
                "declaration aligned"
            );
            applied.push(AppliedFix::Declaration {
                package: state.name.clone(),
                bloc: plan.bloc,
                dep: plan.dep,
                from: plan.from,
                to: plan.to,
                working: plan.working,
            });
        }

        for (name, message) in failed {
            self.fail(&name, message);
        }

        for state in &self.states {
            let writes = state
                .record
                .save()
                .map_err(|source| EngineError::Persist {
                    path: state.record.rel_manifest_path().to_path_buf(),
                    source,
                })?;
            if writes > 0 {
                debug!(package = %state.name, writes, "saved manifest");
            }
        }

        Ok(applied)
    }

    /// Declarations lower than their dependency's resolved version.
    fn plan_declarations(&self) -> Result<Vec<DeclarationPlan>, EngineError> {
        let mut plans = Vec::new();

        for (idx, state) in self.states.iter().enumerate() {
            if state.failed {
                continue;
            }
            for bloc in BlocName::ALL {
                let Ok(deps) = state.record.staged().dependencies(bloc) else {
                    continue;
                };
                for (dep, raw) in deps {
                    let Target::Package(source) = self.target(&dep)? else {
                        continue;
                    };
                    let Ok(declared) = Semver::parse(&raw) else {
                        continue;
                    };
                    if declared.is_wildcard() || declared.is_compound() {
                        continue;
                    }
                    let resolved = &self.states[source].resolved;
                    if !matches!(declared.is_lower_than(resolved), Ok(true)) {
                        continue;
                    }
                    // A staged regression is the user's edit; it stays and shows as drift
                    if state
                        .regressions
                        .iter()
                        .any(|regression| regression.bloc == bloc && regression.dep == dep)
                    {
                        continue;
                    }

                    let working = declaration_in_sync(&state.record, bloc, &dep);
                    plans.push(DeclarationPlan {
                        idx,
                        bloc,
                        to: declared.with_release(resolved).to_string(),
                        from: raw,
                        dep,
                        working,
                    });
                }
            }
        }

        Ok(plans)
    }
}

/// Committed version, staged version and the increase between them.
///
/// `Ok(None)` when the package is absent from the index.
fn load_versions(pkg: &PackageRecord) -> Result<Option<(Option<Semver>, Semver, Bump)>, String> {
    let Some(staged) = pkg.staged().version().map_err(|e| e.to_string())? else {
        return Ok(None);
    };
    ensure_single_version(&staged)?;

    let committed = pkg.committed().version().map_err(|e| e.to_string())?;
    let actual = match &committed {
        Some(committed) => {
            ensure_single_version(committed)?;
            committed
                .increase_type(&staged)
                .map_err(|e| e.to_string())?
        }
        None => Bump::None,
    };

    Ok(Some((committed, staged, actual)))
}

fn ensure_single_version(version: &Semver) -> Result<(), String> {
    if version.is_wildcard() || version.is_compound() {
        return Err(format!("version \"{}\" is not a single version", version));
    }
    Ok(())
}

/// Severity of a declaration change and whether it went down.
fn compare_declarations(committed: &str, staged: &str) -> Result<(Bump, bool), SemverError> {
    let committed = Semver::parse(committed)?;
    let staged = Semver::parse(staged)?;
    if staged.is_lower_than(&committed)? {
        return Ok((Bump::Major, true));
    }
    Ok((committed.update_type(&staged)?, false))
}

fn version_in_sync(pkg: &PackageRecord) -> bool {
    match (pkg.working().raw_version(), pkg.staged().raw_version()) {
        (Ok(working), Ok(staged)) => working == staged,
        (Err(e), _) | (_, Err(e)) => {
            warn!(package = %pkg.display_name(), error = %e, "cannot compare working copy");
            false
        }
    }
}

fn declaration_in_sync(pkg: &PackageRecord, bloc: BlocName, dep: &str) -> bool {
    match (
        pkg.working().dependency(bloc, dep),
        pkg.staged().dependency(bloc, dep),
    ) {
        (Ok(working), Ok(staged)) => working == staged,
        _ => false,
    }
}
