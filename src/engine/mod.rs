//! engine
//!
//! Evaluates a workspace and reports, or fixes, version inconsistencies.
//!
//! # Architecture
//!
//! A run follows a fixed sequence:
//!
//! ```text
//! Classify -> Seed -> Solve -> [Apply] -> Report
//! ```
//!
//! 1. **Classify**: staged files are attributed to packages, and manifest
//!    deltas are split into real and dependency-only changes
//!    ([`classify`]).
//! 2. **Seed**: each package's required bump starts from its own signals
//!    ([`cascade::CascadeEngine::new`]).
//! 3. **Solve**: requirements propagate through the dependency graph until
//!    nothing changes ([`cascade::CascadeEngine::solve`]).
//! 4. **Apply** (fix mode only): required versions and aligned declarations
//!    are written to the index and, where in sync, the working copy.
//! 5. **Report**: what remains is collected into a [`report::ViolationTree`].
//!
//! # Invariants
//!
//! - Check mode never writes.
//! - The outcome does not depend on package discovery order.
//! - A package that cannot be evaluated is reported and skipped; the rest of
//!   the workspace is still evaluated.
//!
//! # Example
//!
//! ```ignore
//! use interdeps::engine::{run, RunOptions};
//!
//! let outcome = run(&workspace, RunOptions::check())?;
//! if !outcome.violations.is_empty() {
//!     eprintln!("{}", outcome.violations.render());
//! }
//! ```

pub mod cascade;
pub mod classify;
pub mod report;

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::workspace::{SnapshotError, Workspace, WorkspaceError};

pub use cascade::{AppliedFix, CascadeEngine, Mode, Requirement};
pub use classify::{classify, collect_real_changes, Classification};
pub use report::{Cause, MessageTree, Violation, ViolationId, ViolationKind, ViolationTree};

/// Errors that abort a run.
///
/// Per-package problems are not errors; they are reported as
/// [`Violation::Failure`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// A fixed manifest could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },
}

/// Options for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Write required versions instead of reporting them.
    pub fix: bool,
}

impl RunOptions {
    pub fn check() -> Self {
        Self { fix: false }
    }

    pub fn fix() -> Self {
        Self { fix: true }
    }

    pub fn mode(&self) -> Mode {
        if self.fix {
            Mode::Fix
        } else {
            Mode::Check
        }
    }
}

/// Result of a run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Problems left after the run
    pub violations: ViolationTree,
    /// Changes written in fix mode
    pub applied: Vec<AppliedFix>,
    /// Final requirement of every evaluated package
    pub requirements: Vec<Requirement>,
}

impl RunOutcome {
    /// Whether the commit can be accepted.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Evaluate `workspace` once.
///
/// # Errors
///
/// Only failures that prevent evaluating the workspace as a whole, or
/// writing a fix, are returned as errors.
pub fn run(workspace: &Workspace, options: RunOptions) -> Result<RunOutcome, EngineError> {
    let mode = options.mode();
    let span = info_span!(parent: workspace.span(), "run", ?mode);
    let _enter = span.enter();

    let edits = classify::staged_edits(workspace)?;
    debug!(packages = edits.len(), "packages with staged edits");

    let mut engine = CascadeEngine::new(workspace, &edits, span.clone())?;
    engine.solve();

    let mut outcome = RunOutcome::default();
    match mode {
        Mode::Fix => {
            outcome.applied = engine.apply()?;
            info!(count = outcome.applied.len(), "fixes applied");
        }
        Mode::Check => {
            outcome.violations.extend(unbumped_changes(workspace)?);
        }
    }

    outcome.violations.extend(engine.violations(mode)?);
    outcome.requirements = engine.requirements();
    debug!(violations = outcome.violations.len(), "run finished");
    Ok(outcome)
}

/// Unbumped staged files, grouped per package.
fn unbumped_changes(workspace: &Workspace) -> Result<Vec<Violation>, EngineError> {
    let mut grouped: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in collect_real_changes(workspace)? {
        if let Some(pkg) = workspace.package_for_file(&path)? {
            grouped.entry(pkg.display_name()).or_default().push(path);
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(package, files)| Violation::UnbumpedChange { package, files })
        .collect())
}
