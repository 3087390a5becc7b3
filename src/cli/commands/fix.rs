//! fix command - Stage the required version increases

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::{exit_code, Session};
use crate::cli::Context;
use crate::engine::{self, AppliedFix, RunOptions};
use crate::ui::output;

/// Evaluate the staged changes and write the required versions.
///
/// Refuses to run while a merge, rebase or similar operation is in progress;
/// the index then holds conflict state that must not be rewritten.
pub fn fix(ctx: &Context) -> Result<ExitCode> {
    let session = Session::open(ctx)?;
    session
        .git
        .ensure_clean_state()
        .context("Cannot fix versions now")?;
    let workspace = session.workspace();

    let outcome = engine::run(&workspace, RunOptions::fix()).context("Failed to fix versions")?;

    let verbosity = ctx.verbosity();
    for applied in &outcome.applied {
        output::print(applied, verbosity);
    }

    let versions = outcome
        .applied
        .iter()
        .filter(|fix| matches!(fix, AppliedFix::Version { .. }))
        .count();
    if versions > 0 {
        output::success(
            format!("Increased {} package version(s).", versions),
            verbosity,
        );
    } else if outcome.applied.is_empty() {
        output::success("Nothing to fix.", verbosity);
    }

    if !outcome.violations.is_empty() {
        output::report(outcome.violations.render());
    }

    Ok(exit_code(outcome.is_clean()))
}
