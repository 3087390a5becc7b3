//! check command - Report missing version increases without writing

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::{exit_code, Session};
use crate::cli::Context;
use crate::engine::{self, RunOptions, ViolationTree};
use crate::ui::output;

/// Evaluate the staged changes and print what needs attention.
pub fn check(ctx: &Context, list: bool) -> Result<ExitCode> {
    let session = Session::open(ctx)?;
    let workspace = session.workspace();

    let outcome =
        engine::run(&workspace, RunOptions::check()).context("Failed to evaluate workspace")?;

    if list {
        print_list(&outcome.violations);
    } else if !outcome.violations.is_empty() {
        output::report(outcome.violations.render());
    } else {
        output::success("All package versions are consistent.", ctx.verbosity());
    }

    Ok(exit_code(outcome.is_clean()))
}

/// One `id kind package` line per violation.
fn print_list(violations: &ViolationTree) {
    for violation in violations {
        println!(
            "{} {} {}",
            violation.id(),
            violation.kind().as_str(),
            violation.package()
        );
    }
}
