//! list command - Show the packages of the workspace

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::Session;
use crate::cli::Context;
use crate::core::types::BlocName;
use crate::ui::output;
use crate::workspace::{ManifestSnapshot, PackageRecord, Workspace};

/// Print every package with its staged version and in-repo dependencies.
pub fn list(ctx: &Context) -> Result<ExitCode> {
    let session = Session::open(ctx)?;
    let workspace = session.workspace();

    let packages = workspace
        .all_packages()
        .context("Failed to list packages")?;
    if packages.is_empty() {
        output::warn(
            format!(
                "no packages found under {}",
                workspace.root().display()
            ),
            ctx.verbosity(),
        );
        return Ok(ExitCode::SUCCESS);
    }

    for pkg in packages {
        println!("{}", describe(&workspace, pkg));
    }
    Ok(ExitCode::SUCCESS)
}

/// `name@version` followed by one indented line per in-repo dependency.
fn describe(workspace: &Workspace, pkg: &PackageRecord) -> String {
    let version = match pkg.staged().raw_version() {
        Ok(Some(version)) => version,
        Ok(None) => "(no version)".to_string(),
        Err(e) => format!("(unreadable: {})", e),
    };
    let mut lines = vec![format!("{}@{}", pkg.display_name(), version)];

    for bloc in BlocName::ALL {
        let Ok(deps) = pkg.staged().dependencies(bloc) else {
            continue;
        };
        for (dep, range) in deps {
            if matches!(workspace.is_in_repo(&dep), Ok(true)) {
                lines.push(format!("  {} {} {}", bloc, dep, range));
            }
        }
    }

    lines.join("\n")
}
