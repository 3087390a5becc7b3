//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads its configuration
//! 2. Calls the engine
//! 3. Formats and displays output, and picks the exit code
//!
//! Handlers do NOT write manifests directly.

mod check;
mod completion;
mod config_cmd;
mod fix;
mod list;

// Re-export command functions for testing and direct invocation
pub use check::check;
pub use completion::completion;
pub use config_cmd::config;
pub use fix::fix;
pub use list::list;

use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context as _, Result};
use tracing::info_span;

use super::Context;
use crate::cli::args::Command;
use crate::core::config::Config;
use crate::git::{Git, Vcs};
use crate::ui::output;
use crate::workspace::Workspace;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        Command::Check { list } => check::check(ctx, list),
        Command::Fix => fix::fix(ctx),
        Command::List => list::list(ctx),
        Command::Config => config_cmd::config(ctx),
        Command::Completion { shell } => {
            completion::completion(shell)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// An opened repository with its configuration.
pub(crate) struct Session {
    pub git: Rc<Git>,
    pub config: Config,
}

impl Session {
    /// Open the repository containing the working directory and load its
    /// configuration. Config warnings are printed.
    pub fn open(ctx: &Context) -> Result<Self> {
        let cwd = match &ctx.cwd {
            Some(cwd) => cwd.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let git = Git::open(&cwd).context("Failed to open repository")?;

        let loaded = Config::load(git.root()).context("Failed to load config")?;
        for warning in &loaded.warnings {
            output::warn(&warning.message, ctx.verbosity());
        }
        let mut config = loaded.config;
        if let Some(root) = &ctx.workspace_root {
            config.set_workspace_root(root.clone());
        }

        Ok(Self {
            git: Rc::new(git),
            config,
        })
    }

    /// The workspace over the index of this repository.
    pub fn workspace(&self) -> Workspace {
        let vcs: Rc<dyn Vcs> = Rc::clone(&self.git) as Rc<dyn Vcs>;
        let span = info_span!("interdeps", root = %self.git.root().display());
        Workspace::new(vcs, &self.config, span)
    }
}

/// Exit code for a run: failure when anything is left to report.
pub(crate) fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
