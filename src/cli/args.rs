//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--workspace-root <dir>`: Override the configured package directory

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// interdeps - Version consistency checks for multi-package git repositories
#[derive(Parser, Debug)]
#[command(name = "interdeps")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if interdeps was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the packages, relative to the repository root
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace_root: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check staged changes for missing version increases
    #[command(
        name = "check",
        long_about = "Check staged changes for missing version increases.\n\n\
            Compares every package manifest at HEAD with the one in the index. \
            Packages with staged changes need a version increase, and packages \
            that depend on an increased package need one too, at least as large \
            as the change in their dependency. Nothing is written.\n\n\
            Exits with status 1 when anything needs attention, which makes the \
            command suitable as a pre-commit hook.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Before committing
    interdeps check

    # As a pre-commit hook (.git/hooks/pre-commit)
    exec interdeps check --quiet

    # Machine-readable list of problems
    interdeps check --list"
    )]
    Check {
        /// List violations as `id kind package`, one per line
        #[arg(long)]
        list: bool,
    },

    /// Write the required version increases to the index
    #[command(
        name = "fix",
        long_about = "Write the required version increases to the index.\n\n\
            Runs the same evaluation as `check`, then sets every package that \
            needs it to its required version and moves in-repo dependency \
            declarations to the new versions. Changes are staged. The working \
            copy of a manifest is updated only where it matched the index.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Stage a dependency update, let interdeps bump the dependents
    git add packages/core
    interdeps fix
    git commit"
    )]
    Fix,

    /// List the packages of the workspace
    #[command(name = "list")]
    List,

    /// Show the effective configuration
    #[command(name = "config")]
    Config,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for interdeps commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    interdeps completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    interdeps completion zsh >> ~/.zshrc

    # Fish
    interdeps completion fish > ~/.config/fish/completions/interdeps.fish

    # PowerShell
    interdeps completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
