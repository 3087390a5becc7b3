//! interdeps - Version consistency checks for multi-package git repositories
//!
//! interdeps inspects the packages of a repository before a commit is made.
//! A package with staged changes needs a version increase, and every package
//! that depends on it needs one too, at least as large as the change in its
//! dependency. interdeps reports what is missing, or writes it.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Classify -> Seed -> Solve -> Apply -> Report
//! - [`workspace`] - Package discovery and the three manifest views
//! - [`core`] - Semver values, manifests, diffs and configuration
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output and logging
//!
//! # Correctness Invariants
//!
//! interdeps maintains the following invariants:
//!
//! 1. Check mode never writes
//! 2. Required bumps only grow, and the result does not depend on order
//! 3. Manifest writes only happen through the staged and working snapshots
//! 4. A package that cannot be evaluated never hides the others' results

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
pub mod workspace;
