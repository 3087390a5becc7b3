//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Committed and staged manifest
//! content is read and written through the [`Vcs`] trait; [`Git`] implements
//! it with the `git2` crate and [`MockVcs`] implements it in memory. No other
//! module should import `git2`, and nothing shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Reading blobs at HEAD and in the index
//! - Writing staged blobs (hash-object plus update-index in one step)
//! - Listing staged paths
//! - Operation-in-progress detection
//!
//! # Example
//!
//! ```ignore
//! use interdeps::git::{ContentRef, Git, Vcs};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//!
//! for path in git.staged_paths()? {
//!     let before = git.read_at(ContentRef::Head, &path)?;
//!     let after = git.read_at(ContentRef::Index, &path)?;
//! }
//! ```

mod interface;
pub mod mock;
mod traits;

pub use interface::{Git, GitError, GitState};
pub use mock::MockVcs;
pub use traits::{ContentRef, Vcs};
