//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting, display and logging setup
//!
//! # Design
//!
//! All user-facing output goes through this module so that the quiet flag is
//! honored consistently.

pub mod output;
