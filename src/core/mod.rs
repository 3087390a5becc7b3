//! core
//!
//! Core domain types, schemas, and arithmetic for interdeps.
//!
//! # Modules
//!
//! - [`types`] - Shared enums: BlocName, SnapshotView
//! - [`semver`] - Version and range parsing, ordering and bumps
//! - [`manifest`] - Typed accessors over a package manifest
//! - [`diff`] - Structural diff between two manifests
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Nothing in here performs I/O except config loading
//! - Every comparison that can be undefined returns a `Result`

pub mod config;
pub mod diff;
pub mod manifest;
pub mod semver;
pub mod types;
