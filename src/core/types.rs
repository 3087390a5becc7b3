//! core::types
//!
//! Small enums shared across layers.
//!
//! # Types
//!
//! - [`BlocName`] - One of the three dependency blocks of a manifest
//! - [`SnapshotView`] - Which state of a manifest is being read or written

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown dependency block: {0}")]
    UnknownBloc(String),
}

/// A dependency block of a package manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlocName {
    #[serde(rename = "dependencies")]
    Dependencies,
    #[serde(rename = "peerDependencies")]
    PeerDependencies,
    #[serde(rename = "devDependencies")]
    DevDependencies,
}

impl BlocName {
    /// All blocks, in the order they are evaluated and reported.
    pub const ALL: [BlocName; 3] = [
        BlocName::Dependencies,
        BlocName::PeerDependencies,
        BlocName::DevDependencies,
    ];

    /// The manifest key for this block.
    ///
    /// # Example
    ///
    /// ```
    /// use interdeps::core::types::BlocName;
    ///
    /// assert_eq!(BlocName::DevDependencies.key(), "devDependencies");
    /// ```
    pub fn key(self) -> &'static str {
        match self {
            BlocName::Dependencies => "dependencies",
            BlocName::PeerDependencies => "peerDependencies",
            BlocName::DevDependencies => "devDependencies",
        }
    }

    /// Look up a block by manifest key.
    pub fn from_key(key: &str) -> Option<BlocName> {
        BlocName::ALL.into_iter().find(|bloc| bloc.key() == key)
    }
}

impl fmt::Display for BlocName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BlocName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlocName::from_key(s).ok_or_else(|| TypeError::UnknownBloc(s.to_string()))
    }
}

/// One of the three states of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotView {
    /// Content at HEAD
    Committed,
    /// Content in the index
    Staged,
    /// Content on disk
    Working,
}

impl SnapshotView {
    /// Short label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            SnapshotView::Committed => "HEAD",
            SnapshotView::Staged => "index",
            SnapshotView::Working => "working tree",
        }
    }
}

impl fmt::Display for SnapshotView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloc_keys_round_trip() {
        for bloc in BlocName::ALL {
            assert_eq!(bloc.key().parse::<BlocName>().unwrap(), bloc);
        }
    }

    #[test]
    fn unknown_bloc_is_rejected() {
        assert_eq!(
            "optionalDependencies".parse::<BlocName>(),
            Err(TypeError::UnknownBloc("optionalDependencies".to_string()))
        );
    }

    #[test]
    fn view_labels() {
        assert_eq!(SnapshotView::Committed.to_string(), "HEAD");
        assert_eq!(SnapshotView::Staged.to_string(), "index");
        assert_eq!(SnapshotView::Working.to_string(), "working tree");
    }
}
