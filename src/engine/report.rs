//! engine::report
//!
//! Violations found by a run, and their presentation.
//!
//! # Architecture
//!
//! [`Violation`] is the structured result: a stable id, a kind, the package
//! it belongs to and detail lines. [`ViolationTree`] collects them and
//! renders a [`MessageTree`] grouped by kind, then package, then dependency
//! block. Nodes without content are pruned, so an empty group never prints a
//! dangling header.
//!
//! Presentation is separate from evaluation: nothing here feeds back into the
//! cascade.
//!
//! # Example
//!
//! ```
//! use interdeps::engine::report::{Violation, ViolationTree};
//!
//! let mut tree = ViolationTree::new();
//! tree.push(Violation::Failure {
//!     package: "a".to_string(),
//!     message: "invalid semver format: \"x\"".to_string(),
//! });
//!
//! let text = tree.render();
//! assert!(text.contains("a"));
//! assert!(text.contains("invalid semver format"));
//! ```

use std::fmt;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::semver::{Bump, Semver};
use crate::core::types::BlocName;

/// Indentation per tree level.
const INDENT: &str = "  ";

/// Headline of a rendered report.
pub const REPORT_HEADLINE: &str = "Cannot accept the commit because of the following:";

// =============================================================================
// Causes
// =============================================================================

/// Why a package's required bump was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    /// Staged changes to the package's own files.
    DirectEdit { files: Vec<PathBuf> },

    /// A declaration changed between HEAD and the index.
    DeclarationChanged {
        bloc: BlocName,
        dep: String,
        from: String,
        to: String,
        bump: Bump,
        regression: bool,
    },

    /// A declaration was added.
    DeclarationAdded {
        bloc: BlocName,
        dep: String,
        range: String,
    },

    /// A declaration was removed.
    DeclarationRemoved {
        bloc: BlocName,
        dep: String,
        range: String,
    },

    /// An in-repo dependency moved past the declared version.
    DependencyBumped {
        bloc: BlocName,
        dep: String,
        declared: String,
        from: Option<Semver>,
        to: Semver,
        bump: Bump,
    },
}

impl Cause {
    /// Severity this cause signals.
    pub fn bump(&self) -> Bump {
        match self {
            Cause::DirectEdit { .. }
            | Cause::DeclarationAdded { .. }
            | Cause::DeclarationRemoved { .. } => Bump::Patch,
            Cause::DeclarationChanged { bump, .. } | Cause::DependencyBumped { bump, .. } => *bump,
        }
    }

    /// Whether this is a staged edit of the package's own files.
    pub fn is_direct_edit(&self) -> bool {
        matches!(self, Cause::DirectEdit { .. })
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::DirectEdit { files } => match files.as_slice() {
                [file] => write!(f, "{} changed", file.display()),
                files => write!(f, "{} files changed", files.len()),
            },
            Cause::DeclarationChanged {
                bloc,
                dep,
                from,
                to,
                regression,
                ..
            } => {
                write!(f, "[{}.{}]: {} => {}", bloc, dep, from, to)?;
                if *regression {
                    f.write_str(" (regression)")?;
                }
                Ok(())
            }
            Cause::DeclarationAdded { bloc, dep, range } => {
                write!(f, "[{}.{}]: added {}", bloc, dep, range)
            }
            Cause::DeclarationRemoved { bloc, dep, range } => {
                write!(f, "[{}.{}]: removed {}", bloc, dep, range)
            }
            Cause::DependencyBumped {
                dep, declared, from, to, ..
            } => match from {
                Some(from) => write!(f, "{}: {} => {}", dep, from, to),
                None => write!(f, "{}: {} => {}", dep, declared, to),
            },
        }
    }
}

// =============================================================================
// Violations
// =============================================================================

/// A stable identifier for a violation.
///
/// Formatted as `kind:hash(key)`, where the hash is a truncated SHA-256 of
/// the package, block and dependency the violation is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViolationId(String);

impl ViolationId {
    /// Create an id from a kind and key.
    pub fn new(kind: ViolationKind, key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let hash = hasher.finalize();
        Self(format!("{}:{}", kind.as_str(), hex::encode(&hash[..4])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViolationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of a violation; also the top-level group of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViolationKind {
    UnbumpedChange,
    DependencyDrift,
    Regression,
    InsufficientBump,
    Failure,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::UnbumpedChange => "unbumped-change",
            ViolationKind::DependencyDrift => "dependency-drift",
            ViolationKind::Regression => "regression",
            ViolationKind::InsufficientBump => "insufficient-bump",
            ViolationKind::Failure => "failure",
        }
    }

    /// Group header in a rendered report.
    pub fn headline(self) -> &'static str {
        match self {
            ViolationKind::UnbumpedChange => {
                "Changed files: files were modified but their package version was not increased"
            }
            ViolationKind::DependencyDrift => "Inconsistent dependencies",
            ViolationKind::Regression => "Dependency regressions",
            ViolationKind::InsufficientBump => "Version increase required",
            ViolationKind::Failure => "Packages that could not be evaluated",
        }
    }
}

/// One problem found by a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// Staged files in a package whose version was not increased.
    #[error("{package}: {} staged file(s) changed without a version increase", .files.len())]
    UnbumpedChange {
        package: String,
        /// Repository-relative paths
        files: Vec<PathBuf>,
    },

    /// An in-repo declaration that does not match the dependency's version.
    #[error("{package}[{bloc}.{dep}]: declares {declared}, current version is {current}")]
    DependencyDrift {
        package: String,
        bloc: BlocName,
        dep: String,
        declared: String,
        current: Semver,
    },

    /// A declaration lowered without a covering version increase.
    #[error("{package}[{bloc}.{dep}]: {from} => {to} is a regression")]
    Regression {
        package: String,
        bloc: BlocName,
        dep: String,
        from: String,
        to: String,
    },

    /// The package's own version increase is below what its changes require.
    #[error("{package}: {from} => {to} = {actual}, {required} required")]
    InsufficientBump {
        package: String,
        from: Semver,
        to: Semver,
        actual: Bump,
        required: Bump,
        causes: Vec<Cause>,
    },

    /// The package could not be evaluated.
    #[error("{package}: {message}")]
    Failure { package: String, message: String },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::UnbumpedChange { .. } => ViolationKind::UnbumpedChange,
            Violation::DependencyDrift { .. } => ViolationKind::DependencyDrift,
            Violation::Regression { .. } => ViolationKind::Regression,
            Violation::InsufficientBump { .. } => ViolationKind::InsufficientBump,
            Violation::Failure { .. } => ViolationKind::Failure,
        }
    }

    /// Stable id, deterministic across runs.
    pub fn id(&self) -> ViolationId {
        let key = match self {
            Violation::DependencyDrift {
                package, bloc, dep, ..
            }
            | Violation::Regression {
                package, bloc, dep, ..
            } => format!("{}/{}/{}", package, bloc, dep),
            Violation::Failure { package, message } => format!("{}/{}", package, message),
            other => other.package().to_string(),
        };
        ViolationId::new(self.kind(), &key)
    }

    /// The package the violation belongs to.
    pub fn package(&self) -> &str {
        match self {
            Violation::UnbumpedChange { package, .. }
            | Violation::DependencyDrift { package, .. }
            | Violation::Regression { package, .. }
            | Violation::InsufficientBump { package, .. }
            | Violation::Failure { package, .. } => package,
        }
    }

    /// The dependency block, for block-scoped violations.
    pub fn bloc(&self) -> Option<BlocName> {
        match self {
            Violation::DependencyDrift { bloc, .. } | Violation::Regression { bloc, .. } => {
                Some(*bloc)
            }
            _ => None,
        }
    }

    /// Node for this violation under its package (or block) node.
    fn message(&self) -> MessageTree {
        match self {
            Violation::UnbumpedChange { files, .. } => {
                let mut node = MessageTree::bare();
                for file in files {
                    node.push_line(file.display().to_string());
                }
                node
            }
            Violation::DependencyDrift {
                package,
                dep,
                declared,
                current,
                ..
            } => {
                let mut node = MessageTree::new(dep.clone());
                node.push_line(format!("current version of {}: {}", dep, current));
                node.push_line(format!("version used in {}: {}", package, declared));
                node
            }
            Violation::Regression { dep, from, to, .. } => {
                let mut node = MessageTree::new(dep.clone());
                node.push_line(format!("{} => {} = major (regression)", from, to));
                node
            }
            Violation::InsufficientBump {
                from,
                to,
                actual,
                causes,
                ..
            } => {
                let mut node = MessageTree::bare();
                for cause in causes {
                    node.push_line(cause_line(cause));
                }
                let actual = if actual.is_some() {
                    actual.as_str()
                } else {
                    "no version increase"
                };
                node.push_line(format!("Package: {} => {} = {}.", from, to, actual));
                node
            }
            Violation::Failure { message, .. } => {
                let mut node = MessageTree::bare();
                node.push_line(message.clone());
                node
            }
        }
    }
}

fn cause_line(cause: &Cause) -> String {
    match cause {
        Cause::DeclarationChanged {
            bloc,
            dep,
            from,
            to,
            bump,
            regression,
        } => format!(
            "Dependency [{}.{}]: {} => {} = {}{}.",
            bloc,
            dep,
            from,
            to,
            bump,
            if *regression { " (regression)" } else { "" }
        ),
        Cause::DependencyBumped {
            bloc,
            dep,
            declared,
            to,
            bump,
            ..
        } => format!(
            "Dependency [{}.{}]: {} => {} = {}.",
            bloc, dep, declared, to, bump
        ),
        other => format!("{} = {}.", other, other.bump()),
    }
}

// =============================================================================
// Trees
// =============================================================================

/// A header with lines and nested groups.
///
/// Empty nodes are pruned on render: a node is empty when it has no lines and
/// every child is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageTree {
    header: Option<String>,
    lines: Vec<String>,
    children: Vec<MessageTree>,
}

impl MessageTree {
    /// A node with a header.
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: Some(header.into()),
            ..Default::default()
        }
    }

    /// A node whose content sits directly under its parent.
    pub fn bare() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn push_child(&mut self, child: MessageTree) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Child with `header`, created if absent.
    fn child_mut(&mut self, header: &str) -> &mut MessageTree {
        let index = match self
            .children
            .iter()
            .position(|c| c.header.as_deref() == Some(header))
        {
            Some(index) => index,
            None => {
                self.children.push(MessageTree::new(header));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.children.iter().all(MessageTree::is_empty)
    }

    /// Render as indented text; empty when the tree is empty.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        self.render_into(0, &mut out);
        out.join("\n")
    }

    fn render_into(&self, depth: usize, out: &mut Vec<String>) {
        if self.is_empty() {
            return;
        }
        let inner = match &self.header {
            Some(header) => {
                out.push(format!("{}{}", INDENT.repeat(depth), header));
                depth + 1
            }
            None => depth,
        };
        for line in &self.lines {
            out.push(format!("{}{}", INDENT.repeat(inner), line));
        }
        for child in &self.children {
            child.render_into(inner, out);
        }
    }
}

impl fmt::Display for MessageTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// All violations of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationTree {
    violations: Vec<Violation>,
}

impl ViolationTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    /// Violations of one kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind() == kind)
    }

    /// Group as headline, then package, then dependency block.
    pub fn to_message_tree(&self) -> MessageTree {
        let mut sorted: Vec<&Violation> = self.violations.iter().collect();
        sorted.sort_by(|a, b| {
            (a.kind(), a.package(), a.bloc()).cmp(&(b.kind(), b.package(), b.bloc()))
        });

        let mut root = MessageTree::new(REPORT_HEADLINE);
        for violation in sorted {
            let group = root.child_mut(violation.kind().headline());
            let package = group.child_mut(&format!("\"{}\"", violation.package()));
            let node = match violation.bloc() {
                Some(bloc) => package.child_mut(bloc.key()),
                None => package,
            };
            node.push_child(violation.message());
        }
        root
    }

    pub fn render(&self) -> String {
        self.to_message_tree().render()
    }
}

impl IntoIterator for ViolationTree {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ViolationTree {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}
