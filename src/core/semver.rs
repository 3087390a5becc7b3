//! core::semver
//!
//! Version and range arithmetic.
//!
//! # Grammar
//!
//! ```text
//! value   := "*" | sigil? major "." minor "." patch ( "||" value )?
//! sigil   := "^" | "~"
//! number  := "0" | [1-9] [0-9]*
//! ```
//!
//! A value with an alternate (`1.0.0 || 2.0.0`) is a compound range. Compound
//! ranges parse and print, but cannot be ordered or increased.
//!
//! # Bump severity
//!
//! [`Bump`] is the totally ordered scale `none < patch < minor < major`. Its
//! [`Bump::join`] (maximum) is the merge operator of the cascade engine.
//!
//! # Example
//!
//! ```
//! use interdeps::core::semver::{Bump, Semver};
//!
//! let old = Semver::parse("1.4.2").unwrap();
//! let new = old.increase(Bump::Minor).unwrap();
//! assert_eq!(new.to_string(), "1.5.0");
//! assert_eq!(old.increase_type(&new).unwrap(), Bump::Minor);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from semver parsing and arithmetic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemverError {
    /// The text is not a version or range this tool understands.
    #[error("invalid semver format: \"{input}\"")]
    InvalidFormat {
        /// The rejected text
        input: String,
    },

    /// Ordering or increasing a value that has no single position.
    #[error("cannot {operation} \"{value}\": {reason}")]
    Uncomparable {
        /// The value involved
        value: String,
        /// What was attempted (compare, increase)
        operation: &'static str,
        /// Why it is impossible
        reason: &'static str,
    },

    /// Increasing a component already at its maximum.
    #[error("cannot increase \"{value}\" by {bump}: component overflows")]
    Overflow {
        /// The value involved
        value: String,
        /// The requested increase
        bump: Bump,
    },
}

/// Required or observed severity of a version change.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Bump {
    /// No change
    #[default]
    None,
    /// Fix-level change
    Patch,
    /// Feature-level change
    Minor,
    /// Breaking change
    Major,
}

impl Bump {
    /// All severities from lowest to highest.
    pub const ALL: [Bump; 4] = [Bump::None, Bump::Patch, Bump::Minor, Bump::Major];

    /// Numeric rank: none=0, patch=1, minor=2, major=3.
    pub fn rank(self) -> u8 {
        match self {
            Bump::None => 0,
            Bump::Patch => 1,
            Bump::Minor => 2,
            Bump::Major => 3,
        }
    }

    /// Least upper bound of two severities.
    pub fn join(self, other: Bump) -> Bump {
        self.max(other)
    }

    /// The highest severity of a set, `none` when empty.
    ///
    /// # Example
    ///
    /// ```
    /// use interdeps::core::semver::Bump;
    ///
    /// assert_eq!(Bump::max_of([Bump::Patch, Bump::Major, Bump::Minor]), Bump::Major);
    /// assert_eq!(Bump::max_of([]), Bump::None);
    /// ```
    pub fn max_of(bumps: impl IntoIterator<Item = Bump>) -> Bump {
        bumps.into_iter().fold(Bump::None, Bump::join)
    }

    /// True for anything above `none`.
    pub fn is_some(self) -> bool {
        self != Bump::None
    }

    /// Lowercase name as used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Bump::None => "none",
            Bump::Patch => "patch",
            Bump::Minor => "minor",
            Bump::Major => "major",
        }
    }
}

impl fmt::Display for Bump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Range prefix of a version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sigil {
    /// `1.2.3`
    Exact,
    /// `~1.2.3`
    Tilde,
    /// `^1.2.3`
    Caret,
    /// `*`
    Wildcard,
}

impl Sigil {
    /// Sort rank; a wider range ranks higher.
    fn rank(self) -> u8 {
        match self {
            Sigil::Exact => 0,
            Sigil::Tilde => 1,
            Sigil::Caret => 2,
            Sigil::Wildcard => 3,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Sigil::Exact => "",
            Sigil::Tilde => "~",
            Sigil::Caret => "^",
            Sigil::Wildcard => "*",
        }
    }
}

/// A parsed version or range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Semver {
    sigil: Sigil,
    major: u64,
    minor: u64,
    patch: u64,
    alternate: Option<Box<Semver>>,
}

impl Semver {
    /// Parse a version or range string.
    ///
    /// # Errors
    ///
    /// Returns [`SemverError::InvalidFormat`] unless the text is `*` or
    /// `[^~]major.minor.patch`, optionally followed by `|| <value>`.
    pub fn parse(text: &str) -> Result<Self, SemverError> {
        let invalid = || SemverError::InvalidFormat {
            input: text.to_string(),
        };

        let (head, rest) = match text.split_once("||") {
            Some((head, rest)) => (head.trim(), Some(rest.trim())),
            None => (text, None),
        };

        let mut value = Self::parse_single(head).ok_or_else(invalid)?;
        if let Some(rest) = rest {
            let alternate = Self::parse(rest).map_err(|_| invalid())?;
            value.alternate = Some(Box::new(alternate));
        }
        Ok(value)
    }

    fn parse_single(text: &str) -> Option<Self> {
        if text == "*" {
            return Some(Self::wildcard());
        }

        let (sigil, numbers) = if let Some(rest) = text.strip_prefix('^') {
            (Sigil::Caret, rest)
        } else if let Some(rest) = text.strip_prefix('~') {
            (Sigil::Tilde, rest)
        } else {
            (Sigil::Exact, text)
        };

        let mut parts = numbers.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            sigil,
            major,
            minor,
            patch,
            alternate: None,
        })
    }

    /// An exact version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            sigil: Sigil::Exact,
            major,
            minor,
            patch,
            alternate: None,
        }
    }

    /// The `*` range.
    pub fn wildcard() -> Self {
        Self {
            sigil: Sigil::Wildcard,
            major: 0,
            minor: 0,
            patch: 0,
            alternate: None,
        }
    }

    pub fn sigil(&self) -> Sigil {
        self.sigil
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn alternate(&self) -> Option<&Semver> {
        self.alternate.as_deref()
    }

    /// True for `*`.
    pub fn is_wildcard(&self) -> bool {
        self.sigil == Sigil::Wildcard
    }

    /// True for `a || b` ranges.
    pub fn is_compound(&self) -> bool {
        self.alternate.is_some()
    }

    fn release(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    fn ensure_single(&self, operation: &'static str) -> Result<(), SemverError> {
        if self.is_compound() {
            return Err(SemverError::Uncomparable {
                value: self.to_string(),
                operation,
                reason: "compound ranges have no single position",
            });
        }
        Ok(())
    }

    /// Strictly greater on major, minor, patch.
    ///
    /// A wildcard is compatible with anything and never greater or lower.
    ///
    /// # Errors
    ///
    /// Returns [`SemverError::Uncomparable`] if either side is compound.
    pub fn is_greater_than(&self, other: &Semver) -> Result<bool, SemverError> {
        self.ensure_single("compare")?;
        other.ensure_single("compare")?;
        if self.is_wildcard() || other.is_wildcard() {
            return Ok(false);
        }
        Ok(self.release() > other.release())
    }

    /// Strictly lower; the mirror of [`Semver::is_greater_than`].
    pub fn is_lower_than(&self, other: &Semver) -> Result<bool, SemverError> {
        other.is_greater_than(self)
    }

    /// The highest-order component at which the two values differ.
    ///
    /// # Errors
    ///
    /// Returns [`SemverError::Uncomparable`] if either side is compound.
    pub fn update_type(&self, other: &Semver) -> Result<Bump, SemverError> {
        self.ensure_single("compare")?;
        other.ensure_single("compare")?;
        if self.is_wildcard() || other.is_wildcard() {
            return Ok(Bump::None);
        }

        let bump = if self.major != other.major {
            Bump::Major
        } else if self.minor != other.minor {
            Bump::Minor
        } else if self.patch != other.patch {
            Bump::Patch
        } else {
            Bump::None
        };
        Ok(bump)
    }

    /// Severity of moving from `self` to `new`; `none` unless `new` is greater.
    pub fn increase_type(&self, new: &Semver) -> Result<Bump, SemverError> {
        if !new.is_greater_than(self)? {
            return Ok(Bump::None);
        }
        self.update_type(new)
    }

    /// A new exact version with the named component incremented.
    ///
    /// Lower-order components are reset to 0. `Bump::None` returns the exact
    /// numbers unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SemverError::Uncomparable`] for compound or wildcard values
    /// and [`SemverError::Overflow`] when the component cannot grow.
    pub fn increase(&self, bump: Bump) -> Result<Semver, SemverError> {
        self.ensure_single("increase")?;
        if self.is_wildcard() {
            return Err(SemverError::Uncomparable {
                value: self.to_string(),
                operation: "increase",
                reason: "a wildcard has no version to increase",
            });
        }

        let overflow = || SemverError::Overflow {
            value: self.to_string(),
            bump,
        };
        let (major, minor, patch) = match bump {
            Bump::None => self.release(),
            Bump::Patch => (self.major, self.minor, self.patch.checked_add(1).ok_or_else(overflow)?),
            Bump::Minor => (self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0),
            Bump::Major => (self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
        };
        Ok(Semver::new(major, minor, patch))
    }

    /// Same major, minor and patch, ignoring the sigil.
    ///
    /// Wildcards and compound ranges never match.
    pub fn same_release(&self, other: &Semver) -> bool {
        !self.is_compound()
            && !other.is_compound()
            && !self.is_wildcard()
            && !other.is_wildcard()
            && self.release() == other.release()
    }

    /// This value's sigil applied to the numbers of `version`.
    pub fn with_release(&self, version: &Semver) -> Semver {
        Semver {
            sigil: self.sigil,
            major: version.major,
            minor: version.minor,
            patch: version.patch,
            alternate: None,
        }
    }

    /// Total order for sorting: numbers first, then sigil rank.
    ///
    /// A wildcard sorts above every pinned value; alternates are ignored.
    pub fn sort_cmp(a: &Semver, b: &Semver) -> Ordering {
        match (a.is_wildcard(), b.is_wildcard()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a
                .release()
                .cmp(&b.release())
                .then_with(|| a.sigil.rank().cmp(&b.sigil.rank())),
        }
    }
}

fn parse_component(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            f.write_str("*")?;
        } else {
            write!(
                f,
                "{}{}.{}.{}",
                self.sigil.prefix(),
                self.major,
                self.minor,
                self.patch
            )?;
        }
        if let Some(alternate) = &self.alternate {
            write!(f, " || {}", alternate)?;
        }
        Ok(())
    }
}

impl FromStr for Semver {
    type Err = SemverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Semver::parse(s)
    }
}
