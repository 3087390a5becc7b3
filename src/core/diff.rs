//! core::diff
//!
//! Structural diff of two manifests.
//!
//! Objects are compared key by key and recursed into; any other pair of
//! values (scalars, arrays, or values of different JSON types) produces a
//! single `Changed` entry at its path.

use serde_json::{Map, Value};

use super::manifest::Manifest;

/// What happened at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Present only in the new value
    Added,
    /// Present only in the old value
    Removed,
    /// Present in both with different content
    Changed,
}

/// One difference between two manifests.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    /// Key path from the manifest root
    pub path: Vec<String>,
    pub kind: DiffKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl DiffEntry {
    /// The top-level manifest key this entry falls under.
    pub fn top_level(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }

    /// Dotted path, for messages.
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Diff two manifests.
///
/// # Example
///
/// ```
/// use interdeps::core::diff::{diff_manifests, DiffKind};
/// use interdeps::core::manifest::Manifest;
///
/// let old = Manifest::parse(r#"{"version":"1.0.0"}"#).unwrap();
/// let new = Manifest::parse(r#"{"version":"1.1.0","main":"index.js"}"#).unwrap();
///
/// let entries = diff_manifests(&old, &new);
/// assert_eq!(entries.len(), 2);
/// assert_eq!(entries[0].kind, DiffKind::Changed);
/// assert_eq!(entries[1].kind, DiffKind::Added);
/// ```
pub fn diff_manifests(old: &Manifest, new: &Manifest) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    diff_objects(old.fields(), new.fields(), &mut Vec::new(), &mut entries);
    entries
}

fn diff_objects(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    path: &mut Vec<String>,
    entries: &mut Vec<DiffEntry>,
) {
    for (key, old_value) in old {
        path.push(key.clone());
        match new.get(key) {
            Some(new_value) => diff_values(old_value, new_value, path, entries),
            None => entries.push(DiffEntry {
                path: path.clone(),
                kind: DiffKind::Removed,
                old: Some(old_value.clone()),
                new: None,
            }),
        }
        path.pop();
    }

    for (key, new_value) in new {
        if old.contains_key(key) {
            continue;
        }
        let mut entry_path = path.clone();
        entry_path.push(key.clone());
        entries.push(DiffEntry {
            path: entry_path,
            kind: DiffKind::Added,
            old: None,
            new: Some(new_value.clone()),
        });
    }
}

fn diff_values(old: &Value, new: &Value, path: &mut Vec<String>, entries: &mut Vec<DiffEntry>) {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => diff_objects(old, new, path, entries),
        (old, new) if old != new => entries.push(DiffEntry {
            path: path.clone(),
            kind: DiffKind::Changed,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(text: &str) -> Manifest {
        Manifest::parse(text).unwrap()
    }

    #[test]
    fn identical_manifests_have_no_entries() {
        let a = manifest(r#"{"name":"a","dependencies":{"b":"1.0.0"}}"#);
        assert!(diff_manifests(&a, &a.clone()).is_empty());
    }

    #[test]
    fn nested_changes_carry_full_path() {
        let old = manifest(r#"{"dependencies":{"b":"1.0.0","c":"1.0.0"}}"#);
        let new = manifest(r#"{"dependencies":{"b":"2.0.0","d":"1.0.0"}}"#);

        let entries = diff_manifests(&old, &new);
        let summary: Vec<(String, DiffKind)> = entries
            .iter()
            .map(|e| (e.dotted_path(), e.kind))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("dependencies.b".to_string(), DiffKind::Changed),
                ("dependencies.c".to_string(), DiffKind::Removed),
                ("dependencies.d".to_string(), DiffKind::Added),
            ]
        );
        assert!(entries.iter().all(|e| e.top_level() == Some("dependencies")));
    }

    #[test]
    fn arrays_and_type_changes_are_single_entries() {
        let old = manifest(r#"{"files":["a","b"],"dependencies":{"x":"1.0.0"}}"#);
        let new = manifest(r#"{"files":["a"],"dependencies":"oops"}"#);

        let entries = diff_manifests(&old, &new);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, vec!["files".to_string()]);
        assert_eq!(entries[1].path, vec!["dependencies".to_string()]);
        assert_eq!(entries[1].kind, DiffKind::Changed);
    }
}
