//! core::manifest
//!
//! Typed access to a package manifest (`package.json`).
//!
//! # Design
//!
//! The manifest is kept as the parsed JSON object so that every field this
//! tool does not understand is written back unchanged and in its original
//! order. The fields the engine works with (`name`, `version`, and the three
//! dependency blocks) have typed accessors; nothing else is addressed by path.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::BlocName;

/// Errors from manifest parsing and serialization.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },
}

/// Dependency name to declared version or range.
pub type DependencyBlock = BTreeMap<String, String>;

/// A package manifest.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON or when the top-level value is not an object.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Wrap an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ManifestError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    /// Serialize as pretty JSON with `indent` spaces and a trailing newline.
    pub fn to_json_string(&self, indent: usize) -> Result<String, ManifestError> {
        let indent = " ".repeat(indent);
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.fields.serialize(&mut serializer)?;

        let mut text = String::from_utf8_lossy(&buf).into_owned();
        text.push('\n');
        Ok(text)
    }

    /// The raw object, for fields without a typed accessor.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// A raw top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The `name` field, if it is a string.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// The `version` field, if it is a string.
    pub fn version(&self) -> Option<&str> {
        self.fields.get("version").and_then(Value::as_str)
    }

    /// Set the `version` field.
    pub fn set_version(&mut self, version: &str) {
        self.fields
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    /// String entries of a dependency block.
    ///
    /// Returns `None` when the block is absent or not an object. Entries whose
    /// value is not a string are skipped.
    pub fn dependencies(&self, bloc: BlocName) -> Option<DependencyBlock> {
        let block = self.fields.get(bloc.key())?.as_object()?;
        Some(
            block
                .iter()
                .filter_map(|(name, range)| Some((name.clone(), range.as_str()?.to_string())))
                .collect(),
        )
    }

    /// One declared dependency.
    pub fn dependency(&self, bloc: BlocName, name: &str) -> Option<&str> {
        self.fields
            .get(bloc.key())?
            .as_object()?
            .get(name)?
            .as_str()
    }

    /// Set one dependency declaration, creating the block if needed.
    ///
    /// A block that exists but is not an object is replaced.
    pub fn set_dependency(&mut self, bloc: BlocName, name: &str, range: &str) {
        let block = self
            .fields
            .entry(bloc.key().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !block.is_object() {
            *block = Value::Object(Map::new());
        }
        if let Value::Object(entries) = block {
            entries.insert(name.to_string(), Value::String(range.to_string()));
        }
    }
}

/// JSON type name, for messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "name": "@acme/left",
  "version": "1.2.3",
  "private": true,
  "dependencies": {
    "@acme/right": "^1.0.0",
    "lodash": "4.17.21",
    "weird": 42
  },
  "scripts": {
    "test": "jest"
  }
}
"#;

    #[test]
    fn typed_accessors() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.name(), Some("@acme/left"));
        assert_eq!(manifest.version(), Some("1.2.3"));
        assert_eq!(
            manifest.dependency(BlocName::Dependencies, "@acme/right"),
            Some("^1.0.0")
        );
        assert!(manifest.dependencies(BlocName::DevDependencies).is_none());
    }

    #[test]
    fn non_string_entries_are_skipped() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let deps = manifest.dependencies(BlocName::Dependencies).unwrap();
        assert_eq!(deps.len(), 2);
        assert!(!deps.contains_key("weird"));
    }

    #[test]
    fn unknown_fields_round_trip_in_order() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.to_json_string(2).unwrap(), SAMPLE);
    }

    #[test]
    fn setters_edit_in_place() {
        let mut manifest = Manifest::parse(SAMPLE).unwrap();
        manifest.set_version("2.0.0");
        manifest.set_dependency(BlocName::Dependencies, "@acme/right", "^2.0.0");
        manifest.set_dependency(BlocName::PeerDependencies, "react", "18.0.0");

        assert_eq!(manifest.version(), Some("2.0.0"));
        assert_eq!(
            manifest.dependency(BlocName::Dependencies, "@acme/right"),
            Some("^2.0.0")
        );
        assert_eq!(
            manifest.dependency(BlocName::PeerDependencies, "react"),
            Some("18.0.0")
        );
        let keys: Vec<&String> = manifest.fields().keys().collect();
        assert_eq!(keys.first().map(|k| k.as_str()), Some("name"));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            Manifest::parse("[1, 2]"),
            Err(ManifestError::NotAnObject { found: "array" })
        ));
        assert!(matches!(Manifest::parse("{"), Err(ManifestError::Json(_))));
    }

    #[test]
    fn respects_indent() {
        let manifest = Manifest::parse(r#"{"name":"a"}"#).unwrap();
        assert_eq!(manifest.to_json_string(4).unwrap(), "{\n    \"name\": \"a\"\n}\n");
    }
}
