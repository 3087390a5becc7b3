//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Repo Config
//!
//! Located at (in order of precedence):
//! 1. `$INTERDEPS_CONFIG` if set
//! 2. `<repo>/interdeps.toml` (canonical)
//! 3. `<repo>/.interdeps/config.toml` (compatibility, warns)
//!
//! # Validation
//!
//! Config values are validated after parsing so that a bad workspace root or
//! manifest name fails before any package is read.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Largest accepted manifest indent.
pub const MAX_INDENT: usize = 8;

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// workspace_root = "packages"
/// exclude = ["legacy-widgets"]
/// manifest = "package.json"
/// indent = 2
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Directory holding the packages, relative to the repository root
    pub workspace_root: Option<String>,

    /// Package directory names to ignore
    pub exclude: Option<Vec<String>>,

    /// Manifest file name inside each package directory
    pub manifest: Option<String>,

    /// Spaces of indentation when rewriting manifests
    pub indent: Option<usize>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(root) = &self.workspace_root {
            if std::path::Path::new(root).is_absolute() || root.split('/').any(|c| c == "..") {
                return Err(ConfigError::InvalidValue(format!(
                    "workspace_root '{}' must be a relative path inside the repository",
                    root
                )));
            }
        }

        if let Some(manifest) = &self.manifest {
            if manifest.is_empty() || manifest.contains('/') || manifest.contains('\\') {
                return Err(ConfigError::InvalidValue(format!(
                    "manifest '{}' must be a plain file name",
                    manifest
                )));
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|name| name.is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "exclude entries cannot be empty".to_string(),
                ));
            }
        }

        if let Some(indent) = self.indent {
            if indent == 0 || indent > MAX_INDENT {
                return Err(ConfigError::InvalidValue(format!(
                    "indent must be between 1 and {}, got {}",
                    MAX_INDENT, indent
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RepoConfig::default();
        assert!(config.workspace_root.is_none());
        assert!(config.exclude.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_values() {
        let config = RepoConfig {
            workspace_root: Some("libs/js".to_string()),
            exclude: Some(vec!["legacy".to_string()]),
            manifest: Some("package.json".to_string()),
            indent: Some(4),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn escaping_workspace_root_rejected() {
        let config = RepoConfig {
            workspace_root: Some("../elsewhere".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn manifest_must_be_file_name() {
        let config = RepoConfig {
            manifest: Some("nested/package.json".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn indent_bounds() {
        for (indent, ok) in [(0, false), (1, true), (8, true), (9, false)] {
            let config = RepoConfig {
                indent: Some(indent),
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "indent {}", indent);
        }
    }

    #[test]
    fn roundtrip() {
        let config = RepoConfig {
            workspace_root: Some("packages".to_string()),
            exclude: Some(vec!["a".to_string(), "b".to_string()]),
            manifest: Some("package.json".to_string()),
            indent: Some(2),
        };

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: RepoConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn reject_unknown_fields() {
        let toml = r#"
            workspace_root = "packages"
            trunk = "main"
        "#;

        let result: Result<RepoConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
