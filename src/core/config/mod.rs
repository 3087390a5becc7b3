//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Repo config file
//! 3. CLI flags (not handled here)
//!
//! # Repo Config Locations
//!
//! Searched in order:
//! 1. `$INTERDEPS_CONFIG` if set (warns and falls through when missing)
//! 2. `<repo>/interdeps.toml`
//!
//! # Example
//!
//! ```no_run
//! use interdeps::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Path::new("/path/to/repo")).unwrap();
//! let config = result.config;
//!
//! println!("Packages live in: {}", config.workspace_root());
//! println!("Manifest file: {}", config.manifest());
//! ```

pub mod schema;

pub use schema::RepoConfig;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "INTERDEPS_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Effective configuration.
///
/// Accessors apply defaults for anything the repo config leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Repository configuration (if a file was found)
    pub repo: Option<RepoConfig>,
    /// Path to the repo config file (if loaded)
    pub(crate) repo_path: Option<PathBuf>,
}

impl Config {
    /// Default directory holding the packages.
    pub const DEFAULT_WORKSPACE_ROOT: &'static str = "packages";
    /// Default manifest file name.
    pub const DEFAULT_MANIFEST: &'static str = "package.json";
    /// Default manifest indent.
    pub const DEFAULT_INDENT: usize = 2;

    /// Load configuration for the repository at `repo_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed or
    /// validated. Missing config files are not an error (defaults are used).
    pub fn load(repo_root: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_with(repo_root, explicit.as_deref())
    }

    /// Load configuration with an explicit override path instead of the
    /// environment.
    pub fn load_with(
        repo_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();
        let (repo, repo_path) = Self::load_repo(repo_root, explicit, &mut warnings)?;

        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config { repo, repo_path },
            warnings,
        })
    }

    fn load_repo(
        repo_root: &Path,
        explicit: Option<&Path>,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(Option<RepoConfig>, Option<PathBuf>), ConfigError> {
        // 1. Explicit override
        if let Some(path) = explicit {
            if path.exists() {
                let config = Self::read_repo_config(path)?;
                return Ok((Some(config), Some(path.to_path_buf())));
            }
            warnings.push(ConfigWarning {
                message: format!(
                    "{} points to '{}', which does not exist; ignoring it",
                    CONFIG_ENV,
                    path.display()
                ),
                path: path.to_path_buf(),
            });
        }

        // 2. Repo location
        let canonical = Self::repo_config_path(repo_root);
        if canonical.exists() {
            let config = Self::read_repo_config(&canonical)?;
            return Ok((Some(config), Some(canonical)));
        }

        Ok((None, None))
    }

    fn read_repo_config(path: &Path) -> Result<RepoConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Canonical repo config path.
    pub fn repo_config_path(repo_root: &Path) -> PathBuf {
        repo_root.join("interdeps.toml")
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Directory holding the packages, relative to the repository root.
    ///
    /// Defaults to "packages".
    pub fn workspace_root(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.workspace_root.as_deref())
            .unwrap_or(Self::DEFAULT_WORKSPACE_ROOT)
    }

    /// Package directory names to skip during discovery.
    pub fn exclude(&self) -> &[String] {
        self.repo
            .as_ref()
            .and_then(|r| r.exclude.as_deref())
            .unwrap_or(&[])
    }

    /// Manifest file name.
    ///
    /// Defaults to "package.json".
    pub fn manifest(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.manifest.as_deref())
            .unwrap_or(Self::DEFAULT_MANIFEST)
    }

    /// Indent used when rewriting manifests.
    ///
    /// Defaults to 2.
    pub fn indent(&self) -> usize {
        self.repo
            .as_ref()
            .and_then(|r| r.indent)
            .unwrap_or(Self::DEFAULT_INDENT)
    }

    /// Override the workspace root (CLI flag).
    pub fn set_workspace_root(&mut self, root: impl Into<String>) {
        self.repo.get_or_insert_with(RepoConfig::default).workspace_root = Some(root.into());
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
