//! Configuration file support
//!
//! An optional `smartrun.toml` (or `smartrun.yaml`) at or above the
//! workspace root supplies defaults for run-first/run-last patterns,
//! concurrency and the checkpoint tag prefix. Command-line flags always
//! override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};

/// File names probed at each directory level, most specific first
const CONFIG_FILE_NAMES: &[&str] = &["smartrun.toml", "smartrun.yaml", "smartrun.yml"];

/// Default checkpoint tag prefix
pub const DEFAULT_CHECKPOINT_PREFIX: &str = "smartrun";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Run ordering and concurrency defaults
    pub run: RunConfig,
    /// Checkpoint marker settings
    pub checkpoint: CheckpointConfig,
}

/// `[run]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Glob patterns for packages to run before everything else
    pub first: Vec<String>,
    /// Glob patterns for packages to run after everything else
    pub last: Vec<String>,
    /// Default pass-through arguments for the script
    pub args: Vec<String>,
    /// Maximum concurrent package scripts (default: available parallelism)
    pub concurrency: Option<usize>,
}

/// `[checkpoint]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointConfig {
    /// Prefix for checkpoint tag names
    pub prefix: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_CHECKPOINT_PREFIX.to_string(),
        }
    }
}

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<Config> {
    let is_toml = path.extension().is_some_and(|e| e == "toml");
    info!(path = %path.display(), format = if is_toml { "TOML" } else { "YAML" }, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config: Config = if is_toml {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Find a configuration file in the directory or its parents.
/// TOML is preferred over YAML at each level; the first match wins.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        for name in CONFIG_FILE_NAMES {
            let config_path = current.join(name);
            if config_path.exists() {
                debug!(path = %config_path.display(), "found config file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load configuration from a directory, falling back to defaults when no
/// config file exists. A file that exists but fails to parse is an error,
/// not a fallback.
pub fn load_config_or_default(dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    match find_config(dir) {
        Some(path) => {
            let config = load_config(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            warn!(dir = %dir.display(), "no config file found, using defaults");
            Ok((Config::default(), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("smartrun.toml");
        std::fs::write(
            &path,
            r#"
[run]
first = ["@my/base"]
last = ["@my/e2e-*"]
args = ["--ci"]
concurrency = 4

[checkpoint]
prefix = "ci-run"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.run.first, vec!["@my/base"]);
        assert_eq!(config.run.last, vec!["@my/e2e-*"]);
        assert_eq!(config.run.args, vec!["--ci"]);
        assert_eq!(config.run.concurrency, Some(4));
        assert_eq!(config.checkpoint.prefix, "ci-run");
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("smartrun.yaml");
        std::fs::write(&path, "run:\n  first:\n    - base\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.run.first, vec!["base"]);
        assert_eq!(config.checkpoint.prefix, DEFAULT_CHECKPOINT_PREFIX);
    }

    #[test]
    fn test_find_config_prefers_toml() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("smartrun.toml");
        std::fs::write(&toml_path, "").unwrap();
        std::fs::write(temp.path().join("smartrun.yaml"), "").unwrap();

        assert_eq!(find_config(temp.path()).unwrap(), toml_path);
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("smartrun.toml");
        std::fs::write(&config_path, "").unwrap();

        let nested = temp.path().join("packages/deep");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested).unwrap(), config_path);
    }

    #[test]
    fn test_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let (config, path) = load_config_or_default(temp.path()).unwrap();
        assert!(path.is_none());
        assert!(config.run.first.is_empty());
        assert!(config.run.concurrency.is_none());
    }

    #[test]
    fn test_broken_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("smartrun.toml"), "[run\nbroken").unwrap();
        assert!(load_config_or_default(temp.path()).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("smartrun.toml");
        std::fs::write(&path, "[run]\nfrist = []\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
