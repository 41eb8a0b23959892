//! Error types for smartrun

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using SmartRunError
pub type Result<T> = std::result::Result<T, SmartRunError>;

/// Main error type for smartrun operations
#[derive(Debug, Error)]
pub enum SmartRunError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Workspace loading errors
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Checkpoint/VCS errors
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Script execution errors
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors, detected before any package work begins
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Conflicting flags supplied together
    #[error("Conflicting options: {0}")]
    ConflictingOptions(String),

    /// Required script argument is missing
    #[error("A script to run must be specified")]
    MissingScript,

    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid glob pattern
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Workspace loading errors (the manifest set cannot be enumerated)
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No workspace configuration present
    #[error("No workspace configuration found at {0}")]
    NotFound(PathBuf),

    /// Package manifest could not be parsed
    #[error("Failed to parse manifest at {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// Workspace contains no packages
    #[error("No packages found in workspace at {0}")]
    NoPackages(PathBuf),

    /// Invalid package location pattern
    #[error("Invalid package pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Circular dependencies between workspace packages
    #[error("Circular dependencies detected: {0}")]
    CircularDependencies(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Checkpoint and VCS errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Git repository not found
    #[error("Git repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    /// Not a git repository
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    /// Failed to open repository
    #[error("Failed to open repository: {0}")]
    OpenFailed(String),

    /// Checkpoint reference does not resolve in the repository
    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    /// Checkpoint tag already exists
    #[error("Checkpoint already exists: {0}")]
    CheckpointExists(String),

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),
}

/// Script execution errors
#[derive(Debug, Error)]
pub enum ExecError {
    /// A script invocation in some phase returned failure
    #[error("Script '{script}' failed in phase {phase} (group '{group}') with exit code {exit_code}")]
    ScriptFailed {
        phase: String,
        group: String,
        script: String,
        exit_code: i32,
    },

    /// Failed to spawn the script process for a package
    #[error("Failed to spawn script for package '{package}': {reason}")]
    SpawnFailed { package: String, reason: String },

    /// Package is not known to the executor
    #[error("Unknown package: {0}")]
    UnknownPackage(String),
}

impl SmartRunError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
