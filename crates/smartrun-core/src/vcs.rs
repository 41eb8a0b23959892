//! Checkpoint VCS collaborator interface
//!
//! The core never talks to git directly; it goes through this trait so the
//! change resolver can be tested with an in-memory implementation. The
//! checkpoint format (tag naming etc.) is opaque at this level.

use std::path::{Path, PathBuf};

use crate::error::CheckpointError;

/// Result type for VCS operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Operations the core requires from the underlying revision control system
pub trait CheckpointVcs {
    /// The directory that paths from `changed_paths` are relative to.
    /// The workspace may live below this directory.
    fn workdir(&self) -> &Path;

    /// Paths (relative to `workdir`) that changed since the given
    /// revision. Fails with `CheckpointError::RevisionNotFound` if the
    /// revision does not resolve.
    fn changed_paths(&self, since: &str) -> Result<Vec<PathBuf>>;

    /// The most recent checkpoint marker, if any exists
    fn latest_checkpoint(&self) -> Result<Option<String>>;

    /// Record a new checkpoint at the current state, returning its name
    fn create_checkpoint(&self) -> Result<String>;

    /// Remove a checkpoint marker
    fn delete_checkpoint(&self, name: &str) -> Result<()>;
}
