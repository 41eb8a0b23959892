//! smartrun git — checkpoint tags and changed-path queries over git2
//!
//! Implements the `CheckpointVcs` collaborator from `smartrun-core`.

mod checkpoint;
mod repository;

pub use checkpoint::GitCheckpoints;
pub use repository::{GitRepo, Result};
