//! smartrun core — selection and ordering engine for change-aware script
//! execution in monorepos
//!
//! Given a package dependency graph, the set of packages changed since a
//! checkpoint, and user-supplied run-first/run-last glob patterns, this
//! crate computes three disjoint, correctly-ordered groups of packages.
//! Executing the groups lives in `smartrun-exec`; talking to git lives in
//! `smartrun-git`.

pub mod changes;
pub mod classify;
pub mod config;
pub mod error;
pub mod monorepo;
pub mod vcs;

pub use changes::{ChangeResolver, ChangedSet, PackageFilter};
pub use classify::{classify, Classification, PatternGroup};
pub use config::{load_config_or_default, CheckpointConfig, Config, RunConfig};
pub use error::{
    CheckpointError, ConfigError, ExecError, Result, SmartRunError, WorkspaceError,
};
pub use monorepo::{DiscoveredPackage, PackageDiscovery, PackageGraph, Workspace, WorkspaceType};
pub use vcs::CheckpointVcs;
