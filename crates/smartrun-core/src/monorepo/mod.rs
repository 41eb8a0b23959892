//! Workspace support for multi-package repositories
//!
//! - Workspace detection (npm, yarn, pnpm, lerna)
//! - Package discovery with glob patterns
//! - Dependency graph with transitive dependent queries

pub mod discovery;
pub mod graph;
pub mod workspace;

pub use discovery::{DiscoveredPackage, PackageDiscovery};
pub use graph::{PackageGraph, PackageNode};
pub use workspace::{Workspace, WorkspaceType};
