//! Package discovery in the workspace

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glob::glob;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, WorkspaceError};

use super::workspace::Workspace;

/// A package discovered in the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredPackage {
    /// Package name
    pub name: String,
    /// Path to the package directory
    pub path: PathBuf,
    /// Path to the manifest file
    pub manifest_path: PathBuf,
    /// Whether this is a private package
    pub private: bool,
    /// Dependencies on other packages in the workspace
    pub workspace_dependencies: Vec<String>,
}

/// Package discovery for workspaces
pub struct PackageDiscovery {
    workspace: Workspace,
}

impl PackageDiscovery {
    /// Create a new package discovery instance
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// Discover all packages in the workspace.
    ///
    /// Packages are identified by a package.json with a `name` field.
    /// Workspace-internal dependencies are resolved in a second pass once
    /// all names are known.
    pub fn discover(&self) -> Result<Vec<DiscoveredPackage>> {
        debug!(
            workspace_type = %self.workspace.workspace_type,
            patterns = self.workspace.package_patterns.len(),
            "discovering packages"
        );

        let mut packages = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for pattern in &self.workspace.package_patterns {
            let full_pattern = self
                .workspace
                .root
                .join(pattern)
                .to_string_lossy()
                .to_string();

            for entry in glob(&full_pattern).map_err(|e| WorkspaceError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })? {
                let path = entry.map_err(|e| WorkspaceError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;

                if !path.is_dir() || seen.contains(&path) {
                    continue;
                }

                let manifest_path = path.join("package.json");
                if !manifest_path.exists() {
                    continue;
                }

                if let Some(pkg) = self.parse_package(&manifest_path)? {
                    seen.insert(path);
                    packages.push(pkg);
                }
            }
        }

        if packages.is_empty() {
            return Err(WorkspaceError::NoPackages(self.workspace.root.clone()).into());
        }

        // Second pass: resolve workspace-internal dependencies
        let all_names: Vec<String> = packages.iter().map(|p| p.name.clone()).collect();
        for pkg in &mut packages {
            pkg.workspace_dependencies = find_workspace_deps(&pkg.manifest_path, &all_names)?;
        }

        info!(count = packages.len(), "discovered packages");
        Ok(packages)
    }

    /// Parse a package from its package.json
    fn parse_package(&self, manifest_path: &Path) -> Result<Option<DiscoveredPackage>> {
        let content = std::fs::read_to_string(manifest_path).map_err(WorkspaceError::Io)?;

        #[derive(Deserialize)]
        struct PackageJson {
            name: Option<String>,
            private: Option<bool>,
        }

        let pkg: PackageJson =
            serde_json::from_str(&content).map_err(|e| WorkspaceError::ManifestParse {
                path: manifest_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let Some(name) = pkg.name else {
            // Nameless manifests cannot participate in the graph
            return Ok(None);
        };

        let path = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        Ok(Some(DiscoveredPackage {
            name,
            path,
            manifest_path: manifest_path.to_path_buf(),
            private: pkg.private.unwrap_or(false),
            workspace_dependencies: Vec::new(),
        }))
    }
}

/// Collect dependency names from a package.json that refer to other
/// workspace packages
fn find_workspace_deps(manifest_path: &Path, all_names: &[String]) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(manifest_path).map_err(WorkspaceError::Io)?;

    #[derive(Deserialize)]
    struct PackageJson {
        dependencies: Option<HashMap<String, String>>,
        #[serde(rename = "devDependencies")]
        dev_dependencies: Option<HashMap<String, String>>,
        #[serde(rename = "peerDependencies")]
        peer_dependencies: Option<HashMap<String, String>>,
    }

    let pkg: PackageJson =
        serde_json::from_str(&content).map_err(|e| WorkspaceError::ManifestParse {
            path: manifest_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut deps = Vec::new();

    for section in [
        pkg.dependencies,
        pkg.dev_dependencies,
        pkg.peer_dependencies,
    ]
    .into_iter()
    .flatten()
    {
        for name in section.keys() {
            if all_names.contains(name) {
                deps.push(name.clone());
            }
        }
    }

    deps.sort();
    deps.dedup();
    Ok(deps)
}
