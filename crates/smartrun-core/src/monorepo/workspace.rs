//! Workspace detection

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkspaceError};

/// Type of JS monorepo workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceType {
    /// npm workspaces
    Npm,
    /// Yarn workspaces (v1 or berry)
    Yarn,
    /// pnpm workspace
    Pnpm,
    /// Lerna monorepo
    Lerna,
}

impl WorkspaceType {
    /// The package-manager command used to run package scripts
    pub fn run_command(&self) -> &'static str {
        match self {
            Self::Npm | Self::Lerna => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }
}

impl std::fmt::Display for WorkspaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Npm => write!(f, "npm"),
            Self::Yarn => write!(f, "yarn"),
            Self::Pnpm => write!(f, "pnpm"),
            Self::Lerna => write!(f, "lerna"),
        }
    }
}

/// A detected workspace root
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Root path of the workspace
    pub root: PathBuf,
    /// Type of workspace
    pub workspace_type: WorkspaceType,
    /// Glob patterns for package locations
    pub package_patterns: Vec<String>,
}

impl Workspace {
    /// Create a new workspace
    pub fn new(root: PathBuf, workspace_type: WorkspaceType) -> Self {
        Self {
            root,
            workspace_type,
            package_patterns: Vec::new(),
        }
    }

    /// Detect the workspace type and package patterns at a directory.
    ///
    /// Detection order: lerna, pnpm, then npm/yarn workspaces. Fails with
    /// `WorkspaceError::NotFound` when no workspace configuration exists.
    pub fn detect(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "detecting workspace type");

        if let Some(ws) = Self::detect_lerna(path)? {
            return Ok(ws);
        }
        if let Some(ws) = Self::detect_pnpm(path)? {
            return Ok(ws);
        }
        if let Some(ws) = Self::detect_npm_yarn(path)? {
            return Ok(ws);
        }

        Err(WorkspaceError::NotFound(path.to_path_buf()).into())
    }

    /// Detect a Lerna monorepo
    fn detect_lerna(path: &Path) -> Result<Option<Self>> {
        let lerna_json = path.join("lerna.json");
        if !lerna_json.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&lerna_json).map_err(WorkspaceError::Io)?;

        #[derive(Deserialize)]
        struct LernaConfig {
            packages: Option<Vec<String>>,
        }

        let config: LernaConfig =
            serde_json::from_str(&content).map_err(WorkspaceError::Json)?;

        let mut ws = Workspace::new(path.to_path_buf(), WorkspaceType::Lerna);
        ws.package_patterns = match config.packages {
            Some(packages) => packages,
            // Lerna falls back to package.json workspaces, then its default
            None => Self::package_json_patterns(path)?
                .unwrap_or_else(|| vec!["packages/*".to_string()]),
        };
        Ok(Some(ws))
    }

    /// Detect a pnpm workspace
    fn detect_pnpm(path: &Path) -> Result<Option<Self>> {
        let pnpm_workspace = path.join("pnpm-workspace.yaml");
        if !pnpm_workspace.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&pnpm_workspace).map_err(WorkspaceError::Io)?;

        #[derive(Deserialize)]
        struct PnpmWorkspace {
            packages: Option<Vec<String>>,
        }

        let config: PnpmWorkspace =
            serde_yaml::from_str(&content).map_err(WorkspaceError::Yaml)?;

        let mut ws = Workspace::new(path.to_path_buf(), WorkspaceType::Pnpm);
        ws.package_patterns = config
            .packages
            .unwrap_or_else(|| vec!["packages/*".to_string()]);
        Ok(Some(ws))
    }

    /// Detect npm or Yarn workspaces
    fn detect_npm_yarn(path: &Path) -> Result<Option<Self>> {
        let Some(patterns) = Self::package_json_patterns(path)? else {
            return Ok(None);
        };

        let workspace_type = if path.join("yarn.lock").exists() {
            WorkspaceType::Yarn
        } else {
            WorkspaceType::Npm
        };

        let mut ws = Workspace::new(path.to_path_buf(), workspace_type);
        ws.package_patterns = patterns;
        Ok(Some(ws))
    }

    /// Read the `workspaces` field from a root package.json, if present
    fn package_json_patterns(path: &Path) -> Result<Option<Vec<String>>> {
        let package_json = path.join("package.json");
        if !package_json.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&package_json).map_err(WorkspaceError::Io)?;

        #[derive(Deserialize)]
        struct PackageJson {
            workspaces: Option<WorkspacesField>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WorkspacesField {
            Array(Vec<String>),
            Object { packages: Vec<String> },
        }

        let pkg: PackageJson =
            serde_json::from_str(&content).map_err(WorkspaceError::Json)?;

        Ok(pkg.workspaces.map(|ws| match ws {
            WorkspacesField::Array(arr) => arr,
            WorkspacesField::Object { packages } => packages,
        }))
    }
}
