//! Change resolution: which packages must re-run since a checkpoint

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::monorepo::{DiscoveredPackage, PackageGraph};
use crate::vcs::CheckpointVcs;

/// The set of packages considered changed for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangedSet {
    /// No checkpoint exists; every package is considered changed
    All,
    /// Explicit subset (already expanded with dependents where requested)
    Packages(BTreeSet<String>),
}

impl ChangedSet {
    /// Materialize the set against the full package graph
    pub fn names(&self, graph: &PackageGraph) -> BTreeSet<String> {
        match self {
            Self::All => graph.names(),
            Self::Packages(names) => names.clone(),
        }
    }

    /// Whether nothing changed
    pub fn is_empty(&self, graph: &PackageGraph) -> bool {
        match self {
            Self::All => graph.is_empty(),
            Self::Packages(names) => names.is_empty(),
        }
    }
}

/// Resolves the changed-package set for one invocation
pub struct ChangeResolver<'a> {
    root: &'a Path,
    packages: &'a [DiscoveredPackage],
    graph: &'a PackageGraph,
    include_dependents: bool,
}

impl<'a> ChangeResolver<'a> {
    /// Create a new change resolver
    pub fn new(
        root: &'a Path,
        packages: &'a [DiscoveredPackage],
        graph: &'a PackageGraph,
    ) -> Self {
        Self {
            root,
            packages,
            graph,
            include_dependents: true,
        }
    }

    /// Set whether transitive dependents of changed packages are included
    pub fn with_dependents(mut self, include: bool) -> Self {
        self.include_dependents = include;
        self
    }

    /// Resolve the changed set.
    ///
    /// With no checkpoint every package is changed (first-run case). With a
    /// checkpoint, the VCS is asked for changed paths, the paths are mapped
    /// to their containing packages, and the result is expanded with every
    /// package transitively depending on a changed one. Packages merely
    /// depended upon by a changed package are not added. An unresolvable
    /// checkpoint propagates as an error.
    pub fn resolve(
        &self,
        checkpoint: Option<&str>,
        vcs: &dyn CheckpointVcs,
    ) -> Result<ChangedSet> {
        let Some(since) = checkpoint else {
            info!("no checkpoint found, all packages considered changed");
            return Ok(ChangedSet::All);
        };

        let paths = vcs.changed_paths(since)?;
        debug!(since, changed_paths = paths.len(), "resolved changed paths");

        let direct = self.map_paths_to_packages(&paths, vcs.workdir());

        let expanded = if self.include_dependents {
            self.graph.with_dependents(&direct)
        } else {
            direct
        };

        info!(
            since,
            changed_packages = expanded.len(),
            "change resolution complete"
        );
        Ok(ChangedSet::Packages(expanded))
    }

    /// Map changed file paths to the names of their containing packages.
    /// Changed paths are relative to the VCS workdir, which may be above
    /// the workspace root, so both sides are anchored before comparing.
    fn map_paths_to_packages(&self, paths: &[PathBuf], workdir: &Path) -> BTreeSet<String> {
        let mut names = BTreeSet::new();

        for file in paths {
            let file = if file.is_absolute() {
                file.clone()
            } else {
                workdir.join(file)
            };

            for pkg in self.packages {
                let pkg_dir = if pkg.path.is_absolute() {
                    pkg.path.clone()
                } else {
                    self.root.join(&pkg.path)
                };
                if file.starts_with(&pkg_dir) {
                    names.insert(pkg.name.clone());
                    break;
                }
            }
        }

        names
    }
}

/// Scope/ignore filtering over a resolved name set
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    /// Only keep names matching one of these globs (empty = keep all)
    pub scope: Vec<String>,
    /// Drop names matching one of these globs
    pub ignore: Vec<String>,
}

impl PackageFilter {
    /// Create a filter from scope and ignore glob lists
    pub fn new(scope: Vec<String>, ignore: Vec<String>) -> Self {
        Self { scope, ignore }
    }

    /// Whether the filter changes nothing
    pub fn is_empty(&self) -> bool {
        self.scope.is_empty() && self.ignore.is_empty()
    }

    /// Apply the filter to a name set
    pub fn apply(&self, names: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let scope = compile_patterns(&self.scope)?;
        let ignore = compile_patterns(&self.ignore)?;

        let filtered = names
            .iter()
            .filter(|name| scope.is_empty() || scope.iter().any(|p| pattern_matches(p, name)))
            .filter(|name| !ignore.iter().any(|p| pattern_matches(p, name)))
            .cloned()
            .collect();

        Ok(filtered)
    }
}

/// Match options keeping `*` within one `/`-separated segment, so a bare
/// `*` never swallows scoped names like `@my/core`
const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Match a package name against a compiled pattern
pub(crate) fn pattern_matches(pattern: &Pattern, name: &str) -> bool {
    pattern.matches_with(name, MATCH_OPTIONS)
}

/// Compile glob strings, surfacing bad syntax as a configuration error
pub(crate) fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| {
                ConfigError::InvalidPattern {
                    pattern: p.clone(),
                    message: e.to_string(),
                }
                .into()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CheckpointError, SmartRunError};
    use std::path::Path;

    fn pkg(name: &str, dir: &str, deps: &[&str]) -> DiscoveredPackage {
        DiscoveredPackage {
            name: name.to_string(),
            path: PathBuf::from(dir),
            manifest_path: Path::new(dir).join("package.json"),
            private: false,
            workspace_dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    struct FakeVcs {
        workdir: PathBuf,
        paths: Vec<PathBuf>,
    }

    impl FakeVcs {
        fn new(workdir: &str, paths: &[&str]) -> Self {
            Self {
                workdir: PathBuf::from(workdir),
                paths: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl CheckpointVcs for FakeVcs {
        fn workdir(&self) -> &Path {
            &self.workdir
        }

        fn changed_paths(&self, since: &str) -> crate::vcs::Result<Vec<PathBuf>> {
            if since == "missing" {
                return Err(CheckpointError::RevisionNotFound(since.to_string()));
            }
            Ok(self.paths.clone())
        }

        fn latest_checkpoint(&self) -> crate::vcs::Result<Option<String>> {
            Ok(None)
        }

        fn create_checkpoint(&self) -> crate::vcs::Result<String> {
            unimplemented!()
        }

        fn delete_checkpoint(&self, _name: &str) -> crate::vcs::Result<()> {
            unimplemented!()
        }
    }

    fn fixture() -> (Vec<DiscoveredPackage>, PackageGraph) {
        let packages = vec![
            pkg("core", "packages/core", &[]),
            pkg("utils", "packages/utils", &["core"]),
            pkg("cli", "packages/cli", &["utils"]),
        ];
        let graph = PackageGraph::build(&packages).unwrap();
        (packages, graph)
    }

    #[test]
    fn test_no_checkpoint_means_all() {
        let (packages, graph) = fixture();
        let resolver = ChangeResolver::new(Path::new("."), &packages, &graph);
        let vcs = FakeVcs::new(".", &[]);

        let changed = resolver.resolve(None, &vcs).unwrap();
        assert_eq!(changed, ChangedSet::All);
        assert_eq!(changed.names(&graph).len(), 3);
    }

    #[test]
    fn test_changed_expands_to_dependents() {
        let (packages, graph) = fixture();
        let resolver = ChangeResolver::new(Path::new("."), &packages, &graph);
        let vcs = FakeVcs::new(".", &["packages/utils/src/index.js"]);

        let changed = resolver.resolve(Some("cp-1"), &vcs).unwrap();
        let names = changed.names(&graph);

        // utils changed directly, cli depends on utils; core is only
        // depended upon and must not be included
        assert!(names.contains("utils"));
        assert!(names.contains("cli"));
        assert!(!names.contains("core"));
    }

    #[test]
    fn test_exclude_dependents() {
        let (packages, graph) = fixture();
        let resolver =
            ChangeResolver::new(Path::new("."), &packages, &graph).with_dependents(false);
        let vcs = FakeVcs::new(".", &["packages/utils/src/index.js"]);

        let changed = resolver.resolve(Some("cp-1"), &vcs).unwrap();
        let names = changed.names(&graph);
        assert_eq!(names.len(), 1);
        assert!(names.contains("utils"));
    }

    #[test]
    fn test_missing_revision_propagates() {
        let (packages, graph) = fixture();
        let resolver = ChangeResolver::new(Path::new("."), &packages, &graph);
        let vcs = FakeVcs::new(".", &[]);

        let result = resolver.resolve(Some("missing"), &vcs);
        assert!(matches!(
            result,
            Err(SmartRunError::Checkpoint(
                CheckpointError::RevisionNotFound(_)
            ))
        ));
    }

    #[test]
    fn test_paths_outside_packages_ignored() {
        let (packages, graph) = fixture();
        let resolver = ChangeResolver::new(Path::new("."), &packages, &graph);
        let vcs = FakeVcs::new(".", &["README.md"]);

        let changed = resolver.resolve(Some("cp-1"), &vcs).unwrap();
        assert!(changed.is_empty(&graph));
    }

    #[test]
    fn test_workspace_below_repo_root() {
        // The repo root is /repo; the workspace lives at /repo/frontend.
        // Changed paths come back relative to the repo root and must still
        // land in the right packages.
        let packages = vec![
            pkg("core", "/repo/frontend/packages/core", &[]),
            pkg("utils", "/repo/frontend/packages/utils", &["core"]),
        ];
        let graph = PackageGraph::build(&packages).unwrap();
        let resolver = ChangeResolver::new(Path::new("/repo/frontend"), &packages, &graph);
        let vcs = FakeVcs::new(
            "/repo",
            &["frontend/packages/core/index.js", "docs/readme.md"],
        );

        let changed = resolver.resolve(Some("cp-1"), &vcs).unwrap();
        let names = changed.names(&graph);
        assert!(names.contains("core"));
        assert!(names.contains("utils"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_package_filter_scope_and_ignore() {
        let names: BTreeSet<String> = ["@my/core", "@my/utils", "tool-a"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let filter = PackageFilter::new(vec!["@my/*".to_string()], vec!["@my/utils".to_string()]);
        let filtered = filter.apply(&names).unwrap();

        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains("@my/core"));
    }

    #[test]
    fn test_package_filter_bad_pattern() {
        let names = BTreeSet::new();
        let filter = PackageFilter::new(vec!["[".to_string()], vec![]);
        assert!(filter.apply(&names).is_err());
    }
}
