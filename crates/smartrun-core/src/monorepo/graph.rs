//! Dependency graph over workspace packages

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use crate::error::{Result, WorkspaceError};

use super::discovery::DiscoveredPackage;

/// A node in the dependency graph
#[derive(Debug, Clone)]
pub struct PackageNode {
    /// Package name
    pub name: String,
    /// Package directory
    pub path: PathBuf,
    /// Packages this package depends on (direct)
    pub dependencies: Vec<String>,
    /// Packages that depend on this package (direct)
    pub dependents: Vec<String>,
}

/// Read-only dependency graph built once per invocation
#[derive(Debug, Clone)]
pub struct PackageGraph {
    /// Nodes indexed by package name
    nodes: HashMap<String, PackageNode>,
    /// Topologically sorted order (dependencies before dependents)
    sorted_order: Vec<String>,
}

impl PackageGraph {
    /// Build a dependency graph from discovered packages
    pub fn build(packages: &[DiscoveredPackage]) -> Result<Self> {
        let mut nodes: HashMap<String, PackageNode> = HashMap::new();

        for pkg in packages {
            nodes.insert(
                pkg.name.clone(),
                PackageNode {
                    name: pkg.name.clone(),
                    path: pkg.path.clone(),
                    dependencies: pkg.workspace_dependencies.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Reverse edges
        for pkg in packages {
            for dep in &pkg.workspace_dependencies {
                if let Some(dep_node) = nodes.get_mut(dep) {
                    dep_node.dependents.push(pkg.name.clone());
                }
            }
        }

        let sorted_order = Self::topological_sort(&nodes);

        Ok(Self {
            nodes,
            sorted_order,
        })
    }

    /// Kahn's algorithm. Nodes on a cycle never reach in-degree zero and
    /// are left out of the sorted order; `validate` reports them.
    fn topological_sort(nodes: &HashMap<String, PackageNode>) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut sorted: Vec<String> = Vec::new();

        for (name, node) in nodes {
            let degree = node
                .dependencies
                .iter()
                .filter(|d| nodes.contains_key(*d))
                .count();
            in_degree.insert(name, degree);
            if degree == 0 {
                queue.push_back(name);
            }
        }

        while let Some(name) = queue.pop_front() {
            sorted.push(name.to_string());

            if let Some(node) = nodes.get(name) {
                for dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        sorted
    }

    /// Validate that the graph has no circular dependencies
    pub fn validate(&self) -> Result<()> {
        if self.sorted_order.len() != self.nodes.len() {
            let in_sorted: HashSet<&String> = self.sorted_order.iter().collect();
            let mut cyclic: Vec<&str> = self
                .nodes
                .keys()
                .filter(|n| !in_sorted.contains(n))
                .map(String::as_str)
                .collect();
            cyclic.sort_unstable();

            return Err(WorkspaceError::CircularDependencies(cyclic.join(", ")).into());
        }
        Ok(())
    }

    /// Get a package node
    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.nodes.get(name)
    }

    /// All package names in the workspace
    pub fn names(&self) -> BTreeSet<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Packages in topologically sorted order (dependencies first)
    pub fn sorted(&self) -> &[String] {
        &self.sorted_order
    }

    /// All packages that transitively depend on the given package,
    /// excluding the package itself
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        let mut affected = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);

        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(current) {
                for dependent in &node.dependents {
                    if affected.insert(dependent.clone()) {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        affected.remove(name);
        affected
    }

    /// All transitive dependents of any package in the set, plus the set
    /// itself (restricted to known packages)
    pub fn with_dependents(&self, names: &BTreeSet<String>) -> BTreeSet<String> {
        let mut result: BTreeSet<String> = names
            .iter()
            .filter(|n| self.nodes.contains_key(*n))
            .cloned()
            .collect();

        for name in names {
            result.extend(self.dependents_of(name));
        }

        result
    }
}
