//! Script execution against package groups

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use smartrun_core::error::ExecError;
use smartrun_core::monorepo::{DiscoveredPackage, PackageGraph, WorkspaceType};

use crate::reporter::{RunEvent, RunReporter};

/// Outcome of executing a script against one package group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether every package script succeeded
    pub success: bool,
    /// Exit code (0 on success, the first failing package's code otherwise)
    pub exit_code: i32,
}

impl ExecutionResult {
    /// A successful (or no-op) result
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// A failed result with the given exit code
    pub fn failed(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Executes a named script against a set of packages.
///
/// An empty package set must be a no-op success. A non-zero package exit
/// comes back as a failed `ExecutionResult`, not an `Err`; errors are
/// reserved for being unable to run at all.
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(
        &self,
        packages: &[String],
        script: &str,
        args: &[String],
        concurrency: usize,
    ) -> Result<ExecutionResult, ExecError>;
}

/// Number of available processing units on the host
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Runs package scripts through the workspace's package manager
/// (`npm run <script>` and friends), one process per package, bounded by a
/// semaphore. Packages are scheduled in dependency waves so a package's
/// in-group dependencies finish before it starts.
pub struct ProcessExecutor {
    run_command: &'static str,
    package_dirs: HashMap<String, PathBuf>,
    dependencies: HashMap<String, Vec<String>>,
    reporter: Arc<dyn RunReporter>,
}

impl ProcessExecutor {
    /// Create an executor for the given workspace packages
    pub fn new(
        workspace_type: WorkspaceType,
        packages: &[DiscoveredPackage],
        graph: &PackageGraph,
        reporter: Arc<dyn RunReporter>,
    ) -> Self {
        let package_dirs = packages
            .iter()
            .map(|p| (p.name.clone(), p.path.clone()))
            .collect();
        let dependencies = packages
            .iter()
            .filter_map(|p| {
                graph
                    .get(&p.name)
                    .map(|n| (p.name.clone(), n.dependencies.clone()))
            })
            .collect();

        Self {
            run_command: workspace_type.run_command(),
            package_dirs,
            dependencies,
            reporter,
        }
    }

    /// Split a group into dependency waves: each package lands one wave
    /// after the deepest of its in-group dependencies.
    fn waves(&self, packages: &[String]) -> Vec<Vec<String>> {
        let in_group: HashSet<&str> = packages.iter().map(String::as_str).collect();
        let mut depth: HashMap<&str, usize> = HashMap::new();

        fn depth_of<'a>(
            name: &'a str,
            deps: &'a HashMap<String, Vec<String>>,
            in_group: &HashSet<&str>,
            depth: &mut HashMap<&'a str, usize>,
        ) -> usize {
            if let Some(d) = depth.get(name) {
                return *d;
            }
            // cycle guard: mark before recursing
            depth.insert(name, 0);
            let d = deps
                .get(name)
                .map(|ds| {
                    ds.iter()
                        .filter(|d| in_group.contains(d.as_str()))
                        .map(|d| depth_of(d, deps, in_group, depth) + 1)
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);
            depth.insert(name, d);
            d
        }

        let mut waves: Vec<Vec<String>> = Vec::new();
        for pkg in packages {
            let d = depth_of(pkg, &self.dependencies, &in_group, &mut depth);
            while waves.len() <= d {
                waves.push(Vec::new());
            }
            waves[d].push(pkg.clone());
        }
        waves
    }
}

#[async_trait]
impl ScriptExecutor for ProcessExecutor {
    async fn execute(
        &self,
        packages: &[String],
        script: &str,
        args: &[String],
        concurrency: usize,
    ) -> Result<ExecutionResult, ExecError> {
        if packages.is_empty() {
            return Ok(ExecutionResult::success());
        }

        for name in packages {
            if !self.package_dirs.contains_key(name) {
                return Err(ExecError::UnknownPackage(name.clone()));
            }
        }

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let waves = self.waves(packages);
        debug!(
            packages = packages.len(),
            waves = waves.len(),
            script,
            "executing group"
        );

        for wave in waves {
            let mut handles = Vec::new();

            for package in wave {
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("semaphore closed");
                let dir = self.package_dirs[&package].clone();
                let run_command = self.run_command;
                let script = script.to_string();
                let args = args.to_vec();
                let reporter = self.reporter.clone();

                let handle = tokio::spawn(async move {
                    let result =
                        run_package_script(&package, run_command, &dir, &script, &args, &*reporter)
                            .await;
                    drop(permit);
                    result
                });
                handles.push(handle);
            }

            let mut first_failure: Option<i32> = None;
            for handle in handles {
                let exit_code = handle.await.map_err(|e| ExecError::SpawnFailed {
                    package: "<task>".to_string(),
                    reason: e.to_string(),
                })??;
                if exit_code != 0 && first_failure.is_none() {
                    first_failure = Some(exit_code);
                }
            }

            // A failed wave never releases the next one
            if let Some(code) = first_failure {
                return Ok(ExecutionResult::failed(code));
            }
        }

        Ok(ExecutionResult::success())
    }
}

/// Run one package's script, streaming output to the reporter.
/// Returns the process exit code.
async fn run_package_script(
    package: &str,
    run_command: &str,
    dir: &std::path::Path,
    script: &str,
    args: &[String],
    reporter: &dyn RunReporter,
) -> Result<i32, ExecError> {
    let start = Instant::now();

    let mut cmd = Command::new(run_command);
    cmd.arg("run").arg(script);
    if !args.is_empty() {
        cmd.arg("--");
        cmd.args(args);
    }
    cmd.current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    reporter.report(&RunEvent::PackageStarted {
        package: package.to_string(),
        command: format!("{} run {}", run_command, script),
    });

    let mut child = cmd.spawn().map_err(|e| ExecError::SpawnFailed {
        package: package.to_string(),
        reason: e.to_string(),
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Drain both pipes concurrently; one stream filling its buffer must
    // not stall the other
    let drain_stdout = async {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                reporter.report(&RunEvent::PackageOutput {
                    package: package.to_string(),
                    line,
                    is_stderr: false,
                });
            }
        }
    };
    let drain_stderr = async {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                reporter.report(&RunEvent::PackageOutput {
                    package: package.to_string(),
                    line,
                    is_stderr: true,
                });
            }
        }
    };
    tokio::join!(drain_stdout, drain_stderr);

    let status = child.wait().await.map_err(|e| ExecError::SpawnFailed {
        package: package.to_string(),
        reason: e.to_string(),
    })?;

    let exit_code = status.code().unwrap_or(-1);
    if status.success() {
        reporter.report(&RunEvent::PackageCompleted {
            package: package.to_string(),
            duration: start.elapsed(),
        });
    } else {
        reporter.report(&RunEvent::PackageFailed {
            package: package.to_string(),
            duration: start.elapsed(),
            exit_code,
        });
    }

    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use smartrun_core::monorepo::DiscoveredPackage;

    fn pkg(name: &str, deps: &[&str]) -> DiscoveredPackage {
        DiscoveredPackage {
            name: name.to_string(),
            path: format!("packages/{name}").into(),
            manifest_path: format!("packages/{name}/package.json").into(),
            private: false,
            workspace_dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn executor(packages: &[DiscoveredPackage]) -> ProcessExecutor {
        let graph = PackageGraph::build(packages).unwrap();
        ProcessExecutor::new(
            WorkspaceType::Npm,
            packages,
            &graph,
            Arc::new(CollectingReporter::default()),
        )
    }

    #[test]
    fn test_waves_respect_in_group_dependencies() {
        let packages = vec![pkg("core", &[]), pkg("utils", &["core"]), pkg("cli", &["utils"])];
        let exec = executor(&packages);

        let waves = exec.waves(&[
            "cli".to_string(),
            "core".to_string(),
            "utils".to_string(),
        ]);

        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["core"]);
        assert_eq!(waves[1], vec!["utils"]);
        assert_eq!(waves[2], vec!["cli"]);
    }

    #[test]
    fn test_waves_ignore_out_of_group_dependencies() {
        let packages = vec![pkg("core", &[]), pkg("utils", &["core"]), pkg("cli", &["utils"])];
        let exec = executor(&packages);

        // core is not in the group, so utils starts immediately
        let waves = exec.waves(&["utils".to_string(), "cli".to_string()]);
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec!["utils"]);
        assert_eq!(waves[1], vec!["cli"]);
    }

    #[test]
    fn test_independent_packages_share_a_wave() {
        let packages = vec![pkg("a", &[]), pkg("b", &[]), pkg("c", &[])];
        let exec = executor(&packages);

        let waves = exec.waves(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(waves.len(), 1);
        assert_eq!(waves[0].len(), 3);
    }

    #[tokio::test]
    async fn test_empty_group_is_noop_success() {
        let packages = vec![pkg("a", &[])];
        let exec = executor(&packages);

        let result = exec.execute(&[], "build", &[], 4).await.unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_noisy_stderr_does_not_stall_stdout() {
        use std::os::unix::fs::PermissionsExt;

        // Writes far more than a pipe buffer to stderr before touching
        // stdout; draining must not deadlock on the full stderr pipe
        let temp = tempfile::TempDir::new().unwrap();
        let shim = temp.path().join("runner");
        std::fs::write(
            &shim,
            "#!/bin/sh\n\
             i=0\n\
             while [ $i -lt 20000 ]; do\n\
             \techo \"stderr $i\" 1>&2\n\
             \ti=$((i+1))\n\
             done\n\
             echo done\n",
        )
        .unwrap();
        std::fs::set_permissions(&shim, std::fs::Permissions::from_mode(0o755)).unwrap();

        let reporter = CollectingReporter::default();
        let exit_code = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            run_package_script(
                "noisy",
                shim.to_str().unwrap(),
                temp.path(),
                "build",
                &[],
                &reporter,
            ),
        )
        .await
        .expect("output draining stalled")
        .unwrap();

        assert_eq!(exit_code, 0);
        let stderr_lines = reporter
            .events()
            .iter()
            .filter(|e| matches!(e, RunEvent::PackageOutput { is_stderr: true, .. }))
            .count();
        assert_eq!(stderr_lines, 20000);
    }

    #[tokio::test]
    async fn test_unknown_package_is_an_error() {
        let packages = vec![pkg("a", &[])];
        let exec = executor(&packages);

        let result = exec.execute(&["ghost".to_string()], "build", &[], 4).await;
        assert!(matches!(result, Err(ExecError::UnknownPackage(_))));
    }
}
