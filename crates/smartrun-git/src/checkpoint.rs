//! Checkpoint markers and change queries
//!
//! A checkpoint is a lightweight tag named `<prefix>-<UTC timestamp>`.
//! Timestamps sort lexicographically, so the latest checkpoint is the
//! greatest matching tag name.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info, instrument};

use smartrun_core::error::CheckpointError;
use smartrun_core::vcs::CheckpointVcs;

use crate::repository::{GitRepo, Result};

/// Checkpoint store over a git repository
pub struct GitCheckpoints {
    repo: GitRepo,
    prefix: String,
}

impl GitCheckpoints {
    /// Create a checkpoint store with the given tag prefix
    pub fn new(repo: GitRepo, prefix: impl Into<String>) -> Self {
        Self {
            repo,
            prefix: prefix.into(),
        }
    }

    /// The underlying repository
    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    /// All checkpoint tag names, sorted ascending
    fn checkpoint_tags(&self) -> Result<Vec<String>> {
        let marker = format!("{}-", self.prefix);
        let mut tags = Vec::new();

        self.repo.repo.tag_foreach(|_oid, name| {
            let name = String::from_utf8_lossy(name)
                .trim_start_matches("refs/tags/")
                .to_string();
            if name.starts_with(&marker) {
                tags.push(name);
            }
            true
        })?;

        tags.sort();
        debug!(count = tags.len(), prefix = %self.prefix, "listed checkpoint tags");
        Ok(tags)
    }
}

impl CheckpointVcs for GitCheckpoints {
    /// Changed paths are relative to the repository working directory,
    /// which may be above the workspace when the workspace is nested
    fn workdir(&self) -> &std::path::Path {
        self.repo.path()
    }

    /// Paths changed between the checkpoint's tree and the working
    /// directory. Uncommitted and untracked files count as changed.
    #[instrument(skip(self))]
    fn changed_paths(&self, since: &str) -> Result<Vec<PathBuf>> {
        let object = self.repo.repo.revparse_single(since).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                CheckpointError::RevisionNotFound(since.to_string())
            } else {
                CheckpointError::Git2(e)
            }
        })?;

        let tree = object.peel_to_tree()?;

        let mut opts = git2::DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);

        let diff = self
            .repo
            .repo
            .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut opts))?;

        let mut paths = Vec::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path() {
                    let path = path.to_path_buf();
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
            }
        }

        debug!(since, changed = paths.len(), "computed changed paths");
        Ok(paths)
    }

    fn latest_checkpoint(&self) -> Result<Option<String>> {
        Ok(self.checkpoint_tags()?.pop())
    }

    #[instrument(skip(self))]
    fn create_checkpoint(&self) -> Result<String> {
        let name = format!("{}-{}", self.prefix, Utc::now().format("%Y%m%d%H%M%S"));

        let tag_ref = format!("refs/tags/{}", name);
        if self.repo.repo.find_reference(&tag_ref).is_ok() {
            return Err(CheckpointError::CheckpointExists(name));
        }

        let head = self.repo.head_commit()?;
        self.repo
            .repo
            .tag_lightweight(&name, head.as_object(), false)?;

        info!(name, "created checkpoint");
        Ok(name)
    }

    #[instrument(skip(self))]
    fn delete_checkpoint(&self, name: &str) -> Result<()> {
        self.repo.repo.tag_delete(name)?;
        info!(name, "deleted checkpoint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, workdir: &Path, file: &str, content: &str) {
        let sig = Signature::now("Test", "test@example.com").unwrap();

        if let Some(parent) = Path::new(file).parent() {
            std::fs::create_dir_all(workdir.join(parent)).unwrap();
        }
        std::fs::write(workdir.join(file), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(file)).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let parent = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, "commit", &tree, &parents)
            .unwrap();
    }

    fn setup() -> (TempDir, GitCheckpoints) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit_file(&repo, temp.path(), "packages/core/index.js", "a");

        let store = GitCheckpoints::new(GitRepo::open(temp.path()).unwrap(), "smartrun");
        (temp, store)
    }

    #[test]
    fn test_no_checkpoint_initially() {
        let (_temp, store) = setup();
        assert!(store.latest_checkpoint().unwrap().is_none());
    }

    #[test]
    fn test_create_and_find_checkpoint() {
        let (_temp, store) = setup();
        let name = store.create_checkpoint().unwrap();
        assert!(name.starts_with("smartrun-"));
        assert_eq!(store.latest_checkpoint().unwrap(), Some(name));
    }

    #[test]
    fn test_latest_picks_greatest_timestamp() {
        let (_temp, store) = setup();
        let head = store.repo.head_commit().unwrap();
        for name in ["smartrun-20240101000000", "smartrun-20250101000000"] {
            store
                .repo
                .repo
                .tag_lightweight(name, head.as_object(), false)
                .unwrap();
        }
        // Tags under another prefix are not checkpoints
        store
            .repo
            .repo
            .tag_lightweight("v1.0.0", head.as_object(), false)
            .unwrap();

        assert_eq!(
            store.latest_checkpoint().unwrap(),
            Some("smartrun-20250101000000".to_string())
        );
    }

    #[test]
    fn test_delete_checkpoint() {
        let (_temp, store) = setup();
        let name = store.create_checkpoint().unwrap();
        store.delete_checkpoint(&name).unwrap();
        assert!(store.latest_checkpoint().unwrap().is_none());
    }

    #[test]
    fn test_changed_paths_since_checkpoint() {
        let (temp, store) = setup();
        let name = store.create_checkpoint().unwrap();

        let repo = Repository::open(temp.path()).unwrap();
        commit_file(&repo, temp.path(), "packages/utils/index.js", "b");

        let paths = store.changed_paths(&name).unwrap();
        assert!(paths.contains(&PathBuf::from("packages/utils/index.js")));
        assert!(!paths.contains(&PathBuf::from("packages/core/index.js")));
    }

    #[test]
    fn test_uncommitted_changes_count() {
        let (temp, store) = setup();
        let name = store.create_checkpoint().unwrap();

        std::fs::write(temp.path().join("packages/core/index.js"), "modified").unwrap();

        let paths = store.changed_paths(&name).unwrap();
        assert!(paths.contains(&PathBuf::from("packages/core/index.js")));
    }

    #[test]
    fn test_changed_paths_are_relative_to_workdir() {
        let (temp, store) = setup();
        let name = store.create_checkpoint().unwrap();

        let repo = Repository::open(temp.path()).unwrap();
        commit_file(&repo, temp.path(), "frontend/packages/app/index.js", "x");

        assert_eq!(
            store.workdir().canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
        let paths = store.changed_paths(&name).unwrap();
        assert!(paths.contains(&PathBuf::from("frontend/packages/app/index.js")));
    }

    #[test]
    fn test_missing_revision() {
        let (_temp, store) = setup();
        let result = store.changed_paths("smartrun-19700101000000");
        assert!(matches!(
            result,
            Err(CheckpointError::RevisionNotFound(_))
        ));
    }
}
