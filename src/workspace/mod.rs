//! Feature workspace lifecycle.
//!
//! Every feature gets an isolated Git worktree bound 1:1 to its branch.
//! Creation is atomic (a failed worktree bind rolls the branch back),
//! archival merges the branch before anything is removed, and discard
//! refuses to drop uncommitted work without force. Ordering is
//! load-bearing throughout: merge before removal, removal before the
//! caller marks the feature archived, so a crash mid-sequence leaves
//! recoverable, inspectable state.

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, ErrorCode, FileFavor, MergeOptions, Repository, Signature, StatusOptions,
    WorktreeAddOptions, WorktreePruneOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// An isolated, branch-bound working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Worktree directory
    pub path: PathBuf,

    /// Branch checked out in the worktree (1:1)
    pub branch: String,
}

/// Health probe result for a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    /// Directory exists on disk
    pub exists: bool,

    /// Worktree is registered with the repository
    pub registered: bool,

    /// No uncommitted modifications (meaningless when `exists` is false)
    pub is_clean: bool,
}

/// Result of integrating a feature branch into a target branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    /// Feature branch that was merged
    pub branch: String,

    /// Branch merged into
    pub target: String,

    /// Merge base commit id, when one exists
    pub merge_base: Option<String>,

    /// Created merge commit id
    pub merge_commit: String,

    /// Whether conflicts were overridden in favor of the feature branch
    pub forced: bool,
}

/// Manages feature worktrees of one repository.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    repo_root: PathBuf,
    workspace_root: PathBuf,
    base_branch: String,
}

impl WorkspaceManager {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        workspace_root: impl Into<PathBuf>,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            workspace_root: workspace_root.into(),
            base_branch: base_branch.into(),
        }
    }

    /// Workspace directory for a branch. Pure in the branch name.
    pub fn workspace_path(&self, branch: &str) -> PathBuf {
        self.workspace_root.join(branch)
    }

    /// Create the branch and bind a worktree to it.
    ///
    /// The branch must not exist anywhere in the repository and the
    /// workspace path must be vacant. If the worktree bind fails after
    /// the branch was created, the branch is deleted before returning.
    pub fn create(&self, branch: &str) -> Result<Workspace> {
        let repo = self.open_repo()?;
        let path = self.workspace_path(branch);

        if repo.find_branch(branch, BranchType::Local).is_ok() {
            return Err(Error::BranchExists(branch.to_string()));
        }
        if path.exists() {
            return Err(Error::PathExists(path));
        }

        let base_commit = repo
            .find_branch(&self.base_branch, BranchType::Local)
            .map_err(|_| Error::BaseBranchMissing(self.base_branch.clone()))?
            .get()
            .peel_to_commit()?;

        fs::create_dir_all(&self.workspace_root)?;

        let mut new_branch = repo.branch(branch, &base_commit, false)?;

        let bind = {
            let mut opts = WorktreeAddOptions::new();
            opts.reference(Some(new_branch.get()));
            repo.worktree(branch, &path, Some(&opts))
        };

        if let Err(err) = bind {
            // Roll back so no orphaned branch survives a failed bind.
            if let Err(del_err) = new_branch.delete() {
                warn!(branch, error = %del_err, "failed to roll back branch after worktree bind failure");
            }
            return Err(err.into());
        }

        info!(branch, path = %path.display(), "workspace created");
        Ok(Workspace {
            path,
            branch: branch.to_string(),
        })
    }

    /// Merge the feature branch into `target` and remove the workspace.
    ///
    /// A trial three-way merge runs first; if it reports conflicts and
    /// `force` is false, nothing is mutated and the conflicted paths are
    /// returned in the error. With `force`, conflicts resolve in favor of
    /// the feature branch. The merge is always a non-fast-forward merge
    /// commit so feature history stays inspectable.
    pub fn archive(&self, branch: &str, target: &str, force: bool) -> Result<MergeReport> {
        let repo = self.open_repo()?;

        let feature_commit = repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let target_commit = repo
            .find_branch(target, BranchType::Local)
            .map_err(|_| Error::BaseBranchMissing(target.to_string()))?
            .get()
            .peel_to_commit()?;

        let merge_base = repo
            .merge_base(target_commit.id(), feature_commit.id())
            .ok()
            .map(|oid| oid.to_string());

        // Trial merge: in-memory three-way, no commit, no mutation.
        let trial = repo.merge_commits(&target_commit, &feature_commit, None)?;
        if trial.has_conflicts() && !force {
            return Err(Error::WouldConflict {
                branch: branch.to_string(),
                target: target.to_string(),
                paths: conflicted_paths(&trial),
            });
        }

        // With force, redo the merge resolving content conflicts toward
        // the feature side; a clean trial is reused as-is.
        let mut merged = if force {
            let mut opts = MergeOptions::new();
            opts.file_favor(FileFavor::Theirs);
            repo.merge_commits(&target_commit, &feature_commit, Some(&opts))?
        } else {
            trial
        };
        if merged.has_conflicts() {
            // Even file-favor cannot settle these (e.g. delete/modify).
            return Err(Error::WouldConflict {
                branch: branch.to_string(),
                target: target.to_string(),
                paths: conflicted_paths(&merged),
            });
        }

        let tree_oid = merged.write_tree_to(&repo)?;
        let tree = repo.find_tree(tree_oid)?;
        let sig = signature(&repo)?;
        let message = format!("Merge branch '{branch}' into {target}");
        let merge_commit = repo.commit(
            Some(&format!("refs/heads/{target}")),
            &sig,
            &sig,
            &message,
            &tree,
            &[&target_commit, &feature_commit],
        )?;

        // If the target branch is checked out in the main worktree, bring
        // its working directory up to the merge commit.
        if repo.head().ok().and_then(|h| h.shorthand().map(String::from)).as_deref()
            == Some(target)
        {
            repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
        }

        info!(branch, target, commit = %merge_commit, forced = force, "feature branch merged");

        // Merge is durable; only now may the workspace go away.
        self.remove_worktree(&repo, branch)?;
        self.delete_branch(&repo, branch)?;

        Ok(MergeReport {
            branch: branch.to_string(),
            target: target.to_string(),
            merge_base,
            merge_commit: merge_commit.to_string(),
            forced: force,
        })
    }

    /// Remove the workspace and branch without merging.
    ///
    /// Refuses when the worktree has uncommitted modifications unless
    /// `force` is given.
    pub fn discard(&self, branch: &str, force: bool) -> Result<()> {
        let repo = self.open_repo()?;
        let path = self.workspace_path(branch);

        if path.exists() && !self.is_clean(&path)? && !force {
            return Err(Error::DirtyWorkspace(branch.to_string()));
        }

        self.remove_worktree(&repo, branch)?;
        self.delete_branch(&repo, branch)?;
        info!(branch, "workspace discarded");
        Ok(())
    }

    /// Probe workspace health without mutating anything.
    pub fn status(&self, branch: &str) -> Result<WorkspaceStatus> {
        let repo = self.open_repo()?;
        let path = self.workspace_path(branch);

        let exists = path.is_dir();
        let registered = repo.find_worktree(branch).is_ok();
        let is_clean = if exists { self.is_clean(&path)? } else { false };

        Ok(WorkspaceStatus {
            exists,
            registered,
            is_clean,
        })
    }

    /// Whether the worktree at `path` has no uncommitted modifications.
    fn is_clean(&self, path: &Path) -> Result<bool> {
        let repo = Repository::open(path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false)
            .include_unmodified(false);
        let statuses = repo.statuses(Some(&mut opts))?;
        Ok(statuses.is_empty())
    }

    fn open_repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.repo_root)?)
    }

    /// Prune the worktree registration and remove its directory.
    fn remove_worktree(&self, repo: &Repository, branch: &str) -> Result<()> {
        match repo.find_worktree(branch) {
            Ok(wt) => {
                let mut opts = WorktreePruneOptions::new();
                opts.valid(true).working_tree(true).locked(true);
                wt.prune(Some(&mut opts))?;
            }
            Err(err) if err.code() == ErrorCode::NotFound => {
                debug!(branch, "worktree not registered; cleaning directory only");
            }
            Err(err) => return Err(err.into()),
        }

        let path = self.workspace_path(branch);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        Ok(())
    }

    fn delete_branch(&self, repo: &Repository, branch: &str) -> Result<()> {
        match repo.find_branch(branch, BranchType::Local) {
            Ok(mut b) => {
                b.delete()?;
                debug!(branch, "branch deleted");
                Ok(())
            }
            Err(err) if err.code() == ErrorCode::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Paths of all conflicted entries in an index.
fn conflicted_paths(index: &git2::Index) -> Vec<String> {
    let Ok(conflicts) = index.conflicts() else {
        return Vec::new();
    };
    let mut paths: Vec<String> = conflicts
        .filter_map(std::result::Result::ok)
        .filter_map(|c| {
            c.our
                .or(c.their)
                .or(c.ancestor)
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Commit signature, falling back to an application identity when the
/// repository has no user configured.
fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig),
        Err(_) => Ok(Signature::now("treeline", "treeline@localhost")?),
    }
}
