//! Orchestration facade.
//!
//! Glues the store, workspace manager, phase controller, and scheduler
//! together into the operations an external driver calls: create a
//! feature, advance its phase, fetch and report tasks, archive or
//! discard it. Every operation loads the feature record, applies one
//! change, and persists it before returning.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{Config, STATE_DIR};
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureDocs, Phase, PhaseController};
use crate::feature::slug::{derive_branch, slugify, validate_branch};
use crate::graph::TaskGraph;
use crate::scheduler::ExecutionScheduler;
use crate::store::{FeatureStore, IdAllocator};
use crate::task::TaskOutcome;
use crate::workspace::{MergeReport, WorkspaceManager, WorkspaceStatus};

/// Feature workflow orchestrator rooted at one repository.
pub struct Orchestrator {
    repo_root: PathBuf,
    config: Config,
    store: FeatureStore,
    allocator: IdAllocator,
    workspaces: WorkspaceManager,
    scheduler: ExecutionScheduler,
}

impl Orchestrator {
    /// Open an orchestrator for a repository, loading its config.
    pub fn open(repo_root: impl Into<PathBuf>) -> Result<Self> {
        let repo_root = repo_root.into();
        let config =
            Config::load(&repo_root).map_err(|e| Error::Config(e.to_string()))?;
        Self::with_config(repo_root, config)
    }

    /// Open an orchestrator with an explicit config.
    pub fn with_config(repo_root: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let repo_root = repo_root.into();
        let state_dir = repo_root.join(STATE_DIR);
        let store = FeatureStore::open(&state_dir)?;
        let allocator = IdAllocator::open(&state_dir)?;
        let workspaces = WorkspaceManager::new(
            &repo_root,
            repo_root.join(&config.workspace.root),
            config.general.base_branch.clone(),
        );
        let scheduler = ExecutionScheduler::from_config(&config.scheduler);
        Ok(Self {
            repo_root,
            config,
            store,
            allocator,
            workspaces,
            scheduler,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Create a feature: allocate an id, derive slug and branch, create
    /// the workspace, and seed the specification artifact.
    pub fn create_feature(&self, name_hint: &str) -> Result<Feature> {
        let slug = slugify(
            name_hint,
            self.config.general.max_slug_words,
            self.config.general.max_slug_length,
        );
        if slug.is_empty() {
            return Err(Error::InvalidSlug(name_hint.to_string()));
        }

        let id = self.allocator.next()?;
        let branch = derive_branch(id, &slug);
        validate_branch(&branch)?;

        let workspace = self.workspaces.create(&branch)?;

        let feature = Feature::new(id, slug, branch.clone(), workspace.path.clone());
        let docs = FeatureDocs::new(&workspace.path, &branch);
        docs.seed_spec(&feature.name())?;

        if let Err(err) = self.store.save(&feature) {
            // Do not leave a workspace with no record behind.
            warn!(feature = id, error = %err, "record save failed; rolling back workspace");
            if let Err(rollback) = self.workspaces.discard(&branch, true) {
                warn!(feature = id, error = %rollback, "workspace rollback failed");
            }
            return Err(err);
        }

        info!(feature = id, branch = %feature.branch, "feature created");
        Ok(feature)
    }

    /// Advance a feature to its next phase, enforcing the gate.
    ///
    /// Entering `plan` and `tasks` seeds the corresponding artifact
    /// template; passing the tasks gate persists the parsed task list.
    /// From `review`, advancing delegates to [`Self::archive_feature`]
    /// with the configured base branch as target.
    pub fn advance_phase(&self, feature_id: u32) -> Result<Feature> {
        let mut feature = self.store.load(feature_id)?;

        if feature.phase.is_terminal() {
            return Err(Error::PhaseGateNotSatisfied {
                feature: feature_id,
                phase: feature.phase,
                reason: "feature is in a terminal phase".to_string(),
            });
        }
        if feature.phase == Phase::Review {
            self.archive_feature(feature_id, None, false)?;
            return self.store.load(feature_id);
        }

        let docs = self.docs_for(&feature)?;

        let controller = PhaseController::new(&self.scheduler);
        let (target, tasks) = controller.check_gate(&feature, &docs)?;

        if let Some(tasks) = tasks {
            feature.tasks = tasks;
        }
        let from = feature.phase;
        feature.phase = target;

        match target {
            Phase::Plan => docs.seed_plan(&feature.name())?,
            Phase::Tasks => docs.seed_tasks(&feature.name())?,
            _ => {}
        }

        self.store.save(&feature)?;
        info!(feature = feature_id, from = %from, to = %target, "phase advanced");
        Ok(feature)
    }

    /// Next batch of dispatchable task ids for a feature.
    ///
    /// Returned tasks are marked in progress and persisted. Surfaces a
    /// deadlock instead of returning an empty batch when pending tasks
    /// can never become ready.
    pub fn next_tasks(&self, feature_id: u32) -> Result<Vec<String>> {
        let mut feature = self.store.load(feature_id)?;
        PhaseController::require_phase(&feature, "next_tasks", Phase::Implement)?;

        let graph = TaskGraph::build(&feature.tasks)?;
        let batch = self.scheduler.next_batch(&graph, &mut feature.tasks);

        if batch.is_empty() && self.scheduler.has_deadlock(&graph, &feature.tasks) {
            return Err(Error::DeadlockDetected {
                blocked: self.scheduler.pending_ids(&feature.tasks).collect(),
            });
        }

        self.store.save(&feature)?;
        Ok(batch)
    }

    /// Report the outcome of a dispatched task.
    pub fn report_task(
        &self,
        feature_id: u32,
        task_id: &str,
        outcome: TaskOutcome,
        reason: Option<&str>,
    ) -> Result<Feature> {
        let mut feature = self.store.load(feature_id)?;
        PhaseController::require_phase(&feature, "report_task", Phase::Implement)?;

        self.scheduler
            .report(&mut feature.tasks, task_id, outcome, reason)?;
        self.store.save(&feature)?;
        Ok(feature)
    }

    /// Merge the feature branch and archive the feature.
    ///
    /// Only legal in the `review` phase. The workspace is removed after a
    /// successful merge, and the record is marked archived only after the
    /// workspace is gone.
    pub fn archive_feature(
        &self,
        feature_id: u32,
        target_branch: Option<&str>,
        force: bool,
    ) -> Result<MergeReport> {
        let mut feature = self.store.load(feature_id)?;
        PhaseController::require_phase(&feature, "archive", Phase::Review)?;

        let target = target_branch.unwrap_or(&self.config.general.base_branch);
        let report = self.workspaces.archive(&feature.branch, target, force)?;

        feature.workspace_path = None;
        feature.phase = Phase::Archived;
        self.store.save(&feature)?;

        info!(feature = feature_id, target, "feature archived");
        Ok(report)
    }

    /// Tear a feature down without merging.
    ///
    /// Legal from any non-terminal phase; requires `force` when the
    /// workspace has uncommitted modifications. The feature ends in the
    /// `cancelled` phase, not `archived`.
    pub fn discard_feature(&self, feature_id: u32, force: bool) -> Result<()> {
        let mut feature = self.store.load(feature_id)?;
        PhaseController::require_cancellable(&feature)?;

        if feature.workspace_path.is_some() {
            self.workspaces.discard(&feature.branch, force)?;
        }

        feature.workspace_path = None;
        feature.phase = Phase::Cancelled;
        self.store.save(&feature)?;

        info!(feature = feature_id, "feature discarded");
        Ok(())
    }

    /// All features that are not archived or cancelled.
    pub fn list_active_features(&self) -> Result<Vec<Feature>> {
        self.store.list_active()
    }

    /// Load a single feature record.
    pub fn feature(&self, feature_id: u32) -> Result<Feature> {
        self.store.load(feature_id)
    }

    /// Health probe for a feature's workspace.
    pub fn workspace_status(&self, feature_id: u32) -> Result<WorkspaceStatus> {
        let feature = self.store.load(feature_id)?;
        self.workspaces.status(&feature.branch)
    }

    fn docs_for(&self, feature: &Feature) -> Result<FeatureDocs> {
        let workspace = feature.workspace_path.as_deref().ok_or_else(|| {
            Error::PhaseGateNotSatisfied {
                feature: feature.id,
                phase: feature.phase,
                reason: "feature has no workspace".to_string(),
            }
        })?;
        Ok(FeatureDocs::new(workspace, &feature.branch))
    }
}
