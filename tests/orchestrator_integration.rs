//! Orchestrator Integration Tests
//!
//! Exercises the full feature pipeline against real temporary Git
//! repositories: create → specify → plan → tasks → implement → review →
//! archive, plus discard and failure paths.

use std::path::Path;

use git2::{BranchType, Repository};
use treeline::{Config, Error, Orchestrator, Phase, TaskOutcome};

/// Initialize a repository with an initial commit on `main`.
fn init_repo(dir: &Path) -> Repository {
    let repo = Repository::init(dir).unwrap();
    {
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "test").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();
    }
    commit_file(&repo, "README.md", "# test repo\n", "initial commit");
    {
        let head_commit = repo.head().unwrap().peel_to_commit().unwrap();
        if repo.find_branch("main", BranchType::Local).is_err() {
            repo.branch("main", &head_commit, true).unwrap();
            repo.set_head("refs/heads/main").unwrap();
        }
    }
    repo
}

/// Write a file in the repo workdir and commit it to HEAD.
fn commit_file(repo: &Repository, name: &str, content: &str, message: &str) {
    let workdir = repo.workdir().unwrap();
    let full = workdir.join(name);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&full, content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = repo.signature().unwrap();
    let parents: Vec<git2::Commit> = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap();
}

/// Commit all pending changes in a worktree.
fn commit_all(workspace: &Path, message: &str) {
    let repo = Repository::open(workspace).unwrap();
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_oid = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = git2::Signature::now("test", "test@example.com").unwrap();
    let parent = repo.head().unwrap().peel_to_commit().unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
        .unwrap();
}

/// Write the tasks artifact for a feature workspace.
fn write_tasks(workspace: &Path, branch: &str, content: &str) {
    let dir = workspace.join("specs").join(branch);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("tasks.md"), content).unwrap();
}

/// Drive a fresh feature up to the implement phase with the given tasks.
fn feature_in_implement(orchestrator: &Orchestrator, tasks_md: &str) -> u32 {
    let feature = orchestrator.create_feature("user authentication").unwrap();
    let id = feature.id;
    let workspace = feature.workspace_path.clone().unwrap();

    orchestrator.advance_phase(id).unwrap(); // specify -> plan (spec seeded)
    orchestrator.advance_phase(id).unwrap(); // plan -> tasks (plan seeded)
    write_tasks(&workspace, &feature.branch, tasks_md);
    orchestrator.advance_phase(id).unwrap(); // tasks -> implement
    id
}

const TASKS_MD: &str = r#"# Tasks: user authentication

## Phase 1: Setup

- [ ] T001 Scaffold the auth module `src/auth/mod.rs`
- [ ] T002 [P] Add login form
- [ ] T003 [P] Add logout button

## Phase 2: Integration

- [ ] T004 Wire auth into the app (depends: T001)
"#;

#[test]
fn test_feature_ids_monotonic_and_never_reused() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let first = orchestrator.create_feature("first feature").unwrap();
    let second = orchestrator.create_feature("second feature").unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);

    // Discarding does not free the id.
    orchestrator.discard_feature(first.id, true).unwrap();
    let third = orchestrator.create_feature("third feature").unwrap();
    assert_eq!(third.id, 3);
}

#[test]
fn test_created_feature_has_workspace_and_spec() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let feature = orchestrator.create_feature("user authentication").unwrap();
    assert_eq!(feature.branch, "001-user-authentication");
    assert_eq!(feature.phase, Phase::Specify);

    let workspace = feature.workspace_path.unwrap();
    assert!(workspace.is_dir());
    assert!(workspace
        .join("specs")
        .join(&feature.branch)
        .join("spec.md")
        .is_file());
}

#[test]
fn test_phase_gates_enforced_in_order() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let feature = orchestrator.create_feature("gated feature").unwrap();
    let id = feature.id;

    // specify -> plan and plan -> tasks pass on the seeded artifacts.
    let workspace = feature.workspace_path.clone().unwrap();
    assert_eq!(orchestrator.advance_phase(id).unwrap().phase, Phase::Plan);
    assert_eq!(orchestrator.advance_phase(id).unwrap().phase, Phase::Tasks);

    // Remove the tasks artifact so the tasks -> implement gate fails.
    let tasks_path = workspace
        .join("specs")
        .join(&feature.branch)
        .join("tasks.md");
    std::fs::remove_file(&tasks_path).unwrap();

    let err = orchestrator.advance_phase(id).unwrap_err();
    assert!(matches!(err, Error::PhaseGateNotSatisfied { .. }));

    // State unchanged by the failed attempt.
    assert_eq!(orchestrator.feature(id).unwrap().phase, Phase::Tasks);
}

#[test]
fn test_implement_gate_requires_all_tasks_resolved() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();
    let id = feature_in_implement(&orchestrator, TASKS_MD);

    let err = orchestrator.advance_phase(id).unwrap_err();
    assert!(matches!(err, Error::PhaseGateNotSatisfied { .. }));
}

#[test]
fn test_scheduling_scenario_narrow_then_wide() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();
    let id = feature_in_implement(&orchestrator, TASKS_MD);

    // T001 alone first.
    let batch = orchestrator.next_tasks(id).unwrap();
    assert_eq!(batch, vec!["T001".to_string()]);

    // Idempotent until reported.
    assert_eq!(orchestrator.next_tasks(id).unwrap(), batch);

    orchestrator
        .report_task(id, "T001", TaskOutcome::Completed, None)
        .unwrap();

    // Parallel pair as one batch.
    let batch = orchestrator.next_tasks(id).unwrap();
    assert_eq!(batch, vec!["T002".to_string(), "T003".to_string()]);

    orchestrator
        .report_task(id, "T002", TaskOutcome::Completed, None)
        .unwrap();
    orchestrator
        .report_task(id, "T003", TaskOutcome::Completed, None)
        .unwrap();

    let batch = orchestrator.next_tasks(id).unwrap();
    assert_eq!(batch, vec!["T004".to_string()]);

    orchestrator
        .report_task(id, "T004", TaskOutcome::Completed, None)
        .unwrap();

    // All resolved: implement -> review now passes.
    let feature = orchestrator.advance_phase(id).unwrap();
    assert_eq!(feature.phase, Phase::Review);
}

#[test]
fn test_skipped_dependency_unblocks_dependent() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();
    let tasks_md = "- [ ] T001 Base work\n- [ ] T002 Follow-up (depends: T001)\n";
    let id = feature_in_implement(&orchestrator, tasks_md);

    orchestrator.next_tasks(id).unwrap();
    orchestrator
        .report_task(id, "T001", TaskOutcome::Skipped, Some("descoped"))
        .unwrap();

    let batch = orchestrator.next_tasks(id).unwrap();
    assert_eq!(batch, vec!["T002".to_string()]);
}

#[test]
fn test_strict_skip_policy_surfaces_deadlock() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());

    let mut config = Config::default();
    config.scheduler.skipped_unblocks = false;
    let orchestrator = Orchestrator::with_config(dir.path(), config).unwrap();

    let tasks_md = "- [ ] T001 Base work\n- [ ] T002 Follow-up (depends: T001)\n";
    let id = feature_in_implement(&orchestrator, tasks_md);

    orchestrator.next_tasks(id).unwrap();
    orchestrator
        .report_task(id, "T001", TaskOutcome::Skipped, None)
        .unwrap();

    let err = orchestrator.next_tasks(id).unwrap_err();
    match err {
        Error::DeadlockDetected { blocked } => {
            assert_eq!(blocked, vec!["T002".to_string()]);
        }
        other => panic!("expected deadlock, got {other:?}"),
    }
}

#[test]
fn test_cyclic_tasks_rejected_at_gate() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let feature = orchestrator.create_feature("cyclic feature").unwrap();
    let id = feature.id;
    let workspace = feature.workspace_path.clone().unwrap();

    orchestrator.advance_phase(id).unwrap();
    orchestrator.advance_phase(id).unwrap();
    write_tasks(
        &workspace,
        &feature.branch,
        "- [ ] T001 One (depends: T002)\n- [ ] T002 Two (depends: T001)\n",
    );

    let err = orchestrator.advance_phase(id).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency(_)));
    assert_eq!(orchestrator.feature(id).unwrap().phase, Phase::Tasks);
}

#[test]
fn test_report_requires_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();
    let id = feature_in_implement(&orchestrator, TASKS_MD);

    let err = orchestrator
        .report_task(id, "T001", TaskOutcome::Completed, None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    let err = orchestrator
        .report_task(id, "T999", TaskOutcome::Completed, None)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownTask(_)));
}

#[test]
fn test_full_pipeline_archive() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();
    let tasks_md = "- [ ] T001 Implement the feature\n";
    let id = feature_in_implement(&orchestrator, tasks_md);

    let feature = orchestrator.feature(id).unwrap();
    let workspace = feature.workspace_path.clone().unwrap();

    orchestrator.next_tasks(id).unwrap();
    orchestrator
        .report_task(id, "T001", TaskOutcome::Completed, Some("implemented"))
        .unwrap();
    orchestrator.advance_phase(id).unwrap();

    // Commit the feature's work (including seeded artifacts) so the
    // workspace is clean and the merge carries content.
    std::fs::write(workspace.join("feature.rs"), "pub fn feature() {}\n").unwrap();
    commit_all(&workspace, "implement feature");

    let report = orchestrator.archive_feature(id, None, false).unwrap();
    assert_eq!(report.target, "main");

    let feature = orchestrator.feature(id).unwrap();
    assert_eq!(feature.phase, Phase::Archived);
    assert!(feature.workspace_path.is_none());
    assert!(!workspace.exists());
    assert!(repo
        .find_branch(&feature.branch, BranchType::Local)
        .is_err());
    assert!(dir.path().join("feature.rs").is_file());

    // Archived features are no longer active.
    assert!(orchestrator.list_active_features().unwrap().is_empty());
}

#[test]
fn test_archive_conflict_leaves_feature_in_review() {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();
    let tasks_md = "- [ ] T001 Implement the feature\n";
    let id = feature_in_implement(&orchestrator, tasks_md);

    let feature = orchestrator.feature(id).unwrap();
    let workspace = feature.workspace_path.clone().unwrap();

    orchestrator.next_tasks(id).unwrap();
    orchestrator
        .report_task(id, "T001", TaskOutcome::Completed, None)
        .unwrap();
    orchestrator.advance_phase(id).unwrap();

    // Conflicting edits to README.md on both sides.
    std::fs::write(workspace.join("README.md"), "# feature version\n").unwrap();
    commit_all(&workspace, "feature edit");
    commit_file(&repo, "README.md", "# main version\n", "main edit");

    let err = orchestrator.archive_feature(id, None, false).unwrap_err();
    assert!(matches!(err, Error::WouldConflict { .. }));

    // Phase stays review, workspace untouched.
    let feature = orchestrator.feature(id).unwrap();
    assert_eq!(feature.phase, Phase::Review);
    assert!(workspace.is_dir());
}

#[test]
fn test_archive_requires_review_phase() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let feature = orchestrator.create_feature("early archive").unwrap();
    let err = orchestrator
        .archive_feature(feature.id, None, false)
        .unwrap_err();
    assert!(matches!(err, Error::WrongPhase { .. }));
}

#[test]
fn test_discard_dirty_workspace_requires_force() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    // The seeded spec.md is uncommitted work.
    let feature = orchestrator.create_feature("doomed feature").unwrap();
    let err = orchestrator.discard_feature(feature.id, false).unwrap_err();
    assert!(matches!(err, Error::DirtyWorkspace(_)));

    orchestrator.discard_feature(feature.id, true).unwrap();
    let feature = orchestrator.feature(feature.id).unwrap();
    assert_eq!(feature.phase, Phase::Cancelled);
    assert!(feature.workspace_path.is_none());
}

#[test]
fn test_discard_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let feature = orchestrator.create_feature("one shot").unwrap();
    orchestrator.discard_feature(feature.id, true).unwrap();

    let err = orchestrator.discard_feature(feature.id, false).unwrap_err();
    assert!(matches!(err, Error::WrongPhase { .. }));
}

#[test]
fn test_list_active_features() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    orchestrator.create_feature("feature one").unwrap();
    let second = orchestrator.create_feature("feature two").unwrap();
    orchestrator.discard_feature(second.id, true).unwrap();

    let active = orchestrator.list_active_features().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, 1);
}

#[test]
fn test_workspace_status_probe() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let orchestrator = Orchestrator::open(dir.path()).unwrap();

    let feature = orchestrator.create_feature("probed feature").unwrap();
    let status = orchestrator.workspace_status(feature.id).unwrap();
    assert!(status.exists);
    assert!(status.registered);
    // Seeded spec.md is uncommitted.
    assert!(!status.is_clean);
}
