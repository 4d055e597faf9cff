//! Integration tests for the metadata store protocol against the mock host.

use claudestep::config::DEFAULT_METADATA_BRANCH;
use claudestep::store::{MetadataStore, RetryPolicy, PLACEHOLDER_PATH};
use claudestep::testing::{
    document_path, fixed_time, seeded_hosting, MetadataFixture, MockHosting, FIXTURE_PROJECT,
    SAMPLE_SPEC,
};
use claudestep::{BranchMetadataStore, PrState, ProjectMetadata, PullRequest, StepError, TaskStatus};

fn store(hosting: &MockHosting) -> BranchMetadataStore<&MockHosting> {
    BranchMetadataStore::new(hosting, DEFAULT_METADATA_BRANCH)
        .with_retry_policy(RetryPolicy::immediate(3))
}

// =========================================================================
// Branch bootstrap
// =========================================================================

#[test]
fn test_ensure_branch_exists_is_idempotent() {
    let hosting = MockHosting::new();
    let store = store(&hosting);

    store.ensure_branch_exists().unwrap();
    let after_first = hosting.commit_count();
    assert!(hosting.file(DEFAULT_METADATA_BRANCH, PLACEHOLDER_PATH).is_some());

    store.ensure_branch_exists().unwrap();
    assert_eq!(hosting.commit_count(), after_first);
}

#[test]
fn test_ensure_branch_reports_hosting_failure() {
    let hosting = MockHosting::new().with_api_failure("502 Bad Gateway");
    let err = store(&hosting).ensure_branch_exists().unwrap_err();
    assert!(matches!(err, StepError::Hosting { .. }));
    assert!(err.to_string().contains("502"));
}

// =========================================================================
// Round trip
// =========================================================================

#[test]
fn test_round_trip_through_store() {
    let hosting = MockHosting::new().with_branch(DEFAULT_METADATA_BRANCH);
    let store = store(&hosting);
    let metadata = MetadataFixture::new(FIXTURE_PROJECT)
        .with_checklist(SAMPLE_SPEC)
        .with_pr(1, 10, "alice", PrState::Merged)
        .with_cost(10, "claude-sonnet-4", 0.42)
        // Orphaned: task 9 does not exist
        .with_pr(9, 11, "bob", PrState::Open)
        .build();

    let written = store
        .update(FIXTURE_PROJECT, &mut |doc| {
            *doc = metadata.clone();
            Ok(())
        })
        .unwrap();
    let read = store.get_project(FIXTURE_PROJECT).unwrap().unwrap();
    assert_eq!(read, written.metadata);
    assert_eq!(read.pull_requests.len(), 2);
    assert!((read.total_cost() - 0.42).abs() < 1e-9);
}

#[test]
fn test_missing_project_is_none() {
    let hosting = MockHosting::new().with_branch(DEFAULT_METADATA_BRANCH);
    assert!(store(&hosting).get_project("nope").unwrap().is_none());
    assert!(!store(&hosting).project_exists("nope").unwrap());
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn test_two_writers_from_same_version() {
    let seed = MetadataFixture::new(FIXTURE_PROJECT).with_checklist(SAMPLE_SPEC).build();
    let hosting = seeded_hosting(&[seed]);
    let store = store(&hosting);

    let a = store.read(FIXTURE_PROJECT).unwrap().unwrap();
    let b = store.read(FIXTURE_PROJECT).unwrap().unwrap();
    assert_eq!(a.version, b.version);

    // Writer A lands first
    let pr_a = PullRequest::new(2, 20, "claude-step-auth-2", "alice", fixed_time(5));
    let mut doc_a = a.metadata.clone();
    doc_a.add_pull_request(pr_a.clone());
    let mut no_recompute = |_: Option<ProjectMetadata>| -> claudestep::Result<ProjectMetadata> {
        panic!("writer A must not conflict")
    };
    let v1 = store
        .write(FIXTURE_PROJECT, doc_a, Some(&a.version), &mut no_recompute)
        .unwrap()
        .version;

    // Writer B conflicts once, recomputes from v1 and succeeds
    let pr_b = PullRequest::new(3, 21, "claude-step-auth-3", "bob", fixed_time(6));
    let mut doc_b = b.metadata.clone();
    doc_b.add_pull_request(pr_b.clone());
    let mut observed = Vec::new();
    let mut recompute = |latest: Option<ProjectMetadata>| {
        let mut latest = latest.expect("document exists");
        observed.push(latest.pull_requests.len());
        latest.add_pull_request(pr_b.clone());
        Ok(latest)
    };
    let puts_before = hosting.put_count();
    let final_doc = store
        .write(FIXTURE_PROJECT, doc_b, Some(&b.version), &mut recompute)
        .unwrap();

    assert_eq!(observed, vec![1]);
    assert_eq!(hosting.put_count() - puts_before, 2);
    assert_ne!(final_doc.version, v1);
    let numbers: Vec<u64> = final_doc
        .metadata
        .pull_requests
        .iter()
        .map(|pr| pr.pr_number)
        .collect();
    assert_eq!(numbers, vec![20, 21]);
}

#[test]
fn test_recompute_that_ignores_latest_loses_update() {
    let seed = MetadataFixture::new(FIXTURE_PROJECT).with_checklist(SAMPLE_SPEC).build();
    let hosting = seeded_hosting(&[seed]);
    let store = store(&hosting);
    let stale = store.read(FIXTURE_PROJECT).unwrap().unwrap();

    store
        .update(FIXTURE_PROJECT, &mut |doc| {
            let pr = PullRequest::new(2, 20, "claude-step-auth-2", "alice", fixed_time(5));
            doc.add_pull_request(pr);
            Ok(())
        })
        .unwrap();

    // The store does not merge: whatever recompute returns is what lands
    let replacement = stale.metadata.clone();
    let mut recompute = |_: Option<ProjectMetadata>| Ok(replacement.clone());
    let written = store
        .write(FIXTURE_PROJECT, stale.metadata.clone(), Some(&stale.version), &mut recompute)
        .unwrap();
    assert!(written.metadata.pull_requests.is_empty());
}

#[test]
fn test_retry_bound_surfaces_conflict() {
    let seed = MetadataFixture::new(FIXTURE_PROJECT).with_checklist(SAMPLE_SPEC).build();
    let hosting = seeded_hosting(&[seed.clone()]).with_forced_conflicts(100);
    let store = BranchMetadataStore::new(&hosting, DEFAULT_METADATA_BRANCH)
        .with_retry_policy(RetryPolicy::immediate(2));

    let err = store
        .update(FIXTURE_PROJECT, &mut |doc| doc.set_pr_state(1, PrState::Merged).or(Ok(())))
        .unwrap_err();
    assert!(matches!(err, StepError::Conflict { attempts: 3, .. }));
    assert!(err.is_retryable());

    // Nothing was lost or half-written
    let stored = hosting
        .file(DEFAULT_METADATA_BRANCH, &document_path(FIXTURE_PROJECT))
        .unwrap();
    assert_eq!(ProjectMetadata::from_json(FIXTURE_PROJECT, &stored).unwrap(), seed);
}

// =========================================================================
// Listing and deletion
// =========================================================================

#[test]
fn test_list_and_modified_since() {
    let mut old = MetadataFixture::new("billing").with_checklist(SAMPLE_SPEC).build();
    old.last_updated = fixed_time(0);
    let mut recent = MetadataFixture::new(FIXTURE_PROJECT).with_checklist(SAMPLE_SPEC).build();
    recent.last_updated = fixed_time(600);
    let hosting = seeded_hosting(&[old, recent]);
    let store = store(&hosting);

    let names: Vec<String> = store.list_project_names().unwrap().into_iter().collect();
    assert_eq!(names, vec!["auth".to_string(), "billing".to_string()]);
    assert_eq!(store.get_all_projects().unwrap().len(), 2);

    let modified = store.get_projects_modified_since(fixed_time(300)).unwrap();
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].project, FIXTURE_PROJECT);
}

#[test]
fn test_listing_without_branch_is_empty() {
    let hosting = MockHosting::new();
    assert!(store(&hosting).get_all_projects().unwrap().is_empty());
}

#[test]
fn test_delete_then_absent() {
    let seed = MetadataFixture::new(FIXTURE_PROJECT).with_checklist(SAMPLE_SPEC).build();
    let hosting = seeded_hosting(&[seed]);
    let store = store(&hosting);

    store.delete(FIXTURE_PROJECT).unwrap();
    assert!(store.get_project(FIXTURE_PROJECT).unwrap().is_none());
    store.delete(FIXTURE_PROJECT).unwrap();
}

// =========================================================================
// Status derivation on read
// =========================================================================

#[test]
fn test_newest_pr_decides_status() {
    let metadata = MetadataFixture::new(FIXTURE_PROJECT)
        .with_checklist(SAMPLE_SPEC)
        .with_pr(2, 10, "alice", PrState::Closed)
        .with_pr(2, 11, "alice", PrState::Merged)
        .build();
    let hosting = seeded_hosting(&[metadata]);
    let read = store(&hosting).get_project(FIXTURE_PROJECT).unwrap().unwrap();
    assert_eq!(read.get_task_by_index(2).unwrap().status, TaskStatus::Completed);
}
