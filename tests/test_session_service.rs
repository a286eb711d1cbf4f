// ABOUTME: Tests for the session service lifecycle and reconciliation
// Runs the real repository on a temp directory against the in-memory fake multiplexer

mod common;

use common::{sample_session, FakeMultiplexer, Harness};
use muxkeep::models::SessionStatus;
use muxkeep::multiplexer::AdapterRegistry;
use muxkeep::session::{SessionError, SessionService};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_list_reconciles_with_single_backend_query() {
    // BEHAVIOR: List reports Connected/Active/Inactive from one multiplexer listing
    let harness = Harness::new();
    for name in ["a", "b", "c"] {
        harness.repository.save(&sample_session(name)).unwrap();
    }
    harness.multiplexer.add_running("a", true, 2);
    harness.multiplexer.add_running("b", false, 1);

    let sessions = harness.service.list_sessions().await.unwrap();

    let statuses: Vec<(String, SessionStatus)> = sessions
        .iter()
        .map(|s| (s.name.clone(), s.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("a".to_string(), SessionStatus::Connected),
            ("b".to_string(), SessionStatus::Active),
            ("c".to_string(), SessionStatus::Inactive),
        ]
    );
    assert_eq!(harness.multiplexer.list_calls(), 1);

    let panes: Vec<usize> = sessions.iter().map(|s| s.pane_count).collect();
    assert_eq!(panes, vec![2, 1, 0]);
    assert_eq!(harness.multiplexer.pane_list_calls(), 1);
}

#[tokio::test]
async fn test_list_without_running_sessions_skips_pane_query() {
    // BEHAVIOR: Nothing running means no pane listing at all
    let harness = Harness::new();
    harness.repository.save(&sample_session("idle")).unwrap();

    let sessions = harness.service.list_sessions().await.unwrap();

    assert_eq!(sessions[0].pane_count, 0);
    assert_eq!(harness.multiplexer.pane_list_calls(), 0);
}

#[tokio::test]
async fn test_list_ignores_stale_persisted_status() {
    // BEHAVIOR: A persisted Active status never survives a read when nothing is running
    let harness = Harness::new();
    let mut stale = sample_session("ghost");
    stale.status = SessionStatus::Connected;
    harness.repository.save(&stale).unwrap();

    let sessions = harness.service.list_sessions().await.unwrap();

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Inactive);
}

#[tokio::test]
async fn test_list_reports_corrupt_records() {
    // BEHAVIOR: A corrupt record is skipped but counted
    let harness = Harness::new();
    harness.repository.save(&sample_session("ok")).unwrap();
    std::fs::write(
        harness.repository.storage_path().join("0bad0bad-0000-4000-8000-000000000000.json"),
        "{\"id\": ",
    )
    .unwrap();

    let report = harness.service.list_sessions_with_report().await.unwrap();

    assert_eq!(report.sessions.len(), 1);
    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test]
async fn test_create_persists_and_starts_session() {
    // BEHAVIOR: Create stores an Active record and starts the live session
    let harness = Harness::new();

    let created = harness
        .service
        .create_session("api", "backend work", &harness.project_dir())
        .await
        .unwrap();

    assert_eq!(created.status, SessionStatus::Active);
    assert_eq!(created.backend, "fake");
    assert_eq!(created.project_path, harness.project_dir());
    assert!(harness.multiplexer.is_live("api"));

    let stored = harness.repository.find_by_name("api").unwrap();
    assert_eq!(stored.id, created.id);
    assert_eq!(stored.description, "backend work");
    assert_eq!(stored.status, SessionStatus::Active);
}

#[tokio::test]
async fn test_create_flushes_name_index() {
    // BEHAVIOR: A created session is resolvable by name from a freshly opened repository
    let harness = Harness::new();
    let created = harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();

    let reopened = muxkeep::session::SessionRepository::open(harness.repository.storage_path()).unwrap();
    assert_eq!(reopened.find_by_name("api").unwrap().id, created.id);
}

#[tokio::test]
async fn test_duplicate_create_is_rejected_before_any_write() {
    // BEHAVIOR: A second create with the same name fails with AlreadyExists and changes nothing
    let harness = Harness::new();
    let first = harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();

    let result = harness
        .service
        .create_session("api", "other", &harness.project_dir())
        .await;

    assert!(matches!(result, Err(SessionError::AlreadyExists(name)) if name == "api"));
    assert_eq!(harness.multiplexer.create_calls(), 1);

    let records = harness.repository.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, first.id);
}

#[tokio::test]
async fn test_invalid_name_is_rejected() {
    // BEHAVIOR: Names tmux would rewrite are refused up front
    let harness = Harness::new();

    let result = harness
        .service
        .create_session("my.session", "", &harness.project_dir())
        .await;

    assert!(matches!(result, Err(SessionError::InvalidName { .. })));
    assert!(harness.repository.list().unwrap().is_empty());
    assert_eq!(harness.multiplexer.create_calls(), 0);
}

#[tokio::test]
async fn test_failed_start_keeps_inactive_record() {
    // BEHAVIOR: When the multiplexer fails, the record is kept as Inactive and an error is returned
    let harness = Harness::new();
    harness.multiplexer.fail_create();

    let err = harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap_err();

    let partial = err.partial_session().expect("partial record is returned");
    assert_eq!(partial.name, "api");
    assert_eq!(partial.status, SessionStatus::Inactive);

    let stored = harness.repository.find_by_name("api").unwrap();
    assert_eq!(stored.id, partial.id);
    assert_eq!(stored.status, SessionStatus::Inactive);

    let fetched = harness.service.get_session("api").await.unwrap();
    assert_eq!(fetched.status, SessionStatus::Inactive);
}

#[tokio::test]
async fn test_get_by_id_and_name_reconciles() {
    // BEHAVIOR: Get resolves ids and names and reports live status and panes
    let harness = Harness::new();
    let created = harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();
    harness.multiplexer.add_running("api", true, 3);

    let by_id = harness.service.get_session(&created.id.to_string()).await.unwrap();
    let by_name = harness.service.get_session("api").await.unwrap();

    assert_eq!(by_id.id, by_name.id);
    assert_eq!(by_name.status, SessionStatus::Connected);
    assert_eq!(by_name.pane_count, 3);
}

#[tokio::test]
async fn test_get_unknown_session_is_not_found() {
    // BEHAVIOR: Unknown identifiers are NotFound, not backend errors
    let harness = Harness::new();

    let err = harness.service.get_session("nope").await.unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.is_backend_unavailable());
}

#[tokio::test]
async fn test_delete_removes_live_session_and_record() {
    // BEHAVIOR: Delete kills the live session and removes the record and its index entry
    let harness = Harness::new();
    let created = harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();

    harness.service.delete_session("api").await.unwrap();

    assert_eq!(harness.multiplexer.killed(), vec!["api".to_string()]);
    assert!(harness.repository.find_by_id(created.id).unwrap_err().is_not_found());
    assert!(harness.repository.find_by_name("api").unwrap_err().is_not_found());
    assert!(harness.service.get_session("api").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete_inactive_session_skips_kill() {
    // BEHAVIOR: A session with no live process is removed without a kill
    let harness = Harness::new();
    let record = sample_session("idle");
    harness.repository.save(&record).unwrap();

    harness.service.delete_session(&record.id.to_string()).await.unwrap();

    assert!(harness.multiplexer.killed().is_empty());
    assert!(harness.repository.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_kill_keeps_record() {
    // BEHAVIOR: If the live session cannot be killed the record stays in place
    let harness = Harness::new();
    harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();
    harness.multiplexer.fail_kill_for("api");

    let result = harness.service.delete_session("api").await;

    assert!(matches!(result, Err(SessionError::Multiplexer(_))));
    assert!(harness.repository.find_by_name("api").is_ok());
    assert!(harness.multiplexer.is_live("api"));
}

#[tokio::test]
async fn test_kill_all_attempts_every_session() {
    // BEHAVIOR: Kill-all continues past a failure and reports it with the total attempted
    let harness = Harness::new();
    for name in ["a", "b", "c"] {
        harness
            .service
            .create_session(name, "", &harness.project_dir())
            .await
            .unwrap();
    }
    harness.multiplexer.fail_kill_for("b");

    let err = harness.service.kill_all_sessions().await.unwrap_err();

    match &err {
        SessionError::Aggregate { failures, attempted } => {
            assert_eq!(*attempted, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "b");
        }
        other => panic!("expected Aggregate, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("1 of 3"));
    assert!(message.contains('b'));

    let mut killed = harness.multiplexer.killed();
    killed.sort();
    assert_eq!(killed, vec!["a".to_string(), "c".to_string()]);

    let remaining: Vec<String> = harness
        .repository
        .list()
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(remaining, vec!["b".to_string()]);
}

#[tokio::test]
async fn test_kill_all_on_success_returns_count() {
    // BEHAVIOR: Kill-all with no failures reports how many sessions were removed
    let harness = Harness::new();
    for name in ["a", "b"] {
        harness
            .service
            .create_session(name, "", &harness.project_dir())
            .await
            .unwrap();
    }

    assert_eq!(harness.service.kill_all_sessions().await.unwrap(), 2);
    assert!(harness.repository.list().unwrap().is_empty());
}

#[tokio::test]
async fn test_attach_passes_through_and_updates_snapshot() {
    // BEHAVIOR: Attach hands off to the multiplexer and leaves an Active snapshot afterwards
    let harness = Harness::new();
    let created = harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();

    harness.service.attach_to_session("api").await.unwrap();

    assert_eq!(harness.multiplexer.attached(), vec!["api".to_string()]);
    let stored = harness.repository.find_by_id(created.id).unwrap();
    assert_eq!(stored.status, SessionStatus::Active);
    assert!(stored.last_active >= created.last_active);
}

#[tokio::test]
async fn test_attach_to_stopped_session_fails() {
    // BEHAVIOR: Attaching to a session with no live process is refused
    let harness = Harness::new();
    harness.repository.save(&sample_session("idle")).unwrap();

    let result = harness.service.attach_to_session("idle").await;

    assert!(matches!(result, Err(SessionError::NotRunning(name)) if name == "idle"));
    assert!(harness.multiplexer.attached().is_empty());
}

#[tokio::test]
async fn test_is_session_running() {
    // BEHAVIOR: Running checks resolve through the repository and never error
    let harness = Harness::new();
    harness
        .service
        .create_session("api", "", &harness.project_dir())
        .await
        .unwrap();
    harness.repository.save(&sample_session("idle")).unwrap();

    assert!(harness.service.is_session_running("api").await);
    assert!(!harness.service.is_session_running("idle").await);
    assert!(!harness.service.is_session_running("missing").await);
}

#[tokio::test]
async fn test_registry_injects_fake_backend() {
    // BEHAVIOR: A registered adapter is what the service ends up driving
    let harness = Harness::new();
    let registry = AdapterRegistry::new();
    registry.register("fake", "fake_", Arc::new(FakeMultiplexer::new()));

    let adapter = registry.get("fake", "fake_").unwrap();
    let service = SessionService::new(Arc::clone(&harness.repository), adapter);

    assert_eq!(service.get_backend_name(), "fake");
    assert!(service.is_backend_available());
}
