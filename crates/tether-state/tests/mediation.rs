//! Mediated calls, loading/error lifecycle and intents

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tether_core::{
    Client, ErrorKind, FileRecord, NewClient, NewFile, StateConfig, StatusSummary, TetherError,
};
use tether_state::{keys, Intent, Observer, ObserverError, Phase, Progress, StateManager};
use tether_testkit::{acme_with_file, assert_failed_with, offline_bridge, ScriptedBackend};

#[tokio::test]
async fn test_successful_call_stores_payload() {
    let (bridge, store) = offline_bridge();
    acme_with_file(&store);
    let state = StateManager::new(bridge);

    let envelope = state.run_mediated("clients", "list_primary", Value::Null).await;
    assert!(envelope.is_success());

    let clients: Vec<Client> = serde_json::from_value(state.get("clients").unwrap()).unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, "acme");

    let entry = state.entry("clients").unwrap();
    assert_eq!(entry.source.as_deref(), Some("list_primary"));
    assert_eq!(entry.phase(), Phase::Idle);
    assert!(!state.is_loading("clients"));
}

type Calls = Arc<Mutex<Vec<(&'static str, Value)>>>;

fn recording(calls: &Calls, label: &'static str) -> Observer {
    let calls = Arc::clone(calls);
    Observer::immediate(move |new, _old| {
        calls.lock().push((label, new.clone()));
        Ok(())
    })
}

#[tokio::test]
async fn test_scenario_c_mediated_refresh_notifies_each_subscriber_once() {
    let (bridge, store) = offline_bridge();
    acme_with_file(&store);
    let state = StateManager::new(bridge);
    let calls: Calls = Arc::default();
    state.subscribe("clients", recording(&calls, "first"));
    state.subscribe("clients", recording(&calls, "second"));

    let envelope = state.run_mediated("clients", "list_primary", Value::Null).await;
    assert!(envelope.is_success());

    let calls = calls.lock().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "first");
    assert_eq!(calls[1].0, "second");
    assert_eq!(calls[0].1, calls[1].1);
    assert_eq!(Some(&calls[0].1), envelope.data());
    assert_eq!(calls[0].1[0]["id"], "acme");
}

#[tokio::test]
async fn test_failing_observer_during_mediated_call() {
    let (bridge, store) = offline_bridge();
    acme_with_file(&store);
    let state = StateManager::new(bridge);
    let calls: Calls = Arc::default();
    state.subscribe(
        "clients",
        Observer::immediate(|_, _| Err(ObserverError::failed("view detached"))),
    );
    state.subscribe("clients", recording(&calls, "survivor"));

    let envelope = state.run_mediated("clients", "list_primary", Value::Null).await;
    assert!(envelope.is_success());
    assert_eq!(calls.lock().len(), 1);
    assert!(!state.is_loading("clients"));
    assert!(state.error("clients").is_none());
    assert_eq!(state.stats().observer_failures, 1);
}

#[tokio::test]
async fn test_observer_sees_cleared_error_on_recovery() {
    let (bridge, store) = offline_bridge();
    let state = StateManager::new(bridge);

    let missing = state
        .run_mediated("client", "get_primary", json!({"id": "acme"}))
        .await;
    assert_failed_with(&missing, ErrorKind::NotFound);
    assert!(state.error("client").is_some());

    let seen: Arc<Mutex<Vec<bool>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let reader = state.clone();
    state.subscribe(
        "client",
        Observer::immediate(move |_, _| {
            sink.lock().push(reader.error("client").is_some());
            Ok(())
        }),
    );

    acme_with_file(&store);
    let found = state
        .run_mediated("client", "get_primary", json!({"id": "acme"}))
        .await;
    assert!(found.is_success());
    assert_eq!(*seen.lock(), vec![false]);
}

#[tokio::test]
async fn test_scenario_d_unsupported_keeps_value() {
    let (bridge, _store) = offline_bridge();
    let state = StateManager::new(bridge);
    state.set("reports", json!(["previous"]), "test");

    let envelope = state.run_mediated("reports", "fetch_reports", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::UnsupportedOperation);

    assert_eq!(state.get("reports"), Some(json!(["previous"])));
    assert!(!state.is_loading("reports"));
    assert_matches!(
        state.error("reports"),
        Some(error) if error.kind == ErrorKind::UnsupportedOperation
    );
    assert_eq!(state.entry("reports").unwrap().phase(), Phase::Error);
}

#[tokio::test]
async fn test_success_clears_previous_error() {
    let (bridge, store) = offline_bridge();
    let state = StateManager::new(bridge);

    let missing = state
        .run_mediated("client", "get_primary", json!({"id": "acme"}))
        .await;
    assert_failed_with(&missing, ErrorKind::NotFound);
    assert!(state.get("client").is_none());

    acme_with_file(&store);
    let found = state
        .run_mediated("client", "get_primary", json!({"id": "acme"}))
        .await;
    assert!(found.is_success());
    assert!(state.error("client").is_none());
    assert_eq!(state.get("client").unwrap()["file_count"], 1);
}

#[tokio::test]
async fn test_repeated_refresh_is_deduplicated() {
    let (bridge, store) = offline_bridge();
    acme_with_file(&store);
    let state = StateManager::new(bridge);

    state.run_mediated("files", "list_dependents", Value::Null).await;
    state.run_mediated("files", "list_dependents", Value::Null).await;
    assert_eq!(state.stats().writes_deduplicated, 1);
}

#[tokio::test]
async fn test_backend_failure_is_recorded() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("real")
            .fail("status_summary", TetherError::backend("database offline"))
            .shared(),
    );
    let state = StateManager::new(bridge);
    state.set("status", json!({"client_count": 3}), "cache");

    let envelope = state.run_mediated("status", "status_summary", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::BackendError);

    let error = state.error("status").unwrap();
    assert!(error.message.contains("database offline"));
    assert_eq!(state.get("status"), Some(json!({"client_count": 3})));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_loading_counter() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("slow")
            .respond("status_summary", json!({"client_count": 0}))
            .with_latency(Duration::from_secs(1))
            .deferred()
            .shared(),
    );
    let state = StateManager::new(bridge);
    let mut status = state.watch_status("status");

    let first = tokio::spawn({
        let state = state.clone();
        async move { state.run_mediated("status", "status_summary", Value::Null).await }
    });
    let second = tokio::spawn({
        let state = state.clone();
        async move { state.run_mediated("status", "status_summary", Value::Null).await }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(state.entry("status").unwrap().in_flight, 2);
    assert!(state.is_loading("status"));
    assert!(status.has_changed().unwrap());
    assert!(status.borrow_and_update().loading);

    // a guarded call is refused while others are in flight
    assert!(state
        .try_run_mediated("status", "status_summary", Value::Null)
        .await
        .is_none());

    assert!(first.await.unwrap().is_success());
    assert!(second.await.unwrap().is_success());
    assert!(!state.is_loading("status"));
    assert_eq!(state.entry("status").unwrap().in_flight, 0);
    assert!(!status.borrow().loading);
    assert_eq!(state.get("status"), Some(json!({"client_count": 0})));
}

#[tokio::test]
async fn test_try_run_mediated_when_idle() {
    let (bridge, _store) = offline_bridge();
    let state = StateManager::new(bridge);
    let envelope = state
        .try_run_mediated("clients", "list_primary", Value::Null)
        .await
        .unwrap();
    assert!(envelope.is_success());
    assert_eq!(state.get("clients"), Some(json!([])));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_records_timeout() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("slow")
            .respond("list_primary", json!([]))
            .with_latency(Duration::from_secs(5))
            .deferred()
            .shared(),
    );
    let state = StateManager::with_config(
        bridge,
        StateConfig {
            mediation_deadline_ms: Some(100),
        },
    );

    let envelope = state.run_mediated("clients", "list_primary", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::Timeout);
    assert!(!state.is_loading("clients"));
    assert!(state.get("clients").is_none());
    assert_eq!(state.error("clients").unwrap().kind, ErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_call_releases_loading() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("slow")
            .respond("list_primary", json!([]))
            .with_latency(Duration::from_secs(5))
            .deferred()
            .shared(),
    );
    let state = StateManager::new(bridge);

    let call = state.run_mediated("clients", "list_primary", Value::Null);
    let outcome = tokio::time::timeout(Duration::from_millis(50), call).await;
    assert!(outcome.is_err());
    assert!(!state.is_loading("clients"));
}

#[tokio::test]
async fn test_progress_is_independent_of_loading() {
    let (bridge, _store) = offline_bridge();
    let state = StateManager::new(bridge);

    state.start_progress("upload");
    assert_eq!(
        state.entry("upload").unwrap().progress,
        Some(Progress::Fraction(0.0))
    );
    assert!(!state.is_loading("upload"));

    state.update_progress("upload", 1.5);
    assert_eq!(
        state.entry("upload").unwrap().progress,
        Some(Progress::Fraction(1.0))
    );
    state.update_progress("upload", Progress::Fraction(-3.0));
    assert_eq!(
        state.entry("upload").unwrap().progress,
        Some(Progress::Fraction(0.0))
    );
    state.update_progress("upload", Progress::Indeterminate);
    assert_eq!(
        state.entry("upload").unwrap().progress,
        Some(Progress::Indeterminate)
    );

    state.clear_progress("upload");
    assert_eq!(state.entry("upload").unwrap().progress, None);
}

#[tokio::test]
async fn test_add_file_intent_refreshes_affected_keys() {
    let (bridge, store) = offline_bridge();
    store.add_primary(NewClient::named("Acme").with_id("acme")).unwrap();
    let state = StateManager::new(bridge);

    let outcome = state
        .dispatch(Intent::AddFile {
            owner_id: "acme".into(),
            file: NewFile::sized(100).with_id("f1"),
        })
        .await;
    assert!(outcome.is_success());

    let file: FileRecord = serde_json::from_value(state.get(keys::LAST_MUTATION).unwrap()).unwrap();
    assert_eq!(file.owner_id, "acme");

    let owned: Vec<FileRecord> =
        serde_json::from_value(state.get(&keys::files_key("acme")).unwrap()).unwrap();
    assert_eq!(owned.len(), 1);

    let clients: Vec<Client> = serde_json::from_value(state.get(keys::CLIENTS).unwrap()).unwrap();
    assert_eq!(clients[0].file_count, 1);
    assert_eq!(clients[0].total_size, 100);

    let summary: StatusSummary =
        serde_json::from_value(state.get(keys::STATUS).unwrap()).unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.total_size, 100);
}

#[tokio::test]
async fn test_failed_mutation_skips_refresh() {
    let (bridge, _store) = offline_bridge();
    let state = StateManager::new(bridge);

    let outcome = state
        .dispatch(Intent::AddFile {
            owner_id: "ghost".into(),
            file: NewFile::sized(1),
        })
        .await;
    assert!(!outcome.is_success());
    assert!(outcome.refreshed.is_empty());
    assert_failed_with(outcome.mutation.as_ref().unwrap(), ErrorKind::OwnerNotFound);
    assert!(state.get(keys::CLIENTS).is_none());
    assert_eq!(
        state.error(keys::LAST_MUTATION).unwrap().kind,
        ErrorKind::OwnerNotFound
    );
}

#[tokio::test]
async fn test_update_and_verify_intents() {
    let (bridge, store) = offline_bridge();
    acme_with_file(&store);
    let state = StateManager::new(Arc::clone(&bridge));

    let mut patch = Map::new();
    patch.insert("name".into(), json!("Acme Corp"));
    let outcome = state
        .dispatch(Intent::UpdateClient {
            id: "acme".into(),
            patch,
        })
        .await;
    assert!(outcome.is_success());
    assert_eq!(state.get(keys::CLIENTS).unwrap()[0]["name"], "Acme Corp");

    let outcome = state
        .dispatch(Intent::VerifyFile {
            id: "acme-file".into(),
        })
        .await;
    assert!(outcome.is_success());
    assert_eq!(state.get(keys::FILES).unwrap()[0]["verified"], true);

    let outcome = state.dispatch(Intent::DeleteClient { id: "acme".into() }).await;
    assert!(outcome.is_success());
    assert_eq!(state.get(keys::CLIENTS), Some(json!([])));
    assert_eq!(state.get(keys::FILES), Some(json!([])));
}

#[tokio::test]
async fn test_refresh_logs_intent() {
    let (bridge, store) = offline_bridge();
    acme_with_file(&store);
    let state = StateManager::new(bridge);

    let outcome = state.dispatch(Intent::RefreshLogs { limit: Some(1) }).await;
    assert!(outcome.mutation.is_none());
    assert_eq!(outcome.refreshed.len(), 1);
    assert_eq!(state.get(keys::LOGS).unwrap().as_array().unwrap().len(), 1);
}
