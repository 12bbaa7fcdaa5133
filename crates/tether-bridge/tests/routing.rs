//! Routing, fallback and failure containment through the bridge

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tether_bridge::{DelegationBridge, Target};
use tether_core::{Client, ErrorKind, FileRecord, Origin, TetherError};
use tether_testkit::{
    acme_with_file, assert_envelope_law, assert_failed_with, assert_store_consistent,
    empty_store, offline_bridge, ScriptedBackend,
};

#[tokio::test]
async fn test_scenario_a_through_bridge() {
    let (bridge, store) = offline_bridge();

    let added = bridge.invoke("add_primary", json!({"name": "Acme"})).await;
    assert_envelope_law(&added);
    let client: Client = added.decode().unwrap();
    assert!(!client.id.is_empty());
    assert_eq!(client.file_count, 0);

    let file = bridge
        .invoke("add_dependent", json!({"owner_id": client.id, "size": 100}))
        .await;
    assert!(file.is_success());

    let owner: Client = bridge
        .invoke("get_primary", json!({"id": client.id}))
        .await
        .decode()
        .unwrap();
    assert_eq!(owner.file_count, 1);
    assert_eq!(owner.total_size, 100);

    let deleted = bridge.invoke("delete_primary", json!({"id": client.id})).await;
    assert_eq!(deleted.data(), Some(&json!(true)));

    let files: Vec<FileRecord> = bridge
        .invoke("list_dependents", Value::Null)
        .await
        .decode()
        .unwrap();
    assert!(files.is_empty());
    let violations = bridge.invoke("integrity_check", Value::Null).await;
    assert_eq!(violations.data(), Some(&json!([])));
    assert_store_consistent(&store);
}

#[tokio::test]
async fn test_scenario_b_owner_not_found() {
    let (bridge, store) = offline_bridge();
    let envelope = bridge
        .invoke("add_dependent", json!({"owner_id": "nonexistent", "size": 10}))
        .await;
    assert_failed_with(&envelope, ErrorKind::OwnerNotFound);
    assert_eq!(envelope.origin(), Origin::Simulated);
    assert_eq!(store.file_count(), 0);
}

#[tokio::test]
async fn test_real_backend_serves_supported_operations() {
    let (bridge, store) = offline_bridge();
    let remote = empty_store();
    acme_with_file(&remote);
    let real = ScriptedBackend::new("remote")
        .forwarding(Arc::clone(&remote))
        .shared();
    bridge.attach_real(real.clone());

    let envelope = bridge.invoke("list_primary", Value::Null).await;
    assert_eq!(envelope.origin(), Origin::Real);
    let clients: Vec<Client> = envelope.decode().unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(real.call_count("list_primary"), 1);

    // The local simulation was never touched.
    assert_eq!(store.client_count(), 0);
    assert_eq!(bridge.stats().real_calls, 1);
    assert_eq!(bridge.stats().simulated_calls, 0);
}

#[tokio::test]
async fn test_falls_back_when_real_lacks_operation() {
    let (bridge, _store) = offline_bridge();
    let real = ScriptedBackend::new("partial")
        .respond("list_primary", json!([]))
        .shared();
    bridge.attach_real(real.clone());

    assert_eq!(bridge.route("list_primary"), Some(Target::Real));
    let envelope = bridge.invoke("status_summary", Value::Null).await;
    assert!(envelope.is_success());
    assert_eq!(envelope.origin(), Origin::Simulated);
    assert!(real.calls().is_empty());
}

#[tokio::test]
async fn test_unavailable_real_falls_back_until_it_returns() {
    let (bridge, _store) = offline_bridge();
    let real = ScriptedBackend::new("flaky")
        .respond("list_primary", json!(["remote"]))
        .unavailable()
        .shared();
    bridge.attach_real(real.clone());

    let offline = bridge.invoke("list_primary", Value::Null).await;
    assert_eq!(offline.origin(), Origin::Simulated);

    real.set_available(true);
    let online = bridge.invoke("list_primary", Value::Null).await;
    assert_eq!(online.origin(), Origin::Real);
    assert_eq!(online.data(), Some(&json!(["remote"])));
}

#[tokio::test]
async fn test_backend_error_message_preserved() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("remote")
            .fail("list_primary", TetherError::backend("connection reset by peer"))
            .shared(),
    );
    let envelope = bridge.invoke("list_primary", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::BackendError);
    assert_eq!(envelope.origin(), Origin::Real);
    assert!(envelope
        .error()
        .is_some_and(|e| e.message.contains("connection reset by peer")));
}

#[tokio::test]
async fn test_envelope_shaped_results_pass_through() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("remote")
            .respond("list_primary", json!({"success": true, "data": [1, 2]}))
            .respond(
                "status_summary",
                json!({"success": false, "error": {"kind": "NotFound", "message": "gone"}}),
            )
            .shared(),
    );

    let ok = bridge.invoke("list_primary", Value::Null).await;
    assert_eq!(ok.data(), Some(&json!([1, 2])));
    assert_eq!(ok.origin(), Origin::Real);

    let failed = bridge.invoke("status_summary", Value::Null).await;
    assert_failed_with(&failed, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_real_backend_panics_become_backend_errors() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("blocking")
            .panic_on("list_primary", "disk on fire")
            .shared(),
    );
    let envelope = bridge.invoke("list_primary", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::BackendError);
    assert_eq!(envelope.origin(), Origin::Real);
    assert!(envelope.error().is_some_and(|e| e.message.contains("disk on fire")));

    bridge.attach_real(
        ScriptedBackend::new("async")
            .panic_on("list_primary", "task on fire")
            .deferred()
            .shared(),
    );
    let envelope = bridge.invoke("list_primary", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::BackendError);
    assert!(envelope.error().is_some_and(|e| e.message.contains("task on fire")));

    // The bridge keeps working afterwards.
    assert!(bridge.invoke("status_summary", Value::Null).await.is_success());
    assert_eq!(bridge.stats().real_calls, 2);
}

#[tokio::test]
async fn test_malformed_arguments_are_validation_errors() {
    let (bridge, _store) = offline_bridge();
    for (operation, args) in [
        ("get_primary", json!({})),
        ("get_primary", json!({"id": 5})),
        ("add_primary", json!({"status": "connected"})),
        ("list_logs", json!({"limit": -1})),
        ("update_field", json!({"collection": "clients", "id": "x"})),
        ("list_primary", json!("not an object")),
        ("add_primary", json!({"name": "Acme", "file_count": 5})),
        ("add_dependent", json!({"owner_id": "acme", "name": "a.txt", "owner": "acme"})),
    ] {
        let envelope = bridge.invoke(operation, args).await;
        assert_failed_with(&envelope, ErrorKind::ValidationError);
    }
}

#[tokio::test]
async fn test_unsupported_operation() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(ScriptedBackend::new("remote").shared());
    let envelope = bridge.invoke("frobnicate", Value::Null).await;
    assert_failed_with(&envelope, ErrorKind::UnsupportedOperation);
    assert_eq!(bridge.stats().unsupported, 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_yields_timeout() {
    let (bridge, _store) = offline_bridge();
    bridge.attach_real(
        ScriptedBackend::new("slow")
            .respond("list_primary", json!([]))
            .with_latency(Duration::from_secs(5))
            .deferred()
            .shared(),
    );

    let envelope = bridge
        .invoke_with_deadline("list_primary", Value::Null, Duration::from_millis(100))
        .await;
    assert_failed_with(&envelope, ErrorKind::Timeout);
    assert_eq!(envelope.origin(), Origin::Real);
    assert_eq!(bridge.stats().timeouts, 1);

    let fallback = bridge.invoke("status_summary", Value::Null).await;
    assert!(fallback.is_success());
}

#[tokio::test]
async fn test_blocking_deadline_does_not_abort_worker() {
    let (bridge, store) = offline_bridge();
    let remote = empty_store();
    bridge.attach_real(
        ScriptedBackend::new("slow")
            .forwarding(Arc::clone(&remote))
            .with_latency(Duration::from_millis(150))
            .shared(),
    );

    let envelope = bridge
        .invoke_with_deadline("add_primary", json!({"name": "Late"}), Duration::from_millis(10))
        .await;
    assert_failed_with(&envelope, ErrorKind::Timeout);

    // The detached worker still completes its write.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(remote.client_count(), 1);
    assert_eq!(store.client_count(), 0);
}

#[tokio::test]
async fn test_detach_returns_to_simulation() {
    let bridge = DelegationBridge::new(empty_store());
    bridge.attach_real(ScriptedBackend::new("remote").respond("list_primary", json!([])).shared());
    assert!(bridge.is_connected());
    bridge.detach_real();
    assert!(!bridge.is_connected());
    let envelope = bridge.invoke("list_primary", Value::Null).await;
    assert_eq!(envelope.origin(), Origin::Simulated);
}
