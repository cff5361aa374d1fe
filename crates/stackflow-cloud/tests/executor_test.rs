mod common;

use common::{Call, FakeProvider, Fault, fast_config};
use serde_json::json;
use stackflow_cloud::{
    CancellationFlag, CloudError, DeploymentResult, ExecutionState, Executor, ExecutorConfig,
    ResourceStatus, RetryConfig, RunOutcome, StateManager,
};
use stackflow_core::{DescriptorSet, ResourceKind, load_str};
use std::time::Duration;
use tempfile::TempDir;

const THREE_TIER: &str = r#"
deployment "demo"

resource "net" kind="network" {
    mode "custom"
}

resource "db" kind="database-instance" {
    depends_on "net"
    network "${net.handle}"
    tier "db-f1-micro"
}

resource "api" kind="service" {
    depends_on "db"
    image "gcr.io/demo/api:latest"
    env {
        DB_HOST "${db.endpoint}"
    }
}

resource "cache" kind="cache-instance" {
    size_gb 1
}
"#;

fn three_tier() -> DescriptorSet {
    load_str(THREE_TIER, "demo").unwrap()
}

fn state_dir() -> (TempDir, StateManager) {
    let dir = tempfile::tempdir().unwrap();
    let manager = StateManager::new(dir.path(), "demo");
    (dir, manager)
}

#[tokio::test]
async fn test_dependencies_are_created_first() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(report.exit_code(), 0);

    let creates = provider.creates();
    let pos = |id: &str| creates.iter().position(|c| c == id).unwrap();
    assert!(pos("net") < pos("db"));
    assert!(pos("db") < pos("api"));
    assert_eq!(creates.len(), 4);

    let result = DeploymentResult::collect(&set, &report.state);
    assert_eq!(result.services.len(), 1);
    assert_eq!(result.services[0].id, "api");
    assert_eq!(result.services[0].value, "api.fake.internal");
    assert_eq!(result.databases[0].value, "db.fake.internal");
}

#[tokio::test]
async fn test_second_run_makes_no_provider_calls() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    executor.provision(&set).await.unwrap();
    provider.reset_calls();

    let report = executor.provision(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert!(provider.calls().is_empty());
    assert!(
        report
            .resources
            .iter()
            .all(|r| r.status == ResourceStatus::Created)
    );
}

#[tokio::test]
async fn test_quota_failure_blocks_dependents_only() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    provider.fail_always("db", Fault::Quota);
    let set = three_tier();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    let status = |id: &str| report.state.status(id);
    assert_eq!(status("net"), ResourceStatus::Created);
    assert_eq!(status("db"), ResourceStatus::Failed);
    assert_eq!(status("api"), ResourceStatus::Blocked);
    assert_eq!(status("cache"), ResourceStatus::Created);

    assert_eq!(report.outcome, RunOutcome::PartialFailure);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(provider.create_count("db"), 1);
    assert_eq!(provider.create_count("api"), 0);

    let blocked: Vec<_> = report
        .with_status(ResourceStatus::Blocked)
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(blocked, vec!["api"]);

    let db = report.resources.iter().find(|r| r.id == "db").unwrap();
    assert!(db.error.as_deref().unwrap().contains("quota exceeded"));

    let result = DeploymentResult::collect(&set, &report.state);
    assert_eq!(result.networks.len(), 1);
    assert!(result.databases.is_empty());
    assert!(result.services.is_empty());
}

#[tokio::test]
async fn test_transient_failure_is_retried_up_to_the_bound() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    provider.fail_always("db", Fault::Transient);
    let set = three_tier();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(provider.create_count("db"), 3);
    assert_eq!(report.state.status("db"), ResourceStatus::Failed);
    assert_eq!(report.state.record("db").unwrap().attempts, 3);
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    provider.fail_next("db", Fault::Transient);
    let set = three_tier();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(provider.create_count("db"), 2);
    assert_eq!(report.state.record("db").unwrap().attempts, 2);
}

#[tokio::test]
async fn test_auth_failure_aborts_and_leaves_rest_pending() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    provider.fail_always("net", Fault::Auth);
    let set = three_tier();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Aborted);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.state.status("net"), ResourceStatus::Failed);
    assert_eq!(report.state.status("db"), ResourceStatus::Pending);
    assert_eq!(report.state.status("api"), ResourceStatus::Pending);
    assert_eq!(report.state.status("cache"), ResourceStatus::Pending);
    assert_eq!(provider.creates(), vec!["net".to_string()]);
}

#[tokio::test]
async fn test_rerun_resumes_after_failure() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    provider.fail_next("db", Fault::Quota);
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    let first = executor.provision(&set).await.unwrap();
    assert_eq!(first.outcome, RunOutcome::PartialFailure);
    provider.reset_calls();

    let second = executor.provision(&set).await.unwrap();
    assert_eq!(second.outcome, RunOutcome::Succeeded);
    assert_eq!(
        provider.calls(),
        vec![Call::Create("db".to_string()), Call::Create("api".to_string())]
    );
}

#[tokio::test]
async fn test_interrupted_create_is_reconciled() {
    let (_dir, manager) = state_dir();
    let set = three_tier();

    let mut state = ExecutionState::new("demo");
    state.prepare_run(&set);
    state
        .transition("net", ResourceKind::Network, ResourceStatus::Creating)
        .unwrap();
    manager.save(&state).await.unwrap();

    let loaded = manager.load().await.unwrap();
    assert_eq!(loaded.status("net"), ResourceStatus::Unknown);

    let provider = FakeProvider::new();
    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(provider.create_count("net"), 1);
}

#[tokio::test]
async fn test_output_references_are_resolved() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();

    Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    let db = provider.last_config("db").unwrap();
    assert_eq!(db["network"], json!("fake/network/net"));

    let api = provider.last_config("api").unwrap();
    assert_eq!(api["env"], json!({ "DB_HOST": "db.fake.internal" }));
}

#[tokio::test]
async fn test_missing_endpoint_fails_the_resource() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = load_str(
        r#"
resource "net" kind="network"
resource "svc" kind="service" {
    depends_on "net"
    target "${net.endpoint}"
}
"#,
        "demo",
    )
    .unwrap();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(report.state.status("svc"), ResourceStatus::Failed);
    assert_eq!(provider.create_count("svc"), 0);
}

#[tokio::test]
async fn test_call_timeout_counts_as_transient() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    provider.fail_always("cache", Fault::Hang);
    let set = three_tier();

    let config = ExecutorConfig {
        retry: RetryConfig::immediate(2),
        call_timeout: Duration::from_millis(20),
    };
    let report = Executor::new(&provider, &manager)
        .with_config(config)
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(provider.create_count("cache"), 2);
    let cache = report.resources.iter().find(|r| r.id == "cache").unwrap();
    assert_eq!(cache.status, ResourceStatus::Failed);
    assert!(cache.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_cancellation_stops_between_resources() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let cancel = CancellationFlag::new();
    provider.cancel_after("net", cancel.clone());
    let set = three_tier();

    let report = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .with_cancellation(cancel)
        .provision(&set)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.state.status("net"), ResourceStatus::Created);
    assert_eq!(report.state.status("db"), ResourceStatus::Pending);
    assert_eq!(report.state.status("api"), ResourceStatus::Pending);
    assert_eq!(provider.creates(), vec!["net".to_string()]);
}

#[tokio::test]
async fn test_state_survives_between_executors() {
    let (dir, manager) = state_dir();
    let set = three_tier();

    let provider = FakeProvider::new();
    Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await
        .unwrap();

    let reopened = StateManager::new(dir.path(), "demo");
    let state = reopened.load().await.unwrap();
    assert_eq!(state.status("api"), ResourceStatus::Created);
    assert_eq!(
        state.handle("api").and_then(|h| h.endpoint.as_deref()),
        Some("api.fake.internal")
    );
}

#[tokio::test]
async fn test_teardown_deletes_in_reverse_order() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    executor.provision(&set).await.unwrap();
    provider.reset_calls();

    let report = executor.teardown(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);

    let destroys = provider.destroys();
    let pos = |id: &str| destroys.iter().position(|c| c == id).unwrap();
    assert!(pos("api") < pos("db"));
    assert!(pos("db") < pos("net"));
    assert!(
        report
            .resources
            .iter()
            .all(|r| r.status == ResourceStatus::Deleted)
    );
    assert!(!provider.exists("net"));
}

#[tokio::test]
async fn test_teardown_treats_missing_resources_as_deleted() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    executor.provision(&set).await.unwrap();
    provider.forget("cache");

    let report = executor.teardown(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(report.state.status("cache"), ResourceStatus::Deleted);
}

#[tokio::test]
async fn test_teardown_failure_keeps_dependencies() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    executor.provision(&set).await.unwrap();
    provider.fail_always("api", Fault::Conflict);
    provider.reset_calls();

    let report = executor.teardown(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::PartialFailure);
    assert_eq!(report.state.status("api"), ResourceStatus::Created);
    assert_eq!(report.state.status("db"), ResourceStatus::Created);
    assert_eq!(report.state.status("net"), ResourceStatus::Created);
    assert_eq!(report.state.status("cache"), ResourceStatus::Deleted);

    let destroys = provider.destroys();
    assert!(!destroys.contains(&"db".to_string()));
    assert!(!destroys.contains(&"net".to_string()));

    let db = report.resources.iter().find(|r| r.id == "db").unwrap();
    assert!(db.error.as_deref().unwrap().contains("still required by: api"));

    provider.clear_faults();
    let report = executor.teardown(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
    for id in ["api", "db", "net"] {
        assert_eq!(report.state.status(id), ResourceStatus::Deleted);
    }
}

#[tokio::test]
async fn test_provision_clears_errors_left_by_failed_teardown() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    executor.provision(&set).await.unwrap();
    provider.fail_always("api", Fault::Conflict);
    executor.teardown(&set).await.unwrap();
    provider.clear_faults();

    let report = executor.provision(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert!(report.resources.iter().all(|r| r.error.is_none()));
    assert!(report.state.record("db").unwrap().last_error.is_none());
}

#[tokio::test]
async fn test_provision_after_teardown_recreates() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();
    let executor = Executor::new(&provider, &manager).with_config(fast_config());

    executor.provision(&set).await.unwrap();
    executor.teardown(&set).await.unwrap();
    provider.reset_calls();

    let report = executor.provision(&set).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(provider.creates().len(), 4);
}

#[tokio::test]
async fn test_locked_deployment_is_refused() {
    let (_dir, manager) = state_dir();
    let provider = FakeProvider::new();
    let set = three_tier();

    let lock = manager.acquire_lock().await.unwrap();
    let result = Executor::new(&provider, &manager)
        .with_config(fast_config())
        .provision(&set)
        .await;
    assert!(matches!(result, Err(CloudError::LockError(_))));
    assert!(provider.calls().is_empty());

    lock.release().await.unwrap();
}
