use relay::error::RelayError;
use relay::registry::RunRegistry;
use relay::run::{Run, RunState};
use serde_json::json;

fn run_at(id: &str, created_at: u64) -> Run {
    Run::new(
        id,
        format!("task-{id}"),
        "https://agent",
        RunState::Submitted,
        3,
        json!({ "id": format!("task-{id}") }),
        created_at,
    )
}

#[tokio::test]
async fn create_then_get() {
    let registry = RunRegistry::new();
    registry.create(run_at("req_a", 1)).await.unwrap();

    let run = registry.get("req_a").await.unwrap();
    assert_eq!(run.remote_task_id, "task-req_a");
    assert_eq!(run.poll_count, 0);
    assert!(run.last_polled_at.is_none());
    assert!(registry.get("req_missing").await.is_none());
}

#[tokio::test]
async fn duplicate_request_id_is_rejected() {
    let registry = RunRegistry::new();
    registry.create(run_at("req_a", 1)).await.unwrap();

    let err = registry.create(run_at("req_a", 2)).await.unwrap_err();
    assert!(matches!(err, RelayError::DuplicateRequest(ref id) if id == "req_a"));
    assert_eq!(registry.get("req_a").await.unwrap().created_at, 1);
}

#[tokio::test]
async fn list_is_newest_first_and_bounded() {
    let registry = RunRegistry::new();
    for (i, ts) in [30, 10, 50, 20, 40].into_iter().enumerate() {
        registry.create(run_at(&format!("req_{i}"), ts)).await.unwrap();
    }

    let page = registry.list(3).await;
    let stamps: Vec<u64> = page.iter().map(|s| s.created_at).collect();
    assert_eq!(stamps, vec![50, 40, 30]);

    let all = registry.list(100).await;
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn list_limit_is_clamped() {
    let registry = RunRegistry::new();
    for i in 0..60 {
        registry.create(run_at(&format!("req_{i}"), i)).await.unwrap();
    }

    assert_eq!(registry.list(0).await.len(), 1);
    assert_eq!(registry.list(1_000).await.len(), 50);
}

#[tokio::test]
async fn update_missing_run_is_noop() {
    let registry = RunRegistry::new();
    let touched = registry.update("req_gone", |run| run.poll_count += 1).await;
    assert!(touched.is_none());
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn update_mutates_in_place() {
    let registry = RunRegistry::new();
    registry.create(run_at("req_a", 1)).await.unwrap();

    let count = registry
        .update("req_a", |run| {
            run.poll_count += 1;
            run.poll_count
        })
        .await;
    assert_eq!(count, Some(1));
    assert_eq!(registry.get("req_a").await.unwrap().poll_count, 1);
}

#[tokio::test]
async fn delete_and_remove_where() {
    let registry = RunRegistry::new();
    registry.create(run_at("req_a", 1)).await.unwrap();
    registry.create(run_at("req_b", 2)).await.unwrap();
    registry.create(run_at("req_c", 3)).await.unwrap();

    assert!(registry.delete("req_a").await.is_some());
    assert!(registry.delete("req_a").await.is_none());

    let removed = registry.remove_where(|run| run.created_at >= 3).await;
    assert_eq!(removed, vec!["req_c".to_string()]);
    assert_eq!(registry.len().await, 1);
    assert!(registry.contains("req_b").await);
}

#[tokio::test]
async fn reservation_blocks_the_id_until_dropped() {
    let registry = RunRegistry::new();

    let claim = registry.reserve("req_a").await.unwrap();
    assert!(matches!(
        registry.reserve("req_a").await,
        Err(RelayError::DuplicateRequest(_))
    ));
    assert!(registry.reserve("req_b").await.is_ok());

    drop(claim);
    assert!(registry.reserve("req_a").await.is_ok());
}

#[tokio::test]
async fn live_run_cannot_be_reserved() {
    let registry = RunRegistry::new();
    {
        let _claim = registry.reserve("req_a").await.unwrap();
        registry.create(run_at("req_a", 1)).await.unwrap();
    }

    assert!(matches!(
        registry.reserve("req_a").await,
        Err(RelayError::DuplicateRequest(ref id)) if id == "req_a"
    ));
}
