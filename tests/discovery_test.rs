use std::sync::Arc;
use std::time::Duration;

use relay::discovery::DiscoveryCache;
use relay::error::{DiscoveryError, RemoteError};
use relay::remote::mock::MockAgent;
use serde_json::json;

const CARD_URL: &str = "https://org.example.com/api/agents/a2a/abc/.well-known/agent-card.json";
const TTL: Duration = Duration::from_secs(300);

fn cache_with(agent: Arc<MockAgent>) -> DiscoveryCache {
    DiscoveryCache::new(agent, TTL)
}

#[tokio::test(start_paused = true)]
async fn repeated_resolves_within_window_fetch_once() {
    let agent = Arc::new(MockAgent::new("https://agent.example/http/", "t1"));
    let cache = cache_with(Arc::clone(&agent));

    for _ in 0..5 {
        let endpoint = cache.resolve_endpoint(CARD_URL).await.unwrap();
        assert_eq!(endpoint, "https://agent.example/http");
    }
    assert_eq!(agent.card_fetches(), 1);

    let entry = cache.cached().await.unwrap();
    assert_eq!(entry.discovery_url, CARD_URL);
    assert_eq!(entry.endpoint_base, "https://agent.example/http");
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_refetched() {
    let agent = Arc::new(MockAgent::new("https://agent.example", "t1"));
    let cache = cache_with(Arc::clone(&agent));

    cache.resolve_endpoint(CARD_URL).await.unwrap();
    tokio::time::advance(TTL - Duration::from_secs(1)).await;
    cache.resolve_endpoint(CARD_URL).await.unwrap();
    assert_eq!(agent.card_fetches(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    cache.resolve_endpoint(CARD_URL).await.unwrap();
    assert_eq!(agent.card_fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn different_url_forces_fetch() {
    let agent = Arc::new(MockAgent::new("https://agent.example", "t1"));
    let cache = cache_with(Arc::clone(&agent));

    cache.resolve_endpoint(CARD_URL).await.unwrap();
    cache
        .resolve_endpoint("https://other.example/.well-known/agent-card.json")
        .await
        .unwrap();
    assert_eq!(agent.card_fetches(), 2);

    // The slot now belongs to the second URL, so the first misses again.
    cache.resolve_endpoint(CARD_URL).await.unwrap();
    assert_eq!(agent.card_fetches(), 3);
}

#[tokio::test]
async fn card_without_http_json_interface_fails_and_caches_nothing() {
    let agent = Arc::new(
        MockAgent::new("https://agent.example", "t1").with_card(Ok(json!({
            "name": "rpc-only",
            "additionalInterfaces": [{ "transport": "JSONRPC", "url": "https://agent/rpc" }]
        }))),
    );
    let cache = cache_with(Arc::clone(&agent));

    let err = cache.resolve_endpoint(CARD_URL).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::MissingInterface { ref url } if url == CARD_URL));
    assert!(cache.cached().await.is_none());

    // Not cached as a miss either: the next call asks again.
    cache.resolve_endpoint(CARD_URL).await.unwrap_err();
    assert_eq!(agent.card_fetches(), 2);
}

#[tokio::test]
async fn card_fetch_failure_is_discovery_error() {
    let agent = Arc::new(
        MockAgent::new("https://agent.example", "t1").with_card(Err(RemoteError::Status {
            status: 401,
            body: "bad key".to_string(),
        })),
    );
    let cache = cache_with(agent);

    let err = cache.resolve_endpoint(CARD_URL).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Fetch(RemoteError::Status { status: 401, .. })));
    assert_eq!(err.to_string(), "agent-card failed: 401 bad key");
}

#[tokio::test]
async fn malformed_card_is_discovery_error() {
    let agent = Arc::new(
        MockAgent::new("https://agent.example", "t1")
            .with_card(Ok(json!({ "additionalInterfaces": "nope" }))),
    );
    let cache = cache_with(agent);

    let err = cache.resolve_endpoint(CARD_URL).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::Malformed(_)));
    assert!(cache.cached().await.is_none());
}
