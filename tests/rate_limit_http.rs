//! Admission control behavior through the HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use quota_gateway::store::{ClientQuota, ClientRepository, MemoryRepository};
use serde_json::Value;

mod common;

#[tokio::test]
async fn admission_drains_bucket_then_rejects_with_429() {
    let backend = common::start_mock_backend("ok").await;
    let repo = Arc::new(MemoryRepository::new());
    repo.create(&ClientQuota {
        tokens: 25,
        ..ClientQuota::new("alice", 30, 20)
    })
    .await
    .unwrap();

    let config = common::test_config(vec![backend]);
    let (proxy, shutdown) = common::spawn_gateway(config, repo.clone()).await;

    let client = common::http_client();
    let url = format!("http://{}/?client_id=alice", proxy);

    for _ in 0..2 {
        let res = client.get(&url).send().await.expect("proxy unreachable");
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(&url).send().await.expect("proxy unreachable");
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], 429);
    assert_eq!(body["message"], "Too many requests");

    // The denied request must not have spent anything.
    assert_eq!(repo.get("alice").await.unwrap().unwrap().tokens, 5);

    shutdown.trigger();
}

#[tokio::test]
async fn unknown_client_is_rejected_with_429() {
    let backend = common::start_mock_backend("ok").await;
    let config = common::test_config(vec![backend]);
    let (proxy, shutdown) = common::spawn_gateway(config, Arc::new(MemoryRepository::new())).await;

    let client = common::http_client();
    let res = client
        .get(format!("http://{}/?client_id=ghost", proxy))
        .send()
        .await
        .expect("proxy unreachable");
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    shutdown.trigger();
}

#[tokio::test]
async fn request_without_client_id_is_not_rate_limited() {
    let backend = common::start_mock_backend("ok").await;
    let config = common::test_config(vec![backend]);
    let (proxy, shutdown) = common::spawn_gateway(config, Arc::new(MemoryRepository::new())).await;

    let client = common::http_client();
    for _ in 0..5 {
        let res = client
            .get(format!("http://{}", proxy))
            .send()
            .await
            .expect("proxy unreachable");
        assert_eq!(res.status(), StatusCode::OK);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn refill_loop_replenishes_a_drained_bucket() {
    let backend = common::start_mock_backend("ok").await;
    let repo = Arc::new(MemoryRepository::new());
    repo.create(&ClientQuota {
        tokens: 0,
        ..ClientQuota::new("alice", 30, 20)
    })
    .await
    .unwrap();

    let mut config = common::test_config(vec![backend]);
    config.rate_limit.refill_interval_secs = 1;
    let (proxy, shutdown) = common::spawn_gateway(config, repo.clone()).await;

    let client = common::http_client();
    let url = format!("http://{}/?client_id=alice", proxy);

    // Drained bucket: rejected now, admitted after the refill ticks.
    let res = client.get(&url).send().await.expect("proxy unreachable");
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_secs(2)).await;

    let res = client.get(&url).send().await.expect("proxy unreachable");
    assert_eq!(res.status(), StatusCode::OK);

    // Replenishment never overshoots the capacity.
    let tokens = repo.get("alice").await.unwrap().unwrap().tokens;
    assert!(tokens <= 30, "tokens {tokens} exceed capacity");

    shutdown.trigger();
}
