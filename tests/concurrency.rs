//! Concurrent duplicates of one logical request.

use futures_util::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value};

use academy_gateway::config::InFlightPolicy;
use academy_gateway::idempotency::IdempotencyStore;

mod common;

const CONCURRENCY: usize = 20;

async fn fire(gw: &common::TestGateway, token: &str) -> Vec<reqwest::Response> {
    let client = reqwest::Client::new();
    let requests = (0..CONCURRENCY).map(|_| {
        client
            .post(gw.url("/api/v1/payments"))
            .bearer_auth("key_42")
            .header("Idempotency-Key", token)
            .json(&json!({ "amount": 4200, "currency": "nok" }))
            .send()
    });
    join_all(requests)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect()
}

#[tokio::test]
async fn test_concurrent_duplicates_execute_once() {
    let gw = common::start_gateway(common::test_config()).await;

    let responses = fire(&gw, "burst-1").await;

    let mut originals = 0;
    let mut bodies = Vec::new();
    for res in responses {
        assert_eq!(res.status(), StatusCode::CREATED);
        if res.headers().get("idempotent-replayed").is_none() {
            originals += 1;
        }
        bodies.push(res.json::<Value>().await.unwrap());
    }

    assert_eq!(originals, 1);
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(bodies[0]["currency"], "NOK");
    assert_eq!(gw.state.ledger.count(), 1);
    assert_eq!(gw.store.len(), 1);

    gw.shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_duplicates_with_reject_policy() {
    let mut config = common::test_config();
    config.idempotency.in_flight = InFlightPolicy::Reject;
    let gw = common::start_gateway(config).await;

    let responses = fire(&gw, "burst-2").await;

    // Duplicates that arrive after the original finished are replays, the
    // rest overlap it and are refused. Only one response may be an original.
    let mut originals = Vec::new();
    let mut replays = Vec::new();
    let mut conflicts = 0;
    for res in responses {
        match res.status() {
            StatusCode::CREATED => {
                let replayed = res.headers().contains_key("idempotent-replayed");
                let body: Value = res.json().await.unwrap();
                if replayed {
                    replays.push(body);
                } else {
                    originals.push(body);
                }
            }
            StatusCode::CONFLICT => {
                assert!(res.headers().contains_key("retry-after"));
                let body: Value = res.json().await.unwrap();
                assert_eq!(body["error"]["code"], "duplicate_in_flight");
                conflicts += 1;
            }
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(originals.len(), 1);
    assert_eq!(originals.len() + replays.len() + conflicts, CONCURRENCY);
    assert!(replays.iter().all(|body| *body == originals[0]));
    assert_eq!(gw.state.ledger.count(), 1);
    assert_eq!(gw.store.len(), 1);
}

#[tokio::test]
async fn test_distinct_tokens_run_in_parallel() {
    let gw = common::start_gateway(common::test_config()).await;
    let client = reqwest::Client::new();

    let requests = (0..CONCURRENCY).map(|i| {
        client
            .post(gw.url("/api/v1/payments"))
            .bearer_auth("key_7")
            .header("Idempotency-Key", format!("order-{i}"))
            .json(&json!({ "amount": 100 + i }))
            .send()
    });
    let statuses: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .map(|r| r.unwrap().status())
        .collect();

    assert!(statuses.iter().all(|s| *s == StatusCode::CREATED));
    assert_eq!(gw.state.ledger.count(), CONCURRENCY);
    assert_eq!(gw.store.len(), CONCURRENCY);
}
