//! End-to-end coverage over the full Consumer stack: HTTP intake, the
//! aggregator, the leader publisher and the log tailer wired together
//! against an in-memory ledger and an in-memory SQLite store, driven
//! through the actual `axum::Router`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use flora_config::ConsumerConfig;
use flora_config::HederaNetwork;
use flora_consumer::aggregator::Aggregator;
use flora_consumer::http::router;
use flora_consumer::intake::Intake;
use flora_consumer::leader::LeaderPublisher;
use flora_consumer::roster::{AccountKeyCache, Roster};
use flora_consumer::state::AppState;
use flora_consumer::tailer::LogTailer;
use flora_dal::ConsensusEntriesDal;
use flora_ledger::{InMemoryLedgerClient, LedgerClient};
use flora_types::{compute_state_hash, AccountId, AdapterRecord, ProofPayload, StateTopicMessage};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

const FLORA_ACCOUNT: &str = "0.0.1";
const FLORA_STATE_TOPIC: &str = "0.0.30";
const REGISTRY_TOPIC: &str = "0.0.2";
const THRESHOLD_FINGERPRINT: &str = "tf";

fn test_config() -> ConsumerConfig {
    ConsumerConfig {
        network: HederaNetwork::Testnet,
        mirror_base_url: "http://localhost:5551".to_string(),
        flora_account_id: FLORA_ACCOUNT.to_string(),
        flora_state_topic_id: FLORA_STATE_TOPIC.to_string(),
        flora_coordination_topic_id: None,
        flora_transaction_topic_id: None,
        flora_discovery_topic_id: None,
        threshold_fingerprint: THRESHOLD_FINGERPRINT.to_string(),
        registry_topic_id: REGISTRY_TOPIC.to_string(),
        quorum: 2,
        expected_petals: 3,
        poll_interval_ms: 10_000,
        mirror_timeout_ms: 5_000,
        port: 0,
        petal_key_secret: "test-secret-at-least-this-long".to_string(),
        database_url: "sqlite::memory:".to_string(),
    }
}

async fn memory_entries_dal() -> Arc<ConsensusEntriesDal> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("../flora-dal/migrations").run(&pool).await.unwrap();
    Arc::new(ConsensusEntriesDal::new(pool))
}

fn adapter_record(adapter: &str, price: f64) -> AdapterRecord {
    let mut payload = serde_json::Map::new();
    payload.insert("price".to_string(), json!(price));
    payload.insert("source".to_string(), json!(adapter));
    AdapterRecord {
        adapter_id: adapter.to_string(),
        entity_id: "HBAR-USD".to_string(),
        source_fingerprint: flora_types::fingerprint_payload(&payload),
        payload,
        timestamp: chrono::Utc::now(),
    }
}

fn petal_proof(petal_id: &str, petal_account: &str, petal_topic: &str, epoch: u64, records: Vec<AdapterRecord>) -> ProofPayload {
    let fps = BTreeMap::new();
    let state_hash = compute_state_hash(&records, THRESHOLD_FINGERPRINT, &fps, REGISTRY_TOPIC);
    ProofPayload {
        epoch,
        state_hash,
        threshold_fingerprint: THRESHOLD_FINGERPRINT.to_string(),
        petal_id: petal_id.to_string(),
        petal_account_id: AccountId::new(petal_account),
        petal_state_topic_id: petal_topic.to_string(),
        flora_account_id: AccountId::new(FLORA_ACCOUNT),
        participants: vec![AccountId::new("0.0.10"), AccountId::new("0.0.11"), AccountId::new("0.0.12")],
        records,
        adapter_fingerprints: fps,
        registry_topic_id: REGISTRY_TOPIC.to_string(),
        timestamp: chrono::Utc::now(),
        hcs_message: None,
        consensus_timestamp: None,
        sequence_number: None,
    }
}

/// Seeds the ledger with the marker message a petal would have already
/// published to its own state topic, so leader-side revalidation
/// succeeds on the first attempt instead of retrying.
async fn seed_state_topic_marker(ledger: &InMemoryLedgerClient, proof: &ProofPayload) {
    let marker = json!({
        "p": "hcs-17",
        "op": "state_hash",
        "m": StateTopicMessage::petal_marker(proof.epoch),
        "account_id": proof.petal_account_id,
        "state_hash": proof.state_hash,
    });
    ledger
        .submit_message(&proof.petal_state_topic_id, &marker, proof.petal_account_id.as_str())
        .await
        .unwrap();
}

struct Harness {
    app: axum::Router,
    ledger: Arc<InMemoryLedgerClient>,
    dal: Arc<ConsensusEntriesDal>,
    tailer: Arc<LogTailer>,
}

async fn build_harness() -> Harness {
    let config = test_config();
    let ledger = Arc::new(InMemoryLedgerClient::new());
    let dal = memory_entries_dal().await;

    let leader_publisher = Arc::new(LeaderPublisher::new(
        ledger.clone(),
        AccountId::new(FLORA_ACCOUNT),
        THRESHOLD_FINGERPRINT.to_string(),
        FLORA_STATE_TOPIC.to_string(),
        config.published_topics(),
        dal.clone(),
    ));
    let aggregator = Arc::new(tokio::sync::Mutex::new(Aggregator::new()));
    let intake = Intake::new(
        AccountId::new(FLORA_ACCOUNT),
        THRESHOLD_FINGERPRINT.to_string(),
        REGISTRY_TOPIC.to_string(),
        config.expected_petals,
    );
    let tailer = Arc::new(LogTailer::new(
        ledger.clone(),
        FLORA_STATE_TOPIC.to_string(),
        "0".to_string(),
        aggregator.clone(),
        dal.clone(),
        leader_publisher.clone(),
        config.quorum,
    ));

    let state = Arc::new(AppState {
        account_keys: AccountKeyCache::new(ledger.clone()),
        config,
        intake,
        aggregator,
        dal: dal.clone(),
        leader_publisher,
        ledger: ledger.clone(),
        roster: tokio::sync::Mutex::new(Roster::new()),
    });

    Harness {
        app: router(state),
        ledger,
        dal,
        tailer,
    }
}

async fn post_json(app: &axum::Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_json(app: &axum::Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().method("GET").uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s1_quorum_via_http_publishes_and_persists() {
    let h = build_harness().await;
    let records = vec![adapter_record("binance", 0.07), adapter_record("coingecko", 0.071)];

    let a = petal_proof("petal-a", "0.0.10", "0.0.20", 0, records.clone());
    let b = petal_proof("petal-b", "0.0.11", "0.0.21", 0, records.clone());
    seed_state_topic_marker(&h.ledger, &a).await;
    seed_state_topic_marker(&h.ledger, &b).await;

    let (status, body) = post_json(&h.app, "/proof", serde_json::to_value(&a).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (status, body) = post_json(&h.app, "/proof", serde_json::to_value(&b).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    // the leader publish is spawned off the request path; give it room to run
    tokio::time::sleep(Duration::from_millis(100)).await;

    let messages = h
        .ledger
        .read_topic_messages(FLORA_STATE_TOPIC, flora_ledger::TopicReadFilter::default())
        .await
        .unwrap();
    assert_eq!(messages.len(), 1, "exactly one consolidated message should have been published");

    let entry = h.dal.get(0).await.unwrap().expect("entry persisted");
    assert_eq!(entry.price, 0.0705);
    assert!(
        entry.consensus_timestamp.is_some() && entry.sequence_number.is_some(),
        "the leader stamps metadata itself once its own publish succeeds"
    );

    let (status, body) = get_json(&h.app, "/price/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["epoch"], 0);
}

#[tokio::test]
async fn s4_rejects_mismatched_flora_account_with_structured_error() {
    let h = build_harness().await;
    let mut proof = petal_proof("petal-a", "0.0.10", "0.0.20", 0, vec![adapter_record("binance", 0.07)]);
    proof.flora_account_id = AccountId::new("0.0.99");

    let (status, body) = post_json(&h.app, "/proof", serde_json::to_value(&proof).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "account_mismatch");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s3_chunked_proof_reassembles_and_joins_quorum() {
    let h = build_harness().await;
    let records = vec![adapter_record("binance", 0.07)];
    let a = petal_proof("petal-a", "0.0.10", "0.0.20", 7, records.clone());
    let b = petal_proof("petal-b", "0.0.11", "0.0.21", 7, records);
    seed_state_topic_marker(&h.ledger, &a).await;
    seed_state_topic_marker(&h.ledger, &b).await;

    let encoded = {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&a).unwrap())
    };
    let half = encoded.len() / 2;
    let chunk1 = json!({"epoch": 7, "petalId": "petal-a", "chunkId": 1, "totalChunks": 2, "data": &encoded[..half]});
    let chunk2 = json!({"epoch": 7, "petalId": "petal-a", "chunkId": 2, "totalChunks": 2, "data": &encoded[half..]});

    let (status, body) = post_json(&h.app, "/proof", chunk1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "buffered");

    let (status, body) = post_json(&h.app, "/proof", chunk2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (status, body) = post_json(&h.app, "/proof", serde_json::to_value(&b).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let entry = h.dal.get(7).await.unwrap().expect("quorum reached via reassembled chunk");
    assert_eq!(entry.price, 0.07);
}

/// Covers the case the leader-publish path doesn't itself stamp: an entry
/// whose consolidated message was discovered on the flora topic by some
/// other route (e.g. a legacy direct-to-topic petal, or a restart that
/// re-learns metadata for an entry inserted before a crash).
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s6_tailer_backfills_metadata_exactly_once() {
    let h = build_harness().await;
    let entry = flora_types::ConsensusEntry {
        epoch: 2,
        state_hash: "deadbeef".to_string(),
        price: 0.07,
        timestamp: chrono::Utc::now(),
        participants: vec![AccountId::new("0.0.10"), AccountId::new("0.0.11"), AccountId::new("0.0.12")],
        sources: vec![],
        hcs_message: None,
        consensus_timestamp: None,
        sequence_number: None,
    };
    h.dal.insert(&entry).await.unwrap();

    let consolidated = json!({
        "p": "hcs-17",
        "op": "state_hash",
        "m": "hcs17:2",
        "account_id": FLORA_ACCOUNT,
        "state_hash": "deadbeef",
        "epoch": 2,
    });
    h.ledger
        .submit_message(FLORA_STATE_TOPIC, &consolidated, FLORA_ACCOUNT)
        .await
        .unwrap();

    h.tailer.clone().poll_once().await;
    let after_first = h.dal.get(2).await.unwrap().expect("entry still present");
    assert!(after_first.consensus_timestamp.is_some(), "tailer should have stamped metadata");
    let stamped_at = after_first.consensus_timestamp.clone().unwrap();

    let applied_again = h
        .dal
        .apply_metadata(2, "hcs://17/different", "9999999999.000000001", 999)
        .await
        .unwrap();
    assert!(!applied_again, "a second application must be a no-op");

    let after_second = h.dal.get(2).await.unwrap().unwrap();
    assert_eq!(
        after_second.consensus_timestamp.unwrap(),
        stamped_at,
        "metadata must only be applied once, even if attempted again with different values"
    );
}
