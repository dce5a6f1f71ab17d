//! HTTP surface (C10). Grounded on `via_verifier_coordinator::coordinator::
//! {api_decl,api_impl}`: a shared state struct wrapped in `Arc`, routes
//! built with `axum::Router`, permissive CORS and a 1 MiB body limit.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use flora_types::ConsensusEntry;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::intake::{IntakeOutcome, ValidationError};
use crate::metrics::METRICS;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MIN_HISTORY_LIMIT: u32 = 1;
const MAX_HISTORY_LIMIT: u32 = 200;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/proof", post(post_proof))
        .route("/price/latest", get(get_price_latest))
        .route("/price/history", get(get_price_history))
        .route("/adapters", get(get_adapters))
        .route("/health", get(get_health))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": self.code(), "message": self.to_string()})),
        )
            .into_response()
    }
}

async fn post_proof(State(state): State<Arc<AppState>>, Json(body): Json<serde_json::Value>) -> Response {
    let outcome = match state.intake.accept(body).await {
        Ok(outcome) => outcome,
        Err(err) => {
            METRICS.proofs_rejected.inc();
            return err.into_response();
        }
    };

    let proof = match outcome {
        IntakeOutcome::Accepted(proof) => proof,
        IntakeOutcome::ChunkBuffered => {
            return (StatusCode::OK, Json(json!({"status": "buffered"}))).into_response()
        }
        IntakeOutcome::DuplicateIgnored => {
            return (StatusCode::OK, Json(json!({"status": "duplicate"}))).into_response()
        }
    };

    METRICS.proofs_accepted.inc();
    state.roster.lock().await.observe(&proof);

    let epoch = proof.epoch;
    let quorum = state.config.quorum;
    let (maybe_entry, proofs_snapshot) = {
        let mut aggregator = state.aggregator.lock().await;
        let entry = aggregator.accept(proof, quorum);
        (entry, aggregator.proofs_for_epoch(epoch))
    };

    if let Some(entry) = maybe_entry {
        METRICS.consensus_entries_emitted.inc();
        state.intake.drop_epoch(epoch).await;
        if let Err(err) = state.dal.insert(&entry).await {
            tracing::warn!(epoch, error = %err, "failed to persist new consensus entry");
        }
        state.leader_publisher.publish(entry, proofs_snapshot);
    }

    (StatusCode::OK, Json(json!({"status": "accepted"}))).into_response()
}

fn entry_response(entry: ConsensusEntry, flora_state_topic_id: &str) -> serde_json::Value {
    let mut value = serde_json::to_value(&entry).unwrap_or(json!({}));
    if value.get("hcsMessage").and_then(|v| v.as_str()).is_none() {
        value["hcsMessage"] = json!(format!("hcs://17/{flora_state_topic_id}"));
    }
    value
}

async fn get_price_latest(State(state): State<Arc<AppState>>) -> Response {
    match state.dal.latest().await {
        Ok(Some(entry)) => {
            Json(entry_response(entry, &state.config.flora_state_topic_id)).into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to load latest consensus entry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    offset: Option<u32>,
    limit: Option<u32>,
}

async fn get_price_history(State(state): State<Arc<AppState>>, Query(query): Query<HistoryQuery>) -> Response {
    let offset = query.offset.unwrap_or(0);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);

    match state.dal.page(offset, limit).await {
        Ok((total, items)) => {
            let items: Vec<_> = items
                .into_iter()
                .map(|e| entry_response(e, &state.config.flora_state_topic_id))
                .collect();
            Json(json!({"total": total, "offset": offset, "limit": limit, "items": items})).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to load consensus history");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_adapters(State(state): State<Arc<AppState>>) -> Response {
    let roster = state.roster.lock().await;
    let mut petals = Vec::new();
    for petal in roster.petals() {
        let key = state.account_keys.get(petal.account_id.as_str()).await;
        petals.push(json!({
            "petalId": petal.petal_id,
            "accountId": petal.account_id,
            "stateTopicId": petal.state_topic_id,
            "adaptersSeen": petal.adapters_seen,
            "fingerprints": petal.fingerprints,
            "publicKey": key.as_ref().map(|k| &k.public_key),
            "keyType": key.as_ref().map(|k| &k.key_type),
        }));
    }

    Json(json!({
        "petals": petals,
        "adapters": roster.aggregate_adapters(),
        "fingerprints": roster.aggregate_fingerprints(),
        "topics": {
            "floraStateTopicId": state.config.flora_state_topic_id,
            "registryTopicId": state.config.registry_topic_id,
        },
        "network": state.config.network.to_string(),
        "floraAccountId": state.config.flora_account_id,
    }))
    .into_response()
}

async fn get_health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}
