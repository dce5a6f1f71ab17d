//! Proof builder (C3): turns one epoch's adapter records into a signed
//! (content-hashed) [`ProofPayload`]. Pure function, no I/O: the timestamp
//! is derived from the epoch, never from the wall clock, so every petal
//! hashing the same adapter data agrees.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use flora_types::{compute_state_hash, AccountId, AdapterRecord, ProofPayload};

#[derive(Debug, Clone)]
pub struct ProofBuilderConfig {
    pub epoch_origin_ms: i64,
    pub block_time_ms: u64,
    pub threshold_fingerprint: String,
    pub adapter_fingerprints: BTreeMap<String, String>,
    pub registry_topic_id: String,
    pub flora_account_id: AccountId,
    pub petal_id: String,
    pub petal_account_id: AccountId,
    pub petal_state_topic_id: String,
    pub participants: Vec<AccountId>,
}

impl ProofBuilderConfig {
    pub fn epoch_timestamp(&self, epoch: u64) -> DateTime<Utc> {
        let millis = self.epoch_origin_ms + (epoch as i64) * (self.block_time_ms as i64);
        Utc.timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Builds the proof for `epoch` out of the adapter records sampled this
/// tick. Steps follow §4.3: re-stamp timestamps, sort, hash.
pub fn build_proof(
    epoch: u64,
    mut records: Vec<AdapterRecord>,
    config: &ProofBuilderConfig,
) -> ProofPayload {
    let epoch_timestamp = config.epoch_timestamp(epoch);
    for record in &mut records {
        record.timestamp = epoch_timestamp;
    }
    records.sort_by_key(|r| r.sort_key());

    let state_hash = compute_state_hash(
        &records,
        &config.threshold_fingerprint,
        &config.adapter_fingerprints,
        &config.registry_topic_id,
    );

    ProofPayload {
        epoch,
        state_hash,
        threshold_fingerprint: config.threshold_fingerprint.clone(),
        petal_id: config.petal_id.clone(),
        petal_account_id: config.petal_account_id.clone(),
        petal_state_topic_id: config.petal_state_topic_id.clone(),
        flora_account_id: config.flora_account_id.clone(),
        participants: config.participants.clone(),
        records,
        adapter_fingerprints: config.adapter_fingerprints.clone(),
        registry_topic_id: config.registry_topic_id.clone(),
        timestamp: epoch_timestamp,
        hcs_message: None,
        consensus_timestamp: None,
        sequence_number: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(adapter: &str, price: f64) -> AdapterRecord {
        let mut payload = serde_json::Map::new();
        payload.insert("price".to_string(), json!(price));
        payload.insert("source".to_string(), json!(adapter));
        AdapterRecord {
            adapter_id: adapter.to_string(),
            entity_id: "HBAR-USD".to_string(),
            source_fingerprint: flora_types::fingerprint_payload(&payload),
            payload,
            timestamp: Utc::now(),
        }
    }

    fn config() -> ProofBuilderConfig {
        ProofBuilderConfig {
            epoch_origin_ms: 1_700_000_000_000,
            block_time_ms: 2_000,
            threshold_fingerprint: "tf".to_string(),
            adapter_fingerprints: BTreeMap::new(),
            registry_topic_id: "0.0.2".to_string(),
            flora_account_id: AccountId::new("0.0.1"),
            petal_id: "petal-a".to_string(),
            petal_account_id: AccountId::new("0.0.10"),
            petal_state_topic_id: "0.0.20".to_string(),
            participants: vec![AccountId::new("0.0.10"), AccountId::new("0.0.11")],
        }
    }

    #[test]
    fn timestamp_is_derived_from_epoch_not_wall_clock() {
        let cfg = config();
        let proof = build_proof(3, vec![record("binance", 0.07)], &cfg);
        assert_eq!(proof.timestamp, cfg.epoch_timestamp(3));
        assert_eq!(proof.records[0].timestamp, proof.timestamp);
    }

    #[test]
    fn state_hash_matches_recomputation() {
        let cfg = config();
        let proof = build_proof(0, vec![record("binance", 0.07), record("coingecko", 0.071)], &cfg);
        assert!(proof.has_valid_state_hash());
    }

    #[test]
    fn records_are_sorted_by_adapter_then_entity() {
        let cfg = config();
        let proof = build_proof(0, vec![record("zeta", 0.1), record("alpha", 0.2)], &cfg);
        assert_eq!(proof.records[0].adapter_id, "alpha");
        assert_eq!(proof.records[1].adapter_id, "zeta");
    }

    #[test]
    fn two_petals_with_same_inputs_produce_the_same_hash() {
        let cfg = config();
        let a = build_proof(7, vec![record("binance", 0.07), record("coingecko", 0.071)], &cfg);
        let b = build_proof(
            7,
            vec![record("coingecko", 0.071), record("binance", 0.07)],
            &cfg,
        );
        assert_eq!(a.state_hash, b.state_hash);
    }
}
