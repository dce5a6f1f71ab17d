//! Wire data model (§3) plus the state-hash computation that ties proof
//! builder (C3) and aggregator (C6) back to the canonicalizer (C1).

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::canon::{hash_canonical, Canonical, ToCanonical};

fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One adapter's observation for one epoch. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdapterRecord {
    pub adapter_id: String,
    pub entity_id: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub source_fingerprint: String,
}

impl AdapterRecord {
    pub fn sort_key(&self) -> (String, String) {
        (self.adapter_id.clone(), self.entity_id.clone())
    }

    pub fn price(&self) -> Option<f64> {
        self.payload.get("price").and_then(|v| v.as_f64())
    }

    pub fn source(&self) -> Option<&str> {
        self.payload.get("source").and_then(|v| v.as_str())
    }
}

impl ToCanonical for AdapterRecord {
    fn to_canonical(&self) -> Canonical {
        Canonical::object([
            ("adapterId".to_string(), Canonical::String(self.adapter_id.clone())),
            ("entityId".to_string(), Canonical::String(self.entity_id.clone())),
            (
                "payload".to_string(),
                Canonical::from(&serde_json::Value::Object(self.payload.clone())),
            ),
            ("timestamp".to_string(), Canonical::String(iso(&self.timestamp))),
            (
                "sourceFingerprint".to_string(),
                Canonical::String(self.source_fingerprint.clone()),
            ),
        ])
    }
}

/// Computes `sourceFingerprint`: hex SHA-384 of the canonicalized payload.
pub fn fingerprint_payload(payload: &serde_json::Map<String, serde_json::Value>) -> String {
    hash_canonical(&serde_json::Value::Object(payload.clone()))
}

/// Inputs to the state hash (§4.5 invariant 2): `SHA384(canonicalize({records:
/// sorted(records), thresholdFingerprint, adapterFingerprints, registryTopicId}))`.
pub struct StateHashInput<'a> {
    pub records: &'a [AdapterRecord],
    pub threshold_fingerprint: &'a str,
    pub adapter_fingerprints: &'a BTreeMap<String, String>,
    pub registry_topic_id: &'a str,
}

impl ToCanonical for StateHashInput<'_> {
    fn to_canonical(&self) -> Canonical {
        let mut sorted: Vec<&AdapterRecord> = self.records.iter().collect();
        sorted.sort_by_key(|r| r.sort_key());

        Canonical::object([
            (
                "records".to_string(),
                Canonical::Array(sorted.iter().map(|r| r.to_canonical()).collect()),
            ),
            (
                "thresholdFingerprint".to_string(),
                Canonical::String(self.threshold_fingerprint.to_string()),
            ),
            (
                "adapterFingerprints".to_string(),
                Canonical::Object(
                    self.adapter_fingerprints
                        .iter()
                        .map(|(k, v)| (k.clone(), Canonical::String(v.clone())))
                        .collect(),
                ),
            ),
            (
                "registryTopicId".to_string(),
                Canonical::String(self.registry_topic_id.to_string()),
            ),
        ])
    }
}

pub fn compute_state_hash(
    records: &[AdapterRecord],
    threshold_fingerprint: &str,
    adapter_fingerprints: &BTreeMap<String, String>,
    registry_topic_id: &str,
) -> String {
    hash_canonical(&StateHashInput {
        records,
        threshold_fingerprint,
        adapter_fingerprints,
        registry_topic_id,
    })
}

/// One petal's epoch submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    pub epoch: u64,
    pub state_hash: String,
    pub threshold_fingerprint: String,
    pub petal_id: String,
    pub petal_account_id: AccountId,
    pub petal_state_topic_id: String,
    pub flora_account_id: AccountId,
    pub participants: Vec<AccountId>,
    pub records: Vec<AdapterRecord>,
    pub adapter_fingerprints: BTreeMap<String, String>,
    pub registry_topic_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcs_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
}

impl ProofPayload {
    pub fn recompute_state_hash(&self) -> String {
        compute_state_hash(
            &self.records,
            &self.threshold_fingerprint,
            &self.adapter_fingerprints,
            &self.registry_topic_id,
        )
    }

    /// Invariant 2 of §3: the declared `stateHash` must match the recomputed one.
    pub fn has_valid_state_hash(&self) -> bool {
        self.recompute_state_hash() == self.state_hash
    }

    /// Metadata has not yet been backfilled by the log tailer.
    pub fn is_pending_metadata(&self) -> bool {
        self.consensus_timestamp.is_none() || self.sequence_number.is_none()
    }
}

/// A single chunk of a proof payload too large (or deliberately split) to
/// submit in one message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedProofPayload {
    pub epoch: u64,
    pub petal_id: String,
    pub chunk_id: u32,
    pub total_chunks: u32,
    pub data: String,
}

/// One `{source, price}` entry flattened out of a consolidated `matching` group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePrice {
    pub source: String,
    pub price: f64,
}

/// Result of aggregation for one epoch. Permanent once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusEntry {
    pub epoch: u64,
    pub state_hash: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub participants: Vec<AccountId>,
    pub sources: Vec<SourcePrice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hcs_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
}

impl ConsensusEntry {
    /// Has this entry already been stamped with log metadata? Once true,
    /// further metadata application must be a no-op (invariant 9 of §8).
    pub fn has_metadata(&self) -> bool {
        self.consensus_timestamp.is_some() && self.sequence_number.is_some()
    }
}

/// §6 state-topic message format, shared by petal and flora publications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTopicMessage {
    pub p: String,
    pub op: String,
    pub m: String,
    pub account_id: AccountId,
    pub state_hash: String,
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<AccountId>>,
}

impl StateTopicMessage {
    pub fn petal_marker(epoch: u64) -> String {
        format!("hcs17:{epoch}")
    }
}

/// Rounds a price to 8 decimal places the way `ConsensusEntry.price` and
/// S1's expected `0.07100000` are specified.
pub fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

/// Standard median: odd `n` takes the middle, even `n` averages the two
/// middles. Rounded to 8 decimals (§4.6, testable property 4).
pub fn median_rounded(prices: &[f64]) -> f64 {
    let mut sorted = prices.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    let median = if n % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    };
    round8(median)
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
            source_fingerprint: fingerprint_payload(&payload),
            payload,
            timestamp: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn median_odd_takes_middle() {
        assert_eq!(median_rounded(&[0.07, 0.071, 0.072]), 0.071);
    }

    #[test]
    fn median_even_averages_middles() {
        assert_eq!(median_rounded(&[0.07, 0.08]), 0.075);
    }

    #[test]
    fn state_hash_is_order_independent_of_record_insertion() {
        let a = vec![record("binance", 0.07), record("coingecko", 0.071)];
        let b = vec![record("coingecko", 0.071), record("binance", 0.07)];
        let fps = BTreeMap::new();
        let ha = compute_state_hash(&a, "tf", &fps, "0.0.1");
        let hb = compute_state_hash(&b, "tf", &fps, "0.0.1");
        assert_eq!(ha, hb);
    }

    #[test]
    fn proof_payload_validates_its_own_hash() {
        let records = vec![record("binance", 0.07)];
        let fps = BTreeMap::new();
        let hash = compute_state_hash(&records, "tf", &fps, "0.0.1");
        let proof = ProofPayload {
            epoch: 0,
            state_hash: hash,
            threshold_fingerprint: "tf".to_string(),
            petal_id: "petal-a".to_string(),
            petal_account_id: AccountId::new("0.0.10"),
            petal_state_topic_id: "0.0.20".to_string(),
            flora_account_id: AccountId::new("0.0.1"),
            participants: vec![AccountId::new("0.0.10")],
            records,
            adapter_fingerprints: fps,
            registry_topic_id: "0.0.1".to_string(),
            timestamp: Utc::now(),
            hcs_message: None,
            consensus_timestamp: None,
            sequence_number: None,
        };
        assert!(proof.has_valid_state_hash());
    }
}
