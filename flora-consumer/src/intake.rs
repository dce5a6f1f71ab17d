//! Proof intake (C5): validates and assembles inbound proofs, buffering
//! chunked submissions until complete. Rejections are a closed, stable
//! reason set surfaced as 400, with a machine-readable `code` field on
//! each rejection.

use std::collections::{HashMap, HashSet};

use flora_types::{AccountId, ChunkedProofPayload, ProofPayload};
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("request body is not a valid proof or proof chunk")]
    Malformed,
    #[error("floraAccountId does not match the configured value")]
    AccountMismatch,
    #[error("thresholdFingerprint does not match the configured value")]
    FingerprintMismatch,
    #[error("registryTopicId does not match the active adapter-category topic")]
    RegistryMismatch,
    #[error("petalAccountId does not match the previously observed binding for this petalId")]
    PetalAccountMismatch,
    #[error("petalStateTopicId does not match the previously observed binding for this petalId")]
    PetalTopicMismatch,
    #[error("participants do not match the expected set")]
    ParticipantMismatch,
    #[error("a duplicate proof for this petal/epoch was submitted with different content")]
    DuplicateMismatch,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Malformed => "malformed",
            ValidationError::AccountMismatch => "account_mismatch",
            ValidationError::FingerprintMismatch => "fingerprint_mismatch",
            ValidationError::RegistryMismatch => "registry_mismatch",
            ValidationError::PetalAccountMismatch => "petal_account_mismatch",
            ValidationError::PetalTopicMismatch => "petal_topic_mismatch",
            ValidationError::ParticipantMismatch => "participant_mismatch",
            ValidationError::DuplicateMismatch => "duplicate_mismatch",
        }
    }
}

#[derive(Debug)]
pub enum IntakeOutcome {
    /// A whole proof is ready for the aggregator.
    Accepted(ProofPayload),
    /// A chunk was buffered; the set is not complete yet.
    ChunkBuffered,
    /// The exact same proof was already accepted for this petal/epoch.
    DuplicateIgnored,
}

struct ChunkBucket {
    total_chunks: u32,
    parts: HashMap<u32, String>,
}

#[derive(Default)]
struct ChunkBuffer {
    buckets: HashMap<(String, u64), ChunkBucket>,
}

impl ChunkBuffer {
    fn push(&mut self, chunk: ChunkedProofPayload) -> Result<Option<ProofPayload>, ValidationError> {
        let key = (chunk.petal_id.clone(), chunk.epoch);
        let bucket = self.buckets.entry(key.clone()).or_insert_with(|| ChunkBucket {
            total_chunks: chunk.total_chunks,
            parts: HashMap::new(),
        });
        if bucket.total_chunks != chunk.total_chunks {
            return Err(ValidationError::Malformed);
        }
        bucket.parts.insert(chunk.chunk_id, chunk.data);

        if bucket.parts.len() as u32 != bucket.total_chunks {
            return Ok(None);
        }

        let mut data = String::new();
        for id in 1..=bucket.total_chunks {
            match bucket.parts.get(&id) {
                Some(part) => data.push_str(part),
                None => return Ok(None),
            }
        }
        self.buckets.remove(&key);

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&data)
            .map_err(|_| ValidationError::Malformed)?;
        let proof: ProofPayload = serde_json::from_slice(&bytes).map_err(|_| ValidationError::Malformed)?;
        Ok(Some(proof))
    }

    fn drop_epoch(&mut self, epoch: u64) {
        self.buckets.retain(|(_, e), _| *e != epoch);
    }
}

use base64::Engine;

/// Bindings learned at runtime: once a petal's account id / state topic id
/// is observed, subsequent proofs must reuse the same value (§4.5).
#[derive(Default)]
struct Bindings {
    account_ids: HashMap<String, AccountId>,
    state_topics: HashMap<String, String>,
}

pub struct Intake {
    flora_account_id: AccountId,
    threshold_fingerprint: String,
    registry_topic_id: String,
    expected_petals: usize,
    chunk_buffer: Mutex<ChunkBuffer>,
    bindings: Mutex<Bindings>,
    seen: Mutex<HashMap<(String, u64), ProofPayload>>,
}

impl Intake {
    pub fn new(
        flora_account_id: AccountId,
        threshold_fingerprint: String,
        registry_topic_id: String,
        expected_petals: usize,
    ) -> Self {
        Self {
            flora_account_id,
            threshold_fingerprint,
            registry_topic_id,
            expected_petals,
            chunk_buffer: Mutex::new(ChunkBuffer::default()),
            bindings: Mutex::new(Bindings::default()),
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub async fn accept(&self, body: serde_json::Value) -> Result<IntakeOutcome, ValidationError> {
        if let Ok(chunk) = serde_json::from_value::<ChunkedProofPayload>(body.clone()) {
            let assembled = {
                let mut buffer = self.chunk_buffer.lock().await;
                buffer.push(chunk)?
            };
            return match assembled {
                Some(proof) => self.finish(proof).await,
                None => Ok(IntakeOutcome::ChunkBuffered),
            };
        }

        let proof: ProofPayload = serde_json::from_value(body).map_err(|_| ValidationError::Malformed)?;
        self.finish(proof).await
    }

    async fn finish(&self, proof: ProofPayload) -> Result<IntakeOutcome, ValidationError> {
        self.validate(&proof).await?;

        let key = (proof.petal_id.clone(), proof.epoch);
        let mut seen = self.seen.lock().await;
        if let Some(existing) = seen.get(&key) {
            return if existing.state_hash == proof.state_hash {
                Ok(IntakeOutcome::DuplicateIgnored)
            } else {
                Err(ValidationError::DuplicateMismatch)
            };
        }
        seen.insert(key, proof.clone());
        Ok(IntakeOutcome::Accepted(proof))
    }

    async fn validate(&self, proof: &ProofPayload) -> Result<(), ValidationError> {
        if proof.flora_account_id != self.flora_account_id {
            return Err(ValidationError::AccountMismatch);
        }
        if proof.threshold_fingerprint != self.threshold_fingerprint {
            return Err(ValidationError::FingerprintMismatch);
        }
        if proof.registry_topic_id != self.registry_topic_id {
            return Err(ValidationError::RegistryMismatch);
        }

        let mut bindings = self.bindings.lock().await;
        match bindings.account_ids.get(&proof.petal_id) {
            Some(known) if *known != proof.petal_account_id => {
                return Err(ValidationError::PetalAccountMismatch);
            }
            Some(_) => {}
            None => {
                bindings
                    .account_ids
                    .insert(proof.petal_id.clone(), proof.petal_account_id.clone());
            }
        }
        match bindings.state_topics.get(&proof.petal_id) {
            Some(known) if *known != proof.petal_state_topic_id => {
                return Err(ValidationError::PetalTopicMismatch);
            }
            Some(_) => {}
            None => {
                bindings
                    .state_topics
                    .insert(proof.petal_id.clone(), proof.petal_state_topic_id.clone());
            }
        }
        drop(bindings);

        let declared: HashSet<&AccountId> = proof.participants.iter().collect();
        if declared.len() != self.expected_petals {
            return Err(ValidationError::ParticipantMismatch);
        }

        Ok(())
    }

    pub async fn drop_epoch(&self, epoch: u64) {
        self.chunk_buffer.lock().await.drop_epoch(epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flora_types::AdapterRecord;
    use std::collections::BTreeMap;

    fn proof(flora: &str, petal_id: &str, petal_account: &str, epoch: u64) -> ProofPayload {
        ProofPayload {
            epoch,
            state_hash: "hash".to_string(),
            threshold_fingerprint: "tf".to_string(),
            petal_id: petal_id.to_string(),
            petal_account_id: AccountId::new(petal_account),
            petal_state_topic_id: "0.0.20".to_string(),
            flora_account_id: AccountId::new(flora),
            participants: vec![AccountId::new("0.0.10"), AccountId::new("0.0.11"), AccountId::new("0.0.12")],
            records: vec![AdapterRecord {
                adapter_id: "binance".to_string(),
                entity_id: "HBAR-USD".to_string(),
                payload: serde_json::Map::new(),
                timestamp: Utc::now(),
                source_fingerprint: "fp".to_string(),
            }],
            adapter_fingerprints: BTreeMap::new(),
            registry_topic_id: "0.0.2".to_string(),
            timestamp: Utc::now(),
            hcs_message: None,
            consensus_timestamp: None,
            sequence_number: None,
        }
    }

    fn intake() -> Intake {
        Intake::new(AccountId::new("0.0.1"), "tf".to_string(), "0.0.2".to_string(), 3)
    }

    #[tokio::test]
    async fn rejects_wrong_flora_account_id() {
        let intake = intake();
        let body = serde_json::to_value(proof("0.0.99", "petal-a", "0.0.10", 0)).unwrap();
        let err = intake.accept(body).await.unwrap_err();
        assert_eq!(err.code(), "account_mismatch");
    }

    #[tokio::test]
    async fn accepts_a_well_formed_proof() {
        let intake = intake();
        let body = serde_json::to_value(proof("0.0.1", "petal-a", "0.0.10", 0)).unwrap();
        assert!(matches!(intake.accept(body).await.unwrap(), IntakeOutcome::Accepted(_)));
    }

    #[tokio::test]
    async fn resubmitting_identical_proof_is_idempotent() {
        let intake = intake();
        let body = serde_json::to_value(proof("0.0.1", "petal-a", "0.0.10", 0)).unwrap();
        intake.accept(body.clone()).await.unwrap();
        assert!(matches!(
            intake.accept(body).await.unwrap(),
            IntakeOutcome::DuplicateIgnored
        ));
    }

    #[tokio::test]
    async fn petal_account_binding_is_enforced_after_first_observation() {
        let intake = intake();
        let first = serde_json::to_value(proof("0.0.1", "petal-a", "0.0.10", 0)).unwrap();
        intake.accept(first).await.unwrap();
        let second = serde_json::to_value(proof("0.0.1", "petal-a", "0.0.99", 1)).unwrap();
        let err = intake.accept(second).await.unwrap_err();
        assert_eq!(err.code(), "petal_account_mismatch");
    }

    #[tokio::test]
    async fn three_chunks_out_of_order_reassemble_into_one_proof() {
        let intake = intake();
        let original = proof("0.0.1", "petal-a", "0.0.10", 0);
        let encoded = base64::engine::general_purpose::STANDARD.encode(serde_json::to_vec(&original).unwrap());
        let third = encoded.len() / 3;
        let parts = [
            &encoded[..third],
            &encoded[third..2 * third],
            &encoded[2 * third..],
        ];

        for (chunk_id, part) in [(2u32, parts[1]), (1, parts[0])] {
            let chunk = ChunkedProofPayload {
                epoch: 0,
                petal_id: "petal-a".to_string(),
                chunk_id,
                total_chunks: 3,
                data: part.to_string(),
            };
            let outcome = intake.accept(serde_json::to_value(chunk).unwrap()).await.unwrap();
            assert!(matches!(outcome, IntakeOutcome::ChunkBuffered));
        }

        let chunk = ChunkedProofPayload {
            epoch: 0,
            petal_id: "petal-a".to_string(),
            chunk_id: 3,
            total_chunks: 3,
            data: parts[2].to_string(),
        };
        let outcome = intake.accept(serde_json::to_value(chunk).unwrap()).await.unwrap();
        match outcome {
            IntakeOutcome::Accepted(assembled) => assert_eq!(assembled.state_hash, original.state_hash),
            other => panic!("expected assembled proof, got {other:?}"),
        }
    }
}
