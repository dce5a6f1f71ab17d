//! Leader publisher (C7): elects a rotating leader per epoch, revalidates
//! each contributing proof against its petal's own state topic, then
//! publishes the consolidated consensus message. Retries never block the
//! aggregator's accept path: retries are scheduled with
//! `tokio::time::sleep`-based backoff, never awaited inline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use flora_ledger::{LedgerClient, TopicReadFilter};
use flora_types::{AccountId, ConsensusEntry, ProofPayload, StateTopicMessage};
use tokio::sync::Mutex;

use crate::metrics::METRICS;

const STATE_TOPIC_VALIDATION_ATTEMPTS: u32 = 6;
const STATE_TOPIC_VALIDATION_DELAY: Duration = Duration::from_secs(2);
const RETRY_BASE: u64 = 5;
const RETRY_CAP: u64 = 120;

#[derive(Debug, thiserror::Error)]
enum PublishError {
    #[error("could not validate petal {petal_id}'s state topic publication")]
    StateTopicValidation { petal_id: String },
    #[error("ledger submission failed: {0}")]
    Submit(String),
}

pub struct LeaderPublisher {
    ledger: Arc<dyn LedgerClient>,
    flora_account_id: AccountId,
    threshold_fingerprint: String,
    flora_state_topic_id: String,
    published_topics: Vec<String>,
    dal: Arc<flora_dal::ConsensusEntriesDal>,
    in_flight: Mutex<HashSet<u64>>,
}

impl LeaderPublisher {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        flora_account_id: AccountId,
        threshold_fingerprint: String,
        flora_state_topic_id: String,
        published_topics: Vec<String>,
        dal: Arc<flora_dal::ConsensusEntriesDal>,
    ) -> Self {
        Self {
            ledger,
            flora_account_id,
            threshold_fingerprint,
            flora_state_topic_id,
            published_topics,
            dal,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// `P[|e| mod len(P)]` (§4.7, testable property 6).
    pub fn elect_leader(participants: &[AccountId], epoch: u64) -> &AccountId {
        &participants[(epoch as usize) % participants.len()]
    }

    /// Spawns the publish attempt for `entry` unless one is already in
    /// flight for this epoch. Non-blocking.
    pub fn publish(self: &Arc<Self>, entry: ConsensusEntry, proofs: Vec<ProofPayload>) {
        let epoch = entry.epoch;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut guard = this.in_flight.lock().await;
                if !guard.insert(epoch) {
                    return;
                }
            }
            this.run_with_retries(entry, proofs).await;
            this.in_flight.lock().await.remove(&epoch);
        });
    }

    async fn run_with_retries(&self, entry: ConsensusEntry, proofs: Vec<ProofPayload>) {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.try_publish_once(&entry, &proofs).await {
                Ok(()) => {
                    METRICS.leader_publish_successes.inc();
                    return;
                }
                Err(err) => {
                    METRICS.leader_publish_failures.inc();
                    tracing::warn!(epoch = entry.epoch, attempt, error = %err, "leader publish attempt failed, retrying");
                    let delay = Duration::from_secs((RETRY_BASE * attempt).min(RETRY_CAP));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_publish_once(&self, entry: &ConsensusEntry, proofs: &[ProofPayload]) -> Result<(), PublishError> {
        for proof in proofs {
            self.validate_proof_on_topic(proof).await?;
        }

        let leader = Self::elect_leader(&entry.participants, entry.epoch);
        let message = StateTopicMessage {
            p: "hcs-17".to_string(),
            op: "state_hash".to_string(),
            m: StateTopicMessage::petal_marker(entry.epoch),
            account_id: self.flora_account_id.clone(),
            state_hash: entry.state_hash.clone(),
            topics: self.published_topics.clone(),
            epoch: Some(entry.epoch),
            price: Some(entry.price),
            threshold_fingerprint: Some(self.threshold_fingerprint.clone()),
            participants: Some(entry.participants.clone()),
        };
        let payload = serde_json::to_value(&message).map_err(|e| PublishError::Submit(e.to_string()))?;

        let receipt = self
            .ledger
            .submit_message(&self.flora_state_topic_id, &payload, leader.as_str())
            .await
            .map_err(|e| PublishError::Submit(e.to_string()))?;

        let hcs_message = format!("hcs://17/{}", self.flora_state_topic_id);
        self.dal
            .apply_metadata(entry.epoch, &hcs_message, &receipt.consensus_timestamp, receipt.sequence_number)
            .await
            .map_err(|e| PublishError::Submit(e.to_string()))?;

        tracing::info!(epoch = entry.epoch, leader = %leader, "consolidated proof published");
        Ok(())
    }

    async fn validate_proof_on_topic(&self, proof: &ProofPayload) -> Result<(), PublishError> {
        for attempt in 1..=STATE_TOPIC_VALIDATION_ATTEMPTS {
            match self
                .ledger
                .read_topic_messages(&proof.petal_state_topic_id, TopicReadFilter::newest(5))
                .await
            {
                Ok(messages) => {
                    for message in &messages {
                        if let Ok(value) = message.decode_json() {
                            if matches_state_topic_marker(&value, proof) {
                                return Ok(());
                            }
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(petal_id = %proof.petal_id, error = %err, "state topic read failed");
                }
            }
            if attempt < STATE_TOPIC_VALIDATION_ATTEMPTS {
                tokio::time::sleep(STATE_TOPIC_VALIDATION_DELAY).await;
            }
        }
        Err(PublishError::StateTopicValidation {
            petal_id: proof.petal_id.clone(),
        })
    }
}

fn matches_state_topic_marker(value: &serde_json::Value, proof: &ProofPayload) -> bool {
    let epoch_matches = value.get("epoch").and_then(|v| v.as_u64()) == Some(proof.epoch)
        || value.get("m").and_then(|v| v.as_str()) == Some(StateTopicMessage::petal_marker(proof.epoch).as_str());

    value.get("p").and_then(|v| v.as_str()) == Some("hcs-17")
        && value.get("op").and_then(|v| v.as_str()) == Some("state_hash")
        && value.get("state_hash").and_then(|v| v.as_str()) == Some(proof.state_hash.as_str())
        && value.get("account_id").and_then(|v| v.as_str()) == Some(proof.petal_account_id.as_str())
        && epoch_matches
}
