//! Aggregator (C6): buckets proofs by epoch, picks the plurality state
//! hash once quorum is met, and computes the consensus price. Owned by a
//! single lock inside the Consumer's shared state, mirroring the
//! teacher's `Arc<RwLock<SigningSession>>` ownership pattern.

use std::collections::HashMap;

use flora_types::{account::sort_unique, compute_state_hash, median_rounded, AccountId, ConsensusEntry, ProofPayload, SourcePrice};

#[derive(Debug, Clone, Default)]
struct EpochMetadata {
    hcs_message: Option<String>,
    consensus_timestamp: Option<String>,
    sequence_number: Option<u64>,
}

#[derive(Default)]
pub struct Aggregator {
    buckets: HashMap<u64, Vec<ProofPayload>>,
    metadata: HashMap<u64, EpochMetadata>,
    consolidated: HashMap<u64, String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the consolidated set from persisted history on startup so a
    /// restart doesn't re-emit an entry for an already-consensed epoch.
    pub fn seed_consolidated(&mut self, epoch: u64, state_hash: String) {
        self.consolidated.insert(epoch, state_hash);
    }

    /// Accepts one validated proof. Returns `Some` exactly when this call
    /// causes a new `ConsensusEntry` to form (§4.6).
    pub fn accept(&mut self, mut proof: ProofPayload, quorum: usize) -> Option<ConsensusEntry> {
        if let Some(meta) = self.metadata.get(&proof.epoch) {
            proof.hcs_message = meta.hcs_message.clone().or(proof.hcs_message);
            proof.consensus_timestamp = meta.consensus_timestamp.clone().or(proof.consensus_timestamp);
            proof.sequence_number = meta.sequence_number.or(proof.sequence_number);
        }

        let epoch = proof.epoch;
        self.buckets.entry(epoch).or_default().push(proof);
        self.try_aggregate(epoch, quorum)
    }

    /// Records metadata discovered by the log tailer (C8) for `epoch`,
    /// used to enrich proofs that arrive afterward.
    pub fn observe_metadata(&mut self, epoch: u64, hcs_message: String, consensus_timestamp: String, sequence_number: u64) {
        let meta = self.metadata.entry(epoch).or_default();
        meta.hcs_message.get_or_insert(hcs_message);
        meta.consensus_timestamp.get_or_insert(consensus_timestamp);
        meta.sequence_number.get_or_insert(sequence_number);
    }

    pub fn proofs_for_epoch(&self, epoch: u64) -> Vec<ProofPayload> {
        self.buckets.get(&epoch).cloned().unwrap_or_default()
    }

    fn try_aggregate(&mut self, epoch: u64, quorum: usize) -> Option<ConsensusEntry> {
        let bucket = self.buckets.get(&epoch)?;
        if bucket.len() < quorum {
            return None;
        }

        // Group by state hash, preserving first-seen insertion order so
        // that a tie between equally-sized groups resolves to whichever
        // was encountered first (§9 open question (b)).
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<&ProofPayload>> = HashMap::new();
        for proof in bucket {
            if !groups.contains_key(&proof.state_hash) {
                order.push(proof.state_hash.clone());
            }
            groups.entry(proof.state_hash.clone()).or_default().push(proof);
        }

        let mut best_hash = order[0].clone();
        let mut best_len = groups[&best_hash].len();
        for hash in &order[1..] {
            let len = groups[hash].len();
            if len > best_len {
                best_len = len;
                best_hash = hash.clone();
            }
        }

        if best_len < quorum {
            return None;
        }
        if self.consolidated.contains_key(&epoch) {
            return None;
        }

        let matching = &groups[&best_hash];
        let first = matching[0];
        let recomputed = compute_state_hash(
            &first.records,
            &first.threshold_fingerprint,
            &first.adapter_fingerprints,
            &first.registry_topic_id,
        );
        if recomputed != best_hash {
            tracing::warn!(epoch, "matching group's declared state hash failed recomputation, dropping");
            return None;
        }

        let mut prices = Vec::new();
        let mut sources = Vec::new();
        for proof in matching {
            for record in &proof.records {
                if let Some(price) = record.price() {
                    prices.push(price);
                    sources.push(SourcePrice {
                        source: record.source().unwrap_or(&record.adapter_id).to_string(),
                        price,
                    });
                }
            }
        }
        let price = median_rounded(&prices);

        let participants = resolve_participants(matching);

        let entry = ConsensusEntry {
            epoch,
            state_hash: best_hash.clone(),
            price,
            timestamp: first.timestamp,
            participants,
            sources,
            hcs_message: first.hcs_message.clone(),
            consensus_timestamp: first.consensus_timestamp.clone(),
            sequence_number: first.sequence_number,
        };

        self.consolidated.insert(epoch, best_hash);
        Some(entry)
    }
}

/// Prefers the participant set declared on the proofs (validated at
/// intake to have the expected cardinality); falls back to each matching
/// proof's own `petalAccountId` if none declared any participants.
fn resolve_participants(matching: &[&ProofPayload]) -> Vec<AccountId> {
    let declared: Vec<AccountId> = matching
        .iter()
        .flat_map(|p| p.participants.iter().cloned())
        .collect();
    let ids = if declared.is_empty() {
        matching.iter().map(|p| p.petal_account_id.clone()).collect()
    } else {
        declared
    };
    sort_unique(ids)
}
