//! Log tailer (C8): polls the flora state topic for the leader's
//! consolidated publications (and any legacy direct-to-topic proofs),
//! backfilling consensus-entry metadata exactly once. Structured like the
//! teacher's `via_btc_watch::BtcWatch`: a poll interval, a monotonic
//! cursor, and a `watch::Receiver<bool>` stop signal.

use std::sync::Arc;
use std::time::Duration;

use flora_ledger::{LedgerClient, TopicReadFilter};
use flora_types::ProofPayload;
use tokio::sync::{watch, Mutex};

use crate::aggregator::Aggregator;
use crate::leader::LeaderPublisher;
use crate::metrics::METRICS;

pub struct LogTailer {
    ledger: Arc<dyn LedgerClient>,
    topic_id: String,
    last_timestamp: Mutex<String>,
    aggregator: Arc<Mutex<Aggregator>>,
    dal: Arc<flora_dal::ConsensusEntriesDal>,
    leader_publisher: Arc<LeaderPublisher>,
    quorum: usize,
}

impl LogTailer {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        topic_id: String,
        initial_cursor: String,
        aggregator: Arc<Mutex<Aggregator>>,
        dal: Arc<flora_dal::ConsensusEntriesDal>,
        leader_publisher: Arc<LeaderPublisher>,
        quorum: usize,
    ) -> Self {
        Self {
            ledger,
            topic_id,
            last_timestamp: Mutex::new(initial_cursor),
            aggregator,
            dal,
            leader_publisher,
            quorum,
        }
    }

    pub async fn run(self: Arc<Self>, poll_interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        tracing::info!("log tailer stopping");
                        return;
                    }
                }
            }
        }
    }

    /// One tailer iteration: read new messages off the topic cursor and
    /// dispatch each. Exposed (not just called from `run`) so it can be
    /// driven directly in tests without a live ticker.
    pub async fn poll_once(&self) {
        METRICS.tailer_polls.inc();
        let cursor = self.last_timestamp.lock().await.clone();
        let messages = match self
            .ledger
            .read_topic_messages(&self.topic_id, TopicReadFilter::after(cursor, 100))
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                METRICS.tailer_poll_failures.inc();
                tracing::warn!(error = %err, "log tailer poll failed");
                return;
            }
        };

        for message in messages {
            self.handle_message(&message.contents_base64, &message.consensus_timestamp, message.sequence_number)
                .await;
            *self.last_timestamp.lock().await = message.consensus_timestamp;
        }
    }

    async fn handle_message(&self, contents_base64: &str, consensus_timestamp: &str, sequence_number: u64) {
        use base64::Engine;
        let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(contents_base64) else {
            return;
        };
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(&raw) else {
            return;
        };

        // Legacy petals that published proofs directly to the flora topic.
        if let Ok(proof) = serde_json::from_value::<ProofPayload>(value.clone()) {
            let epoch = proof.epoch;
            let proofs_snapshot;
            let maybe_entry = {
                let mut aggregator = self.aggregator.lock().await;
                let entry = aggregator.accept(proof, self.quorum);
                proofs_snapshot = aggregator.proofs_for_epoch(epoch);
                entry
            };
            if let Some(entry) = maybe_entry {
                METRICS.consensus_entries_emitted.inc();
                if let Err(err) = self.dal.insert(&entry).await {
                    tracing::warn!(epoch, error = %err, "failed to persist entry discovered via log tailer");
                }
                self.leader_publisher.publish(entry, proofs_snapshot);
            }
        }

        let Some(epoch) = value.get("epoch").and_then(|v| v.as_u64()) else {
            return;
        };
        let hcs_message = format!("hcs://17/{}", self.topic_id);
        match self
            .dal
            .apply_metadata(epoch, &hcs_message, consensus_timestamp, sequence_number)
            .await
        {
            Ok(applied) if applied => {
                let mut aggregator = self.aggregator.lock().await;
                aggregator.observe_metadata(epoch, hcs_message, consensus_timestamp.to_string(), sequence_number);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(epoch, error = %err, "failed to apply log metadata"),
        }
    }
}
