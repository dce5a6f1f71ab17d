//! Petal scheduler (C4): single-petal, single-threaded epoch loop. Built
//! the way `via_btc_watch::BtcWatch::run` is built: owns a
//! `tokio::time::interval`, accepts a `watch::Receiver<bool>` stop signal,
//! and never returns `Err` for a transient failure; only the irrecoverable
//! startup path can abort.

use std::sync::Arc;
use std::time::Duration;

use flora_adapters::AdapterRunner;
use flora_ledger::LedgerClient;
use flora_types::{StateTopicMessage, AccountId};
use tokio::sync::watch;

use crate::builder::{build_proof, ProofBuilderConfig};
use crate::metrics::{record_adapter_failure, METRICS};

pub struct PetalScheduler {
    builder_config: ProofBuilderConfig,
    adapters: AdapterRunner,
    ledger: Arc<dyn LedgerClient>,
    http: reqwest::Client,
    consumer_proof_url: String,
    publish_state_topic: bool,
    last_epoch: i64,
}

impl PetalScheduler {
    pub fn new(
        builder_config: ProofBuilderConfig,
        adapters: AdapterRunner,
        ledger: Arc<dyn LedgerClient>,
        consumer_proof_url: String,
        publish_state_topic: bool,
    ) -> Self {
        Self {
            builder_config,
            adapters,
            ledger,
            http: reqwest::Client::new(),
            consumer_proof_url,
            publish_state_topic,
            last_epoch: -1,
        }
    }

    fn current_epoch(&self, block_time_ms: u64, now_ms: i64) -> i64 {
        (now_ms - self.builder_config.epoch_origin_ms).div_euclid(block_time_ms as i64)
    }

    /// Drives the loop until `stop` is signalled. Transient failures (a
    /// skipped epoch, a failed submission) are logged, never fatal.
    pub async fn run(mut self, block_time: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(block_time);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(block_time.as_millis() as u64).await;
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        tracing::info!("petal scheduler stopping");
                        return;
                    }
                }
            }
        }
    }

    async fn tick(&mut self, block_time_ms: u64) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let epoch = self.current_epoch(block_time_ms, now_ms);
        if epoch <= self.last_epoch {
            return;
        }
        self.last_epoch = epoch;
        let epoch = epoch as u64;

        let Some(records) = self.adapters.run_epoch().await else {
            METRICS.epochs_skipped.inc();
            for adapter_id in self.adapters.adapter_ids() {
                record_adapter_failure(&adapter_id);
            }
            tracing::warn!(epoch, "skipping epoch: adapter runner returned no records");
            return;
        };

        let proof = build_proof(epoch, records, &self.builder_config);

        if self.publish_state_topic {
            self.submit_state_topic_marker(epoch, &proof.state_hash).await;
        }

        match self.http.post(&self.consumer_proof_url).json(&proof).send().await {
            Ok(response) if response.status().is_success() => {
                METRICS.proofs_published.inc();
                tracing::info!(epoch, state_hash = %proof.state_hash, "proof published to consumer");
            }
            Ok(response) => {
                METRICS.proof_submit_failures.inc();
                tracing::warn!(epoch, status = %response.status(), "consumer rejected proof");
            }
            Err(err) => {
                METRICS.proof_submit_failures.inc();
                tracing::warn!(epoch, error = %err, "failed to POST proof to consumer");
            }
        }
    }

    /// Fire-and-forget write to the petal's own state topic. Failure is
    /// logged but never blocks the HTTP post to the Consumer.
    async fn submit_state_topic_marker(&self, epoch: u64, state_hash: &str) {
        let message = StateTopicMessage {
            p: "hcs-17".to_string(),
            op: "state_hash".to_string(),
            m: StateTopicMessage::petal_marker(epoch),
            account_id: self.builder_config.petal_account_id.clone(),
            state_hash: state_hash.to_string(),
            topics: vec![self.builder_config.petal_state_topic_id.clone()],
            epoch: Some(epoch),
            price: None,
            threshold_fingerprint: None,
            participants: None,
        };
        let payload = match serde_json::to_value(&message) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize state topic marker");
                return;
            }
        };

        let ledger = self.ledger.clone();
        let topic_id = self.builder_config.petal_state_topic_id.clone();
        let signer: AccountId = self.builder_config.petal_account_id.clone();
        tokio::spawn(async move {
            if let Err(err) = ledger.submit_message(&topic_id, &payload, signer.as_str()).await {
                METRICS.state_topic_submit_failures.inc();
                tracing::warn!(error = %err, "failed to submit state topic marker");
            }
        });
    }
}
