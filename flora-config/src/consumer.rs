use std::time::Duration;

use anyhow::Context as _;

use crate::network::HederaNetwork;
use crate::raw::{load_raw_env, RawEnv};
use crate::FromEnv;

/// Configuration for the single Consumer process (C5–C10).
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub network: HederaNetwork,
    pub mirror_base_url: String,
    pub flora_account_id: String,
    pub flora_state_topic_id: String,
    pub flora_coordination_topic_id: Option<String>,
    pub flora_transaction_topic_id: Option<String>,
    pub flora_discovery_topic_id: Option<String>,
    pub threshold_fingerprint: String,
    pub registry_topic_id: String,
    pub quorum: usize,
    pub expected_petals: usize,
    pub poll_interval_ms: u64,
    pub mirror_timeout_ms: u64,
    pub port: u16,
    pub petal_key_secret: String,
    pub database_url: String,
}

impl ConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn mirror_timeout(&self) -> Duration {
        Duration::from_millis(self.mirror_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// All topics a consolidated state-topic message should reference,
    /// in the order §4.7 lists them.
    pub fn published_topics(&self) -> Vec<String> {
        let mut topics = vec![self.flora_state_topic_id.clone()];
        topics.extend(self.flora_coordination_topic_id.clone());
        topics.extend(self.flora_transaction_topic_id.clone());
        topics.push(self.registry_topic_id.clone());
        topics.extend(self.flora_discovery_topic_id.clone());
        topics
    }

    fn from_raw(raw: RawEnv) -> anyhow::Result<Self> {
        let network = raw.hedera_network.parse()?;
        Ok(Self {
            network,
            mirror_base_url: raw.mirror_base_url,
            flora_account_id: raw.flora_account_id,
            flora_state_topic_id: raw.flora_state_topic_id,
            flora_coordination_topic_id: raw.flora_coordination_topic_id,
            flora_transaction_topic_id: raw.flora_transaction_topic_id,
            flora_discovery_topic_id: raw.flora_discovery_topic_id,
            threshold_fingerprint: raw.threshold_fingerprint,
            registry_topic_id: raw.registry_topic_id,
            quorum: raw.quorum,
            expected_petals: raw.expected_petals,
            poll_interval_ms: raw.poll_interval_ms,
            mirror_timeout_ms: raw.mirror_timeout_ms,
            port: raw.port,
            petal_key_secret: raw
                .petal_key_secret
                .context("PETAL_KEY_SECRET is required to start the consumer")?,
            database_url: raw.database_url,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            network: HederaNetwork::Testnet,
            mirror_base_url: "http://localhost:5551".to_string(),
            flora_account_id: "0.0.1".to_string(),
            flora_state_topic_id: "0.0.30".to_string(),
            flora_coordination_topic_id: Some("0.0.31".to_string()),
            flora_transaction_topic_id: Some("0.0.32".to_string()),
            flora_discovery_topic_id: Some("0.0.33".to_string()),
            threshold_fingerprint: "tf".to_string(),
            registry_topic_id: "0.0.2".to_string(),
            quorum: 2,
            expected_petals: 3,
            poll_interval_ms: 10_000,
            mirror_timeout_ms: 5_000,
            port: 3000,
            petal_key_secret: "test-secret-at-least-this-long".to_string(),
            database_url: "sqlite::memory:".to_string(),
        }
    }
}

impl FromEnv for ConsumerConfig {
    fn from_env() -> anyhow::Result<Self> {
        ConsumerConfig::from_raw(load_raw_env()?)
    }
}
