use std::time::Duration;

use anyhow::Context as _;

use crate::network::HederaNetwork;
use crate::raw::{load_raw_env, RawEnv};
use crate::FromEnv;

/// Identity and timing configuration for a single petal worker (C3/C4).
#[derive(Debug, Clone)]
pub struct PetalConfig {
    pub network: HederaNetwork,
    pub mirror_base_url: String,
    pub petal_id: String,
    pub petal_account_id: String,
    pub petal_state_topic_id: String,
    pub flora_account_id: String,
    pub threshold_fingerprint: String,
    pub registry_topic_id: String,
    pub participants: Vec<String>,
    pub block_time_ms: u64,
    pub publish_state_topic: bool,
    pub consumer_proof_url: String,
    pub adapter_timeout_ms: u64,
}

impl PetalConfig {
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    fn from_raw(raw: RawEnv) -> anyhow::Result<Self> {
        let network = raw.hedera_network.parse()?;
        let participants = raw
            .flora_participants
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            network,
            mirror_base_url: raw.mirror_base_url,
            petal_id: raw.petal_id.context("PETAL_ID is required to start a petal")?,
            petal_account_id: raw
                .petal_account_id
                .context("PETAL_ACCOUNT_ID is required to start a petal")?,
            petal_state_topic_id: raw
                .petal_state_topic_id
                .context("PETAL_STATE_TOPIC_ID is required to start a petal")?,
            flora_account_id: raw.flora_account_id,
            threshold_fingerprint: raw.threshold_fingerprint,
            registry_topic_id: raw.registry_topic_id,
            participants,
            block_time_ms: raw.block_time_ms,
            publish_state_topic: raw.petal_publish_state_topic,
            consumer_proof_url: raw
                .consumer_proof_url
                .context("CONSUMER_PROOF_URL is required to start a petal")?,
            adapter_timeout_ms: raw.adapter_timeout_ms,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            network: HederaNetwork::Testnet,
            mirror_base_url: "http://localhost:5551".to_string(),
            petal_id: "petal-a".to_string(),
            petal_account_id: "0.0.10".to_string(),
            petal_state_topic_id: "0.0.20".to_string(),
            flora_account_id: "0.0.1".to_string(),
            threshold_fingerprint: "tf".to_string(),
            registry_topic_id: "0.0.2".to_string(),
            participants: vec!["0.0.10".to_string(), "0.0.11".to_string(), "0.0.12".to_string()],
            block_time_ms: 2000,
            publish_state_topic: true,
            consumer_proof_url: "http://localhost:3000/proof".to_string(),
            adapter_timeout_ms: 4000,
        }
    }
}

impl FromEnv for PetalConfig {
    fn from_env() -> anyhow::Result<Self> {
        PetalConfig::from_raw(load_raw_env()?)
    }
}
