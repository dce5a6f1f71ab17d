use serde::Deserialize;

fn default_network() -> String {
    "testnet".to_string()
}

fn default_block_time_ms() -> u64 {
    2000
}

fn default_quorum() -> usize {
    2
}

fn default_expected_petals() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_database_url() -> String {
    "sqlite://flora.db".to_string()
}

fn default_adapter_timeout_ms() -> u64 {
    4_000
}

fn default_mirror_timeout_ms() -> u64 {
    5_000
}

/// Flat view of every environment variable listed in spec.md §6. Every
/// typed config (`PetalConfig`, `ConsumerConfig`, ...) is derived from one
/// of these, the way the teacher's per-crate configs are each loaded by a
/// dedicated `FromEnv` impl but share the same `envy` mechanics.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnv {
    #[serde(rename = "HEDERA_NETWORK", default = "default_network")]
    pub hedera_network: String,
    #[serde(rename = "MIRROR_BASE_URL")]
    pub mirror_base_url: String,
    #[serde(rename = "OPERATOR_ACCOUNT_ID", default)]
    pub operator_account_id: Option<String>,
    #[serde(rename = "OPERATOR_PRIVATE_KEY", default)]
    pub operator_private_key: Option<String>,

    #[serde(rename = "FLORA_ACCOUNT_ID")]
    pub flora_account_id: String,
    #[serde(rename = "FLORA_PARTICIPANTS")]
    pub flora_participants: String,
    #[serde(rename = "FLORA_THRESHOLD", default)]
    pub flora_threshold: Option<String>,
    #[serde(rename = "THRESHOLD_FINGERPRINT")]
    pub threshold_fingerprint: String,
    #[serde(rename = "REGISTRY_TOPIC_ID")]
    pub registry_topic_id: String,
    #[serde(rename = "FLORA_STATE_TOPIC_ID")]
    pub flora_state_topic_id: String,
    #[serde(rename = "FLORA_COORDINATION_TOPIC_ID", default)]
    pub flora_coordination_topic_id: Option<String>,
    #[serde(rename = "FLORA_TRANSACTION_TOPIC_ID", default)]
    pub flora_transaction_topic_id: Option<String>,
    #[serde(rename = "FLORA_DISCOVERY_TOPIC_ID", default)]
    pub flora_discovery_topic_id: Option<String>,

    #[serde(rename = "PETAL_ID", default)]
    pub petal_id: Option<String>,
    #[serde(rename = "PETAL_ACCOUNT_ID", default)]
    pub petal_account_id: Option<String>,
    #[serde(rename = "PETAL_STATE_TOPIC_ID", default)]
    pub petal_state_topic_id: Option<String>,
    #[serde(rename = "PETAL_KEY_SECRET", default)]
    pub petal_key_secret: Option<String>,
    #[serde(rename = "PETAL_PUBLISH_STATE_TOPIC", default = "default_true")]
    pub petal_publish_state_topic: bool,
    #[serde(rename = "CONSUMER_PROOF_URL", default)]
    pub consumer_proof_url: Option<String>,
    #[serde(rename = "ADAPTER_TIMEOUT_MS", default = "default_adapter_timeout_ms")]
    pub adapter_timeout_ms: u64,

    #[serde(rename = "BLOCK_TIME_MS", default = "default_block_time_ms")]
    pub block_time_ms: u64,
    #[serde(rename = "QUORUM", default = "default_quorum")]
    pub quorum: usize,
    #[serde(rename = "EXPECTED_PETALS", default = "default_expected_petals")]
    pub expected_petals: usize,
    #[serde(rename = "POLL_INTERVAL_MS", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(rename = "MIRROR_TIMEOUT_MS", default = "default_mirror_timeout_ms")]
    pub mirror_timeout_ms: u64,
    #[serde(rename = "PORT", default = "default_port")]
    pub port: u16,

    #[serde(rename = "DATABASE_URL", default = "default_database_url")]
    pub database_url: String,
}

pub fn load_raw_env() -> anyhow::Result<RawEnv> {
    envy::from_env::<RawEnv>().map_err(|err| anyhow::anyhow!("failed to load environment: {err}"))
}
