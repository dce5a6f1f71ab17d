//! The narrow interface the consensus core consumes from the underlying
//! ledger client. Topic provisioning, transaction signing, and the wider
//! Hedera SDK surface are external collaborators, out of scope here.

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("topic {0} not found")]
    TopicNotFound(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrder {
    Ascending,
    Descending,
}

impl ReadOrder {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            ReadOrder::Ascending => "asc",
            ReadOrder::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicReadFilter {
    pub order: ReadOrder,
    pub limit: usize,
    pub timestamp_after: Option<String>,
}

impl Default for TopicReadFilter {
    fn default() -> Self {
        Self {
            order: ReadOrder::Ascending,
            limit: 25,
            timestamp_after: None,
        }
    }
}

impl TopicReadFilter {
    pub fn newest(limit: usize) -> Self {
        Self {
            order: ReadOrder::Descending,
            limit,
            timestamp_after: None,
        }
    }

    pub fn after(timestamp: impl Into<String>, limit: usize) -> Self {
        Self {
            order: ReadOrder::Ascending,
            limit,
            timestamp_after: Some(timestamp.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub consensus_timestamp: String,
    pub sequence_number: u64,
    pub contents_base64: String,
}

impl TopicMessage {
    pub fn decode_json(&self) -> Result<serde_json::Value, LedgerError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(&self.contents_base64)
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub consensus_timestamp: String,
    pub sequence_number: u64,
}

#[derive(Debug, Clone)]
pub struct AccountKey {
    pub public_key: String,
    pub key_type: String,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submits a message to `topic_id`, paid/signed by `signer_account_id`.
    async fn submit_message(
        &self,
        topic_id: &str,
        message: &serde_json::Value,
        signer_account_id: &str,
    ) -> Result<SubmitReceipt, LedgerError>;

    /// Reads a topic's message stream with mirror-style filters
    /// (`order`, `limit`, `timestamp=gt:<ts>`).
    async fn read_topic_messages(
        &self,
        topic_id: &str,
        filter: TopicReadFilter,
    ) -> Result<Vec<TopicMessage>, LedgerError>;

    /// Reads an account's public key and key type.
    async fn account_public_key(&self, account_id: &str) -> Result<AccountKey, LedgerError>;
}
