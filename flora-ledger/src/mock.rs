//! Deterministic in-memory [`LedgerClient`] used by the workspace's own
//! tests in place of a live mirror node / consensus service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::Mutex;

use crate::traits::{AccountKey, LedgerClient, LedgerError, ReadOrder, SubmitReceipt, TopicMessage, TopicReadFilter};

#[derive(Default)]
struct Topic {
    messages: Vec<TopicMessage>,
}

pub struct InMemoryLedgerClient {
    topics: Mutex<HashMap<String, Topic>>,
    keys: Mutex<HashMap<String, AccountKey>>,
    seq: AtomicU64,
    base_timestamp: i64,
}

impl InMemoryLedgerClient {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            keys: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
            base_timestamp: 1_700_000_000,
        }
    }

    pub async fn set_account_key(&self, account_id: &str, public_key: &str, key_type: &str) {
        self.keys.lock().await.insert(
            account_id.to_string(),
            AccountKey {
                public_key: public_key.to_string(),
                key_type: key_type.to_string(),
            },
        );
    }

    fn next_timestamp(&self) -> (String, u64) {
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        (format!("{}.{:09}", self.base_timestamp + n as i64, 0), n + 1)
    }
}

impl Default for InMemoryLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedgerClient {
    async fn submit_message(
        &self,
        topic_id: &str,
        message: &serde_json::Value,
        _signer_account_id: &str,
    ) -> Result<SubmitReceipt, LedgerError> {
        let (consensus_timestamp, sequence_number) = self.next_timestamp();
        let contents_base64 = base64::engine::general_purpose::STANDARD.encode(
            serde_json::to_vec(message).map_err(|e| LedgerError::Decode(e.to_string()))?,
        );

        let mut topics = self.topics.lock().await;
        topics
            .entry(topic_id.to_string())
            .or_default()
            .messages
            .push(TopicMessage {
                consensus_timestamp: consensus_timestamp.clone(),
                sequence_number,
                contents_base64,
            });

        Ok(SubmitReceipt {
            consensus_timestamp,
            sequence_number,
        })
    }

    async fn read_topic_messages(
        &self,
        topic_id: &str,
        filter: TopicReadFilter,
    ) -> Result<Vec<TopicMessage>, LedgerError> {
        let topics = self.topics.lock().await;
        let Some(topic) = topics.get(topic_id) else {
            return Ok(vec![]);
        };

        let mut messages: Vec<TopicMessage> = topic
            .messages
            .iter()
            .filter(|m| match &filter.timestamp_after {
                Some(ts) => m.consensus_timestamp.as_str() > ts.as_str(),
                None => true,
            })
            .cloned()
            .collect();

        match filter.order {
            ReadOrder::Ascending => messages.sort_by(|a, b| a.consensus_timestamp.cmp(&b.consensus_timestamp)),
            ReadOrder::Descending => messages.sort_by(|a, b| b.consensus_timestamp.cmp(&a.consensus_timestamp)),
        }
        messages.truncate(filter.limit);
        Ok(messages)
    }

    async fn account_public_key(&self, account_id: &str) -> Result<AccountKey, LedgerError> {
        self.keys
            .lock()
            .await
            .get(account_id)
            .cloned()
            .ok_or_else(|| LedgerError::TopicNotFound(format!("no key for account {account_id}")))
    }
}
