//! HTTP implementation of [`LedgerClient`] against a Hedera-mirror-style
//! REST API, grounded on the teacher's `via_btc_client` RPC client shape
//! (a thin `reqwest` wrapper with typed request/response structs).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::traits::{AccountKey, LedgerClient, LedgerError, SubmitReceipt, TopicMessage, TopicReadFilter};

pub struct MirrorLedgerClient {
    base_url: String,
    http: reqwest::Client,
}

impl MirrorLedgerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    fn messages_url(&self, topic_id: &str, filter: &TopicReadFilter) -> String {
        let mut url = format!(
            "{}/api/v1/topics/{topic_id}/messages?order={}&limit={}",
            self.base_url.trim_end_matches('/'),
            filter.order.as_query_value(),
            filter.limit,
        );
        if let Some(ts) = &filter.timestamp_after {
            url.push_str(&format!("&timestamp=gt:{ts}"));
        }
        url
    }
}

#[derive(Debug, Deserialize)]
struct MirrorMessagesResponse {
    messages: Vec<MirrorMessage>,
}

#[derive(Debug, Deserialize)]
struct MirrorMessage {
    consensus_timestamp: String,
    sequence_number: u64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct MirrorAccountResponse {
    key: MirrorKey,
}

#[derive(Debug, Deserialize)]
struct MirrorKey {
    #[serde(rename = "_type")]
    key_type: String,
    key: String,
}

#[async_trait]
impl LedgerClient for MirrorLedgerClient {
    async fn submit_message(
        &self,
        topic_id: &str,
        message: &serde_json::Value,
        signer_account_id: &str,
    ) -> Result<SubmitReceipt, LedgerError> {
        // Real topic submission is signed with the Hedera SDK, not plain
        // HTTP against the (read-only) mirror node; that signing path is
        // the out-of-scope ledger-client collaborator. This sends the
        // submission to a co-located gateway that fronts the SDK.
        let url = format!(
            "{}/submit/{topic_id}?signer={signer_account_id}",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!(
                "submit to topic {topic_id} failed with status {}",
                response.status()
            )));
        }
        let receipt: SubmitReceiptWire = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(SubmitReceipt {
            consensus_timestamp: receipt.consensus_timestamp,
            sequence_number: receipt.sequence_number,
        })
    }

    async fn read_topic_messages(
        &self,
        topic_id: &str,
        filter: TopicReadFilter,
    ) -> Result<Vec<TopicMessage>, LedgerError> {
        let url = self.messages_url(topic_id, &filter);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LedgerError::TopicNotFound(topic_id.to_string()));
        }
        let parsed: MirrorMessagesResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(parsed
            .messages
            .into_iter()
            .map(|m| TopicMessage {
                consensus_timestamp: m.consensus_timestamp,
                sequence_number: m.sequence_number,
                contents_base64: m.message,
            })
            .collect())
    }

    async fn account_public_key(&self, account_id: &str) -> Result<AccountKey, LedgerError> {
        let url = format!(
            "{}/api/v1/accounts/{account_id}",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let parsed: MirrorAccountResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(AccountKey {
            public_key: parsed.key.key,
            key_type: parsed.key.key_type,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitReceiptWire {
    consensus_timestamp: String,
    sequence_number: u64,
}
