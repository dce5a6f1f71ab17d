//! In-repo test fixtures standing in for real adapter implementations,
//! which are an external collaborator out of this crate's scope.

use async_trait::async_trait;
use chrono::Utc;
use flora_types::{fingerprint_payload, AdapterRecord};
use serde_json::json;
use std::time::Duration;

use crate::{Adapter, AdapterError};

pub struct FixedAdapter {
    id: String,
    entity_id: String,
    price: f64,
    source: String,
}

impl FixedAdapter {
    pub fn new(id: &str, entity_id: &str, price: f64, source: &str) -> Self {
        Self {
            id: id.to_string(),
            entity_id: entity_id.to_string(),
            price,
            source: source.to_string(),
        }
    }
}

#[async_trait]
impl Adapter for FixedAdapter {
    fn adapter_id(&self) -> &str {
        &self.id
    }

    async fn sample(&self) -> Result<AdapterRecord, AdapterError> {
        let mut payload = serde_json::Map::new();
        payload.insert("price".to_string(), json!(self.price));
        payload.insert("source".to_string(), json!(self.source));
        let source_fingerprint = fingerprint_payload(&payload);
        Ok(AdapterRecord {
            adapter_id: self.id.clone(),
            entity_id: self.entity_id.clone(),
            payload,
            timestamp: Utc::now(),
            source_fingerprint,
        })
    }
}

pub struct AlwaysFailsAdapter {
    id: String,
}

impl AlwaysFailsAdapter {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[async_trait]
impl Adapter for AlwaysFailsAdapter {
    fn adapter_id(&self) -> &str {
        &self.id
    }

    async fn sample(&self) -> Result<AdapterRecord, AdapterError> {
        Err(AdapterError::Transport {
            adapter_id: self.id.clone(),
            message: "connection refused".to_string(),
        })
    }
}

pub struct SlowAdapter {
    id: String,
    delay: Duration,
}

impl SlowAdapter {
    pub fn new(id: &str, delay: Duration) -> Self {
        Self {
            id: id.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl Adapter for SlowAdapter {
    fn adapter_id(&self) -> &str {
        &self.id
    }

    async fn sample(&self) -> Result<AdapterRecord, AdapterError> {
        tokio::time::sleep(self.delay).await;
        FixedAdapter::new(&self.id, "HBAR-USD", 0.07, "slow").sample().await
    }
}
