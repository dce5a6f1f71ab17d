//! Adapter runner (component C2): concurrently samples every registered
//! price adapter for one epoch, with a per-adapter deadline and an
//! all-or-nothing failure policy. Partial adapter sets cannot produce
//! matching state hashes across petals, so any single failure skips the
//! whole epoch rather than publishing a partial proof.

pub mod testing;

use std::time::Duration;

use async_trait::async_trait;
use flora_types::AdapterRecord;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("adapter {adapter_id} timed out")]
    Timeout { adapter_id: String },
    #[error("adapter {adapter_id} transport error: {message}")]
    Transport { adapter_id: String, message: String },
    #[error("adapter {adapter_id} returned malformed data: {message}")]
    Decode { adapter_id: String, message: String },
    #[error("adapter {adapter_id} reported a non-finite price")]
    NonFinitePrice { adapter_id: String },
}

impl AdapterError {
    pub fn adapter_id(&self) -> &str {
        match self {
            AdapterError::Timeout { adapter_id }
            | AdapterError::Transport { adapter_id, .. }
            | AdapterError::Decode { adapter_id, .. }
            | AdapterError::NonFinitePrice { adapter_id } => adapter_id,
        }
    }
}

/// A single price source. Implementations (the actual HTTP clients for
/// Binance, CoinGecko, etc.) are an external collaborator, out of scope for
/// this crate; only the trait the runner consumes lives here.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn adapter_id(&self) -> &str;

    async fn sample(&self) -> Result<AdapterRecord, AdapterError>;
}

const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(4);

pub struct AdapterRunner {
    adapters: Vec<Box<dyn Adapter>>,
    per_adapter_timeout: Duration,
}

impl AdapterRunner {
    pub fn new(adapters: Vec<Box<dyn Adapter>>) -> Self {
        Self {
            adapters,
            per_adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_adapter_timeout = timeout;
        self
    }

    pub fn adapter_ids(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.adapter_id().to_string()).collect()
    }

    /// Samples every adapter concurrently. Returns `None` (epoch skipped)
    /// if any adapter fails, times out, or decodes to a non-finite price.
    pub async fn run_epoch(&self) -> Option<Vec<AdapterRecord>> {
        let timeout = self.per_adapter_timeout;
        let tasks = self.adapters.iter().map(|adapter| {
            let adapter_id = adapter.adapter_id().to_string();
            async move {
                match tokio::time::timeout(timeout, adapter.sample()).await {
                    Ok(Ok(record)) => {
                        if record.price().map(f64::is_finite).unwrap_or(false) {
                            Ok(record)
                        } else {
                            Err(AdapterError::NonFinitePrice { adapter_id })
                        }
                    }
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(AdapterError::Timeout { adapter_id }),
                }
            }
        });

        let results = futures::future::join_all(tasks).await;
        let mut records = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(adapter_id = %err.adapter_id(), error = %err, "adapter failed, skipping epoch");
                    return None;
                }
            }
        }
        Some(records)
    }
}
