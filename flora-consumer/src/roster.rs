//! Backing state for `GET /adapters`: per-petal roster built up from
//! accepted proofs, plus a short-TTL cache over the ledger's account-key
//! lookup (§5 resource policy: 5-minute TTL).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use flora_ledger::{AccountKey, LedgerClient};
use flora_types::{AccountId, ProofPayload};
use tokio::sync::Mutex;

const ACCOUNT_KEY_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, serde::Serialize)]
pub struct PetalRosterEntry {
    pub petal_id: String,
    pub account_id: AccountId,
    pub state_topic_id: String,
    pub adapters_seen: BTreeSet<String>,
    pub fingerprints: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct Roster {
    petals: HashMap<String, PetalRosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, proof: &ProofPayload) {
        let entry = self
            .petals
            .entry(proof.petal_id.clone())
            .or_insert_with(|| PetalRosterEntry {
                petal_id: proof.petal_id.clone(),
                account_id: proof.petal_account_id.clone(),
                state_topic_id: proof.petal_state_topic_id.clone(),
                adapters_seen: BTreeSet::new(),
                fingerprints: BTreeMap::new(),
            });
        for record in &proof.records {
            entry.adapters_seen.insert(record.adapter_id.clone());
        }
        for (adapter_id, fingerprint) in &proof.adapter_fingerprints {
            entry.fingerprints.insert(adapter_id.clone(), fingerprint.clone());
        }
    }

    pub fn petals(&self) -> Vec<PetalRosterEntry> {
        let mut entries: Vec<_> = self.petals.values().cloned().collect();
        entries.sort_by(|a, b| a.petal_id.cmp(&b.petal_id));
        entries
    }

    pub fn aggregate_adapters(&self) -> BTreeSet<String> {
        self.petals.values().flat_map(|p| p.adapters_seen.iter().cloned()).collect()
    }

    pub fn aggregate_fingerprints(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for petal in self.petals.values() {
            out.extend(petal.fingerprints.clone());
        }
        out
    }
}

pub struct AccountKeyCache {
    ledger: std::sync::Arc<dyn LedgerClient>,
    entries: Mutex<HashMap<String, (AccountKey, Instant)>>,
}

impl AccountKeyCache {
    pub fn new(ledger: std::sync::Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, account_id: &str) -> Option<AccountKey> {
        {
            let cache = self.entries.lock().await;
            if let Some((key, fetched_at)) = cache.get(account_id) {
                if fetched_at.elapsed() < ACCOUNT_KEY_TTL {
                    return Some(key.clone());
                }
            }
        }
        let key = self.ledger.account_public_key(account_id).await.ok()?;
        self.entries
            .lock()
            .await
            .insert(account_id.to_string(), (key.clone(), Instant::now()));
        Some(key)
    }
}
