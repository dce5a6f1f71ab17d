//! Hedera-style dotted-integer account identifiers (e.g. `"0.0.10"`) with
//! the deterministic ordering consensus depends on (§4.6): compare each
//! dot-separated component as an integer (a missing component sorts as 0),
//! tie-break on the raw string.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(raw: impl Into<String>) -> Self {
        AccountId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn components(&self) -> Vec<i64> {
        self.0.split('.').map(|p| p.parse::<i64>().unwrap_or(0)).collect()
    }
}

impl PartialOrd for AccountId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccountId {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.components();
        let b = other.components();
        for i in 0..a.len().max(b.len()) {
            let ca = a.get(i).copied().unwrap_or(0);
            let cb = b.get(i).copied().unwrap_or(0);
            match ca.cmp(&cb) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sorts, deduplicates and returns account ids in canonical order.
pub fn sort_unique(mut ids: Vec<AccountId>) -> Vec<AccountId> {
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_integer_component_not_lexically() {
        let mut ids = vec![
            AccountId::new("0.0.100"),
            AccountId::new("0.0.11"),
            AccountId::new("0.0.2"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                AccountId::new("0.0.2"),
                AccountId::new("0.0.11"),
                AccountId::new("0.0.100"),
            ]
        );
    }

    #[test]
    fn missing_component_sorts_as_zero() {
        let mut ids = vec![AccountId::new("0.0"), AccountId::new("0.0.-1")];
        ids.sort();
        assert_eq!(ids[0], AccountId::new("0.0.-1"));
    }

    #[test]
    fn dedup_after_sort() {
        let ids = sort_unique(vec![
            AccountId::new("0.0.5"),
            AccountId::new("0.0.3"),
            AccountId::new("0.0.5"),
        ]);
        assert_eq!(ids, vec![AccountId::new("0.0.3"), AccountId::new("0.0.5")]);
    }
}
