//! Ambient `vise` metrics for the petal binary, grounded on the teacher's
//! `via_verifier_coordinator::metrics` module shape.

use vise::{Counter, EncodeLabelSet, Family, Metrics};

#[derive(Debug, Clone, PartialEq, Eq, Hash, EncodeLabelSet)]
struct AdapterLabel {
    adapter_id: String,
}

#[derive(Debug, Metrics)]
#[metrics(prefix = "flora_petal")]
pub struct PetalMetrics {
    /// Ticks where an adapter failed, timed out, or produced a non-finite
    /// price, so no proof was built.
    pub epochs_skipped: Counter,
    /// Proofs successfully POSTed to the Consumer.
    pub proofs_published: Counter,
    /// `submit_message` failures on the petal's own state topic. Logged
    /// and swallowed (this write is fire-and-forget).
    pub state_topic_submit_failures: Counter,
    /// Failed POSTs of a built proof to the Consumer.
    pub proof_submit_failures: Counter,
    #[metrics(labels = ["adapter_id"])]
    pub adapter_failures: Family<AdapterLabel, Counter>,
}

#[vise::register]
pub static METRICS: vise::Global<PetalMetrics> = vise::Global::new();

pub fn record_adapter_failure(adapter_id: &str) {
    METRICS.adapter_failures[&AdapterLabel {
        adapter_id: adapter_id.to_string(),
    }]
        .inc();
}
