//! Ambient `vise` metrics for the Consumer, grounded on the teacher's
//! `via_verifier_coordinator::metrics` module shape.

use vise::{Counter, Metrics};

#[derive(Debug, Metrics)]
#[metrics(prefix = "flora_consumer")]
pub struct ConsumerMetrics {
    pub proofs_accepted: Counter,
    pub proofs_rejected: Counter,
    pub consensus_entries_emitted: Counter,
    pub leader_publish_successes: Counter,
    pub leader_publish_failures: Counter,
    pub tailer_polls: Counter,
    pub tailer_poll_failures: Counter,
}

#[vise::register]
pub static METRICS: vise::Global<ConsumerMetrics> = vise::Global::new();
