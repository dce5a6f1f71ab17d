pub mod builder;
pub mod metrics;
pub mod scheduler;

pub use builder::{build_proof, ProofBuilderConfig};
pub use scheduler::PetalScheduler;
