pub mod account;
pub mod canon;
pub mod error;
pub mod model;

pub use account::AccountId;
pub use canon::{canonical_json, canonicalize, hash_canonical, sha384_hex, Canonical, ToCanonical};
pub use error::FloraError;
pub use model::{
    compute_state_hash, fingerprint_payload, median_rounded, round8, AdapterRecord,
    ChunkedProofPayload, ConsensusEntry, ProofPayload, SourcePrice, StateHashInput,
    StateTopicMessage,
};
