use thiserror::Error;

/// Errors that can cross a flora-types boundary. Component-specific
/// rejection reasons (intake validation, adapter failures) live closer to
/// their owning crate; this covers the data-integrity faults §7 calls out
/// as shared across the workspace.
#[derive(Debug, Error)]
pub enum FloraError {
    #[error("recomputed state hash does not match declared stateHash")]
    StateHashMismatch,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
