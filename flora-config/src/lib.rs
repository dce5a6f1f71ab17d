mod consumer;
mod network;
mod petal;
mod raw;

pub use consumer::ConsumerConfig;
pub use network::HederaNetwork;
pub use petal::PetalConfig;
pub use raw::RawEnv;

/// Mirrors the teacher's `zksync_env_config::FromEnv`: each config knows how
/// to load itself from the process environment.
pub trait FromEnv: Sized {
    fn from_env() -> anyhow::Result<Self>;
}
