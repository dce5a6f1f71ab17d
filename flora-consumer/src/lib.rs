pub mod aggregator;
pub mod http;
pub mod intake;
pub mod leader;
pub mod metrics;
pub mod roster;
pub mod state;
pub mod tailer;

pub use state::AppState;
