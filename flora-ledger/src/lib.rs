pub mod mirror;
pub mod mock;
mod traits;

pub use mirror::MirrorLedgerClient;
pub use mock::InMemoryLedgerClient;
pub use traits::{AccountKey, LedgerClient, LedgerError, ReadOrder, SubmitReceipt, TopicMessage, TopicReadFilter};
