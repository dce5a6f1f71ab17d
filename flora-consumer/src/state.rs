//! Shared process state (§5): one `AppState` owned by the HTTP router,
//! the log tailer task, and the leader-publish tasks, mirroring the
//! `ViaWithdrawalState`/`RestApi` ownership pattern.

use std::sync::Arc;

use flora_config::ConsumerConfig;
use flora_dal::ConsensusEntriesDal;
use flora_ledger::LedgerClient;
use tokio::sync::Mutex;

use crate::aggregator::Aggregator;
use crate::intake::Intake;
use crate::leader::LeaderPublisher;
use crate::roster::{AccountKeyCache, Roster};

pub struct AppState {
    pub config: ConsumerConfig,
    pub intake: Intake,
    pub aggregator: Mutex<Aggregator>,
    pub dal: Arc<ConsensusEntriesDal>,
    pub leader_publisher: Arc<LeaderPublisher>,
    pub ledger: Arc<dyn LedgerClient>,
    pub roster: Mutex<Roster>,
    pub account_keys: AccountKeyCache,
}
