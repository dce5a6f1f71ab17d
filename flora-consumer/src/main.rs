use std::sync::Arc;

use clap::Parser;
use flora_config::{ConsumerConfig, FromEnv};
use flora_consumer::aggregator::Aggregator;
use flora_consumer::http::router;
use flora_consumer::intake::Intake;
use flora_consumer::leader::LeaderPublisher;
use flora_consumer::roster::{AccountKeyCache, Roster};
use flora_consumer::state::AppState;
use flora_consumer::tailer::LogTailer;
use flora_dal::{AppStateDal, ConsensusEntriesDal};
use flora_ledger::{LedgerClient, MirrorLedgerClient, TopicReadFilter};
use flora_types::AccountId;
use tokio::sync::{watch, Mutex};

/// The Consumer: proof intake, aggregation, leader publication, log
/// tailing and the HTTP surface. Configuration is environment-first; this
/// flag only points at a local override file before startup.
#[derive(Debug, Parser)]
struct Cli {
    #[arg(long, env = "CONSUMER_CONFIG_PATH")]
    config_path: Option<String>,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    if cli.config_path.is_some() {
        tracing::info!(path = ?cli.config_path, "loading environment overrides");
    }

    let config = ConsumerConfig::from_env()?;
    let pool = flora_dal::connect(&config.database_url).await?;

    let app_state_dal = AppStateDal::new(pool.clone(), &config.petal_key_secret);
    app_state_dal
        .set_raw("consumer_last_started_at", &chrono::Utc::now().to_rfc3339())
        .await?;

    let entries_dal = Arc::new(ConsensusEntriesDal::new(pool));
    let ledger = Arc::new(MirrorLedgerClient::new(config.mirror_base_url.clone(), config.mirror_timeout()));

    let mut aggregator = Aggregator::new();
    let history = entries_dal.load_all_ascending().await?;
    let mut newest_timestamp = "0".to_string();
    for entry in &history {
        aggregator.seed_consolidated(entry.epoch, entry.state_hash.clone());
        if let Some(ts) = &entry.consensus_timestamp {
            newest_timestamp = ts.clone();
        }
    }
    tracing::info!(count = history.len(), "loaded consensus history");

    if newest_timestamp == "0" {
        let newest_message = ledger
            .read_topic_messages(&config.flora_state_topic_id, TopicReadFilter::newest(1))
            .await?;
        if let Some(message) = newest_message.into_iter().next() {
            newest_timestamp = message.consensus_timestamp;
        }
    }

    let leader_publisher = Arc::new(LeaderPublisher::new(
        ledger.clone(),
        AccountId::new(config.flora_account_id.clone()),
        config.threshold_fingerprint.clone(),
        config.flora_state_topic_id.clone(),
        config.published_topics(),
        entries_dal.clone(),
    ));

    let aggregator = Arc::new(Mutex::new(aggregator));
    let intake = Intake::new(
        AccountId::new(config.flora_account_id.clone()),
        config.threshold_fingerprint.clone(),
        config.registry_topic_id.clone(),
        config.expected_petals,
    );

    let tailer = Arc::new(LogTailer::new(
        ledger.clone(),
        config.flora_state_topic_id.clone(),
        newest_timestamp,
        aggregator.clone(),
        entries_dal.clone(),
        leader_publisher.clone(),
        config.quorum,
    ));

    let state = Arc::new(AppState {
        account_keys: AccountKeyCache::new(ledger.clone()),
        config: config.clone(),
        intake,
        aggregator,
        dal: entries_dal,
        leader_publisher,
        ledger,
        roster: Mutex::new(Roster::new()),
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(tailer.run(config.poll_interval(), stop_rx.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "consumer listening");

    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            let _ = stop_tx.send(true);
        })
        .await?;

    Ok(())
}
