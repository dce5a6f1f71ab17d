use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Parser;
use flora_adapters::testing::FixedAdapter;
use flora_adapters::AdapterRunner;
use flora_config::{FromEnv, PetalConfig};
use flora_dal::AppStateDal;
use flora_ledger::MirrorLedgerClient;
use flora_petal::{PetalScheduler, ProofBuilderConfig};
use flora_types::AccountId;
use tokio::sync::watch;

/// Petal worker: samples adapters on a fixed block time and publishes
/// proofs to the Consumer. Configuration is environment-first; this flag
/// exists only to point at a local `.env`-style file before startup, the
/// way `via_server`'s `Cli` does.
#[derive(Debug, Parser)]
struct Cli {
    #[arg(long, env = "PETAL_CONFIG_PATH")]
    config_path: Option<String>,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

const EPOCH_ORIGIN_KEY: &str = "epoch_origin_ms";

async fn bootstrap_epoch_origin_ms(state: &AppStateDal) -> anyhow::Result<i64> {
    if let Some(raw) = state.get_raw(EPOCH_ORIGIN_KEY).await? {
        return Ok(raw.parse()?);
    }
    let now_ms = chrono::Utc::now().timestamp_millis();
    state.set_raw(EPOCH_ORIGIN_KEY, &now_ms.to_string()).await?;
    Ok(now_ms)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let _cli = Cli::parse();

    let config = PetalConfig::from_env()?;

    let pool = flora_dal::connect("sqlite://petal.db?mode=rwc").await?;
    // The petal only ever persists plain values (epoch_origin_ms) through
    // this handle, so the AEAD key it's constructed with is never exercised.
    let app_state = AppStateDal::new(pool, &config.petal_id);
    let epoch_origin_ms = bootstrap_epoch_origin_ms(&app_state).await?.min(chrono::Utc::now().timestamp_millis());

    let participants: Vec<AccountId> = config.participants.iter().map(|p| AccountId::new(p.as_str())).collect();
    let builder_config = ProofBuilderConfig {
        epoch_origin_ms,
        block_time_ms: config.block_time_ms,
        threshold_fingerprint: config.threshold_fingerprint.clone(),
        adapter_fingerprints: BTreeMap::new(),
        registry_topic_id: config.registry_topic_id.clone(),
        flora_account_id: AccountId::new(config.flora_account_id.clone()),
        petal_id: config.petal_id.clone(),
        petal_account_id: AccountId::new(config.petal_account_id.clone()),
        petal_state_topic_id: config.petal_state_topic_id.clone(),
        participants,
    };

    // The real price-adapter implementations (Binance, CoinGecko, ...) are
    // the out-of-scope external collaborator named in spec.md §1; this
    // wires the in-repo fixtures so the binary is runnable standalone.
    let adapters = AdapterRunner::new(vec![
        Box::new(FixedAdapter::new("binance", "HBAR-USD", 0.07, "binance")),
        Box::new(FixedAdapter::new("coingecko", "HBAR-USD", 0.071, "coingecko")),
    ])
    .with_timeout(config.adapter_timeout());

    let ledger = Arc::new(MirrorLedgerClient::new(
        config.mirror_base_url.clone(),
        config.adapter_timeout(),
    ));

    let scheduler = PetalScheduler::new(
        builder_config,
        adapters,
        ledger,
        config.consumer_proof_url.clone(),
        config.publish_state_topic,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = stop_tx.send(true);
    });

    scheduler.run(config.block_time(), stop_rx).await;
    Ok(())
}
