use payout_distributor::{
    DistributionOrchestrator,
    batch::PaymentBatcher,
    chain::{ChainJobSubmitter, EvmJobContract, SettlementKey},
    config::Config,
    ledger::SqliteLedger,
    manifest::{IpfsClient, ManifestPublisher},
    users::SqliteUserSource,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,payout_distributor=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Runs one distribution pass and exits.
///
/// Wiring happens once here: the ledger pool, the IPFS client and the signed
/// job contract client are built up front and handed to the orchestrator.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config_path =
        std::env::var("DISTRIBUTOR_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Distributor starting with config: {:?}", config);

    // A missing or malformed key is fatal before any user is touched.
    let key = SettlementKey::load(&config.key_file_path()?)?;
    let wallet = key.wallet(config.chain.chain_id)?;
    info!("Submitting as {}", key.address);

    let ledger = SqliteLedger::connect(&config.database.url).await?;
    let users = SqliteUserSource::new(ledger.pool().clone());

    let contract = EvmJobContract::new(&config.chain.rpc_url, &config.chain.contract_address, wallet)?;
    let submitter = ChainJobSubmitter::new(
        Arc::new(contract),
        config.distribution.task_count,
        config.chain.tip,
    );
    let publisher = ManifestPublisher::new(Arc::new(IpfsClient::new(&config.content_store.api_url)));

    let orchestrator = DistributionOrchestrator::new(
        Arc::new(users),
        Arc::new(ledger),
        PaymentBatcher::new(config.distribution.batch_size)?,
        publisher,
        submitter,
    )
    .resume_after(config.distribution.resume_after_user);

    match orchestrator.run().await {
        Ok(report) => {
            info!(
                "Run complete: {} obligations, {} jobs, {} users skipped, {} intents reconciled, last user {:?}",
                report.attempted,
                report.receipts.len(),
                report.skipped_total(),
                report.intents_reconciled,
                report.last_user_id
            );
            Ok(())
        }
        Err(aborted) => {
            for receipt in &aborted.report.receipts {
                info!("Submitted before abort: {} -> {}", receipt.manifest_id, receipt.job_tx_id);
            }
            error!("Run aborted at batch {:?}", aborted.batch_index);
            Err(aborted.into())
        }
    }
}
