use std::sync::Arc;

use ckb::CkbAdapter;
use common::{
    alert::alerter_from_config,
    config::{IndexerConfig, LoadFromEnv},
};
use database::DbClient;
use evm::EvmAdapter;
use eyre::{Result, WrapErr};
use generic_indexer::{ScanSettings, Supervisor};
use migration::{Migrator, MigratorTrait};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tron::TronAdapter;
use utxo::UtxoAdapter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = IndexerConfig::load()?;

    let db_conn = database::connect::connect(&cfg.database.url).await?;
    info!("Connected to Indexer's DB");
    Migrator::up(&db_conn, None)
        .await
        .wrap_err("Failed to apply migrations")?;

    let db = Arc::new(DbClient::new(db_conn));
    let alerter = alerter_from_config(&cfg.alert)?;

    let mut supervisor = Supervisor::new(db, alerter, &cfg.settings);
    let chains = &cfg.chains;

    for evm in [&chains.ethereum, &chains.bsc].into_iter().flatten() {
        let adapter = EvmAdapter::new(evm)
            .wrap_err_with(|| format!("Failed to build adapter for {}", evm.common.name))?;
        supervisor.spawn_chain(adapter, ScanSettings::from(&evm.common));
    }
    if let Some(tron) = &chains.tron {
        let adapter = TronAdapter::new(tron)
            .wrap_err_with(|| format!("Failed to build adapter for {}", tron.common.name))?;
        supervisor.spawn_chain(adapter, ScanSettings::from(&tron.common));
    }
    for utxo in [&chains.bitcoin, &chains.dogecoin].into_iter().flatten() {
        let adapter = UtxoAdapter::new(utxo)
            .wrap_err_with(|| format!("Failed to build adapter for {}", utxo.common.name))?;
        supervisor.spawn_chain(adapter, ScanSettings::from(&utxo.common));
    }
    if let Some(ckb) = &chains.ckb {
        let adapter = CkbAdapter::new(ckb)
            .wrap_err_with(|| format!("Failed to build adapter for {}", ckb.common.name))?;
        supervisor.spawn_chain(adapter, ScanSettings::from(&ckb.common));
    }

    supervisor.spawn_monitor();
    info!("Indexing {} chain(s): {}", supervisor.chains().len(), supervisor.chains().join(", "));

    supervisor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {:?}", e);
            }
        })
        .await;

    Ok(())
}
