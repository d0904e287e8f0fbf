use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use quant_arena::config::Config;
use quant_arena::decision::{DecisionEngine, ScoreSource, ScoreSourceKind, SharedHealth};
use quant_arena::events;
use quant_arena::lifecycle::{JsonFileStore, StrategyLifecycleManager};
use quant_arena::orchestrator::Orchestrator;
use quant_arena::phenotype::RandomPhenotypeGenerator;
use quant_arena::sim::{SimAccount, SimMarketData, SimScoreSource};
use quant_arena::status;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            eprintln!("Make sure config/default.toml exists");
            std::process::exit(1);
        }
    };

    // Log to file in JSON so stdout stays free for operators.
    let log_file = std::fs::File::create("quant-arena.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        cycle_interval_secs = config.orchestrator.cycle_interval_secs,
        listen = %config.status.listen_addr,
        "starting quant-arena"
    );

    let store = Arc::new(
        JsonFileStore::open(
            Path::new(&config.persistence.roster_path),
            Path::new(&config.persistence.transitions_path),
        )
        .context("failed to open strategy store")?,
    );
    let lifecycle = Arc::new(StrategyLifecycleManager::new(
        store,
        config.lifecycle.clone(),
        config.capacity.r1_allocation_usd,
    ));

    let (event_tx, _event_rx) = events::channel(256);
    let health = Arc::new(SharedHealth::default());

    let sources: Vec<Arc<dyn ScoreSource>> = vec![
        Arc::new(SimScoreSource::new(ScoreSourceKind::Model, 0.05)),
        Arc::new(SimScoreSource::new(ScoreSourceKind::Technical, 0.0)),
        Arc::new(SimScoreSource::new(ScoreSourceKind::News, -0.02)),
        Arc::new(SimScoreSource::new(ScoreSourceKind::Strategy, 0.03)),
    ];
    let decision_engine = Arc::new(DecisionEngine::new(
        config.decision.clone(),
        sources,
        health.clone(),
        event_tx.clone(),
        std::time::Duration::from_millis(config.orchestrator.provider_timeout_ms),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        Arc::new(SimMarketData::new(7)),
        Arc::new(SimAccount),
        lifecycle,
        Box::new(RandomPhenotypeGenerator::new()),
        health,
        event_tx,
    )?);

    orchestrator.start();

    let server = {
        let state = status::AppState {
            orchestrator: orchestrator.clone(),
            decisions: decision_engine,
        };
        let listen_addr = config.status.listen_addr.clone();
        tokio::spawn(async move { status::serve(state, &listen_addr).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown requested");
    orchestrator.stop();
    server.abort();
    Ok(())
}
