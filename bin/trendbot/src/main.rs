use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Broker, CandleSource, Config};
use engine::{
    BinanceKlines, Engine, OrderExecutor, RetryPolicy, SimpleTrader, StrategyRunner, TraderParams,
};
use paper::PaperBroker;
use strategy::{StrategyFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(market_data = %cfg.market_data_url, "TrendBot starting in paper mode");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading strategies from {}", cfg.strategy_config_path))?;

    // ── Market data + paper broker ────────────────────────────────────────────
    let klines: Arc<dyn CandleSource> = Arc::new(
        BinanceKlines::new(cfg.market_data_url.clone()).context("building market data client")?,
    );
    let paper = Arc::new(
        PaperBroker::new(
            cfg.paper_balance_usd,
            cfg.paper_slippage_bps,
            cfg.paper_leverage,
        )
        .with_feed(klines),
    );
    // Strategies read candles through the paper broker so fills track the
    // prices they saw.
    let source: Arc<dyn CandleSource> = paper.clone();
    let broker: Arc<dyn Broker> = paper;

    // ── Strategies ────────────────────────────────────────────────────────────
    let registry =
        StrategyRegistry::from_config(&strategy_file, source).context("building strategies")?;
    if registry.is_empty() {
        bail!("no strategies configured in {}", cfg.strategy_config_path);
    }
    info!(strategies = registry.len(), symbols = ?registry.symbols(), "Strategies loaded");

    let retry = RetryPolicy::new(
        cfg.order_retry_attempts,
        Duration::from_millis(cfg.order_retry_delay_ms),
    );
    let executor = OrderExecutor::new(broker, retry);

    let runners = registry
        .into_entries()
        .into_iter()
        .map(|entry| {
            let trader = SimpleTrader::new(executor.clone(), TraderParams::from_config(&entry.config));
            StrategyRunner::new(entry.strategy, trader, entry.config.sessions)
        })
        .collect();

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, handle) = Engine::new(runners);
    let engine_task = tokio::spawn(engine.run());
    tokio::pin!(engine_task);

    info!("All strategies started. Waiting for shutdown signal.");
    let summaries = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("listening for shutdown signal")?;
            info!("Shutdown signal received");
            handle.shutdown().await;
            (&mut engine_task).await.context("engine task failed")?
        }
        joined = &mut engine_task => {
            info!("Every strategy finished its sessions");
            joined.context("engine task failed")?
        }
    };

    for s in &summaries {
        info!(
            strategy = %s.name,
            symbol = %s.symbol,
            cycles = s.cycles,
            orders = s.orders_placed,
            errors = s.errors,
            "Strategy summary"
        );
    }
    Ok(())
}
