use std::sync::Arc;

use tokio::time::{interval, Duration};

use finsight_core::clock::SystemClock;
use finsight_core::config::AppConfig;
use finsight_core::services::Recalculator;
use finsight_core::store::{pg, PgPriceFeed, PgStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = pg::init_pool(&config.database_url).await?;
    tracing::info!("Database connected, migrations applied");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let prices = Arc::new(PgPriceFeed::new(pool));
    let recalc = Recalculator::new(store.clone(), prices, Arc::new(SystemClock));

    // Startup pass, then periodic price-driven recomputes.
    recalc_all(store.as_ref(), &recalc).await;

    let mut ticker = interval(Duration::from_secs(config.recalc_interval_secs));
    ticker.tick().await; // first tick fires immediately; the startup pass covered it
    loop {
        ticker.tick().await;
        recalc_all(store.as_ref(), &recalc).await;
    }
}

/// Recompute metrics for every portfolio. Per-portfolio failures are logged
/// and skipped so one bad portfolio cannot stall the batch.
async fn recalc_all(store: &dyn Store, recalc: &Recalculator) {
    let portfolios = match store.all_portfolios().await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Batch recompute: failed to list portfolios");
            return;
        }
    };

    if portfolios.is_empty() {
        tracing::debug!("Batch recompute: no portfolios");
        return;
    }

    for portfolio in &portfolios {
        match recalc.recalc_portfolio_metrics(portfolio.id).await {
            Ok(totals) => {
                tracing::info!(
                    portfolio_id = %portfolio.id,
                    name = %portfolio.name,
                    total_value = %totals.total_value,
                    unrealized_pnl = %totals.unrealized_pnl,
                    realized_pnl = %totals.realized_pnl,
                    "Portfolio recomputed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    portfolio_id = %portfolio.id,
                    "Batch recompute failed for portfolio"
                );
            }
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
