mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;
use uuid::Uuid;

use finsight_core::clock::FixedClock;
use finsight_core::errors::CoreError;
use finsight_core::services::Recalculator;
use finsight_core::store::{MemStore, StaticPrices, Store};

fn recalc_for(store: &Arc<MemStore>, prices: StaticPrices) -> Recalculator {
    Recalculator::new(
        store.clone(),
        Arc::new(prices),
        Arc::new(FixedClock(common::tick())),
    )
}

#[tokio::test]
async fn test_totals_cover_cash_and_positions() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(1000)).await;
    let pos =
        common::seed_position(&store, portfolio.id, "AAPL", dec!(10), dec!(100), dec!(25)).await;

    let prices = StaticPrices::new().with("AAPL", common::quote(dec!(160)));
    let recalc = recalc_for(&store, prices);

    let totals = recalc.recalc_portfolio_metrics(portfolio.id).await.unwrap();

    assert_eq!(totals.positions_value, dec!(1600));
    assert_eq!(totals.total_value, dec!(2600));
    assert_eq!(totals.cash, dec!(1000));
    assert_eq!(totals.unrealized_pnl, dec!(600));
    assert_eq!(totals.realized_pnl, dec!(25));

    let metrics = store.metrics_for_portfolio(portfolio.id).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].position_id, pos.id);
    assert_eq!(metrics[0].market_value, dec!(1600));
    assert_eq!(metrics[0].unrealized_pnl, dec!(600));
    // 600 unrealized on a 1000 cost basis
    assert_eq!(metrics[0].unrealized_pnl_pct, dec!(0.6));
}

#[tokio::test]
async fn test_missing_quote_skips_value_but_keeps_realized() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(500)).await;
    common::seed_position(&store, portfolio.id, "AAPL", dec!(10), dec!(100), dec!(0)).await;
    common::seed_position(&store, portfolio.id, "OBSCURE", dec!(7), dec!(50), dec!(40)).await;

    // Only AAPL has a quote.
    let prices = StaticPrices::new().with("AAPL", common::quote(dec!(110)));
    let recalc = recalc_for(&store, prices);

    let totals = recalc.recalc_portfolio_metrics(portfolio.id).await.unwrap();

    assert_eq!(totals.positions_value, dec!(1100));
    assert_eq!(totals.total_value, dec!(1600));
    // OBSCURE contributes nothing to value, but its realized PnL still counts.
    assert_eq!(totals.realized_pnl, dec!(40));

    let metrics = store.metrics_for_portfolio(portfolio.id).await.unwrap();
    assert_eq!(metrics.len(), 1, "no metrics row without a quote");
}

#[tokio::test]
async fn test_metrics_write_failure_does_not_abort_batch() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(0)).await;
    let broken =
        common::seed_position(&store, portfolio.id, "AAA", dec!(1), dec!(10), dec!(0)).await;
    let healthy =
        common::seed_position(&store, portfolio.id, "BBB", dec!(2), dec!(20), dec!(0)).await;
    store.break_metrics_for(broken.id).await;

    let prices = StaticPrices::new()
        .with("AAA", common::quote(dec!(12)))
        .with("BBB", common::quote(dec!(25)));
    let recalc = recalc_for(&store, prices);

    let totals = recalc.recalc_portfolio_metrics(portfolio.id).await.unwrap();

    // Totals still include the position whose metrics write failed.
    assert_eq!(totals.positions_value, dec!(12) + dec!(50));

    let metrics = store.metrics_for_portfolio(portfolio.id).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].position_id, healthy.id);
}

#[tokio::test]
async fn test_recompute_is_idempotent_and_dedups_snapshot() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(100)).await;
    common::seed_position(&store, portfolio.id, "AAPL", dec!(3), dec!(50), dec!(0)).await;

    let prices = StaticPrices::new().with("AAPL", common::quote(dec!(60)));
    let recalc = recalc_for(&store, prices);

    let first = recalc.recalc_portfolio_metrics(portfolio.id).await.unwrap();
    let metrics_first = store.metrics_for_portfolio(portfolio.id).await.unwrap();

    let second = recalc.recalc_portfolio_metrics(portfolio.id).await.unwrap();
    let metrics_second = store.metrics_for_portfolio(portfolio.id).await.unwrap();

    assert_eq!(first.total_value, second.total_value);
    assert_eq!(metrics_first.len(), metrics_second.len());
    assert_eq!(
        metrics_first[0].market_value,
        metrics_second[0].market_value
    );

    // Same clock tick twice: exactly one equity point.
    assert_eq!(store.equity_point_count(portfolio.id).await, 1);

    let latest = store.latest_equity_point(portfolio.id).await.unwrap().unwrap();
    assert_eq!(latest.timestamp, common::tick());
    assert_eq!(latest.total_value, dec!(280));
    assert_eq!(latest.cash_balance, dec!(100));
}

#[tokio::test]
async fn test_distinct_ticks_append_distinct_points() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(100)).await;
    common::seed_position(&store, portfolio.id, "AAPL", dec!(1), dec!(50), dec!(0)).await;

    let quote = common::quote(dec!(55));
    let first_tick = recalc_for(&store, StaticPrices::new().with("AAPL", quote.clone()));
    first_tick.recalc_portfolio_metrics(portfolio.id).await.unwrap();

    let later = Recalculator::new(
        store.clone(),
        Arc::new(StaticPrices::new().with("AAPL", quote)),
        Arc::new(FixedClock(common::tick() + chrono::Duration::minutes(5))),
    );
    later.recalc_portfolio_metrics(portfolio.id).await.unwrap();

    assert_eq!(store.equity_point_count(portfolio.id).await, 2);

    let curve = store.equity_curve(portfolio.id, 100).await.unwrap();
    assert!(curve[0].timestamp < curve[1].timestamp);
    assert_eq!(curve[0].total_value, curve[1].total_value);
}

#[tokio::test]
async fn test_unknown_portfolio_is_not_found() {
    let store = Arc::new(MemStore::new());
    let recalc = recalc_for(&store, StaticPrices::new());

    let result = recalc.recalc_portfolio_metrics(Uuid::new_v4()).await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}
