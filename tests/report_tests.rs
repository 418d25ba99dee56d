mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use finsight_core::clock::FixedClock;
use finsight_core::services::{report, Recalculator};
use finsight_core::store::{MemStore, StaticPrices};

#[tokio::test]
async fn test_report_joins_positions_with_latest_metrics() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(0)).await;
    common::seed_position(&store, portfolio.id, "AAPL", dec!(10), dec!(100), dec!(15)).await;
    common::seed_position(&store, portfolio.id, "NOQUOTE", dec!(5), dec!(40), dec!(-5)).await;

    let prices = StaticPrices::new().with("AAPL", common::quote(dec!(130)));
    let recalc = Recalculator::new(
        store.clone(),
        Arc::new(prices),
        Arc::new(FixedClock(common::tick())),
    );
    recalc.recalc_portfolio_metrics(portfolio.id).await.unwrap();

    let report = report::portfolio_report(store.as_ref(), portfolio.id).await.unwrap();

    assert_eq!(report.positions.len(), 2);
    assert_eq!(report.total_value, dec!(1300));
    assert_eq!(report.total_unrealized_pnl, dec!(300));
    // Realized spans both positions, with or without metrics.
    assert_eq!(report.total_realized_pnl, dec!(10));

    let aapl = report.positions.iter().find(|p| p.symbol == "AAPL").unwrap();
    assert_eq!(aapl.current_price, Some(dec!(130)));
    assert_eq!(aapl.market_value, Some(dec!(1300)));
    assert_eq!(aapl.last_updated, Some(common::tick()));

    let noquote = report.positions.iter().find(|p| p.symbol == "NOQUOTE").unwrap();
    assert_eq!(noquote.current_price, None);
    assert_eq!(noquote.realized_pnl, dec!(-5));
}

#[tokio::test]
async fn test_user_summaries_compute_change_against_cost() {
    let store = Arc::new(MemStore::new());
    let portfolio = common::seed_portfolio(&store, "user_a", dec!(500)).await;
    common::seed_position(&store, portfolio.id, "AAPL", dec!(10), dec!(100), dec!(0)).await;

    let prices = StaticPrices::new().with("AAPL", common::quote(dec!(120)));

    let summaries = report::user_portfolio_summaries(store.as_ref(), &prices, "user_a")
        .await
        .unwrap();

    assert_eq!(summaries.portfolios.len(), 1);
    let summary = &summaries.portfolios[0];
    // 1200 market value on a 1000 cost basis, plus 500 cash.
    assert_eq!(summary.total_value, dec!(1700));
    assert_eq!(summary.cash, dec!(500));
    assert_eq!(summary.change_percent, dec!(20));
    assert_eq!(summaries.total_value_all, dec!(1700));
}

#[tokio::test]
async fn test_user_with_no_portfolios_has_empty_summary() {
    let store = Arc::new(MemStore::new());
    let prices = StaticPrices::new();

    let summaries = report::user_portfolio_summaries(store.as_ref(), &prices, "nobody")
        .await
        .unwrap();

    assert!(summaries.portfolios.is_empty());
    assert_eq!(summaries.total_value_all, dec!(0));
}
