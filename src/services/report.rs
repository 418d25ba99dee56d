use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::CoreResult;
use crate::models::Portfolio;
use crate::store::{PriceFeed, Store};

/// One position joined with its latest metrics snapshot. Metric fields are
/// absent when no recompute has seen a quote for the symbol yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub position_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_buy_price: Decimal,
    pub status: String,
    pub realized_pnl: Decimal,
    pub current_price: Option<Decimal>,
    pub market_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub unrealized_pnl_pct: Option<Decimal>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub portfolio_id: Uuid,
    pub total_value: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub positions: Vec<PositionReport>,
}

/// Detailed portfolio report: every position with its latest metrics, plus
/// totals. Positions without metrics still appear (with empty market fields)
/// and still contribute their realized PnL.
pub async fn portfolio_report(
    store: &dyn Store,
    portfolio_id: Uuid,
) -> CoreResult<PortfolioReport> {
    let positions = store.positions_for_portfolio(portfolio_id).await?;
    let metrics = store.metrics_for_portfolio(portfolio_id).await?;
    let by_position: HashMap<Uuid, _> =
        metrics.into_iter().map(|m| (m.position_id, m)).collect();

    let mut total_value = Decimal::ZERO;
    let mut total_unrealized = Decimal::ZERO;
    let mut total_realized = Decimal::ZERO;

    let reports = positions
        .into_iter()
        .map(|pos| {
            let m = by_position.get(&pos.id);
            if let Some(m) = m {
                total_value += m.market_value;
                total_unrealized += m.unrealized_pnl;
            }
            total_realized += pos.realized_pnl;

            PositionReport {
                position_id: pos.id,
                symbol: pos.symbol,
                quantity: pos.quantity,
                avg_buy_price: pos.avg_buy_price,
                status: pos.status,
                realized_pnl: pos.realized_pnl,
                current_price: m.map(|m| m.current_price),
                market_value: m.map(|m| m.market_value),
                unrealized_pnl: m.map(|m| m.unrealized_pnl),
                unrealized_pnl_pct: m.map(|m| m.unrealized_pnl_pct),
                last_updated: m.map(|m| m.updated_at),
            }
        })
        .collect();

    Ok(PortfolioReport {
        portfolio_id,
        total_value,
        total_unrealized_pnl: total_unrealized,
        total_realized_pnl: total_realized,
        positions: reports,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    #[serde(flatten)]
    pub portfolio: Portfolio,
    pub total_value: Decimal,
    pub cash: Decimal,
    pub change_percent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPortfolioSummaries {
    pub portfolios: Vec<PortfolioSummary>,
    pub total_value_all: Decimal,
}

/// Per-portfolio totals for a user's portfolio list view: current value from
/// live quotes, cash, and percentage change against aggregate cost basis.
pub async fn user_portfolio_summaries(
    store: &dyn Store,
    prices: &dyn PriceFeed,
    user_id: &str,
) -> CoreResult<UserPortfolioSummaries> {
    let portfolios = store.portfolios_for_user(user_id).await?;

    let mut summaries = Vec::with_capacity(portfolios.len());
    let mut total_value_all = Decimal::ZERO;

    for portfolio in portfolios {
        let positions = store.positions_for_portfolio(portfolio.id).await?;

        let mut positions_value = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;

        for pos in &positions {
            total_cost += pos.avg_buy_price * pos.quantity;
            match prices.lookup(&pos.symbol).await {
                Ok(Some(quote)) => positions_value += quote.price * pos.quantity,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, symbol = %pos.symbol, "Price lookup failed in summary");
                }
            }
        }

        let change_percent = if total_cost > Decimal::ZERO {
            (positions_value - total_cost) / total_cost * Decimal::from(100)
        } else {
            Decimal::ZERO
        };

        let cash = portfolio.cash_balance;
        let total_value = positions_value + cash;
        total_value_all += total_value;

        summaries.push(PortfolioSummary {
            portfolio,
            total_value,
            cash,
            change_percent,
        });
    }

    Ok(UserPortfolioSummaries {
        portfolios: summaries,
        total_value_all,
    })
}
