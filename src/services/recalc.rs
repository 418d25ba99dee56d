use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::{CoreError, CoreResult};
use crate::models::PositionMetrics;
use crate::store::{PriceFeed, Store};

use super::equity_curve;

/// Aggregated portfolio figures for one recompute tick.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioTotals {
    pub portfolio_id: Uuid,
    pub total_value: Decimal,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}

impl PortfolioTotals {
    pub fn zero(portfolio_id: Uuid) -> Self {
        Self {
            portfolio_id,
            total_value: Decimal::ZERO,
            cash: Decimal::ZERO,
            positions_value: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
        }
    }
}

/// Re-derives per-position market value and unrealized PnL from the latest
/// quotes, persists the metrics snapshots, and appends an equity curve point.
/// Batch semantics are best-effort: a missing quote or a failed per-position
/// write is logged and skipped, never fatal to the rest of the recompute.
pub struct Recalculator {
    store: Arc<dyn Store>,
    prices: Arc<dyn PriceFeed>,
    clock: Arc<dyn Clock>,
}

impl Recalculator {
    pub fn new(store: Arc<dyn Store>, prices: Arc<dyn PriceFeed>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            prices,
            clock,
        }
    }

    pub async fn recalc_portfolio_metrics(
        &self,
        portfolio_id: Uuid,
    ) -> CoreResult<PortfolioTotals> {
        let portfolio = self
            .store
            .get_portfolio(portfolio_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("portfolio {portfolio_id}")))?;

        let now = self.clock.now();
        let positions = self.store.positions_for_portfolio(portfolio_id).await?;

        let mut positions_value = Decimal::ZERO;
        let mut unrealized_pnl = Decimal::ZERO;
        let mut realized_pnl = Decimal::ZERO;

        for pos in &positions {
            // Realized PnL never depends on a current quote; count it for
            // every position up front.
            realized_pnl += pos.realized_pnl;

            let quote = match self.prices.lookup(&pos.symbol).await {
                Ok(Some(q)) => q,
                Ok(None) => {
                    tracing::debug!(
                        symbol = %pos.symbol,
                        position_id = %pos.id,
                        "No quote available, position excluded from value totals"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        symbol = %pos.symbol,
                        "Price lookup failed, position excluded from value totals"
                    );
                    continue;
                }
            };

            let market_value = pos.quantity * quote.price;
            let unrealized = (quote.price - pos.avg_buy_price) * pos.quantity;
            let cost_basis = pos.avg_buy_price * pos.quantity;
            let unrealized_pct = if cost_basis.is_zero() {
                Decimal::ZERO
            } else {
                unrealized / cost_basis
            };

            positions_value += market_value;
            unrealized_pnl += unrealized;

            let metrics = PositionMetrics {
                position_id: pos.id,
                portfolio_id: pos.portfolio_id,
                symbol: pos.symbol.clone(),
                current_price: quote.price,
                market_value,
                unrealized_pnl: unrealized,
                unrealized_pnl_pct: unrealized_pct,
                updated_at: now,
            };
            if let Err(e) = self.store.upsert_position_metrics(&metrics).await {
                tracing::warn!(
                    error = %e,
                    position_id = %pos.id,
                    "Failed to upsert position metrics, continuing"
                );
            }
        }

        let cash = portfolio.cash_balance;
        let totals = PortfolioTotals {
            portfolio_id,
            total_value: positions_value + cash,
            cash,
            positions_value,
            unrealized_pnl,
            realized_pnl,
        };

        if let Err(e) = equity_curve::record_snapshot(self.store.as_ref(), &totals, now).await {
            tracing::warn!(
                error = %e,
                portfolio_id = %portfolio_id,
                "Failed to record equity snapshot, returning totals anyway"
            );
        }

        tracing::debug!(
            portfolio_id = %portfolio_id,
            total_value = %totals.total_value,
            positions_value = %totals.positions_value,
            unrealized_pnl = %totals.unrealized_pnl,
            "Portfolio metrics recomputed"
        );

        Ok(totals)
    }
}
