use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::CoreResult;
use crate::models::EquityCurvePoint;
use crate::store::Store;

use super::recalc::PortfolioTotals;

/// Append a portfolio equity snapshot, suppressing duplicates at timestamp
/// granularity: a recompute triggered twice in the same instant (dashboard
/// fan-out hits every portfolio in one request) yields one point, not two.
/// Points are never updated or deleted here; pruning is an external concern.
pub async fn record_snapshot(
    store: &dyn Store,
    totals: &PortfolioTotals,
    at: DateTime<Utc>,
) -> CoreResult<EquityCurvePoint> {
    if let Some(latest) = store.latest_equity_point(totals.portfolio_id).await? {
        if latest.timestamp == at {
            tracing::debug!(
                portfolio_id = %totals.portfolio_id,
                timestamp = %at,
                "Equity snapshot already recorded for this tick"
            );
            return Ok(latest);
        }
    }

    let point = EquityCurvePoint {
        id: Uuid::new_v4(),
        portfolio_id: totals.portfolio_id,
        timestamp: at,
        total_value: totals.total_value,
        cash_balance: totals.cash,
        positions_value: totals.positions_value,
        unrealized_pnl: totals.unrealized_pnl,
        realized_pnl: totals.realized_pnl,
    };
    store.append_equity_point(&point).await?;

    Ok(point)
}

/// Historical equity curve for one portfolio, oldest first.
pub async fn portfolio_equity_curve(
    store: &dyn Store,
    portfolio_id: Uuid,
    limit: i64,
) -> CoreResult<Vec<EquityCurvePoint>> {
    Ok(store.equity_curve(portfolio_id, limit).await?)
}
