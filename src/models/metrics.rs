use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the portfolio_position_metrics table.
///
/// One row per position, overwritten on every recompute. This is the latest
/// snapshot, not a history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionMetrics {
    pub position_id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    pub updated_at: DateTime<Utc>,
}
