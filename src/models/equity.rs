use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the portfolio_equity_curve table.
///
/// Append-only history of portfolio-level equity; one row per recompute tick,
/// deduplicated on timestamp by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EquityCurvePoint {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal,
    pub cash_balance: Decimal,
    pub positions_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
}
