use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::PositionStatus;

/// Database row for the portfolio_positions table.
///
/// A position is the materialized view of its transaction journal: quantity,
/// cost basis, and accumulated realized PnL. It is never deleted, only closed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub id: Uuid,
    pub portfolio_id: Uuid,
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_buy_price: Decimal,
    pub status: String,
    pub realized_pnl: Decimal,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    /// Bumped on every committed mutation; guards against lost updates.
    pub version: i64,
}

impl Position {
    /// A fresh position holds nothing yet: quantity 0, open, no journal.
    pub fn new(portfolio_id: Uuid, symbol: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            portfolio_id,
            symbol,
            quantity: Decimal::ZERO,
            avg_buy_price: Decimal::ZERO,
            status: PositionStatus::Open.as_str().into(),
            realized_pnl: Decimal::ZERO,
            opened_at: None,
            closed_at: None,
            last_updated: now,
            version: 0,
        }
    }

    pub fn status(&self) -> PositionStatus {
        PositionStatus::from_db_str(&self.status)
    }
}
