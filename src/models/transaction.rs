use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the transactions table.
///
/// Immutable once written; the journal is append-only and reconstructs the
/// owning position's quantity and realized PnL exactly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub position_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub txn_type: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub currency: String,
    /// Zero for buys; `(price - avg_buy_price) * quantity - fee` for sells.
    pub realized_pnl: Decimal,
    pub executed_at: DateTime<Utc>,
}
