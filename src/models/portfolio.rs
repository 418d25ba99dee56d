use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the portfolios table.
///
/// Cash is mutated by funding flows outside this core; here it is read-only
/// input to equity totals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Portfolio {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub cash_balance: Decimal,
    pub created_at: Option<DateTime<Utc>>,
}
