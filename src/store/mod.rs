pub mod memory;
pub mod pg;

pub use memory::{MemStore, StaticPrices};
pub use pg::{PgPriceFeed, PgStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{EquityCurvePoint, Portfolio, Position, PositionMetrics, Transaction};

/// Latest known quote for a symbol.
#[derive(Debug, Clone)]
pub struct Quote {
    pub price: Decimal,
    pub currency: String,
    pub as_of: DateTime<Utc>,
}

/// Result of an optimistic transaction commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The position moved underneath us; the caller re-reads and retries.
    Conflict,
}

/// The single persistence seam of the core. Everything the ledger, the
/// recalculator, and the aggregator need from the relational store goes
/// through this trait, so tests can swap in [`MemStore`].
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_portfolio(&self, id: Uuid) -> anyhow::Result<Option<Portfolio>>;

    async fn portfolios_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Portfolio>>;

    /// Every portfolio in the store; used by the periodic batch recompute.
    async fn all_portfolios(&self) -> anyhow::Result<Vec<Portfolio>>;

    async fn get_position(&self, id: Uuid) -> anyhow::Result<Option<Position>>;

    async fn position_by_symbol(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
    ) -> anyhow::Result<Option<Position>>;

    async fn insert_position(&self, position: &Position) -> anyhow::Result<()>;

    async fn positions_for_portfolio(&self, portfolio_id: Uuid)
        -> anyhow::Result<Vec<Position>>;

    /// Atomically append `txn` and write `updated` in one storage transaction,
    /// guarded by the position's previous version (`updated.version - 1`).
    /// Returns [`CommitOutcome::Conflict`] without side effects if the guard
    /// does not match; both writes land or neither does.
    async fn commit_fill(
        &self,
        txn: &Transaction,
        updated: &Position,
    ) -> anyhow::Result<CommitOutcome>;

    async fn transactions_for_position(
        &self,
        position_id: Uuid,
    ) -> anyhow::Result<Vec<Transaction>>;

    async fn upsert_position_metrics(&self, metrics: &PositionMetrics) -> anyhow::Result<()>;

    async fn metrics_for_portfolio(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Vec<PositionMetrics>>;

    async fn latest_equity_point(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Option<EquityCurvePoint>>;

    async fn append_equity_point(&self, point: &EquityCurvePoint) -> anyhow::Result<()>;

    async fn equity_curve(
        &self,
        portfolio_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<EquityCurvePoint>>;
}

/// Read-only access to the latest quotes the external price feed has written.
/// `Ok(None)` means "no quote for this symbol" and is never an error: the
/// recalculator skips such positions rather than failing the batch.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn lookup(&self, symbol: &str) -> anyhow::Result<Option<Quote>>;
}
