use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{EquityCurvePoint, Portfolio, Position, PositionMetrics, Transaction};

use super::{CommitOutcome, PriceFeed, Quote, Store};

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_portfolio(&self, id: Uuid) -> anyhow::Result<Option<Portfolio>> {
        let portfolio = sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(portfolio)
    }

    async fn portfolios_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Portfolio>> {
        let portfolios = sqlx::query_as::<_, Portfolio>(
            "SELECT * FROM portfolios WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(portfolios)
    }

    async fn all_portfolios(&self) -> anyhow::Result<Vec<Portfolio>> {
        let portfolios =
            sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(portfolios)
    }

    async fn get_position(&self, id: Uuid) -> anyhow::Result<Option<Position>> {
        let position =
            sqlx::query_as::<_, Position>("SELECT * FROM portfolio_positions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(position)
    }

    async fn position_by_symbol(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
    ) -> anyhow::Result<Option<Position>> {
        let position = sqlx::query_as::<_, Position>(
            "SELECT * FROM portfolio_positions WHERE portfolio_id = $1 AND symbol = $2",
        )
        .bind(portfolio_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(position)
    }

    async fn insert_position(&self, position: &Position) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portfolio_positions
                (id, portfolio_id, symbol, quantity, avg_buy_price, status,
                 realized_pnl, opened_at, closed_at, last_updated, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(position.id)
        .bind(position.portfolio_id)
        .bind(&position.symbol)
        .bind(position.quantity)
        .bind(position.avg_buy_price)
        .bind(&position.status)
        .bind(position.realized_pnl)
        .bind(position.opened_at)
        .bind(position.closed_at)
        .bind(position.last_updated)
        .bind(position.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn positions_for_portfolio(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Vec<Position>> {
        let positions = sqlx::query_as::<_, Position>(
            "SELECT * FROM portfolio_positions WHERE portfolio_id = $1 ORDER BY symbol",
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(positions)
    }

    async fn commit_fill(
        &self,
        txn: &Transaction,
        updated: &Position,
    ) -> anyhow::Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        // Version guard: the UPDATE only lands if nobody else committed since
        // the ledger read this position.
        let result = sqlx::query(
            r#"
            UPDATE portfolio_positions
            SET quantity = $2, avg_buy_price = $3, status = $4, realized_pnl = $5,
                opened_at = $6, closed_at = $7, last_updated = $8, version = $9
            WHERE id = $1 AND version = $10
            "#,
        )
        .bind(updated.id)
        .bind(updated.quantity)
        .bind(updated.avg_buy_price)
        .bind(&updated.status)
        .bind(updated.realized_pnl)
        .bind(updated.opened_at)
        .bind(updated.closed_at)
        .bind(updated.last_updated)
        .bind(updated.version)
        .bind(updated.version - 1)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::Conflict);
        }

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, position_id, type, quantity, price, fee, currency, realized_pnl, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(txn.id)
        .bind(txn.position_id)
        .bind(&txn.txn_type)
        .bind(txn.quantity)
        .bind(txn.price)
        .bind(txn.fee)
        .bind(&txn.currency)
        .bind(txn.realized_pnl)
        .bind(txn.executed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CommitOutcome::Committed)
    }

    async fn transactions_for_position(
        &self,
        position_id: Uuid,
    ) -> anyhow::Result<Vec<Transaction>> {
        let txns = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE position_id = $1 ORDER BY executed_at",
        )
        .bind(position_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txns)
    }

    async fn upsert_position_metrics(&self, metrics: &PositionMetrics) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portfolio_position_metrics
                (position_id, portfolio_id, symbol, current_price, market_value,
                 unrealized_pnl, unrealized_pnl_pct, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (position_id) DO UPDATE
                SET current_price = $4, market_value = $5, unrealized_pnl = $6,
                    unrealized_pnl_pct = $7, updated_at = $8
            "#,
        )
        .bind(metrics.position_id)
        .bind(metrics.portfolio_id)
        .bind(&metrics.symbol)
        .bind(metrics.current_price)
        .bind(metrics.market_value)
        .bind(metrics.unrealized_pnl)
        .bind(metrics.unrealized_pnl_pct)
        .bind(metrics.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn metrics_for_portfolio(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Vec<PositionMetrics>> {
        let metrics = sqlx::query_as::<_, PositionMetrics>(
            "SELECT * FROM portfolio_position_metrics WHERE portfolio_id = $1",
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(metrics)
    }

    async fn latest_equity_point(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Option<EquityCurvePoint>> {
        let point = sqlx::query_as::<_, EquityCurvePoint>(
            r#"
            SELECT * FROM portfolio_equity_curve
            WHERE portfolio_id = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(portfolio_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(point)
    }

    async fn append_equity_point(&self, point: &EquityCurvePoint) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO portfolio_equity_curve
                (id, portfolio_id, timestamp, total_value, cash_balance,
                 positions_value, unrealized_pnl, realized_pnl)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(point.id)
        .bind(point.portfolio_id)
        .bind(point.timestamp)
        .bind(point.total_value)
        .bind(point.cash_balance)
        .bind(point.positions_value)
        .bind(point.unrealized_pnl)
        .bind(point.realized_pnl)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn equity_curve(
        &self,
        portfolio_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<EquityCurvePoint>> {
        let points = sqlx::query_as::<_, EquityCurvePoint>(
            r#"
            SELECT * FROM portfolio_equity_curve
            WHERE portfolio_id = $1
            ORDER BY timestamp
            LIMIT $2
            "#,
        )
        .bind(portfolio_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }
}

/// [`PriceFeed`] over the live_prices table the external scraper maintains.
#[derive(Clone)]
pub struct PgPriceFeed {
    pool: PgPool,
}

impl PgPriceFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceFeed for PgPriceFeed {
    async fn lookup(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        let row: Option<(Decimal, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT price, currency, scraped_at FROM live_prices WHERE symbol = $1",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(price, currency, as_of)| Quote {
            price,
            currency,
            as_of,
        }))
    }
}
