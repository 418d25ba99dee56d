use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{EquityCurvePoint, Portfolio, Position, PositionMetrics, Transaction};

use super::{CommitOutcome, PriceFeed, Quote, Store};

#[derive(Default)]
struct Inner {
    portfolios: HashMap<Uuid, Portfolio>,
    positions: HashMap<Uuid, Position>,
    transactions: Vec<Transaction>,
    metrics: HashMap<Uuid, PositionMetrics>,
    equity: Vec<EquityCurvePoint>,
    broken_metrics: HashSet<Uuid>,
}

/// In-memory [`Store`] used by the integration tests. Mirrors the Postgres
/// semantics, including the version guard on commits.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_portfolio(&self, portfolio: Portfolio) {
        self.inner
            .lock()
            .await
            .portfolios
            .insert(portfolio.id, portfolio);
    }

    pub async fn seed_position(&self, position: Position) {
        self.inner
            .lock()
            .await
            .positions
            .insert(position.id, position);
    }

    /// Make every metrics upsert for this position fail, to exercise the
    /// skip-and-continue path of batch recompute.
    pub async fn break_metrics_for(&self, position_id: Uuid) {
        self.inner.lock().await.broken_metrics.insert(position_id);
    }

    pub async fn equity_point_count(&self, portfolio_id: Uuid) -> usize {
        self.inner
            .lock()
            .await
            .equity
            .iter()
            .filter(|p| p.portfolio_id == portfolio_id)
            .count()
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_portfolio(&self, id: Uuid) -> anyhow::Result<Option<Portfolio>> {
        Ok(self.inner.lock().await.portfolios.get(&id).cloned())
    }

    async fn portfolios_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Portfolio>> {
        let inner = self.inner.lock().await;
        let mut portfolios: Vec<Portfolio> = inner
            .portfolios
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        portfolios.sort_by_key(|p| p.created_at);
        Ok(portfolios)
    }

    async fn all_portfolios(&self) -> anyhow::Result<Vec<Portfolio>> {
        let inner = self.inner.lock().await;
        let mut portfolios: Vec<Portfolio> = inner.portfolios.values().cloned().collect();
        portfolios.sort_by_key(|p| p.created_at);
        Ok(portfolios)
    }

    async fn get_position(&self, id: Uuid) -> anyhow::Result<Option<Position>> {
        Ok(self.inner.lock().await.positions.get(&id).cloned())
    }

    async fn position_by_symbol(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
    ) -> anyhow::Result<Option<Position>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .positions
            .values()
            .find(|p| p.portfolio_id == portfolio_id && p.symbol == symbol)
            .cloned())
    }

    async fn insert_position(&self, position: &Position) -> anyhow::Result<()> {
        self.inner
            .lock()
            .await
            .positions
            .insert(position.id, position.clone());
        Ok(())
    }

    async fn positions_for_portfolio(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Vec<Position>> {
        let inner = self.inner.lock().await;
        let mut positions: Vec<Position> = inner
            .positions
            .values()
            .filter(|p| p.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    async fn commit_fill(
        &self,
        txn: &Transaction,
        updated: &Position,
    ) -> anyhow::Result<CommitOutcome> {
        let mut inner = self.inner.lock().await;

        let current = inner
            .positions
            .get(&updated.id)
            .ok_or_else(|| anyhow::anyhow!("position {} vanished", updated.id))?;

        if current.version != updated.version - 1 {
            return Ok(CommitOutcome::Conflict);
        }

        inner.positions.insert(updated.id, updated.clone());
        inner.transactions.push(txn.clone());
        Ok(CommitOutcome::Committed)
    }

    async fn transactions_for_position(
        &self,
        position_id: Uuid,
    ) -> anyhow::Result<Vec<Transaction>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|t| t.position_id == position_id)
            .cloned()
            .collect())
    }

    async fn upsert_position_metrics(&self, metrics: &PositionMetrics) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.broken_metrics.contains(&metrics.position_id) {
            anyhow::bail!("metrics write rejected for {}", metrics.position_id);
        }
        inner.metrics.insert(metrics.position_id, metrics.clone());
        Ok(())
    }

    async fn metrics_for_portfolio(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Vec<PositionMetrics>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .metrics
            .values()
            .filter(|m| m.portfolio_id == portfolio_id)
            .cloned()
            .collect())
    }

    async fn latest_equity_point(
        &self,
        portfolio_id: Uuid,
    ) -> anyhow::Result<Option<EquityCurvePoint>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .equity
            .iter()
            .filter(|p| p.portfolio_id == portfolio_id)
            .max_by_key(|p| p.timestamp)
            .cloned())
    }

    async fn append_equity_point(&self, point: &EquityCurvePoint) -> anyhow::Result<()> {
        self.inner.lock().await.equity.push(point.clone());
        Ok(())
    }

    async fn equity_curve(
        &self,
        portfolio_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<EquityCurvePoint>> {
        let inner = self.inner.lock().await;
        let mut points: Vec<EquityCurvePoint> = inner
            .equity
            .iter()
            .filter(|p| p.portfolio_id == portfolio_id)
            .cloned()
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points.truncate(limit as usize);
        Ok(points)
    }
}

/// Fixed quote table for tests.
#[derive(Default)]
pub struct StaticPrices {
    quotes: HashMap<String, Quote>,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, quote: Quote) -> Self {
        self.quotes.insert(symbol.to_string(), quote);
        self
    }
}

#[async_trait]
impl PriceFeed for StaticPrices {
    async fn lookup(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        Ok(self.quotes.get(symbol).cloned())
    }
}
