use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::CoreResult;
use crate::models::EquityCurvePoint;
use crate::store::{PriceFeed, Store};

use super::equity_curve;
use super::recalc::{PortfolioTotals, Recalculator};
use super::report::{self, PositionReport};

const DEFAULT_TOP_HOLDINGS: usize = 10;
const DEFAULT_CURVE_LIMIT: i64 = 100;

/// A symbol's merged footprint across all of a user's portfolios. The
/// contributing portfolio ids are kept so one dashboard row stays traceable
/// to its sources.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub quantity: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub current_price: Option<Decimal>,
    pub portfolio_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEquityPoint {
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub total_value: Decimal,
    pub total_cash: Decimal,
    pub top_holdings: Vec<Holding>,
    pub day_change: Decimal,
    pub day_change_percent: Decimal,
    pub equity_curve: Vec<UserEquityPoint>,
    pub message: Option<String>,
}

impl DashboardView {
    fn empty(message: &str) -> Self {
        Self {
            total_value: Decimal::ZERO,
            total_cash: Decimal::ZERO,
            top_holdings: Vec::new(),
            day_change: Decimal::ZERO,
            day_change_percent: Decimal::ZERO,
            equity_curve: Vec::new(),
            message: Some(message.into()),
        }
    }
}

/// Composes recompute, reporting, and the equity curve across every portfolio
/// a user owns. One broken portfolio contributes zero and is logged; it never
/// takes the whole dashboard down.
pub struct Aggregator {
    store: Arc<dyn Store>,
    recalc: Recalculator,
    top_limit: usize,
    curve_limit: i64,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>, prices: Arc<dyn PriceFeed>, clock: Arc<dyn Clock>) -> Self {
        let recalc = Recalculator::new(store.clone(), prices, clock);
        Self {
            store,
            recalc,
            top_limit: DEFAULT_TOP_HOLDINGS,
            curve_limit: DEFAULT_CURVE_LIMIT,
        }
    }

    pub fn with_limits(mut self, top_limit: usize, curve_limit: i64) -> Self {
        self.top_limit = top_limit;
        self.curve_limit = curve_limit;
        self
    }

    pub async fn get_user_dashboard(&self, user_id: &str) -> CoreResult<DashboardView> {
        if user_id.trim().is_empty() {
            return Ok(DashboardView::empty("No user id provided. Please log in."));
        }

        let portfolios = self.store.portfolios_for_user(user_id).await?;
        if portfolios.is_empty() {
            return Ok(DashboardView::empty(
                "You have no portfolios yet. Add your first portfolio to get started.",
            ));
        }

        // Portfolios are independent units of work; recompute them in parallel.
        let slices = join_all(
            portfolios
                .iter()
                .map(|p| self.portfolio_slice(p.id)),
        )
        .await;

        let mut total_value = Decimal::ZERO;
        let mut total_cash = Decimal::ZERO;
        let mut merged: HashMap<String, Holding> = HashMap::new();
        let mut curve_buckets: BTreeMap<DateTime<Utc>, Decimal> = BTreeMap::new();

        for slice in slices {
            total_value += slice.totals.total_value;
            total_cash += slice.totals.cash;

            for pos in slice.positions {
                let entry = merged.entry(pos.symbol.clone()).or_insert_with(|| Holding {
                    symbol: pos.symbol.clone(),
                    quantity: Decimal::ZERO,
                    market_value: Decimal::ZERO,
                    unrealized_pnl: Decimal::ZERO,
                    current_price: None,
                    portfolio_ids: Vec::new(),
                });
                entry.quantity += pos.quantity;
                entry.market_value += pos.market_value.unwrap_or(Decimal::ZERO);
                entry.unrealized_pnl += pos.unrealized_pnl.unwrap_or(Decimal::ZERO);
                if pos.current_price.is_some() {
                    entry.current_price = pos.current_price;
                }
                entry.portfolio_ids.push(slice.totals.portfolio_id);
            }

            for point in slice.curve {
                *curve_buckets.entry(point.timestamp).or_insert(Decimal::ZERO) +=
                    point.total_value;
            }
        }

        let mut holdings: Vec<Holding> = merged.into_values().collect();
        holdings.sort_by(|a, b| b.market_value.cmp(&a.market_value));

        // Day change sums unrealized PnL over every merged position, not just
        // the displayed top slice; truncation below is display policy only.
        let day_change: Decimal = holdings.iter().map(|h| h.unrealized_pnl).sum();
        let denominator = total_value - day_change;
        let day_change_percent = if total_value.is_zero() || denominator.is_zero() {
            Decimal::ZERO
        } else {
            day_change / denominator * Decimal::from(100)
        };

        holdings.truncate(self.top_limit);

        let equity_curve = curve_buckets
            .into_iter()
            .map(|(timestamp, value)| UserEquityPoint {
                timestamp,
                total_value: value,
            })
            .collect();

        let message = if holdings.is_empty() {
            Some("You have no holdings yet. Add your first asset to get started.".into())
        } else {
            None
        };

        Ok(DashboardView {
            total_value,
            total_cash,
            top_holdings: holdings,
            day_change,
            day_change_percent,
            equity_curve,
            message,
        })
    }

    /// One portfolio's contribution: fresh totals, per-position reports, and
    /// its equity curve. Any failure degrades to a zero contribution.
    async fn portfolio_slice(&self, portfolio_id: Uuid) -> PortfolioSlice {
        let totals = match self.recalc.recalc_portfolio_metrics(portfolio_id).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    portfolio_id = %portfolio_id,
                    "Failed to recalc portfolio metrics for dashboard"
                );
                PortfolioTotals::zero(portfolio_id)
            }
        };

        let positions = match report::portfolio_report(self.store.as_ref(), portfolio_id).await {
            Ok(r) => r.positions,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    portfolio_id = %portfolio_id,
                    "Failed to fetch portfolio report for dashboard"
                );
                Vec::new()
            }
        };

        let curve = match equity_curve::portfolio_equity_curve(
            self.store.as_ref(),
            portfolio_id,
            self.curve_limit,
        )
        .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    portfolio_id = %portfolio_id,
                    "Failed to fetch equity curve for dashboard"
                );
                Vec::new()
            }
        };

        PortfolioSlice {
            totals,
            positions,
            curve,
        }
    }
}

struct PortfolioSlice {
    totals: PortfolioTotals,
    positions: Vec<PositionReport>,
    curve: Vec<EquityCurvePoint>,
}
