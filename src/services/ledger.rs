use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::{CoreError, CoreResult};
use crate::models::{Position, PositionStatus, Transaction, TxnType};
use crate::store::{CommitOutcome, Store};

const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded retries for the optimistic version check. Conflicts only happen
/// when two callers hit the same position at once, so a handful is plenty.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// A transaction request as it arrives from the caller, type not yet parsed.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub position_id: Uuid,
    pub txn_type: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub currency: String,
}

/// The position ledger: applies buy/sell transactions to positions and keeps
/// the append-only journal consistent with the materialized position state.
pub struct Ledger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    apply_timeout: Duration,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, apply_timeout: Duration) -> Self {
        self.apply_timeout = apply_timeout;
        self
    }

    /// Create the position row for a symbol newly added to a portfolio.
    /// Idempotent per (portfolio, symbol); starts at quantity 0, open, with
    /// no journal entries.
    pub async fn open_position(
        &self,
        portfolio_id: Uuid,
        symbol: &str,
    ) -> CoreResult<Position> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(CoreError::InvalidArgument("symbol is required".into()));
        }

        self.store
            .get_portfolio(portfolio_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("portfolio {portfolio_id}")))?;

        if let Some(existing) = self.store.position_by_symbol(portfolio_id, &symbol).await? {
            return Ok(existing);
        }

        let position = Position::new(portfolio_id, symbol, self.clock.now());
        self.store.insert_position(&position).await?;

        tracing::info!(
            position_id = %position.id,
            portfolio_id = %portfolio_id,
            symbol = %position.symbol,
            "Position opened"
        );

        Ok(position)
    }

    /// Apply one buy/sell to a position: append the journal row and update
    /// quantity, cost basis, realized PnL, and lifecycle status as a single
    /// atomic unit. Concurrent applies against the same position serialize
    /// through the version guard; a bounded deadline keeps a stuck commit
    /// from holding the position hostage.
    pub async fn apply_transaction(
        &self,
        req: TransactionRequest,
    ) -> CoreResult<(Transaction, Position)> {
        let txn_type = TxnType::from_api_str(&req.txn_type).ok_or_else(|| {
            CoreError::InvalidArgument(format!("invalid transaction type: {}", req.txn_type))
        })?;

        if req.quantity <= Decimal::ZERO {
            return Err(CoreError::InvalidArgument("quantity must be > 0".into()));
        }
        if req.price < Decimal::ZERO {
            return Err(CoreError::InvalidArgument("price must be >= 0".into()));
        }
        if req.fee < Decimal::ZERO {
            return Err(CoreError::InvalidArgument("fee must be >= 0".into()));
        }

        match tokio::time::timeout(self.apply_timeout, self.apply_inner(&req, txn_type)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::Persistence(anyhow::anyhow!(
                "transaction apply for position {} exceeded {:?} deadline",
                req.position_id,
                self.apply_timeout
            ))),
        }
    }

    async fn apply_inner(
        &self,
        req: &TransactionRequest,
        txn_type: TxnType,
    ) -> CoreResult<(Transaction, Position)> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let position = self
                .store
                .get_position(req.position_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("position {}", req.position_id)))?;

            let now = self.clock.now();
            let (updated, realized_delta) = match txn_type {
                TxnType::Buy => (apply_buy(&position, req.quantity, req.price, now), Decimal::ZERO),
                TxnType::Sell => {
                    if req.quantity > position.quantity {
                        return Err(CoreError::InsufficientPosition {
                            requested: req.quantity,
                            held: position.quantity,
                        });
                    }
                    apply_sell(&position, req.quantity, req.price, req.fee, now)
                }
            };

            let txn = Transaction {
                id: Uuid::new_v4(),
                position_id: position.id,
                txn_type: txn_type.as_str().into(),
                quantity: req.quantity,
                price: req.price,
                fee: req.fee,
                currency: req.currency.clone(),
                realized_pnl: realized_delta,
                executed_at: now,
            };

            match self.store.commit_fill(&txn, &updated).await? {
                CommitOutcome::Committed => {
                    tracing::info!(
                        position_id = %position.id,
                        txn_type = %txn_type,
                        quantity = %req.quantity,
                        price = %req.price,
                        realized_pnl = %realized_delta,
                        "Transaction applied"
                    );
                    return Ok((txn, updated));
                }
                CommitOutcome::Conflict => {
                    tracing::debug!(
                        position_id = %position.id,
                        attempt,
                        "Concurrent update detected, retrying apply"
                    );
                }
            }
        }

        Err(CoreError::Persistence(anyhow::anyhow!(
            "gave up applying transaction to position {} after {} conflicting attempts",
            req.position_id,
            MAX_COMMIT_ATTEMPTS
        )))
    }
}

/// Buy: weighted-average cost basis, fees excluded. A buy into an empty
/// position (fresh or previously closed) resets the basis to the buy price
/// and reopens the position.
fn apply_buy(
    position: &Position,
    quantity: Decimal,
    price: Decimal,
    now: DateTime<Utc>,
) -> Position {
    let new_quantity = position.quantity + quantity;
    let new_avg = if position.quantity.is_zero() {
        price
    } else {
        (position.avg_buy_price * position.quantity + price * quantity) / new_quantity
    };

    let mut updated = position.clone();
    updated.quantity = new_quantity;
    updated.avg_buy_price = new_avg;
    updated.status = PositionStatus::Open.as_str().into();
    updated.opened_at = position.opened_at.or(Some(now));
    updated.closed_at = None;
    updated.last_updated = now;
    updated.version = position.version + 1;
    updated
}

/// Sell: the basis of the remaining shares is untouched; the realized delta
/// `(price - avg) * qty - fee` accumulates on the position. Liquidating to
/// exactly zero closes it.
fn apply_sell(
    position: &Position,
    quantity: Decimal,
    price: Decimal,
    fee: Decimal,
    now: DateTime<Utc>,
) -> (Position, Decimal) {
    let realized_delta = (price - position.avg_buy_price) * quantity - fee;
    let new_quantity = position.quantity - quantity;

    let mut updated = position.clone();
    updated.quantity = new_quantity;
    updated.realized_pnl = position.realized_pnl + realized_delta;
    updated.last_updated = now;
    updated.version = position.version + 1;
    if new_quantity.is_zero() {
        updated.status = PositionStatus::Closed.as_str().into();
        updated.closed_at = Some(now);
    } else {
        updated.status = PositionStatus::Open.as_str().into();
    }

    (updated, realized_delta)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position_with(quantity: Decimal, avg: Decimal) -> Position {
        let mut pos = Position::new(Uuid::new_v4(), "AAPL".into(), Utc::now());
        pos.quantity = quantity;
        pos.avg_buy_price = avg;
        if !quantity.is_zero() {
            pos.opened_at = Some(Utc::now());
        }
        pos
    }

    #[test]
    fn test_first_buy_sets_basis() {
        let pos = position_with(dec!(0), dec!(0));
        let updated = apply_buy(&pos, dec!(10), dec!(150), Utc::now());

        assert_eq!(updated.quantity, dec!(10));
        assert_eq!(updated.avg_buy_price, dec!(150));
        assert_eq!(updated.status(), PositionStatus::Open);
        assert!(updated.opened_at.is_some());
    }

    #[test]
    fn test_buy_weighted_average() {
        // 10 @ 150 then 5 @ 160 -> (10*150 + 5*160) / 15
        let pos = position_with(dec!(10), dec!(150));
        let updated = apply_buy(&pos, dec!(5), dec!(160), Utc::now());

        assert_eq!(updated.quantity, dec!(15));
        let expected = (dec!(150) * dec!(10) + dec!(160) * dec!(5)) / dec!(15);
        assert_eq!(updated.avg_buy_price, expected);
    }

    #[test]
    fn test_sell_leaves_basis_untouched() {
        let pos = position_with(dec!(15), dec!(153));
        let (updated, delta) = apply_sell(&pos, dec!(8), dec!(170), dec!(0), Utc::now());

        assert_eq!(updated.quantity, dec!(7));
        assert_eq!(updated.avg_buy_price, dec!(153));
        assert_eq!(delta, (dec!(170) - dec!(153)) * dec!(8));
        assert_eq!(updated.status(), PositionStatus::Open);
        assert!(updated.closed_at.is_none());
    }

    #[test]
    fn test_sell_fee_reduces_realized() {
        let pos = position_with(dec!(10), dec!(100));
        let (_, delta) = apply_sell(&pos, dec!(4), dec!(110), dec!(5), Utc::now());

        // (110 - 100) * 4 - 5
        assert_eq!(delta, dec!(35));
    }

    #[test]
    fn test_full_liquidation_closes() {
        let pos = position_with(dec!(5), dec!(100));
        let now = Utc::now();
        let (updated, delta) = apply_sell(&pos, dec!(5), dec!(120), dec!(0), now);

        assert_eq!(delta, dec!(100));
        assert_eq!(updated.quantity, dec!(0));
        assert_eq!(updated.status(), PositionStatus::Closed);
        assert_eq!(updated.closed_at, Some(now));
    }

    #[test]
    fn test_buy_after_close_resets_basis() {
        let mut pos = position_with(dec!(0), dec!(200));
        pos.status = PositionStatus::Closed.as_str().into();
        pos.closed_at = Some(Utc::now());

        let updated = apply_buy(&pos, dec!(3), dec!(50), Utc::now());

        assert_eq!(updated.avg_buy_price, dec!(50));
        assert_eq!(updated.status(), PositionStatus::Open);
        assert!(updated.closed_at.is_none());
    }

    #[test]
    fn test_realized_pnl_accumulates() {
        let pos = position_with(dec!(10), dec!(100));
        let (after_first, _) = apply_sell(&pos, dec!(2), dec!(110), dec!(0), Utc::now());
        let (after_second, _) = apply_sell(&after_first, dec!(3), dec!(90), dec!(0), Utc::now());

        // +20 then -30
        assert_eq!(after_second.realized_pnl, dec!(-10));
        assert_eq!(after_second.quantity, dec!(5));
    }
}
