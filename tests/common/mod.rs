use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use finsight_core::models::{Portfolio, Position, PositionStatus};
use finsight_core::store::{MemStore, Quote};

/// The fixed recompute tick all deterministic tests pin to.
#[allow(dead_code)]
pub fn tick() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Seed a portfolio for testing.
#[allow(dead_code)]
pub async fn seed_portfolio(store: &MemStore, user_id: &str, cash: Decimal) -> Portfolio {
    let portfolio = Portfolio {
        id: Uuid::new_v4(),
        user_id: user_id.into(),
        name: format!("{user_id}'s portfolio"),
        cash_balance: cash,
        created_at: Some(tick()),
    };
    store.seed_portfolio(portfolio.clone()).await;
    portfolio
}

/// Seed an open position holding `quantity` at `avg_buy_price`.
#[allow(dead_code)]
pub async fn seed_position(
    store: &MemStore,
    portfolio_id: Uuid,
    symbol: &str,
    quantity: Decimal,
    avg_buy_price: Decimal,
    realized_pnl: Decimal,
) -> Position {
    let mut position = Position::new(portfolio_id, symbol.into(), tick());
    position.quantity = quantity;
    position.avg_buy_price = avg_buy_price;
    position.realized_pnl = realized_pnl;
    if !quantity.is_zero() {
        position.status = PositionStatus::Open.as_str().into();
        position.opened_at = Some(tick());
    }
    store.seed_position(position.clone()).await;
    position
}

#[allow(dead_code)]
pub fn quote(price: Decimal) -> Quote {
    Quote {
        price,
        currency: "USD".into(),
        as_of: tick(),
    }
}
