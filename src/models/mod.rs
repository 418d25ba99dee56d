pub mod equity;
pub mod metrics;
pub mod portfolio;
pub mod position;
pub mod transaction;

pub use equity::EquityCurvePoint;
pub use metrics::PositionMetrics;
pub use portfolio::Portfolio;
pub use position::Position;
pub use transaction::Transaction;

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TxnType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnType {
    Buy,
    Sell,
}

impl TxnType {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(TxnType::Buy),
            "sell" => Some(TxnType::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Buy => "buy",
            TxnType::Sell => "sell",
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PositionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "closed" => PositionStatus::Closed,
            _ => PositionStatus::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
