pub mod dashboard;
pub mod equity_curve;
pub mod ledger;
pub mod recalc;
pub mod report;

pub use dashboard::{Aggregator, DashboardView, Holding, UserEquityPoint};
pub use ledger::{Ledger, TransactionRequest};
pub use recalc::{PortfolioTotals, Recalculator};
pub use report::{PortfolioReport, PositionReport};
