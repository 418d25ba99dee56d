pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::{CoreError, CoreResult};
