use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot sell {requested} against position holding {held}")]
    InsufficientPosition { requested: Decimal, held: Decimal },

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Persistence(e.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
