use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub recalc_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,

            // A zero period would panic inside tokio's interval timer.
            recalc_interval_secs: env::var("RECALC_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .unwrap_or(300)
                .max(1),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_clamped() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("RECALC_INTERVAL_SECS", "0");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.recalc_interval_secs, 1);

        env::remove_var("RECALC_INTERVAL_SECS");
    }
}
