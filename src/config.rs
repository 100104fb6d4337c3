use crate::application::services::trade_service::TradeLimits;
use crate::domain::services::validation::{DEFAULT_UI_SOFT_LIMIT, LEDGER_HARD_LIMIT};
use crate::infrastructure::alpaca::AlpacaConfig;
use crate::secrets::load_secret;
use tracing::warn;

/// Application settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Port the HTTP API binds to
    pub port: u16,
    /// SQLite URL for the trade ledger
    pub database_url: String,
    /// Global API rate limit (requests per minute)
    pub rate_limit_per_minute: u32,
    /// Soft per-trade quantity cap enforced at the form level
    pub ui_soft_limit: i64,
    /// Hard per-trade quantity cap enforced at the ledger level
    pub ledger_hard_limit: i64,
    /// Whether sells are rejected when ownership cannot be verified
    pub strict_sell_check: bool,
    /// Page-size ceiling for the trade listing endpoint
    pub max_list_limit: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: 8000,
            database_url: "sqlite://data/slackoms.db".to_string(),
            rate_limit_per_minute: 60,
            ui_soft_limit: DEFAULT_UI_SOFT_LIMIT,
            ledger_hard_limit: LEDGER_HARD_LIMIT,
            strict_sell_check: false,
            max_list_limit: 1000,
        }
    }
}

impl Settings {
    /// Load configuration from environment variables, falling back to
    /// defaults with a warning on unparseable values.
    pub fn from_env() -> Settings {
        let mut settings = Settings::default();

        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(value) => settings.port = value,
                Err(e) => warn!(
                    "Failed to parse PORT '{}': {}, using default: {}",
                    port, e, settings.port
                ),
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            settings.database_url = url;
        }

        if let Ok(rate) = std::env::var("RATE_LIMIT_PER_MINUTE") {
            match rate.parse::<u32>() {
                Ok(value) if value > 0 => settings.rate_limit_per_minute = value,
                Ok(value) => warn!(
                    "Invalid RATE_LIMIT_PER_MINUTE value: {} (must be positive), using default: {}",
                    value, settings.rate_limit_per_minute
                ),
                Err(e) => warn!(
                    "Failed to parse RATE_LIMIT_PER_MINUTE '{}': {}, using default: {}",
                    rate, e, settings.rate_limit_per_minute
                ),
            }
        }

        if let Ok(limit) = std::env::var("UI_SOFT_LIMIT") {
            match limit.parse::<i64>() {
                Ok(value) if value > 0 => settings.ui_soft_limit = value,
                _ => warn!(
                    "Invalid UI_SOFT_LIMIT '{}', using default: {}",
                    limit, settings.ui_soft_limit
                ),
            }
        }

        if let Ok(limit) = std::env::var("LEDGER_HARD_LIMIT") {
            match limit.parse::<i64>() {
                Ok(value) if value > 0 => settings.ledger_hard_limit = value,
                _ => warn!(
                    "Invalid LEDGER_HARD_LIMIT '{}', using default: {}",
                    limit, settings.ledger_hard_limit
                ),
            }
        }

        if let Ok(strict) = std::env::var("STRICT_SELL_CHECK") {
            match strict.parse::<bool>() {
                Ok(value) => settings.strict_sell_check = value,
                Err(_) => warn!(
                    "Invalid STRICT_SELL_CHECK '{}', using default: {}",
                    strict, settings.strict_sell_check
                ),
            }
        }

        settings
    }

    pub fn trade_limits(&self) -> TradeLimits {
        TradeLimits {
            ui_soft_limit: self.ui_soft_limit,
            ledger_hard_limit: self.ledger_hard_limit,
        }
    }
}

/// Brokerage sandbox credentials, optional: without them the service
/// runs ledger-only, with format-only symbol validation and no paper
/// order mirroring.
pub fn alpaca_from_env() -> Option<AlpacaConfig> {
    let api_key = load_secret("ALPACA_API_KEY").ok()?;
    let secret_key = load_secret("ALPACA_SECRET_KEY").ok()?;

    let mut config = AlpacaConfig::new(api_key, secret_key);
    if let Ok(url) = std::env::var("ALPACA_TRADING_URL") {
        config.trading_url = url;
    }
    if let Ok(url) = std::env::var("ALPACA_DATA_URL") {
        config.data_url = url;
    }
    Some(config)
}
