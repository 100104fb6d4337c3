use thiserror::Error;

/// Validation failures for trade submissions.
///
/// These are expected-bad-input outcomes, returned as data rather than
/// raised through the error channel. The `Display` text is what ends up
/// in front of the Slack user, so messages name the offending value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Invalid ticker format '{0}'. Use 1-5 letters only (e.g., AAPL, TSLA)")]
    InvalidFormat(String),

    #[error("Quantity must be a whole number, not '{0}'")]
    NotInteger(String),

    #[error("Quantity must be greater than 0")]
    NotPositive,

    #[error("Maximum quantity per trade is {0} shares")]
    ExceedsMaximum(i64),

    #[error("Symbol '{0}' not found. Please verify the ticker symbol.")]
    SymbolNotFound(String),

    #[error("Symbol '{0}' is not currently tradeable.")]
    SymbolNotTradable(String),

    #[error("Insufficient buying power. You need ${required:.2} but only have ${available:.2} available")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("You don't own any shares of {0}. Cannot sell.")]
    NoPosition(String),

    #[error("Insufficient shares. You only have {owned} shares of {symbol}, cannot sell {requested}")]
    InsufficientShares {
        symbol: String,
        owned: i64,
        requested: i64,
    },

    #[error("Unable to verify share ownership for {0}")]
    OwnershipUnverified(String),

    #[error("Quantity exceeds maximum ({0} shares)")]
    QuantityTooLarge(i64),

    #[error("GMV must be positive")]
    GmvNotPositive,

    #[error("GMV exceeds maximum ($100,000,000)")]
    GmvTooLarge,

    #[error("Price per share too low (< $0.01)")]
    PriceTooLow,

    #[error("Price per share too high (> $100,000)")]
    PriceTooHigh,

    #[error("Side must be BUY or SELL")]
    InvalidSide,

    #[error("Value must be finite")]
    MustBeFinite,
}

impl From<ValidationError> for String {
    fn from(error: ValidationError) -> Self {
        error.to_string()
    }
}
