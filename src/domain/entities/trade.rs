use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{gmv::Gmv, quantity::ShareQuantity, symbol::Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            _ => Err(ValidationError::InvalidSide),
        }
    }
}

/// One executed paper trade.
///
/// Records are immutable once appended to the ledger. The constructor
/// enforces the field-level contract (validated symbol, positive whole
/// quantity, positive GMV), so a `TradeRecord` in hand is always safe
/// to store or fold into a position.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub trade_id: String,
    pub symbol: Symbol,
    pub quantity: ShareQuantity,
    pub gmv: Gmv,
    pub side: TradeSide,
    pub portfolio_name: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(
        trade_id: String,
        symbol: Symbol,
        quantity: ShareQuantity,
        gmv: Gmv,
        side: TradeSide,
        portfolio_name: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if portfolio_name.trim().is_empty() {
            return Err(ValidationError::Required("Portfolio name"));
        }
        if user_id.trim().is_empty() {
            return Err(ValidationError::Required("User id"));
        }

        Ok(TradeRecord {
            trade_id,
            symbol,
            quantity,
            gmv,
            side,
            portfolio_name: portfolio_name.trim().to_string(),
            user_id: user_id.trim().to_string(),
            timestamp,
        })
    }

    /// Implied execution price per share.
    pub fn price_per_share(&self) -> f64 {
        self.gmv.per_share(self.quantity)
    }
}
