//! Market Data and Order Gateway Traits
//!
//! Common interfaces for the brokerage collaborators the trade flow
//! depends on: quote lookups, asset lookups, and paper order
//! submission. Keeping these behind traits decouples validation and
//! accounting from any concrete brokerage client and makes the trade
//! flow easy to exercise with mocks.

use crate::domain::entities::trade::TradeSide;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from market data / brokerage operations.
///
/// `SymbolNotFound` is a confirmed answer from the brokerage; every
/// other variant means the service could not be asked, which callers
/// treat as "unknown" rather than a validation failure.
#[derive(Debug, Error, Clone)]
pub enum MarketDataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Order submission failed: {0}")]
    OrderRejected(String),
}

impl MarketDataError {
    /// True when the error means the service was unreachable or broken,
    /// as opposed to a confirmed negative answer.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, MarketDataError::SymbolNotFound(_))
    }
}

/// Asset metadata as reported by the brokerage.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInfo {
    pub symbol: String,
    pub tradable: bool,
}

/// Account cash snapshot used for buying-power checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub cash: f64,
    pub buying_power: f64,
}

/// A market order to mirror into the paper brokerage.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperOrder {
    pub symbol: String,
    pub quantity: i64,
    pub side: TradeSide,
}

/// Latest-price source for buying-power and reasonableness checks.
#[async_trait]
pub trait QuoteLookup: Send + Sync {
    /// Most recent trade price for the symbol.
    async fn latest_price(&self, symbol: &str) -> Result<f64, MarketDataError>;
}

/// Asset existence / tradability source.
#[async_trait]
pub trait AssetLookup: Send + Sync {
    /// `Ok(None)` is a confirmed "no such asset"; transport problems
    /// surface as `Err` so the validator can degrade gracefully.
    async fn get_asset(&self, symbol: &str) -> Result<Option<AssetInfo>, MarketDataError>;
}

/// Paper order submission and account state.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a market order, returning the brokerage order id.
    async fn submit_order(&self, order: &PaperOrder) -> Result<String, MarketDataError>;

    /// Current account cash / buying power.
    async fn account(&self) -> Result<AccountSnapshot, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_a_confirmed_answer() {
        assert!(!MarketDataError::SymbolNotFound("XXXX".to_string()).is_unavailable());
    }

    #[test]
    fn test_transport_errors_are_unavailable() {
        assert!(MarketDataError::Network("timeout".to_string()).is_unavailable());
        assert!(MarketDataError::Authentication("bad key".to_string()).is_unavailable());
        assert!(MarketDataError::UnexpectedResponse("html".to_string()).is_unavailable());
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::Network("connection refused".to_string());
        assert_eq!(error.to_string(), "Network error: connection refused");
    }
}
