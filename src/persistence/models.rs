//! Database Models
//!
//! Persistent row shapes for the trade ledger and the position book,
//! plus conversions to and from the domain entities.

use crate::domain::entities::position::Position;
use crate::domain::entities::trade::{TradeRecord, TradeSide};
use crate::domain::value_objects::pnl::PnL;
use crate::domain::value_objects::{gmv::Gmv, quantity::ShareQuantity, symbol::Symbol};
use crate::persistence::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Trade row in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRow {
    pub id: i64,
    pub trade_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub gmv: f64,
    pub side: String, // "BUY" or "SELL"
    pub portfolio_name: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TradeRow {
    /// Rehydrate the domain record. The row passed the table's CHECK
    /// constraints at insert time, so a failure here means the stored
    /// data is corrupt, which is fatal rather than a validation issue.
    pub fn to_record(&self) -> Result<TradeRecord, LedgerError> {
        let corrupt = |e: crate::domain::errors::ValidationError| {
            LedgerError::Corrupt(self.trade_id.clone(), e.to_string())
        };

        let symbol = Symbol::parse(&self.symbol).map_err(corrupt)?;
        let quantity = ShareQuantity::new(self.quantity).map_err(corrupt)?;
        let gmv = Gmv::new(self.gmv).map_err(corrupt)?;
        let side = TradeSide::from_str(&self.side).map_err(corrupt)?;

        TradeRecord::new(
            self.trade_id.clone(),
            symbol,
            quantity,
            gmv,
            side,
            self.portfolio_name.clone(),
            self.user_id.clone(),
            self.timestamp,
        )
        .map_err(corrupt)
    }
}

/// Input for a ledger append
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub trade_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub gmv: f64,
    pub side: TradeSide,
    pub portfolio_name: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl NewTrade {
    pub fn from_record(record: &TradeRecord) -> Self {
        NewTrade {
            trade_id: record.trade_id.clone(),
            symbol: record.symbol.as_str().to_string(),
            quantity: record.quantity.value(),
            gmv: record.gmv.value(),
            side: record.side,
            portfolio_name: record.portfolio_name.clone(),
            user_id: record.user_id.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Position row in the position book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionRow {
    pub id: i64,
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PositionRow {
    /// Rebuild the in-memory state machine from the stored row.
    pub fn to_entity(&self) -> Position {
        Position {
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            average_cost: self.average_cost,
            current_price: self.current_price,
            realized_pnl: PnL::from_value(self.realized_pnl),
            unrealized_pnl: PnL::from_value(self.unrealized_pnl),
        }
    }
}

/// Filter for ledger listing queries
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub portfolio: Option<String>,
    pub symbol: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> TradeRow {
        TradeRow {
            id: 1,
            trade_id: "T1697234567123000001".to_string(),
            symbol: "AAPL".to_string(),
            quantity: 100,
            gmv: 15000.0,
            side: "BUY".to_string(),
            portfolio_name: "Tech Portfolio".to_string(),
            user_id: "U12345ABC".to_string(),
            timestamp: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_round_trips_to_record() {
        let row = row();
        let record = row.to_record().unwrap();
        assert_eq!(record.trade_id, row.trade_id);
        assert_eq!(record.symbol.as_str(), "AAPL");
        assert_eq!(record.quantity.value(), 100);
        assert_eq!(record.side, TradeSide::Buy);

        let back = NewTrade::from_record(&record);
        assert_eq!(back.symbol, row.symbol);
        assert_eq!(back.gmv, row.gmv);
    }

    #[test]
    fn test_corrupt_row_is_fatal() {
        let mut bad = row();
        bad.side = "HOLD".to_string();
        assert!(matches!(bad.to_record(), Err(LedgerError::Corrupt(_, _))));
    }

    #[test]
    fn test_position_row_to_entity() {
        let row = PositionRow {
            id: 1,
            user_id: "U1".to_string(),
            symbol: "AAPL".to_string(),
            quantity: 150,
            average_cost: 160.0,
            current_price: 180.0,
            unrealized_pnl: 3000.0,
            realized_pnl: 1000.0,
            last_updated: Utc::now(),
            created_at: Utc::now(),
        };

        let position = row.to_entity();
        assert_eq!(position.quantity, 150);
        assert_eq!(position.average_cost, 160.0);
        assert_eq!(position.realized_pnl.value(), 1000.0);
    }
}
