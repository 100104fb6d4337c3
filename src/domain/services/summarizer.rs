//! Portfolio summaries
//!
//! Aggregates a portfolio's trade history into the report the Slack bot
//! renders: buy/sell counts plus the current position per symbol with
//! its average cost and trade history.

use crate::domain::entities::position::Position;
use crate::domain::entities::trade::{TradeRecord, TradeSide};
use crate::domain::services::accountant;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One trade as it appears in a position's history block.
#[derive(Debug, Clone, Serialize)]
pub struct TradeDigest {
    pub trade_id: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub gmv: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-symbol block of the summary.
#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub quantity: i64,
    pub avg_cost: f64,
    pub trades: Vec<TradeDigest>,
}

/// The reportable portfolio summary.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub portfolio_name: String,
    pub total_trades: usize,
    pub total_buys: usize,
    pub total_sells: usize,
    pub positions: BTreeMap<String, PositionSummary>,
}

impl PortfolioSummary {
    fn empty(portfolio_name: &str) -> Self {
        PortfolioSummary {
            portfolio_name: portfolio_name.to_string(),
            total_trades: 0,
            total_buys: 0,
            total_sells: 0,
            positions: BTreeMap::new(),
        }
    }
}

/// Round a dollar amount to cents for reporting.
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summarize a portfolio's trades.
///
/// Input order is not trusted: trades are folded in non-decreasing
/// timestamp order through the position accountant. A position whose
/// quantity ended at or below zero reports an average cost of 0.
pub fn summarize(portfolio_name: &str, trades: &[TradeRecord]) -> PortfolioSummary {
    if trades.is_empty() {
        return PortfolioSummary::empty(portfolio_name);
    }

    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    let mut book: HashMap<String, Position> = HashMap::new();
    let mut histories: BTreeMap<String, Vec<TradeDigest>> = BTreeMap::new();
    let mut total_buys = 0;
    let mut total_sells = 0;

    for trade in &ordered {
        accountant::apply_to_book(&mut book, trade);

        match trade.side {
            TradeSide::Buy => total_buys += 1,
            TradeSide::Sell => total_sells += 1,
        }

        histories
            .entry(trade.symbol.as_str().to_string())
            .or_default()
            .push(TradeDigest {
                trade_id: trade.trade_id.clone(),
                side: trade.side,
                quantity: trade.quantity.value(),
                gmv: trade.gmv.value(),
                timestamp: trade.timestamp,
            });
    }

    let positions = histories
        .into_iter()
        .map(|(symbol, history)| {
            let position = &book[&symbol];
            let avg_cost = if position.quantity > 0 {
                round_cents(position.average_cost)
            } else {
                0.0
            };
            (
                symbol,
                PositionSummary {
                    quantity: position.quantity,
                    avg_cost,
                    trades: history,
                },
            )
        })
        .collect();

    PortfolioSummary {
        portfolio_name: portfolio_name.to_string(),
        total_trades: ordered.len(),
        total_buys,
        total_sells,
        positions,
    }
}
