//! Position accounting
//!
//! Rebuilds per-symbol positions by folding an ordered trade history
//! into the [`Position`] state machine. The fold is pure: no I/O, no
//! shared state, and replaying the same ordered input always produces
//! the same book. The ledger stays the source of truth; everything here
//! is derived.

use crate::domain::entities::position::Position;
use crate::domain::entities::trade::TradeRecord;
use std::collections::HashMap;

/// Fold a single trade into a position book, creating the position on
/// first sight of its symbol. The trade's execution price doubles as
/// the latest mark for the symbol.
pub fn apply_to_book(book: &mut HashMap<String, Position>, trade: &TradeRecord) {
    let position = book
        .entry(trade.symbol.as_str().to_string())
        .or_insert_with(|| Position::new(trade.symbol.as_str()));

    let price = trade.price_per_share();
    position.apply(trade.side, trade.quantity.value(), price);
    position.refresh_market_price(price);
}

/// Rebuild the full position book from a trade history.
///
/// Input order does not matter: trades are folded in non-decreasing
/// timestamp order, with ties broken by input order (stable sort), so
/// ledger insertion order wins within a timestamp.
pub fn replay(trades: &[TradeRecord]) -> HashMap<String, Position> {
    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by_key(|t| t.timestamp);

    let mut book = HashMap::new();
    for trade in ordered {
        apply_to_book(&mut book, trade);
    }
    book
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::trade::TradeSide;
    use crate::domain::value_objects::{gmv::Gmv, quantity::ShareQuantity, symbol::Symbol};
    use chrono::{Duration, Utc};

    fn trade(seq: i64, symbol: &str, side: TradeSide, quantity: i64, price: f64) -> TradeRecord {
        let qty = ShareQuantity::new(quantity).unwrap();
        TradeRecord::new(
            format!("T{:03}", seq),
            Symbol::parse(symbol).unwrap(),
            qty,
            Gmv::from_price(qty, price).unwrap(),
            side,
            "Tech Portfolio".to_string(),
            "U1".to_string(),
            Utc::now() + Duration::milliseconds(seq),
        )
        .unwrap()
    }

    #[test]
    fn test_replay_empty() {
        let book = replay(&[]);
        assert!(book.is_empty());
    }

    #[test]
    fn test_replay_buy_buy_sell_scenario() {
        let trades = vec![
            trade(1, "AAPL", TradeSide::Buy, 100, 150.0),
            trade(2, "AAPL", TradeSide::Buy, 100, 170.0),
            trade(3, "AAPL", TradeSide::Sell, 50, 180.0),
        ];

        let book = replay(&trades);
        let position = &book["AAPL"];
        assert_eq!(position.quantity, 150);
        assert_eq!(position.average_cost, 160.0);
        assert_eq!(position.realized_pnl.value(), 1000.0);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let trades = vec![
            trade(1, "AAPL", TradeSide::Buy, 100, 150.0),
            trade(2, "MSFT", TradeSide::Buy, 50, 300.0),
            trade(3, "AAPL", TradeSide::Sell, 30, 160.0),
        ];

        assert_eq!(replay(&trades), replay(&trades));
    }

    #[test]
    fn test_replay_sorts_by_timestamp() {
        let buy = trade(1, "AAPL", TradeSide::Buy, 100, 150.0);
        let sell = trade(2, "AAPL", TradeSide::Sell, 100, 170.0);

        // Sell first in the input, but the buy has the earlier
        // timestamp and must fold first.
        let book = replay(&[sell, buy]);
        let position = &book["AAPL"];
        assert_eq!(position.quantity, 0);
        assert_eq!(position.realized_pnl.value(), 100.0 * (170.0 - 150.0));
    }

    #[test]
    fn test_incremental_fold_equals_one_pass() {
        let trades = vec![
            trade(1, "AAPL", TradeSide::Buy, 100, 150.0),
            trade(2, "AAPL", TradeSide::Buy, 100, 170.0),
            trade(3, "MSFT", TradeSide::Buy, 10, 300.0),
            trade(4, "AAPL", TradeSide::Sell, 50, 180.0),
        ];

        let one_pass = replay(&trades);

        let mut incremental = replay(&trades[..2]);
        for t in &trades[2..] {
            apply_to_book(&mut incremental, t);
        }

        assert_eq!(one_pass, incremental);
    }

    #[test]
    fn test_buys_only_average_is_total_spent_over_total_quantity() {
        let trades = vec![
            trade(1, "AAPL", TradeSide::Buy, 10, 100.0),
            trade(2, "AAPL", TradeSide::Buy, 30, 120.0),
            trade(3, "AAPL", TradeSide::Buy, 60, 90.0),
        ];

        let book = replay(&trades);
        let position = &book["AAPL"];
        let total_spent = 10.0 * 100.0 + 30.0 * 120.0 + 60.0 * 90.0;
        let total_quantity = 100.0;
        assert!((position.average_cost - total_spent / total_quantity).abs() < 1e-9);
    }

    #[test]
    fn test_symbols_are_independent() {
        let trades = vec![
            trade(1, "AAPL", TradeSide::Buy, 100, 150.0),
            trade(2, "MSFT", TradeSide::Buy, 50, 300.0),
        ];

        let book = replay(&trades);
        assert_eq!(book.len(), 2);
        assert_eq!(book["AAPL"].quantity, 100);
        assert_eq!(book["MSFT"].quantity, 50);
    }
}
