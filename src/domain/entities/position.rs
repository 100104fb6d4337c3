use crate::domain::entities::trade::TradeSide;
use crate::domain::value_objects::pnl::PnL;

/// A derived per-symbol holding with weighted-average cost basis.
///
/// Positions are never authoritative: the state here must always be
/// reproducible by replaying the full ordered trade history for its key
/// from the flat state. Buys move the average cost; sells realize PnL
/// against it and leave the cost basis of the remaining shares alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: f64,
    pub current_price: f64,
    pub realized_pnl: PnL,
    pub unrealized_pnl: PnL,
}

impl Position {
    /// A flat (empty) position for a symbol.
    pub fn new(symbol: &str) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity: 0,
            average_cost: 0.0,
            current_price: 0.0,
            realized_pnl: PnL::zero(),
            unrealized_pnl: PnL::zero(),
        }
    }

    /// Fold one trade into the position.
    pub fn apply(&mut self, side: TradeSide, quantity: i64, price: f64) {
        match side {
            TradeSide::Buy => self.apply_buy(quantity, price),
            TradeSide::Sell => self.apply_sell(quantity, price),
        }
    }

    /// Buy: fold the new lot into the weighted-average cost.
    ///
    /// If the resulting quantity is not positive the average cost is
    /// left at its prior value; a zero-quantity position has no
    /// meaningful cost basis.
    pub fn apply_buy(&mut self, quantity: i64, price: f64) {
        let total_cost = self.quantity as f64 * self.average_cost + quantity as f64 * price;
        self.quantity += quantity;
        if self.quantity > 0 {
            self.average_cost = total_cost / self.quantity as f64;
        }
    }

    /// Sell: realize PnL against the average cost. The cost basis of
    /// the remaining shares does not change.
    pub fn apply_sell(&mut self, quantity: i64, price: f64) {
        let realized = quantity as f64 * (price - self.average_cost);
        self.realized_pnl = self.realized_pnl + PnL::from_value(realized);
        self.quantity -= quantity;
    }

    /// Refresh the mark price and recompute unrealized PnL.
    pub fn refresh_market_price(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_pnl = if self.quantity > 0 {
            PnL::from_value(self.quantity as f64 * (price - self.average_cost))
        } else {
            PnL::zero()
        };
    }

    /// Current market value of the held shares.
    pub fn market_value(&self) -> f64 {
        self.quantity as f64 * self.current_price
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}
