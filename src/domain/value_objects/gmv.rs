use crate::domain::errors::ValidationError;
use crate::domain::value_objects::quantity::ShareQuantity;

/// Gross Monetary Value of a trade: total dollar value, quantity times
/// price per share.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Gmv(f64);

impl Gmv {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value <= 0.0 {
            return Err(ValidationError::GmvNotPositive);
        }
        Ok(Gmv(value))
    }

    /// Build a GMV from a quantity and a per-share price.
    pub fn from_price(quantity: ShareQuantity, price_per_share: f64) -> Result<Self, ValidationError> {
        Gmv::new(quantity.value() as f64 * price_per_share)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Implied price per share for the given quantity.
    pub fn per_share(&self, quantity: ShareQuantity) -> f64 {
        self.0 / quantity.value() as f64
    }
}

impl std::fmt::Display for Gmv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
