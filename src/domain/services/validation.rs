//! Trade input validation
//!
//! Validates everything a trade submission carries before any ledger
//! write is attempted: ticker format and existence, quantity bounds,
//! buying power, and sell-side share ownership. Expected bad input
//! never raises; each check returns a structured result the edge layer
//! can map back onto the offending form field.

use crate::domain::errors::ValidationError;
use crate::domain::repositories::market_data::AssetLookup;
use crate::domain::value_objects::{quantity::ShareQuantity, symbol::Symbol};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Soft per-trade quantity cap applied at the form level.
pub const DEFAULT_UI_SOFT_LIMIT: i64 = 10_000;

/// Hard per-trade quantity cap applied at the ledger level. Distinct
/// from the soft cap above: two policies, not one constant.
pub const LEDGER_HARD_LIMIT: i64 = 1_000_000;

/// Hard GMV cap per trade.
pub const GMV_HARD_LIMIT: f64 = 100_000_000.0;

/// Fat-finger guard bounds on the implied price per share.
pub const PRICE_PER_SHARE_MIN: f64 = 0.01;
pub const PRICE_PER_SHARE_MAX: f64 = 100_000.0;

/// Logical form field a validation failure belongs to. Maps onto the
/// block ids of the Slack trade modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Symbol,
    Quantity,
}

impl FormField {
    pub fn block_id(&self) -> &'static str {
        match self {
            FormField::Symbol => "trade_symbol_block",
            FormField::Quantity => "qty_shares_block",
        }
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.block_id())
    }
}

/// Outcome of ticker validation.
#[derive(Debug, Clone)]
pub struct TickerCheck {
    pub valid: bool,
    /// Normalized (trimmed, uppercased) symbol, even when invalid.
    pub symbol: String,
    pub error: Option<ValidationError>,
    /// Non-fatal note, e.g. when the asset lookup was unreachable.
    pub warning: Option<String>,
}

/// Outcome of quantity validation.
#[derive(Debug, Clone)]
pub struct QuantityCheck {
    pub valid: bool,
    pub quantity: Option<ShareQuantity>,
    pub error: Option<ValidationError>,
}

/// Outcome of a buying-power check.
#[derive(Debug, Clone)]
pub struct BuyingPowerCheck {
    pub valid: bool,
    pub required: f64,
    pub available: f64,
    pub error: Option<ValidationError>,
}

/// Outcome of a sell-side ownership check.
#[derive(Debug, Clone)]
pub struct SellCheck {
    pub valid: bool,
    pub owned_quantity: i64,
    pub error: Option<ValidationError>,
}

/// A held position as seen by the sell-side check.
#[derive(Debug, Clone)]
pub struct HeldPosition {
    pub symbol: String,
    pub quantity: i64,
}

/// Aggregated outcome of [`ValidationService::validate_trade_inputs`].
#[derive(Debug, Clone)]
pub struct TradeInputCheck {
    pub valid: bool,
    pub errors: HashMap<FormField, String>,
    pub symbol: Option<Symbol>,
    pub quantity: Option<ShareQuantity>,
    pub warning: Option<String>,
}

impl TradeInputCheck {
    /// The validated pair, present iff `valid`.
    pub fn into_validated(self) -> Option<(Symbol, ShareQuantity)> {
        match (self.valid, self.symbol, self.quantity) {
            (true, Some(symbol), Some(quantity)) => Some((symbol, quantity)),
            _ => None,
        }
    }
}

/// Service for validating trade inputs.
///
/// Collaborators are injected at construction. Without an asset lookup,
/// ticker validation is format-only. `strict_sell_check` controls the
/// policy when ownership data is unavailable: false (the default
/// wiring) passes the sell through, true rejects it as unverifiable.
pub struct ValidationService {
    asset_lookup: Option<Arc<dyn AssetLookup>>,
    strict_sell_check: bool,
}

impl ValidationService {
    pub fn new(asset_lookup: Option<Arc<dyn AssetLookup>>, strict_sell_check: bool) -> Self {
        Self {
            asset_lookup,
            strict_sell_check,
        }
    }

    /// Validate ticker symbol format and, when a lookup is wired in,
    /// existence and tradability.
    pub async fn validate_ticker_symbol(&self, raw: &str) -> TickerCheck {
        let (outcome, warning) = self.check_ticker(raw).await;
        match outcome {
            Ok(symbol) => TickerCheck {
                valid: true,
                symbol: symbol.into_string(),
                error: None,
                warning,
            },
            Err(error) => TickerCheck {
                valid: false,
                symbol: Symbol::normalize(raw),
                error: Some(error),
                warning,
            },
        }
    }

    async fn check_ticker(&self, raw: &str) -> (Result<Symbol, ValidationError>, Option<String>) {
        let symbol = match Symbol::parse(raw) {
            Ok(symbol) => symbol,
            Err(error) => return (Err(error), None),
        };

        let lookup = match &self.asset_lookup {
            Some(lookup) => lookup,
            None => {
                debug!("Symbol validation (format only): {}", symbol);
                return (Ok(symbol), None);
            }
        };

        match lookup.get_asset(symbol.as_str()).await {
            Ok(Some(asset)) if asset.tradable => {
                debug!("Symbol validation passed: {}", symbol);
                (Ok(symbol), None)
            }
            Ok(Some(_)) => {
                let name = symbol.into_string();
                (Err(ValidationError::SymbolNotTradable(name)), None)
            }
            Ok(None) => {
                let name = symbol.into_string();
                (Err(ValidationError::SymbolNotFound(name)), None)
            }
            Err(e) if !e.is_unavailable() => {
                // A confirmed negative answer, just delivered on the
                // error channel.
                let name = symbol.into_string();
                (Err(ValidationError::SymbolNotFound(name)), None)
            }
            Err(e) => {
                // Lookup outage must not block the trade; accept the
                // format-valid symbol and attach a warning.
                warn!("Asset lookup failed for {}: {}", symbol, e);
                (
                    Ok(symbol),
                    Some("Could not verify symbol with market data".to_string()),
                )
            }
        }
    }

    /// Validate a raw quantity string against a per-trade cap.
    pub fn validate_quantity(&self, raw: &str, max_limit: i64) -> QuantityCheck {
        match ShareQuantity::parse(raw) {
            Ok(quantity) if quantity.value() > max_limit => QuantityCheck {
                valid: false,
                quantity: None,
                error: Some(ValidationError::ExceedsMaximum(max_limit)),
            },
            Ok(quantity) => QuantityCheck {
                valid: true,
                quantity: Some(quantity),
                error: None,
            },
            Err(error) => QuantityCheck {
                valid: false,
                quantity: None,
                error: Some(error),
            },
        }
    }

    /// Check that the account can cover `quantity * price`. No fee or
    /// margin modeling.
    pub fn validate_buying_power(
        &self,
        symbol: &str,
        quantity: i64,
        current_price: f64,
        available_cash: f64,
    ) -> BuyingPowerCheck {
        let required = quantity as f64 * current_price;

        if required > available_cash {
            BuyingPowerCheck {
                valid: false,
                required,
                available: available_cash,
                error: Some(ValidationError::InsufficientFunds {
                    required,
                    available: available_cash,
                }),
            }
        } else {
            debug!(
                "Buying power check passed for {}: ${:.2} <= ${:.2}",
                symbol, required, available_cash
            );
            BuyingPowerCheck {
                valid: true,
                required,
                available: available_cash,
                error: None,
            }
        }
    }

    /// Check that the seller owns enough shares of `symbol`.
    ///
    /// `positions: None` means ownership could not be fetched; the
    /// strictness flag decides whether that passes or fails.
    pub fn validate_sell_order(
        &self,
        symbol: &str,
        quantity: i64,
        positions: Option<&[HeldPosition]>,
    ) -> SellCheck {
        let positions = match positions {
            Some(positions) => positions,
            None if self.strict_sell_check => {
                return SellCheck {
                    valid: false,
                    owned_quantity: 0,
                    error: Some(ValidationError::OwnershipUnverified(symbol.to_string())),
                }
            }
            None => {
                warn!("No positions provided for sell validation - skipping check");
                return SellCheck {
                    valid: true,
                    owned_quantity: 0,
                    error: None,
                };
            }
        };

        let owned_quantity = positions
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol))
            .map(|p| p.quantity)
            .unwrap_or(0);

        if owned_quantity == 0 {
            return SellCheck {
                valid: false,
                owned_quantity: 0,
                error: Some(ValidationError::NoPosition(symbol.to_string())),
            };
        }

        if quantity > owned_quantity {
            return SellCheck {
                valid: false,
                owned_quantity,
                error: Some(ValidationError::InsufficientShares {
                    symbol: symbol.to_string(),
                    owned: owned_quantity,
                    requested: quantity,
                }),
            };
        }

        debug!(
            "Sell validation passed: selling {} of {} {} shares",
            quantity, owned_quantity, symbol
        );
        SellCheck {
            valid: true,
            owned_quantity,
            error: None,
        }
    }

    /// Run all form-level checks in one pass, aggregating every failure
    /// into a field-keyed map. Buying power runs only when both account
    /// cash and a current price are supplied and quantity passed.
    pub async fn validate_trade_inputs(
        &self,
        symbol: &str,
        quantity: &str,
        account_cash: Option<f64>,
        current_price: Option<f64>,
        max_quantity: i64,
    ) -> TradeInputCheck {
        let mut errors = HashMap::new();

        let (ticker_outcome, warning) = self.check_ticker(symbol).await;
        let validated_symbol = match ticker_outcome {
            Ok(symbol) => Some(symbol),
            Err(error) => {
                errors.insert(FormField::Symbol, error.to_string());
                None
            }
        };

        let quantity_check = self.validate_quantity(quantity, max_quantity);
        if let Some(error) = &quantity_check.error {
            errors.insert(FormField::Quantity, error.to_string());
        }

        if let (Some(cash), Some(price), Some(qty)) =
            (account_cash, current_price, quantity_check.quantity)
        {
            let symbol_name = validated_symbol
                .as_ref()
                .map(|s| s.as_str())
                .unwrap_or(symbol);
            let buying_power = self.validate_buying_power(symbol_name, qty.value(), price, cash);
            if let Some(error) = buying_power.error {
                errors.insert(FormField::Quantity, error.to_string());
            }
        }

        let valid = errors.is_empty();
        if valid {
            debug!("All trade validations passed for {}", symbol);
        } else {
            warn!("Trade validation failed: {} field error(s)", errors.len());
        }

        TradeInputCheck {
            valid,
            errors,
            symbol: validated_symbol,
            quantity: quantity_check.quantity,
            warning,
        }
    }
}

/// Ledger-level business guard, run after form validation and before
/// any append: hard caps on quantity and GMV plus a reasonableness
/// bound on the implied price per share, catching fat-finger
/// symbol/quantity/GMV mismatches.
pub fn validate_trade_payload(
    quantity: i64,
    gmv: f64,
    hard_limit: i64,
) -> Result<(), ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::NotPositive);
    }
    if quantity > hard_limit {
        return Err(ValidationError::QuantityTooLarge(hard_limit));
    }
    if !gmv.is_finite() || gmv <= 0.0 {
        return Err(ValidationError::GmvNotPositive);
    }
    if gmv > GMV_HARD_LIMIT {
        return Err(ValidationError::GmvTooLarge);
    }

    let price_per_share = gmv / quantity as f64;
    if price_per_share < PRICE_PER_SHARE_MIN {
        return Err(ValidationError::PriceTooLow);
    }
    if price_per_share > PRICE_PER_SHARE_MAX {
        return Err(ValidationError::PriceTooHigh);
    }

    Ok(())
}
