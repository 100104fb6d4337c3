//! Trade execution service
//!
//! Orchestrates one trade submission end to end: form-level validation,
//! the ledger-level business guard, sell-side ownership checks, trade
//! id generation with duplicate retry, the ledger append, the
//! incremental position update, and the background mirror to the paper
//! brokerage. Validation always completes before the append is
//! attempted; a failed validation never writes.

use crate::domain::entities::trade::{TradeRecord, TradeSide};
use crate::domain::errors::ValidationError;
use crate::domain::repositories::market_data::{OrderGateway, PaperOrder, QuoteLookup};
use crate::domain::services::trade_id::TradeIdGenerator;
use crate::domain::services::validation::{
    validate_trade_payload, FormField, HeldPosition, ValidationService, DEFAULT_UI_SOFT_LIMIT,
    LEDGER_HARD_LIMIT,
};
use crate::domain::value_objects::{gmv::Gmv, quantity::ShareQuantity, symbol::Symbol};
use crate::persistence::models::NewTrade;
use crate::persistence::repository::{PositionBook, TradeLedger};
use crate::persistence::LedgerError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// The two quantity ceilings, kept as distinct named policies: the soft
/// cap the trade form enforces and the hard cap the ledger enforces.
#[derive(Debug, Clone, Copy)]
pub struct TradeLimits {
    pub ui_soft_limit: i64,
    pub ledger_hard_limit: i64,
}

impl Default for TradeLimits {
    fn default() -> Self {
        Self {
            ui_soft_limit: DEFAULT_UI_SOFT_LIMIT,
            ledger_hard_limit: LEDGER_HARD_LIMIT,
        }
    }
}

/// A raw trade submission as it arrives from the edge layer.
///
/// `quantity_raw` is kept as text: the Slack modal delivers strings,
/// and the quantity validator owns the parse.
#[derive(Debug, Clone)]
pub struct TradeSubmission {
    pub symbol: String,
    pub quantity_raw: String,
    pub gmv: f64,
    pub side: TradeSide,
    pub portfolio_name: String,
    pub user_id: String,
}

/// Why a submission did not become a ledger row.
#[derive(Debug, Error)]
pub enum TradeFailure {
    /// Field-level validation failures, keyed by form field.
    #[error("trade validation failed")]
    Rejected(HashMap<FormField, String>),

    /// A business-rule violation outside the form fields.
    #[error("{0}")]
    Rule(ValidationError),

    /// The ledger itself failed.
    #[error("{0}")]
    Storage(#[from] LedgerError),
}

/// A successfully executed trade.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub record: TradeRecord,
    /// Non-fatal validation note, e.g. symbol accepted unverified.
    pub warning: Option<String>,
}

/// Coordinates validation, the ledger, the position book, and the
/// brokerage collaborators for trade execution.
pub struct TradeService {
    ledger: Arc<TradeLedger>,
    positions: Arc<PositionBook>,
    validator: ValidationService,
    ids: TradeIdGenerator,
    quotes: Option<Arc<dyn QuoteLookup>>,
    gateway: Option<Arc<dyn OrderGateway>>,
    limits: TradeLimits,
}

impl TradeService {
    pub fn new(
        ledger: Arc<TradeLedger>,
        positions: Arc<PositionBook>,
        validator: ValidationService,
        quotes: Option<Arc<dyn QuoteLookup>>,
        gateway: Option<Arc<dyn OrderGateway>>,
        limits: TradeLimits,
    ) -> Self {
        Self {
            ledger,
            positions,
            validator,
            ids: TradeIdGenerator::new(),
            quotes,
            gateway,
            limits,
        }
    }

    /// Execute one trade submission.
    pub async fn execute_trade(
        &self,
        submission: TradeSubmission,
    ) -> Result<TradeOutcome, TradeFailure> {
        // Buying-power context is best effort: an unreachable brokerage
        // downgrades the check rather than blocking the trade.
        let (account_cash, current_price) = if submission.side == TradeSide::Buy {
            (
                self.account_cash().await,
                self.latest_price(&submission.symbol).await,
            )
        } else {
            (None, None)
        };

        let check = self
            .validator
            .validate_trade_inputs(
                &submission.symbol,
                &submission.quantity_raw,
                account_cash,
                current_price,
                self.limits.ui_soft_limit,
            )
            .await;
        let warning = check.warning.clone();
        let errors = check.errors.clone();
        let (symbol, quantity) = match check.into_validated() {
            Some(validated) => validated,
            None => return Err(TradeFailure::Rejected(errors)),
        };

        validate_trade_payload(quantity.value(), submission.gmv, self.limits.ledger_hard_limit)
            .map_err(TradeFailure::Rule)?;
        let gmv = Gmv::new(submission.gmv).map_err(TradeFailure::Rule)?;

        if submission.side == TradeSide::Sell {
            self.check_sell_ownership(&submission.user_id, &symbol, quantity)
                .await?;
        }

        let record = self
            .append_with_retry(symbol, quantity, gmv, &submission)
            .await?;

        // The ledger row is committed; the book is a derived cache that
        // a replay can rebuild, so a failure here must not fail the
        // trade.
        if let Err(e) = self.positions.apply_trade(&record.user_id, &record).await {
            error!("Position update failed for {}: {}", record.trade_id, e);
        }

        self.mirror_to_brokerage(&record);

        info!(
            "Trade executed successfully: {} - {} {} {}",
            record.trade_id, record.side, record.quantity, record.symbol
        );
        Ok(TradeOutcome { record, warning })
    }

    async fn check_sell_ownership(
        &self,
        user_id: &str,
        symbol: &Symbol,
        quantity: ShareQuantity,
    ) -> Result<(), TradeFailure> {
        let held = match self.positions.for_user(user_id).await {
            Ok(rows) => Some(
                rows.into_iter()
                    .map(|row| HeldPosition {
                        symbol: row.symbol,
                        quantity: row.quantity,
                    })
                    .collect::<Vec<_>>(),
            ),
            Err(e) => {
                warn!("Could not load positions for sell validation: {}", e);
                None
            }
        };

        let sell =
            self.validator
                .validate_sell_order(symbol.as_str(), quantity.value(), held.as_deref());
        match sell.error {
            None => Ok(()),
            Some(error) => {
                let mut errors = HashMap::new();
                errors.insert(FormField::Quantity, error.to_string());
                Err(TradeFailure::Rejected(errors))
            }
        }
    }

    async fn append_with_retry(
        &self,
        symbol: Symbol,
        quantity: ShareQuantity,
        gmv: Gmv,
        submission: &TradeSubmission,
    ) -> Result<TradeRecord, TradeFailure> {
        let mut record = TradeRecord::new(
            self.ids.next_id(),
            symbol,
            quantity,
            gmv,
            submission.side,
            submission.portfolio_name.clone(),
            submission.user_id.clone(),
            Utc::now(),
        )
        .map_err(TradeFailure::Rule)?;

        match self.ledger.append(NewTrade::from_record(&record)).await {
            Ok(_) => Ok(record),
            Err(LedgerError::DuplicateId(id)) => {
                // Recoverable exactly once: mint a fresh id and retry.
                warn!("Trade id {} collided, regenerating", id);
                record.trade_id = self.ids.next_id();
                self.ledger.append(NewTrade::from_record(&record)).await?;
                Ok(record)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn mirror_to_brokerage(&self, record: &TradeRecord) {
        let Some(gateway) = self.gateway.clone() else {
            return;
        };

        let order = PaperOrder {
            symbol: record.symbol.as_str().to_string(),
            quantity: record.quantity.value(),
            side: record.side,
        };
        let trade_id = record.trade_id.clone();

        tokio::spawn(async move {
            match gateway.submit_order(&order).await {
                Ok(order_id) => {
                    info!("✓ Mirrored {} to paper brokerage as {}", trade_id, order_id)
                }
                Err(e) => warn!("✗ Paper brokerage mirror failed for {}: {}", trade_id, e),
            }
        });
    }

    async fn account_cash(&self) -> Option<f64> {
        let gateway = self.gateway.as_ref()?;
        match gateway.account().await {
            Ok(snapshot) => Some(snapshot.cash),
            Err(e) => {
                warn!("Account lookup unavailable, skipping buying-power check: {}", e);
                None
            }
        }
    }

    async fn latest_price(&self, symbol: &str) -> Option<f64> {
        let quotes = self.quotes.as_ref()?;
        match quotes.latest_price(&Symbol::normalize(symbol)).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!("Quote lookup unavailable for {}: {}", symbol, e);
                None
            }
        }
    }
}
