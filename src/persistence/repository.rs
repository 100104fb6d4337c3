//! Database Repositories
//!
//! Data access for the append-only trade ledger and the derived
//! position book.

use super::models::*;
use super::{DbPool, LedgerError};
use crate::domain::entities::trade::TradeRecord;
use chrono::Utc;
use tracing::{debug, error};

/// The append-only trade ledger.
///
/// Rows are inserted once and never mutated; everything else in the
/// system derives from this table.
pub struct TradeLedger {
    pool: DbPool,
}

impl TradeLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append one trade. A unique-index collision on `trade_id` maps to
    /// [`LedgerError::DuplicateId`] so the caller can regenerate the id
    /// and retry.
    pub async fn append(&self, trade: NewTrade) -> Result<TradeRow, LedgerError> {
        let record = sqlx::query_as::<_, TradeRow>(
            r#"
            INSERT INTO trades (
                trade_id, symbol, quantity, gmv, side,
                portfolio_name, user_id, timestamp
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(&trade.trade_id)
        .bind(&trade.symbol)
        .bind(trade.quantity)
        .bind(trade.gmv)
        .bind(trade.side.as_str())
        .bind(&trade.portfolio_name)
        .bind(&trade.user_id)
        .bind(trade.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                debug!("Trade id collision: {}", trade.trade_id);
                LedgerError::DuplicateId(trade.trade_id.clone())
            } else {
                error!("Failed to append trade: {}", e);
                LedgerError::Query(format!("Failed to append trade: {}", e))
            }
        })?;

        debug!(
            "Appended trade: {} - {} {} {}",
            record.trade_id, record.side, record.quantity, record.symbol
        );
        Ok(record)
    }

    /// Get a trade by its application id
    pub async fn get(&self, trade_id: &str) -> Result<Option<TradeRow>, LedgerError> {
        let record = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades WHERE trade_id = ?1")
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get trade {}: {}", trade_id, e);
                LedgerError::Query(format!("Failed to get trade: {}", e))
            })?;

        Ok(record)
    }

    /// List trades, most recent first, with optional symbol/portfolio
    /// filters and pagination.
    pub async fn list(&self, filter: &TradeFilter) -> Result<Vec<TradeRow>, LedgerError> {
        let mut sql = String::from("SELECT * FROM trades");
        let mut conditions: Vec<&str> = Vec::new();
        if filter.symbol.is_some() {
            conditions.push("symbol = ?");
        }
        if filter.portfolio.is_some() {
            conditions.push("portfolio_name = ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, TradeRow>(&sql);
        if let Some(symbol) = &filter.symbol {
            query = query.bind(symbol.trim().to_uppercase());
        }
        if let Some(portfolio) = &filter.portfolio {
            query = query.bind(portfolio.clone());
        }
        query = query.bind(filter.limit).bind(filter.skip);

        let records = query.fetch_all(&self.pool).await.map_err(|e| {
            error!("Failed to list trades: {}", e);
            LedgerError::Query(format!("Failed to list trades: {}", e))
        })?;

        Ok(records)
    }

    /// Full trade history for a portfolio in replay order: ascending
    /// timestamp, ledger insertion order within a timestamp.
    pub async fn list_for_portfolio(
        &self,
        portfolio_name: &str,
    ) -> Result<Vec<TradeRecord>, LedgerError> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE portfolio_name = ?1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(portfolio_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load portfolio {}: {}", portfolio_name, e);
            LedgerError::Query(format!("Failed to load portfolio trades: {}", e))
        })?;

        rows.iter().map(|row| row.to_record()).collect()
    }

    /// Distinct portfolio names across the ledger
    pub async fn portfolio_names(&self) -> Result<Vec<String>, LedgerError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT portfolio_name FROM trades ORDER BY portfolio_name")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!("Failed to list portfolios: {}", e);
                    LedgerError::Query(format!("Failed to list portfolios: {}", e))
                })?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Connectivity probe for the health endpoint
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

/// The derived position book, updated incrementally as trades append.
///
/// This is a cache over the ledger: every row must equal what a full
/// replay of that user's trades would produce.
pub struct PositionBook {
    pool: DbPool,
}

impl PositionBook {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fold one appended trade into the stored position for
    /// (user, symbol), creating the row on first trade.
    pub async fn apply_trade(
        &self,
        user_id: &str,
        trade: &TradeRecord,
    ) -> Result<PositionRow, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE user_id = ?1 AND symbol = ?2",
        )
        .bind(user_id)
        .bind(trade.symbol.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to load position: {}", e);
            LedgerError::Query(format!("Failed to load position: {}", e))
        })?;

        let mut position = existing
            .as_ref()
            .map(PositionRow::to_entity)
            .unwrap_or_else(|| crate::domain::entities::position::Position::new(trade.symbol.as_str()));

        let price = trade.price_per_share();
        position.apply(trade.side, trade.quantity.value(), price);
        position.refresh_market_price(price);

        let now = Utc::now();
        let row = if let Some(existing) = existing {
            sqlx::query_as::<_, PositionRow>(
                r#"
                UPDATE positions
                SET quantity = ?1, average_cost = ?2, current_price = ?3,
                    unrealized_pnl = ?4, realized_pnl = ?5, last_updated = ?6
                WHERE id = ?7
                RETURNING *
                "#,
            )
            .bind(position.quantity)
            .bind(position.average_cost)
            .bind(position.current_price)
            .bind(position.unrealized_pnl.value())
            .bind(position.realized_pnl.value())
            .bind(now)
            .bind(existing.id)
            .fetch_one(&mut *tx)
            .await
        } else {
            sqlx::query_as::<_, PositionRow>(
                r#"
                INSERT INTO positions (
                    user_id, symbol, quantity, average_cost, current_price,
                    unrealized_pnl, realized_pnl, last_updated, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(trade.symbol.as_str())
            .bind(position.quantity)
            .bind(position.average_cost)
            .bind(position.current_price)
            .bind(position.unrealized_pnl.value())
            .bind(position.realized_pnl.value())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
        }
        .map_err(|e| {
            error!("Failed to upsert position: {}", e);
            LedgerError::Query(format!("Failed to upsert position: {}", e))
        })?;

        tx.commit().await?;

        debug!(
            "Updated position {}/{}: qty {}, avg cost {:.4}",
            user_id, row.symbol, row.quantity, row.average_cost
        );
        Ok(row)
    }

    /// Open (non-zero) positions for a user
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<PositionRow>, LedgerError> {
        let records = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE user_id = ?1 AND quantity != 0 ORDER BY symbol",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get positions for {}: {}", user_id, e);
            LedgerError::Query(format!("Failed to get positions: {}", e))
        })?;

        Ok(records)
    }

    /// One position by key, including flat ones
    pub async fn get(
        &self,
        user_id: &str,
        symbol: &str,
    ) -> Result<Option<PositionRow>, LedgerError> {
        let record = sqlx::query_as::<_, PositionRow>(
            "SELECT * FROM positions WHERE user_id = ?1 AND symbol = ?2",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get position {}/{}: {}", user_id, symbol, e);
            LedgerError::Query(format!("Failed to get position: {}", e))
        })?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::trade::TradeSide;
    use crate::persistence::init_database;

    fn new_trade(trade_id: &str, symbol: &str, side: TradeSide, quantity: i64, gmv: f64) -> NewTrade {
        NewTrade {
            trade_id: trade_id.to_string(),
            symbol: symbol.to_string(),
            quantity,
            gmv,
            side,
            portfolio_name: "Tech Portfolio".to_string(),
            user_id: "U1".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let ledger = TradeLedger::new(pool);

        let row = ledger
            .append(new_trade("T1", "AAPL", TradeSide::Buy, 100, 15000.0))
            .await
            .unwrap();
        assert_eq!(row.trade_id, "T1");
        assert_eq!(row.side, "BUY");

        let fetched = ledger.get("T1").await.unwrap().unwrap();
        assert_eq!(fetched.symbol, "AAPL");
        assert!(ledger.get("T999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_duplicate_id() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let ledger = TradeLedger::new(pool);

        ledger
            .append(new_trade("T1", "AAPL", TradeSide::Buy, 100, 15000.0))
            .await
            .unwrap();

        let result = ledger
            .append(new_trade("T1", "MSFT", TradeSide::Buy, 10, 3000.0))
            .await;
        assert!(matches!(result, Err(LedgerError::DuplicateId(id)) if id == "T1"));

        // Retry with a fresh id succeeds.
        ledger
            .append(new_trade("T2", "MSFT", TradeSide::Buy, 10, 3000.0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let ledger = TradeLedger::new(pool);

        for i in 0..5 {
            let symbol = if i % 2 == 0 { "AAPL" } else { "MSFT" };
            ledger
                .append(new_trade(&format!("T{}", i), symbol, TradeSide::Buy, 10, 1500.0))
                .await
                .unwrap();
        }

        let all = ledger
            .list(&TradeFilter {
                skip: 0,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
        // Most recent first.
        assert_eq!(all[0].trade_id, "T4");

        let aapl = ledger
            .list(&TradeFilter {
                symbol: Some("aapl".to_string()),
                skip: 0,
                limit: 100,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(aapl.len(), 3);
        assert!(aapl.iter().all(|t| t.symbol == "AAPL"));

        let page = ledger
            .list(&TradeFilter {
                skip: 2,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].trade_id, "T2");
    }

    #[tokio::test]
    async fn test_portfolio_replay_order_and_names() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let ledger = TradeLedger::new(pool);

        ledger
            .append(new_trade("T1", "AAPL", TradeSide::Buy, 100, 15000.0))
            .await
            .unwrap();
        ledger
            .append(new_trade("T2", "AAPL", TradeSide::Sell, 50, 9000.0))
            .await
            .unwrap();

        let history = ledger.list_for_portfolio("Tech Portfolio").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].trade_id, "T1");
        assert_eq!(history[1].trade_id, "T2");

        let names = ledger.portfolio_names().await.unwrap();
        assert_eq!(names, vec!["Tech Portfolio".to_string()]);
    }

    #[tokio::test]
    async fn test_position_book_incremental_updates() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let ledger = TradeLedger::new(pool.clone());
        let book = PositionBook::new(pool);

        let buy1 = ledger
            .append(new_trade("T1", "AAPL", TradeSide::Buy, 100, 15000.0))
            .await
            .unwrap()
            .to_record()
            .unwrap();
        let row = book.apply_trade("U1", &buy1).await.unwrap();
        assert_eq!(row.quantity, 100);
        assert_eq!(row.average_cost, 150.0);

        let buy2 = ledger
            .append(new_trade("T2", "AAPL", TradeSide::Buy, 100, 17000.0))
            .await
            .unwrap()
            .to_record()
            .unwrap();
        let row = book.apply_trade("U1", &buy2).await.unwrap();
        assert_eq!(row.quantity, 200);
        assert_eq!(row.average_cost, 160.0);

        let sell = ledger
            .append(new_trade("T3", "AAPL", TradeSide::Sell, 50, 9000.0))
            .await
            .unwrap()
            .to_record()
            .unwrap();
        let row = book.apply_trade("U1", &sell).await.unwrap();
        assert_eq!(row.quantity, 150);
        assert_eq!(row.average_cost, 160.0);
        assert_eq!(row.realized_pnl, 1000.0);

        let open = book.for_user("U1").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_flat_positions_hidden_from_open_list() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let ledger = TradeLedger::new(pool.clone());
        let book = PositionBook::new(pool);

        let buy = ledger
            .append(new_trade("T1", "AAPL", TradeSide::Buy, 10, 1500.0))
            .await
            .unwrap()
            .to_record()
            .unwrap();
        book.apply_trade("U1", &buy).await.unwrap();

        let sell = ledger
            .append(new_trade("T2", "AAPL", TradeSide::Sell, 10, 1600.0))
            .await
            .unwrap()
            .to_record()
            .unwrap();
        book.apply_trade("U1", &sell).await.unwrap();

        assert!(book.for_user("U1").await.unwrap().is_empty());
        // The row itself still exists with its realized PnL.
        let flat = book.get("U1", "AAPL").await.unwrap().unwrap();
        assert_eq!(flat.quantity, 0);
        assert_eq!(flat.realized_pnl, 100.0);
    }
}
