//! Alpaca Paper Trading Client
//!
//! Thin REST adapter over the Alpaca sandbox API, implementing the
//! domain's `QuoteLookup`, `AssetLookup`, and `OrderGateway` seams.
//! Everything here is wiring: no accounting or validation logic lives
//! in this module.

use crate::domain::entities::trade::TradeSide;
use crate::domain::repositories::market_data::{
    AccountSnapshot, AssetInfo, AssetLookup, MarketDataError, OrderGateway, PaperOrder, QuoteLookup,
};
use async_trait::async_trait;
use lru::LruCache;
use reqwest::StatusCode;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

const ASSET_CACHE_CAPACITY: usize = 256;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the paper API.
#[derive(Debug)]
pub struct AlpacaConfig {
    pub api_key: Zeroizing<String>,
    pub secret_key: Zeroizing<String>,
    /// Trading host, e.g. "https://paper-api.alpaca.markets"
    pub trading_url: String,
    /// Market data host, e.g. "https://data.alpaca.markets"
    pub data_url: String,
}

impl AlpacaConfig {
    pub fn new(api_key: Zeroizing<String>, secret_key: Zeroizing<String>) -> Self {
        Self {
            api_key,
            secret_key,
            trading_url: "https://paper-api.alpaca.markets".to_string(),
            data_url: "https://data.alpaca.markets".to_string(),
        }
    }
}

// Wire shapes. Alpaca returns monetary fields as strings.

#[derive(Debug, Deserialize)]
struct AccountResponse {
    cash: String,
    buying_power: String,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    symbol: String,
    tradable: bool,
}

#[derive(Debug, Deserialize)]
struct LatestTradeResponse {
    trade: LatestTrade,
}

#[derive(Debug, Deserialize)]
struct LatestTrade {
    #[serde(rename = "p")]
    price: f64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

/// REST client for the Alpaca paper-trading sandbox.
pub struct AlpacaClient {
    http: reqwest::Client,
    config: AlpacaConfig,
    asset_cache: Arc<Mutex<LruCache<String, AssetInfo>>>,
}

impl AlpacaClient {
    pub fn new(config: AlpacaConfig) -> Result<Self, MarketDataError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MarketDataError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let capacity = NonZeroUsize::new(ASSET_CACHE_CAPACITY)
            .ok_or_else(|| MarketDataError::UnexpectedResponse("zero cache capacity".to_string()))?;

        Ok(Self {
            http,
            config,
            asset_cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("APCA-API-KEY-ID", self.config.api_key.as_str())
            .header("APCA-API-SECRET-KEY", self.config.secret_key.as_str())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, MarketDataError> {
        let response = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| MarketDataError::UnexpectedResponse(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                MarketDataError::Authentication("Alpaca rejected the API credentials".to_string()),
            ),
            status => Err(MarketDataError::UnexpectedResponse(format!(
                "{} from {}",
                status, url
            ))),
        }
    }

    fn parse_money(raw: &str, field: &str) -> Result<f64, MarketDataError> {
        raw.parse().map_err(|_| {
            MarketDataError::UnexpectedResponse(format!("unparseable {}: '{}'", field, raw))
        })
    }
}

#[async_trait]
impl QuoteLookup for AlpacaClient {
    async fn latest_price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let url = format!(
            "{}/v2/stocks/{}/trades/latest",
            self.config.data_url, symbol
        );
        let response: LatestTradeResponse = self.get_json(&url).await?;
        debug!("Latest price for {}: {}", symbol, response.trade.price);
        Ok(response.trade.price)
    }
}

#[async_trait]
impl AssetLookup for AlpacaClient {
    async fn get_asset(&self, symbol: &str) -> Result<Option<AssetInfo>, MarketDataError> {
        if let Ok(mut cache) = self.asset_cache.lock() {
            if let Some(asset) = cache.get(symbol) {
                return Ok(Some(asset.clone()));
            }
        }

        let url = format!("{}/v2/assets/{}", self.config.trading_url, symbol);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let asset: AssetResponse = response
                    .json()
                    .await
                    .map_err(|e| MarketDataError::UnexpectedResponse(e.to_string()))?;
                let info = AssetInfo {
                    symbol: asset.symbol,
                    tradable: asset.tradable,
                };
                if let Ok(mut cache) = self.asset_cache.lock() {
                    cache.put(symbol.to_string(), info.clone());
                }
                Ok(Some(info))
            }
            // A confirmed miss, not an outage. Not cached: the asset
            // universe can gain symbols.
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                MarketDataError::Authentication("Alpaca rejected the API credentials".to_string()),
            ),
            status => Err(MarketDataError::UnexpectedResponse(format!(
                "{} from {}",
                status, url
            ))),
        }
    }
}

#[async_trait]
impl OrderGateway for AlpacaClient {
    async fn submit_order(&self, order: &PaperOrder) -> Result<String, MarketDataError> {
        let side = match order.side {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        };
        let payload = serde_json::json!({
            "symbol": order.symbol,
            "qty": order.quantity.to_string(),
            "side": side,
            "type": "market",
            "time_in_force": "day",
        });

        let url = format!("{}/v2/orders", self.config.trading_url);
        let response = self
            .authed(self.http.post(&url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let order: OrderResponse = response
                .json()
                .await
                .map_err(|e| MarketDataError::UnexpectedResponse(e.to_string()))?;
            debug!("Submitted paper order: {}", order.id);
            Ok(order.id)
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!("Paper order rejected ({}): {}", status, body);
            Err(MarketDataError::OrderRejected(format!(
                "{}: {}",
                status, body
            )))
        }
    }

    async fn account(&self) -> Result<AccountSnapshot, MarketDataError> {
        let url = format!("{}/v2/account", self.config.trading_url);
        let response: AccountResponse = self.get_json(&url).await?;
        Ok(AccountSnapshot {
            cash: Self::parse_money(&response.cash, "cash")?,
            buying_power: Self::parse_money(&response.buying_power, "buying_power")?,
        })
    }
}
