use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slackoms::application::services::trade_service::{
    TradeFailure, TradeService, TradeSubmission,
};
use slackoms::auth;
use slackoms::config::{alpaca_from_env, Settings};
use slackoms::domain::entities::trade::TradeSide;
use slackoms::domain::repositories::market_data::{AssetLookup, OrderGateway, QuoteLookup};
use slackoms::domain::services::summarizer;
use slackoms::domain::services::validation::ValidationService;
use slackoms::infrastructure::alpaca::AlpacaClient;
use slackoms::persistence::models::TradeFilter;
use slackoms::persistence::repository::{PositionBook, TradeLedger};
use slackoms::persistence::{init_database, LedgerError};
use slackoms::rate_limit::{throttle, ApiRateLimiter};

#[derive(Clone)]
struct AppState {
    trade_service: Arc<TradeService>,
    ledger: Arc<TradeLedger>,
    positions: Arc<PositionBook>,
    brokerage_configured: bool,
    max_list_limit: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slackoms=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("SlackOMS paper-trading server starting...");

    let settings = Settings::from_env();
    auth::init_api_keys();

    let pool = init_database(&settings.database_url).await?;
    let ledger = Arc::new(TradeLedger::new(pool.clone()));
    let positions = Arc::new(PositionBook::new(pool));

    // Brokerage sandbox is optional: without credentials the service
    // runs ledger-only with format-only symbol validation.
    let alpaca: Option<Arc<AlpacaClient>> = match alpaca_from_env() {
        Some(config) => match AlpacaClient::new(config) {
            Ok(client) => {
                info!("✓ Paper brokerage client configured");
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!("✗ Paper brokerage client unavailable: {}", e);
                None
            }
        },
        None => {
            warn!("ALPACA_API_KEY / ALPACA_SECRET_KEY not set, running ledger-only");
            None
        }
    };

    let validator = ValidationService::new(
        alpaca.clone().map(|c| c as Arc<dyn AssetLookup>),
        settings.strict_sell_check,
    );
    let trade_service = Arc::new(TradeService::new(
        ledger.clone(),
        positions.clone(),
        validator,
        alpaca.clone().map(|c| c as Arc<dyn QuoteLookup>),
        alpaca.clone().map(|c| c as Arc<dyn OrderGateway>),
        settings.trade_limits(),
    ));

    let state = AppState {
        trade_service,
        ledger,
        positions,
        brokerage_configured: alpaca.is_some(),
        max_list_limit: settings.max_list_limit,
    };

    let limiter = ApiRateLimiter::from_settings(&settings);
    info!(
        "✓ Rate limiting enabled: {} requests/minute",
        limiter.requests_per_minute()
    );

    let api = Router::new()
        .route("/trade", post(execute_trade))
        .route("/trades", get(list_trades))
        .route("/trades/:trade_id", get(get_trade))
        .route("/portfolio/:portfolio_name", get(get_portfolio))
        .route("/portfolios", get(list_portfolios))
        .route("/positions/:user_id", get(get_user_positions))
        .route_layer(middleware::from_fn(auth::require_auth))
        .route_layer(middleware::from_fn(
            move |request: axum::extract::Request, next: middleware::Next| {
                let limiter = limiter.clone();
                async move { throttle(limiter, request, next).await }
            },
        ));

    let app = Router::new()
        .route("/", get(|| async { "SlackOMS paper trading API is running!" }))
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(65_536))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    // Graceful shutdown on Ctrl+C or SIGTERM
    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");
    Ok(())
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database_ok = state.ledger.ping().await;

    Json(json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "service": "SlackOMS API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database_ok,
        "paper_trading": state.brokerage_configured,
        "timestamp": chrono::Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct TradeCreateRequest {
    symbol: String,
    /// Accepted as a JSON number or string; the quantity validator
    /// owns the parse either way.
    quantity: Value,
    gmv: f64,
    side: String,
    portfolio_name: String,
    user_id: String,
}

/// Execute a paper trade
///
/// Validates the submission, assigns a trade id, appends to the ledger,
/// and updates the derived position before responding.
async fn execute_trade(
    State(state): State<AppState>,
    Json(payload): Json<TradeCreateRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let side: TradeSide = payload.side.parse().map_err(|e: slackoms::domain::errors::ValidationError| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Validation Error", "detail": e.to_string()})),
        )
    })?;

    let quantity_raw = match payload.quantity {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    };

    let submission = TradeSubmission {
        symbol: payload.symbol,
        quantity_raw,
        gmv: payload.gmv,
        side,
        portfolio_name: payload.portfolio_name,
        user_id: payload.user_id,
    };

    match state.trade_service.execute_trade(submission).await {
        Ok(outcome) => {
            let record = outcome.record;
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "trade_id": record.trade_id,
                    "message": "Trade executed successfully",
                    "warning": outcome.warning,
                    "trade": {
                        "symbol": record.symbol.as_str(),
                        "quantity": record.quantity.value(),
                        "gmv": record.gmv.value(),
                        "side": record.side.as_str(),
                        "portfolio_name": record.portfolio_name,
                        "user_id": record.user_id,
                        "timestamp": record.timestamp,
                    },
                })),
            ))
        }
        Err(TradeFailure::Rejected(errors)) => {
            let fields: serde_json::Map<String, Value> = errors
                .iter()
                .map(|(field, message)| (field.block_id().to_string(), json!(message)))
                .collect();
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "error": "Validation Error",
                    "errors": fields,
                })),
            ))
        }
        Err(TradeFailure::Rule(e)) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Validation Error",
                "detail": e.to_string(),
            })),
        )),
        Err(TradeFailure::Storage(e)) => {
            error!("Error executing trade: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "Internal Server Error",
                    "detail": "Failed to execute trade",
                })),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListTradesParams {
    #[serde(default)]
    skip: i64,
    limit: Option<i64>,
    symbol: Option<String>,
    portfolio: Option<String>,
}

/// List trades, most recent first, with pagination and filtering
async fn list_trades(
    State(state): State<AppState>,
    Query(params): Query<ListTradesParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let filter = TradeFilter {
        portfolio: params.portfolio,
        symbol: params.symbol,
        skip: params.skip.max(0),
        limit: params.limit.unwrap_or(100).clamp(1, state.max_list_limit),
    };

    let trades = state
        .ledger
        .list(&filter)
        .await
        .map_err(internal_error("Failed to retrieve trades"))?;

    info!(
        "Retrieved {} trades (skip={}, limit={})",
        trades.len(),
        filter.skip,
        filter.limit
    );
    Ok(Json(json!(trades)))
}

/// Get details of a specific trade by trade ID
async fn get_trade(
    State(state): State<AppState>,
    Path(trade_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let trade = state
        .ledger
        .get(&trade_id)
        .await
        .map_err(internal_error("Failed to retrieve trade"))?;

    match trade {
        Some(trade) => Ok(Json(json!(trade))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": "Not Found",
                "detail": format!("Trade {} not found", trade_id),
            })),
        )),
    }
}

/// Get a portfolio summary with all positions
async fn get_portfolio(
    State(state): State<AppState>,
    Path(portfolio_name): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let trades = state
        .ledger
        .list_for_portfolio(&portfolio_name)
        .await
        .map_err(internal_error("Failed to retrieve portfolio"))?;

    let summary = summarizer::summarize(&portfolio_name, &trades);
    info!("Retrieved portfolio summary: {}", portfolio_name);
    Ok(Json(json!(summary)))
}

/// List all portfolio names
async fn list_portfolios(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let names = state
        .ledger
        .portfolio_names()
        .await
        .map_err(internal_error("Failed to retrieve portfolios"))?;

    info!("Retrieved {} portfolios", names.len());
    Ok(Json(json!(names)))
}

/// Get a user's open positions
async fn get_user_positions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let positions = state
        .positions
        .for_user(&user_id)
        .await
        .map_err(internal_error("Failed to retrieve positions"))?;

    Ok(Json(json!(positions)))
}

fn internal_error(detail: &'static str) -> impl Fn(LedgerError) -> (StatusCode, Json<Value>) {
    move |e: LedgerError| {
        error!("{}: {}", detail, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "Internal Server Error",
                "detail": detail,
            })),
        )
    }
}
