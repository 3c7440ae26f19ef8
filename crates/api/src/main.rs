use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockinsight_core::backend::{Backend, HttpBackend};
use stockinsight_core::dashboard::Dashboard;
use stockinsight_core::domain::{AddStockReceipt, BackendHealth};
use stockinsight_core::fetch::{FetchError, FetchState, Settled};
use stockinsight_core::ledger::{LedgerSummary, PriceRefresh};
use stockinsight_core::notify::{Notification, NotificationLog, Notifier};

const NOTIFICATION_HISTORY: usize = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockinsight_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_settings(&settings)?);
    tracing::info!(
        base_url = %settings.backend_base_url,
        backend = backend.backend_name(),
        "analysis backend configured"
    );
    match backend.health().await {
        Ok(health) => tracing::info!(status = %health.status, "backend reachable"),
        Err(e) => {
            tracing::warn!(error = %e.user_message(), "backend unreachable; panels will show errors until it is up")
        }
    }

    let state = AppState::new(&settings, backend);
    let collector = collect_notifications(state.dashboard.notifier(), state.notifications.clone());
    state.dashboard.mount().await;

    let app = router(state.clone());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.dashboard.unmount().await;
    collector.abort();
    if let Err(e) = served {
        let err = anyhow::Error::new(e);
        sentry_anyhow::capture_anyhow(&err);
        return Err(err);
    }

    Ok(())
}

#[derive(Clone)]
struct AppState {
    dashboard: Arc<Dashboard>,
    backend: Arc<dyn Backend>,
    notifications: Arc<Mutex<NotificationLog>>,
}

impl AppState {
    fn new(settings: &stockinsight_core::config::Settings, backend: Arc<dyn Backend>) -> Self {
        let dashboard = Dashboard::new(settings, backend.clone(), Notifier::default());
        Self {
            dashboard: Arc::new(dashboard),
            backend,
            notifications: Arc::new(Mutex::new(NotificationLog::new(NOTIFICATION_HISTORY))),
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/backend-health", get(backend_health))
        .route("/api/dashboard", get(dashboard_text))
        .route("/api/panels/news", get(news_state))
        .route("/api/panels/news/refresh", post(news_refresh))
        .route("/api/panels/news-analysis", post(news_analysis))
        .route("/api/panels/price-analysis", post(price_analysis))
        .route("/api/panels/sentiment/:symbol", get(sentiment))
        .route("/api/panels/technical-analysis", post(technical_analysis))
        .route("/api/panels/global-indices", get(global_indices))
        .route("/api/portfolio", get(portfolio))
        .route("/api/portfolio/holdings", post(add_holding))
        .route("/api/portfolio/holdings/:ticker", delete(remove_holding))
        .route("/api/portfolio/refresh", post(refresh_portfolio))
        .route("/api/portfolio/reset", post(reset_portfolio))
        .route("/api/notifications", get(notifications))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn collect_notifications(notifier: &Notifier, log: Arc<Mutex<NotificationLog>>) -> JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    tracing::info!(
                        panel = %notification.panel,
                        level = ?notification.level,
                        title = %notification.title,
                        message = %notification.message,
                        "notification"
                    );
                    log.lock().await.push(notification);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification history fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Only rejected input is an HTTP error. Backend failures live in the panel
/// state, which is returned with 200.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn rejected<T>(settled: &Settled<T>) -> Result<(), ApiError> {
    match settled {
        Settled::Failed(FetchError::Validation(message)) => Err(ApiError::bad_request(message)),
        _ => Ok(()),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn backend_health(
    State(state): State<AppState>,
) -> Result<Json<BackendHealth>, ApiError> {
    state.backend.health().await.map(Json).map_err(|e| {
        tracing::warn!(kind = e.kind(), error = %e, "backend health check failed");
        ApiError {
            status: StatusCode::BAD_GATEWAY,
            message: e.user_message(),
        }
    })
}

async fn dashboard_text(State(state): State<AppState>) -> String {
    state.dashboard.render(Utc::now()).await
}

async fn news_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.news().state().await)
}

async fn news_refresh(State(state): State<AppState>) -> impl IntoResponse {
    let news = state.dashboard.news();
    news.refresh().await;
    Json(news.state().await)
}

#[derive(Debug, Deserialize)]
struct CompanyRequest {
    #[serde(default)]
    company_name: String,
}

#[derive(Debug, Deserialize)]
struct SymbolRequest {
    #[serde(default)]
    stock_symbol: String,
}

#[derive(Debug, Deserialize)]
struct TechnicalRequest {
    #[serde(default)]
    stock_symbol: String,
    risk_reward_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HoldingRequest {
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    quantity: i64,
}

async fn news_analysis(
    State(state): State<AppState>,
    Json(req): Json<CompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = state.dashboard.news_analysis();
    rejected(&panel.analyze(&req.company_name).await)?;
    Ok(Json(panel.state().await))
}

async fn price_analysis(
    State(state): State<AppState>,
    Json(req): Json<SymbolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = state.dashboard.price();
    rejected(&panel.analyze(&req.stock_symbol).await)?;
    Ok(Json(panel.state().await))
}

async fn sentiment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = state.dashboard.sentiment();
    rejected(&panel.analyze(&symbol).await)?;
    Ok(Json(panel.state().await))
}

async fn technical_analysis(
    State(state): State<AppState>,
    Json(req): Json<TechnicalRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let panel = state.dashboard.technical();
    rejected(&panel.analyze(&req.stock_symbol, req.risk_reward_ratio).await)?;
    Ok(Json(panel.state().await))
}

async fn global_indices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dashboard.indices().state().await)
}

#[derive(Debug, Serialize)]
struct PortfolioView {
    summary: LedgerSummary,
    trade: FetchState<AddStockReceipt>,
    quotes: FetchState<PriceRefresh>,
}

async fn portfolio_view(state: &AppState) -> PortfolioView {
    let portfolio = state.dashboard.portfolio().portfolio();
    PortfolioView {
        summary: portfolio.summary().await,
        trade: portfolio.trades_state().await,
        quotes: portfolio.quotes_state().await,
    }
}

async fn portfolio(State(state): State<AppState>) -> Json<PortfolioView> {
    Json(portfolio_view(&state).await)
}

async fn add_holding(
    State(state): State<AppState>,
    Json(req): Json<HoldingRequest>,
) -> Result<Json<PortfolioView>, ApiError> {
    let bought = state
        .dashboard
        .portfolio()
        .add_holding(&req.ticker, req.quantity)
        .await;
    if let Err(FetchError::Validation(message)) = bought {
        return Err(ApiError::bad_request(message));
    }
    Ok(Json(portfolio_view(&state).await))
}

async fn remove_holding(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<PortfolioView>, ApiError> {
    let removed = state.dashboard.portfolio().remove_holding(&ticker).await;
    if let Err(FetchError::Validation(message)) = removed {
        return Err(ApiError::not_found(message));
    }
    Ok(Json(portfolio_view(&state).await))
}

async fn refresh_portfolio(State(state): State<AppState>) -> Json<PortfolioView> {
    state.dashboard.portfolio().refresh_prices().await;
    Json(portfolio_view(&state).await)
}

async fn reset_portfolio(State(state): State<AppState>) -> Json<PortfolioView> {
    state.dashboard.portfolio().reset().await;
    Json(portfolio_view(&state).await)
}

async fn notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.notifications.lock().await.entries())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockinsight_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
