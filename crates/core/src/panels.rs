use crate::backend::Backend;
use crate::domain::{
    GlobalIndices, NewsAnalysis, NewsItem, PriceSnapshot, SentimentReport, TechnicalAnalysis,
};
use crate::fetch::{FetchError, FetchState, Panel, Settled};
use crate::ledger::{Holding, LedgerSummary, Portfolio, PriceRefresh};
use crate::notify::Notifier;
use crate::refresh::RefreshHandle;
use crate::render::{self, View};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_RISK_REWARD_RATIO: f64 = 2.5;
pub const RISK_REWARD_RANGE: RangeInclusive<f64> = 1.0..=5.0;

const ANALYSIS_FAILED: &str = "Analysis Failed";
const ANALYSIS_COMPLETE: &str = "Analysis Complete";

fn required_symbol(raw: &str) -> Result<String, FetchError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(FetchError::validation("Please enter a stock symbol"));
    }
    Ok(symbol)
}

#[derive(Clone)]
pub struct NewsFeedPanel {
    panel: Panel<Vec<NewsItem>>,
    backend: Arc<dyn Backend>,
    symbol: Option<String>,
}

impl NewsFeedPanel {
    pub const NAME: &'static str = "news";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier, symbol: Option<String>) -> Self {
        Self {
            panel: Panel::new(Self::NAME, notifier),
            backend,
            symbol: symbol.filter(|s| !s.trim().is_empty()),
        }
    }

    pub async fn refresh(&self) -> Settled<Vec<NewsItem>> {
        self.panel
            .execute(self.backend.news(self.symbol.as_deref()))
            .await
    }

    pub fn mount(&self, period: Duration) -> Option<RefreshHandle> {
        let this = self.clone();
        RefreshHandle::spawn(Self::NAME, period, move || {
            let this = this.clone();
            async move {
                this.refresh().await;
            }
        })
    }

    pub async fn state(&self) -> FetchState<Vec<NewsItem>> {
        self.panel.snapshot().await
    }

    pub async fn render(&self, now: DateTime<Utc>) -> View {
        render::news_feed(&self.state().await, now)
    }

    pub async fn teardown(&self) {
        self.panel.teardown().await;
    }
}

#[derive(Clone)]
pub struct NewsAnalysisPanel {
    panel: Panel<NewsAnalysis>,
    backend: Arc<dyn Backend>,
}

impl NewsAnalysisPanel {
    pub const NAME: &'static str = "news-analysis";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            panel: Panel::new(Self::NAME, notifier)
                .with_failure_title(ANALYSIS_FAILED)
                .with_success_title(ANALYSIS_COMPLETE),
            backend,
        }
    }

    pub async fn analyze(&self, company_name: &str) -> Settled<NewsAnalysis> {
        let company_name = company_name.trim();
        if company_name.is_empty() {
            return Settled::Failed(
                self.panel
                    .reject(FetchError::validation("Please enter a company name")),
            );
        }
        self.panel
            .execute_announced(
                format!("Successfully analyzed {company_name}"),
                self.backend.news_analysis(company_name),
            )
            .await
    }

    pub async fn state(&self) -> FetchState<NewsAnalysis> {
        self.panel.snapshot().await
    }

    pub async fn render(&self, now: DateTime<Utc>) -> View {
        render::news_analysis(&self.state().await, now)
    }

    pub async fn teardown(&self) {
        self.panel.teardown().await;
    }
}

#[derive(Clone)]
pub struct PriceAnalysisPanel {
    panel: Panel<PriceSnapshot>,
    backend: Arc<dyn Backend>,
}

impl PriceAnalysisPanel {
    pub const NAME: &'static str = "price-analysis";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            panel: Panel::new(Self::NAME, notifier)
                .with_failure_title(ANALYSIS_FAILED)
                .with_success_title(ANALYSIS_COMPLETE),
            backend,
        }
    }

    pub async fn analyze(&self, stock_symbol: &str) -> Settled<PriceSnapshot> {
        let symbol = match required_symbol(stock_symbol) {
            Ok(symbol) => symbol,
            Err(err) => return Settled::Failed(self.panel.reject(err)),
        };
        self.panel
            .execute_announced(
                format!("Successfully analyzed price for {symbol}"),
                self.backend.price_analysis(&symbol),
            )
            .await
    }

    pub async fn state(&self) -> FetchState<PriceSnapshot> {
        self.panel.snapshot().await
    }

    pub async fn render(&self) -> View {
        render::price_analysis(&self.state().await)
    }

    pub async fn teardown(&self) {
        self.panel.teardown().await;
    }
}

#[derive(Clone)]
pub struct SentimentPanel {
    panel: Panel<SentimentReport>,
    backend: Arc<dyn Backend>,
    symbol: Arc<Mutex<Option<String>>>,
}

impl SentimentPanel {
    pub const NAME: &'static str = "sentiment";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            panel: Panel::new(Self::NAME, notifier)
                .with_failure_title(ANALYSIS_FAILED)
                .with_success_title(ANALYSIS_COMPLETE),
            backend,
            symbol: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn analyze(&self, symbol: &str) -> Settled<SentimentReport> {
        let symbol = match required_symbol(symbol) {
            Ok(symbol) => symbol,
            Err(err) => return Settled::Failed(self.panel.reject(err)),
        };
        *self.symbol.lock().await = Some(symbol.clone());
        self.panel
            .execute_announced(
                format!("Successfully analyzed social sentiment for {symbol}"),
                self.backend.sentiment(&symbol),
            )
            .await
    }

    pub async fn refresh(&self) -> Option<Settled<SentimentReport>> {
        let symbol = self.symbol.lock().await.clone()?;
        Some(self.panel.execute(self.backend.sentiment(&symbol)).await)
    }

    pub async fn symbol(&self) -> Option<String> {
        self.symbol.lock().await.clone()
    }

    pub fn mount(&self, period: Duration) -> Option<RefreshHandle> {
        let this = self.clone();
        RefreshHandle::spawn(Self::NAME, period, move || {
            let this = this.clone();
            async move {
                this.refresh().await;
            }
        })
    }

    pub async fn state(&self) -> FetchState<SentimentReport> {
        self.panel.snapshot().await
    }

    pub async fn render(&self) -> View {
        render::sentiment(&self.state().await)
    }

    pub async fn teardown(&self) {
        self.panel.teardown().await;
    }
}

#[derive(Clone)]
pub struct TechnicalAnalysisPanel {
    panel: Panel<TechnicalAnalysis>,
    backend: Arc<dyn Backend>,
}

impl TechnicalAnalysisPanel {
    pub const NAME: &'static str = "technical-analysis";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            panel: Panel::new(Self::NAME, notifier)
                .with_failure_title(ANALYSIS_FAILED)
                .with_success_title(ANALYSIS_COMPLETE),
            backend,
        }
    }

    /// `risk_reward_ratio` defaults to 2.5 and must lie in `[1, 5]`.
    pub async fn analyze(
        &self,
        stock_symbol: &str,
        risk_reward_ratio: Option<f64>,
    ) -> Settled<TechnicalAnalysis> {
        let symbol = match required_symbol(stock_symbol) {
            Ok(symbol) => symbol,
            Err(err) => return Settled::Failed(self.panel.reject(err)),
        };
        let ratio = risk_reward_ratio.unwrap_or(DEFAULT_RISK_REWARD_RATIO);
        if !RISK_REWARD_RANGE.contains(&ratio) {
            return Settled::Failed(self.panel.reject(FetchError::validation(
                "Risk/reward ratio must be between 1 and 5",
            )));
        }
        self.panel
            .execute_announced(
                format!("Successfully analyzed {symbol}"),
                self.backend.technical_analysis(&symbol, ratio),
            )
            .await
    }

    pub async fn state(&self) -> FetchState<TechnicalAnalysis> {
        self.panel.snapshot().await
    }

    pub async fn render(&self) -> View {
        render::technical_analysis(&self.state().await)
    }

    pub async fn teardown(&self) {
        self.panel.teardown().await;
    }
}

#[derive(Clone)]
pub struct GlobalIndicesPanel {
    panel: Panel<GlobalIndices>,
    backend: Arc<dyn Backend>,
    region: String,
}

impl GlobalIndicesPanel {
    pub const NAME: &'static str = "global-indices";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier, region: impl Into<String>) -> Self {
        Self {
            panel: Panel::new(Self::NAME, notifier),
            backend,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub async fn refresh(&self) -> Settled<GlobalIndices> {
        self.panel
            .execute(self.backend.global_indices(&self.region))
            .await
    }

    pub fn mount(&self, period: Duration) -> Option<RefreshHandle> {
        let this = self.clone();
        RefreshHandle::spawn(Self::NAME, period, move || {
            let this = this.clone();
            async move {
                this.refresh().await;
            }
        })
    }

    pub async fn state(&self) -> FetchState<GlobalIndices> {
        self.panel.snapshot().await
    }

    pub async fn render(&self) -> View {
        render::global_indices(&self.state().await)
    }

    pub async fn teardown(&self) {
        self.panel.teardown().await;
    }
}

#[derive(Clone)]
pub struct PortfolioPanel {
    portfolio: Portfolio,
}

impl PortfolioPanel {
    pub const NAME: &'static str = "portfolio";

    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier, starting_balance: f64) -> Self {
        Self {
            portfolio: Portfolio::new(backend, starting_balance, notifier),
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub async fn add_holding(&self, ticker: &str, quantity: i64) -> Result<Option<Holding>, FetchError> {
        self.portfolio.add_holding(ticker, quantity).await
    }

    pub async fn remove_holding(&self, ticker: &str) -> Result<Option<Holding>, FetchError> {
        self.portfolio.remove_holding(ticker).await
    }

    pub async fn refresh_prices(&self) -> Settled<PriceRefresh> {
        self.portfolio.refresh_prices().await
    }

    pub async fn reset(&self) {
        self.portfolio.reset().await;
    }

    pub async fn summary(&self) -> LedgerSummary {
        self.portfolio.summary().await
    }

    pub fn mount(&self, period: Duration) -> Option<RefreshHandle> {
        let portfolio = self.portfolio.clone();
        RefreshHandle::spawn(Self::NAME, period, move || {
            let portfolio = portfolio.clone();
            async move {
                if portfolio.has_holdings().await {
                    portfolio.refresh_prices().await;
                }
            }
        })
    }

    pub async fn render(&self) -> View {
        render::portfolio(
            &self.portfolio.summary().await,
            &self.portfolio.quotes_state().await,
        )
    }

    pub async fn teardown(&self) {
        self.portfolio.teardown().await;
    }
}
