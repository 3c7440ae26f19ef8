pub mod http;

use crate::domain::{
    AddStockReceipt, BackendHealth, GlobalIndices, NewsAnalysis, NewsItem, PriceQuote,
    PriceSnapshot, SentimentReport, TechnicalAnalysis,
};
use crate::fetch::FetchError;

pub use http::HttpBackend;

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn health(&self) -> Result<BackendHealth, FetchError>;

    async fn news(&self, symbol: Option<&str>) -> Result<Vec<NewsItem>, FetchError>;

    async fn news_analysis(&self, company_name: &str) -> Result<NewsAnalysis, FetchError>;

    async fn price_analysis(&self, stock_symbol: &str) -> Result<PriceSnapshot, FetchError>;

    async fn sentiment(&self, symbol: &str) -> Result<SentimentReport, FetchError>;

    async fn technical_analysis(
        &self,
        stock_symbol: &str,
        risk_reward_ratio: f64,
    ) -> Result<TechnicalAnalysis, FetchError>;

    async fn add_stock(&self, ticker: &str, quantity: u32) -> Result<AddStockReceipt, FetchError>;

    async fn get_price(&self, ticker: &str) -> Result<PriceQuote, FetchError>;

    async fn global_indices(&self, region: &str) -> Result<GlobalIndices, FetchError>;
}
