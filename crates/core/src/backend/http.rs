use crate::backend::Backend;
use crate::config::Settings;
use crate::domain::contract;
use crate::domain::{
    AddStockReceipt, BackendHealth, GlobalIndices, NewsAnalysis, NewsItem, PriceQuote,
    PriceSnapshot, SentimentReport, TechnicalAnalysis,
};
use crate::fetch::FetchError;
use anyhow::Context;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(&settings.backend_base_url, settings.backend_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid backend base URL: {base_url}"))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "backend base URL cannot carry a path: {base_url}"
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build backend http client")?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Network(format!("invalid backend URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = self.endpoint(segments)?;
        self.send(self.http.get(url).query(query)).await
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<Value, FetchError> {
        let url = self.endpoint(segments)?;
        self.send(self.http.post(url).json(body)).await
    }

    async fn send(&self, req: RequestBuilder) -> Result<Value, FetchError> {
        let res = req
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        let status = res.status();
        let url = res.url().clone();
        let text = res.text().await?;
        tracing::debug!(%url, %status, bytes = text.len(), "backend responded");

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw = serde_json::from_str::<Value>(&text)
            .map_err(|e| FetchError::Decode(format!("response is not valid JSON ({e})")))?;
        if let Some(message) = contract::application_error(&raw) {
            return Err(FetchError::Application(message));
        }
        Ok(raw)
    }
}

fn symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Serialize)]
struct CompanyRequest<'a> {
    company_name: &'a str,
}

#[derive(Debug, Serialize)]
struct SymbolRequest<'a> {
    stock_symbol: &'a str,
}

#[derive(Debug, Serialize)]
struct TechnicalRequest<'a> {
    stock_symbol: &'a str,
    risk_reward_ratio: f64,
}

#[derive(Debug, Serialize)]
struct AddStockRequest<'a> {
    ticker: &'a str,
    quantity: u32,
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    fn backend_name(&self) -> &'static str {
        "http_json"
    }

    async fn health(&self) -> Result<BackendHealth, FetchError> {
        let raw = self.get_json(&["api", "health"], &[]).await?;
        contract::health_from_json(raw)
    }

    async fn news(&self, symbol_filter: Option<&str>) -> Result<Vec<NewsItem>, FetchError> {
        let filter = symbol_filter.map(symbol).filter(|s| !s.is_empty());
        let query: Vec<(&str, &str)> = filter.iter().map(|s| ("symbol", s.as_str())).collect();
        let raw = self.get_json(&["api", "news"], &query).await?;
        contract::news_from_json(raw)
    }

    async fn news_analysis(&self, company_name: &str) -> Result<NewsAnalysis, FetchError> {
        let company_name = company_name.trim();
        let raw = self
            .post_json(&["api", "news-analysis"], &CompanyRequest { company_name })
            .await?;
        contract::news_analysis_from_json(raw, company_name)
    }

    async fn price_analysis(&self, stock_symbol: &str) -> Result<PriceSnapshot, FetchError> {
        let stock_symbol = symbol(stock_symbol);
        let raw = self
            .post_json(
                &["api", "price-analysis"],
                &SymbolRequest {
                    stock_symbol: &stock_symbol,
                },
            )
            .await?;
        contract::price_from_json(raw, &stock_symbol)
    }

    async fn sentiment(&self, stock_symbol: &str) -> Result<SentimentReport, FetchError> {
        let stock_symbol = symbol(stock_symbol);
        let raw = self
            .get_json(&["api", "sentiment", &stock_symbol], &[])
            .await?;
        contract::sentiment_from_json(raw, &stock_symbol)
    }

    async fn technical_analysis(
        &self,
        stock_symbol: &str,
        risk_reward_ratio: f64,
    ) -> Result<TechnicalAnalysis, FetchError> {
        let stock_symbol = symbol(stock_symbol);
        let raw = self
            .post_json(
                &["api", "technical-analysis"],
                &TechnicalRequest {
                    stock_symbol: &stock_symbol,
                    risk_reward_ratio,
                },
            )
            .await?;
        contract::technical_from_json(raw, &stock_symbol)
    }

    async fn add_stock(&self, ticker: &str, quantity: u32) -> Result<AddStockReceipt, FetchError> {
        let ticker = symbol(ticker);
        let raw = self
            .post_json(
                &["api", "portfolio", "add-stock"],
                &AddStockRequest {
                    ticker: &ticker,
                    quantity,
                },
            )
            .await?;
        contract::add_stock_from_json(raw, &ticker, quantity)
    }

    async fn get_price(&self, ticker: &str) -> Result<PriceQuote, FetchError> {
        let ticker = symbol(ticker);
        let raw = self
            .get_json(&["api", "portfolio", "get-price", &ticker], &[])
            .await?;
        contract::quote_from_json(raw, &ticker)
    }

    async fn global_indices(&self, region: &str) -> Result<GlobalIndices, FetchError> {
        let raw = self
            .get_json(&["api", "global-indices"], &[("region", region.trim())])
            .await?;
        contract::indices_from_json(raw)
    }
}
