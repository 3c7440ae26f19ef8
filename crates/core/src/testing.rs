use crate::backend::Backend;
use crate::domain::{
    AddStockReceipt, BackendHealth, GlobalIndices, IndexSnapshot, NewsAnalysis, NewsItem,
    PriceQuote, PriceSnapshot, SentimentItem, SentimentReport, Signal, TechnicalAnalysis,
};
use crate::domain::Sentiment;
use crate::fetch::FetchError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct StubBackend {
    calls: Mutex<Vec<String>>,
    prices: Mutex<HashMap<String, Result<f64, FetchError>>>,
    news: Mutex<Option<Result<Vec<NewsItem>, FetchError>>>,
    failure: Mutex<Option<FetchError>>,
    holds: Mutex<HashMap<String, Arc<Notify>>>,
}

impl StubBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_price(self, ticker: &str, price: f64) -> Self {
        self.set_price(ticker, Ok(price));
        self
    }

    pub(crate) fn set_price(&self, ticker: &str, price: Result<f64, FetchError>) {
        self.prices.lock().unwrap().insert(ticker.to_string(), price);
    }

    pub(crate) fn set_news(&self, news: Result<Vec<NewsItem>, FetchError>) {
        *self.news.lock().unwrap() = Some(news);
    }

    pub(crate) fn fail_with(&self, err: Option<FetchError>) {
        *self.failure.lock().unwrap() = err;
    }

    pub(crate) fn hold(&self, ticker: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap()
            .insert(ticker.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), FetchError> {
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn price(&self, ticker: &str) -> Result<f64, FetchError> {
        self.prices
            .lock()
            .unwrap()
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Http { status: 404, body: String::new() }))
    }
}

pub(crate) fn news_item(title: &str) -> NewsItem {
    NewsItem {
        title: title.to_string(),
        description: format!("{title} description"),
        url: format!("https://news.example/{}", title.to_lowercase().replace(' ', "-")),
        source: Some("Wire".to_string()),
        published_at: Some("2026-10-19T09:00:00Z".to_string()),
    }
}

#[async_trait::async_trait]
impl Backend for StubBackend {
    fn backend_name(&self) -> &'static str {
        "stub"
    }

    async fn health(&self) -> Result<BackendHealth, FetchError> {
        self.record("health".to_string())?;
        Ok(BackendHealth {
            status: "healthy".to_string(),
            message: "stub".to_string(),
        })
    }

    async fn news(&self, symbol: Option<&str>) -> Result<Vec<NewsItem>, FetchError> {
        self.record(format!("news:{}", symbol.unwrap_or("")))?;
        match self.news.lock().unwrap().clone() {
            Some(news) => news,
            None => Ok(vec![news_item("Markets rally")]),
        }
    }

    async fn news_analysis(&self, company_name: &str) -> Result<NewsAnalysis, FetchError> {
        self.record(format!("news_analysis:{company_name}"))?;
        Ok(NewsAnalysis {
            stock_name: company_name.to_string(),
            price: PriceSnapshot {
                symbol: company_name.to_string(),
                current_price: Some(250.5),
                change_percent: Some(-1.25),
                volatility: None,
                timestamp: None,
            },
            news: vec![news_item("Earnings beat")],
        })
    }

    async fn price_analysis(&self, stock_symbol: &str) -> Result<PriceSnapshot, FetchError> {
        self.record(format!("price_analysis:{stock_symbol}"))?;
        Ok(PriceSnapshot {
            symbol: stock_symbol.to_string(),
            current_price: self.price(stock_symbol).ok(),
            change_percent: Some(0.5),
            volatility: None,
            timestamp: Some("2026-10-19 09:30:00".to_string()),
        })
    }

    async fn sentiment(&self, symbol: &str) -> Result<SentimentReport, FetchError> {
        self.record(format!("sentiment:{symbol}"))?;
        Ok(SentimentReport {
            stock_name: symbol.to_string(),
            trend: "Bullish".to_string(),
            reason: "Mostly positive coverage".to_string(),
            overall_score: 0.4,
            results: vec![SentimentItem {
                text: "Record deliveries".to_string(),
                sentiment: Sentiment::Positive,
                score: 0.8,
            }],
        })
    }

    async fn technical_analysis(
        &self,
        stock_symbol: &str,
        risk_reward_ratio: f64,
    ) -> Result<TechnicalAnalysis, FetchError> {
        self.record(format!("technical:{stock_symbol}:{risk_reward_ratio}"))?;
        Ok(TechnicalAnalysis {
            ticker: stock_symbol.to_string(),
            signal: Signal::Buy,
            entry_price: 100.0,
            stop_loss: Some(95.0),
            target_price: Some(100.0 + 5.0 * risk_reward_ratio),
            atr: 2.0,
            timestamp: None,
        })
    }

    async fn add_stock(&self, ticker: &str, quantity: u32) -> Result<AddStockReceipt, FetchError> {
        self.record(format!("add_stock:{ticker}:{quantity}"))?;
        let gate = self.holds.lock().unwrap().get(ticker).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let price = self.price(ticker)?;
        Ok(AddStockReceipt {
            ticker: ticker.to_string(),
            quantity,
            price,
            total_cost: price * f64::from(quantity),
        })
    }

    async fn get_price(&self, ticker: &str) -> Result<PriceQuote, FetchError> {
        self.record(format!("get_price:{ticker}"))?;
        Ok(PriceQuote {
            ticker: ticker.to_string(),
            price: self.price(ticker)?,
        })
    }

    async fn global_indices(&self, region: &str) -> Result<GlobalIndices, FetchError> {
        self.record(format!("global_indices:{region}"))?;
        let mut indices = GlobalIndices::new();
        indices.insert(
            "^GSPC".to_string(),
            IndexSnapshot {
                symbol: "^GSPC".to_string(),
                name: Some("S&P 500".to_string()),
                current_value: 5000.0,
                change_percent: 0.75,
                trend: vec![4900.0, 4950.0, 5000.0],
            },
        );
        Ok(indices)
    }
}
