//! Backend response shapes and their normalization into the domain model.
//!
//! Numeric fields arrive as numbers, numeric strings, `"N/A"` or `null` depending
//! on the backend revision, so they are read as raw JSON and coerced here.

use crate::domain::model::{
    AddStockReceipt, BackendHealth, GlobalIndices, IndexSnapshot, NewsAnalysis, NewsItem,
    PriceQuote, PriceSnapshot, Sentiment, SentimentItem, SentimentReport, Signal,
    TechnicalAnalysis,
};
use crate::fetch::FetchError;
use crate::format::{parse_number, safe_number};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

const PLACEHOLDER_URL: &str = "#";

pub fn application_error(raw: &Value) -> Option<String> {
    match raw.get("error")? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => Some("Unknown backend error".to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn decode<W: DeserializeOwned>(raw: Value, what: &str) -> Result<W, FetchError> {
    serde_json::from_value(raw).map_err(|e| FetchError::Decode(format!("{what}: {e}")))
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct WireNewsResponse {
    #[serde(default, alias = "articles")]
    news: Vec<WireNewsItem>,
}

#[derive(Debug, Deserialize)]
struct WireNewsItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "summary")]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<Value>,
    #[serde(default, alias = "publishedAt")]
    published_at: Option<String>,
}

impl WireNewsItem {
    fn into_item(self) -> Option<NewsItem> {
        let title = non_blank(self.title)?;
        // Older feeds send `source: {name}`, newer ones a plain string.
        let source = match self.source {
            Some(Value::String(s)) => non_blank(Some(s)),
            Some(Value::Object(map)) => {
                non_blank(map.get("name").and_then(|v| v.as_str()).map(str::to_string))
            }
            _ => None,
        };
        Some(NewsItem {
            title,
            description: self.description.unwrap_or_default().trim().to_string(),
            url: non_blank(self.url).unwrap_or_else(|| PLACEHOLDER_URL.to_string()),
            source,
            published_at: non_blank(self.published_at),
        })
    }
}

fn news_items(items: Vec<WireNewsItem>) -> Vec<NewsItem> {
    items.into_iter().filter_map(WireNewsItem::into_item).collect()
}

pub fn news_from_json(raw: Value) -> Result<Vec<NewsItem>, FetchError> {
    let wire: WireNewsResponse = decode(raw, "news feed")?;
    Ok(news_items(wire.news))
}

#[derive(Debug, Deserialize)]
struct WirePrice {
    #[serde(default, alias = "stock")]
    stock_symbol: Option<String>,
    #[serde(default)]
    current_price: Value,
    #[serde(default, alias = "percentage_change")]
    change_percent: Value,
    #[serde(default)]
    volatility: Value,
    #[serde(default)]
    timestamp: Option<String>,
}

impl WirePrice {
    fn into_snapshot(self, fallback_symbol: &str) -> PriceSnapshot {
        PriceSnapshot {
            symbol: non_blank(self.stock_symbol)
                .unwrap_or_else(|| fallback_symbol.to_string())
                .to_uppercase(),
            current_price: parse_number(&self.current_price),
            change_percent: parse_number(&self.change_percent),
            volatility: parse_number(&self.volatility),
            timestamp: non_blank(self.timestamp),
        }
    }
}

pub fn price_from_json(raw: Value, requested_symbol: &str) -> Result<PriceSnapshot, FetchError> {
    let wire: WirePrice = decode(raw, "price analysis")?;
    Ok(wire.into_snapshot(requested_symbol))
}

#[derive(Debug, Deserialize)]
struct WireNewsAnalysis {
    #[serde(default)]
    stock_name: Option<String>,
    #[serde(flatten)]
    price: WirePrice,
    #[serde(default, alias = "news_summaries")]
    news: Vec<WireNewsItem>,
}

pub fn news_analysis_from_json(
    raw: Value,
    requested_company: &str,
) -> Result<NewsAnalysis, FetchError> {
    let wire: WireNewsAnalysis = decode(raw, "news analysis")?;
    let stock_name = non_blank(wire.stock_name).unwrap_or_else(|| requested_company.to_string());
    Ok(NewsAnalysis {
        price: wire.price.into_snapshot(&stock_name),
        news: news_items(wire.news),
        stock_name,
    })
}

#[derive(Debug, Deserialize)]
struct WireSentimentReport {
    #[serde(default)]
    stock_name: Option<String>,
    #[serde(default)]
    trend: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    overall_score: Value,
    #[serde(default)]
    results: Vec<WireSentimentItem>,
}

#[derive(Debug, Deserialize)]
struct WireSentimentItem {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
    #[serde(default)]
    score: Value,
}

pub fn sentiment_from_json(
    raw: Value,
    requested_symbol: &str,
) -> Result<SentimentReport, FetchError> {
    let wire: WireSentimentReport = decode(raw, "sentiment analysis")?;
    if wire.results.is_empty() {
        return Err(FetchError::Application(
            "No sentiment data available".to_string(),
        ));
    }

    let results = wire
        .results
        .into_iter()
        .map(|item| SentimentItem {
            text: item.text.unwrap_or_default().trim().to_string(),
            sentiment: item
                .sentiment
                .as_deref()
                .map(Sentiment::parse)
                .unwrap_or(Sentiment::Neutral),
            score: safe_number(Some(&item.score)).clamp(-1.0, 1.0),
        })
        .collect();

    Ok(SentimentReport {
        stock_name: non_blank(wire.stock_name).unwrap_or_else(|| requested_symbol.to_string()),
        trend: non_blank(wire.trend).unwrap_or_else(|| "Neutral".to_string()),
        reason: non_blank(wire.reason).unwrap_or_default(),
        overall_score: safe_number(Some(&wire.overall_score)),
        results,
    })
}

#[derive(Debug, Deserialize)]
struct WireTechnicalAnalysis {
    #[serde(default, alias = "stock_symbol")]
    ticker: Option<String>,
    #[serde(default)]
    signal: Option<String>,
    #[serde(default)]
    entry_price: Value,
    #[serde(default)]
    stop_loss: Value,
    #[serde(default)]
    target_price: Value,
    #[serde(default)]
    atr: Value,
    #[serde(default)]
    timestamp: Option<String>,
}

pub fn technical_from_json(
    raw: Value,
    requested_symbol: &str,
) -> Result<TechnicalAnalysis, FetchError> {
    let wire: WireTechnicalAnalysis = decode(raw, "technical analysis")?;
    let label = wire.signal.unwrap_or_default();
    let signal = Signal::parse(&label)
        .ok_or_else(|| FetchError::Decode(format!("unknown trading signal {label:?}")))?;

    Ok(TechnicalAnalysis {
        ticker: non_blank(wire.ticker)
            .unwrap_or_else(|| requested_symbol.to_string())
            .to_uppercase(),
        signal,
        entry_price: safe_number(Some(&wire.entry_price)),
        stop_loss: parse_number(&wire.stop_loss),
        target_price: parse_number(&wire.target_price),
        atr: safe_number(Some(&wire.atr)),
        timestamp: non_blank(wire.timestamp),
    })
}

#[derive(Debug, Deserialize)]
struct WireAddStock {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    quantity: Value,
    #[serde(default)]
    price: Value,
    #[serde(default)]
    total_cost: Value,
    #[serde(default)]
    success: Option<bool>,
}

pub fn add_stock_from_json(
    raw: Value,
    requested_ticker: &str,
    requested_quantity: u32,
) -> Result<AddStockReceipt, FetchError> {
    let wire: WireAddStock = decode(raw, "add stock")?;
    if wire.success == Some(false) {
        return Err(FetchError::Application(
            "Backend refused to add the stock".to_string(),
        ));
    }

    let price = parse_number(&wire.price)
        .filter(|p| *p > 0.0)
        .ok_or_else(|| FetchError::Decode("add stock: missing or invalid price".to_string()))?;
    let quantity = match parse_number(&wire.quantity) {
        None => requested_quantity,
        Some(q) if q >= 1.0 && q.fract() == 0.0 && q <= f64::from(u32::MAX) => q as u32,
        Some(q) => {
            return Err(FetchError::Decode(format!(
                "add stock: quantity must be a positive integer (got {q})"
            )))
        }
    };
    let total_cost = parse_number(&wire.total_cost).unwrap_or(price * f64::from(quantity));

    Ok(AddStockReceipt {
        ticker: non_blank(wire.ticker)
            .unwrap_or_else(|| requested_ticker.to_string())
            .to_uppercase(),
        quantity,
        price,
        total_cost,
    })
}

#[derive(Debug, Deserialize)]
struct WirePriceQuote {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    price: Value,
}

pub fn quote_from_json(raw: Value, requested_ticker: &str) -> Result<PriceQuote, FetchError> {
    let wire: WirePriceQuote = decode(raw, "price quote")?;
    let price = parse_number(&wire.price)
        .ok_or_else(|| FetchError::Decode(format!("no price for {requested_ticker}")))?;
    Ok(PriceQuote {
        ticker: non_blank(wire.ticker)
            .unwrap_or_else(|| requested_ticker.to_string())
            .to_uppercase(),
        price,
    })
}

#[derive(Debug, Deserialize)]
struct WireIndex {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    current_value: Value,
    #[serde(default)]
    change_percent: Value,
    #[serde(default)]
    trend: Vec<Value>,
}

pub fn indices_from_json(raw: Value) -> Result<GlobalIndices, FetchError> {
    let wire: BTreeMap<String, WireIndex> = decode(raw, "global indices")?;
    Ok(wire
        .into_iter()
        .map(|(key, index)| {
            let symbol = non_blank(index.symbol).unwrap_or_else(|| key.clone());
            let snapshot = IndexSnapshot {
                symbol,
                name: non_blank(index.name),
                current_value: safe_number(Some(&index.current_value)),
                change_percent: safe_number(Some(&index.change_percent)),
                trend: index.trend.iter().filter_map(parse_number).collect(),
            };
            (key, snapshot)
        })
        .collect())
}

pub fn health_from_json(raw: Value) -> Result<BackendHealth, FetchError> {
    #[derive(Deserialize)]
    struct WireHealth {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
    }

    let wire: WireHealth = decode(raw, "health")?;
    Ok(BackendHealth {
        status: non_blank(wire.status).unwrap_or_else(|| "unknown".to_string()),
        message: wire.message.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn application_error_detects_error_field() {
        assert_eq!(application_error(&json!({"error": "X"})), Some("X".to_string()));
        assert_eq!(application_error(&json!({"error": null, "news": []})), None);
        assert_eq!(application_error(&json!({"news": []})), None);
        assert_eq!(application_error(&json!([1, 2])), None);
    }

    #[test]
    fn news_drops_untitled_items_and_fills_defaults() {
        let raw = json!({
            "news": [
                {"title": "Tesla beats estimates", "description": "Q3 deliveries up", "url": "https://n.example/1"},
                {"title": "  ", "description": "no title"},
                {"title": "Fed holds rates"}
            ]
        });
        let items = news_from_json(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://n.example/1");
        assert_eq!(items[1].description, "");
        assert_eq!(items[1].url, "#");
    }

    #[test]
    fn legacy_live_feed_shape_is_accepted() {
        let raw = json!({
            "articles": [{
                "title": "Stocks rally",
                "description": "Indices climb",
                "publishedAt": "2026-01-05T10:00:00Z",
                "url": "https://n.example/2",
                "source": {"name": "Daily Wire"}
            }]
        });
        let items = news_from_json(raw).unwrap();
        assert_eq!(items[0].source.as_deref(), Some("Daily Wire"));
        assert_eq!(items[0].published_at.as_deref(), Some("2026-01-05T10:00:00Z"));
    }

    #[test]
    fn price_keeps_unavailable_fields_as_none() {
        let raw = json!({
            "stock_symbol": "tsla",
            "current_price": "251.3",
            "change_percent": "N/A",
            "volatility": null,
            "timestamp": "2026-01-05 16:00:00"
        });
        let snapshot = price_from_json(raw, "TSLA").unwrap();
        assert_eq!(snapshot.symbol, "TSLA");
        assert_eq!(snapshot.current_price, Some(251.3));
        assert_eq!(snapshot.change_percent, None);
        assert_eq!(snapshot.volatility, None);
    }

    #[test]
    fn price_accepts_legacy_field_names() {
        let raw = json!({"stock": "AAPL", "current_price": 190.12, "percentage_change": -1.5});
        let snapshot = price_from_json(raw, "AAPL").unwrap();
        assert_eq!(snapshot.symbol, "AAPL");
        assert_eq!(snapshot.change_percent, Some(-1.5));
    }

    #[test]
    fn news_analysis_combines_price_and_news() {
        let raw = json!({
            "stock_name": "Tesla",
            "current_price": 250.0,
            "change_percent": 1.2,
            "volatility": 3.4,
            "news": [{"title": "Mock News 1", "description": "Sample", "url": "http://example.com"}],
            "timestamp": "2026-01-05 16:00:00"
        });
        let analysis = news_analysis_from_json(raw, "Tesla").unwrap();
        assert_eq!(analysis.stock_name, "Tesla");
        assert_eq!(analysis.price.volatility, Some(3.4));
        assert_eq!(analysis.price.symbol, "TESLA");
        assert_eq!(analysis.news.len(), 1);
    }

    #[test]
    fn sentiment_clamps_scores_and_requires_results() {
        let raw = json!({
            "stock_name": "AAPL",
            "trend": "Bullish",
            "reason": "optimism",
            "overall_score": "0.42",
            "results": [
                {"text": "great quarter", "sentiment": "Positive", "score": 1.7},
                {"text": "meh", "sentiment": "unsure", "score": "bad"}
            ]
        });
        let report = sentiment_from_json(raw, "AAPL").unwrap();
        assert_eq!(report.overall_score, 0.42);
        assert_eq!(report.results[0].score, 1.0);
        assert_eq!(report.results[1].sentiment, Sentiment::Neutral);
        assert_eq!(report.results[1].score, 0.0);

        let empty = sentiment_from_json(json!({"results": []}), "AAPL");
        assert_eq!(
            empty,
            Err(FetchError::Application("No sentiment data available".into()))
        );
    }

    #[test]
    fn technical_requires_known_signal() {
        let raw = json!({
            "ticker": "NVDA",
            "signal": "Buy",
            "entry_price": 120.5,
            "stop_loss": null,
            "target_price": "140.25",
            "atr": 3.1,
            "timestamp": "2026-01-05 16:00:00"
        });
        let analysis = technical_from_json(raw, "NVDA").unwrap();
        assert_eq!(analysis.signal, Signal::Buy);
        assert_eq!(analysis.stop_loss, None);
        assert_eq!(analysis.target_price, Some(140.25));

        let bad = technical_from_json(json!({"signal": "Moon"}), "NVDA");
        assert!(matches!(bad, Err(FetchError::Decode(_))));
    }

    #[test]
    fn add_stock_derives_total_cost_and_rejects_failure() {
        let raw = json!({"success": true, "ticker": "aapl", "price": "190.5", "quantity": 2});
        let receipt = add_stock_from_json(raw, "AAPL", 2).unwrap();
        assert_eq!(receipt.ticker, "AAPL");
        assert_eq!(receipt.total_cost, 381.0);

        let refused = add_stock_from_json(json!({"success": false, "price": 1.0}), "AAPL", 1);
        assert!(matches!(refused, Err(FetchError::Application(_))));

        let no_price = add_stock_from_json(json!({"success": true}), "AAPL", 1);
        assert!(matches!(no_price, Err(FetchError::Decode(_))));

        let fractional = add_stock_from_json(json!({"price": 1.0, "quantity": 1.5}), "AAPL", 1);
        assert!(matches!(fractional, Err(FetchError::Decode(_))));
    }

    #[test]
    fn quote_requires_a_price() {
        let quote = quote_from_json(json!({"ticker": "MSFT", "price": 410.0}), "MSFT").unwrap();
        assert_eq!(quote.price, 410.0);
        assert!(quote_from_json(json!({"ticker": "MSFT"}), "MSFT").is_err());
    }

    #[test]
    fn indices_coerce_values_and_drop_bad_trend_points() {
        let raw = json!({
            "^GSPC": {"name": "S&P 500", "current_value": "5100.5", "change_percent": 0.8, "trend": [1, "2", "x", 3]},
            "^DJI": {"current_value": null, "change_percent": "n/a", "trend": []}
        });
        let indices = indices_from_json(raw).unwrap();
        let spx = &indices["^GSPC"];
        assert_eq!(spx.symbol, "^GSPC");
        assert_eq!(spx.current_value, 5100.5);
        assert_eq!(spx.trend, vec![1.0, 2.0, 3.0]);
        assert_eq!(indices["^DJI"].current_value, 0.0);
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        assert!(matches!(
            news_from_json(json!({"news": "nope"})),
            Err(FetchError::Decode(_))
        ));
    }
}
