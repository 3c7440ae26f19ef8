use crate::domain::{
    GlobalIndices, NewsAnalysis, NewsItem, PriceSnapshot, SentimentReport, TechnicalAnalysis,
};
use crate::fetch::{FetchState, FetchStatus};
use crate::format::{format_currency, format_signed_percent, time_ago, to_fixed, Sentinel};
use crate::ledger::{LedgerSummary, PriceRefresh};
use crate::sparkline;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Idle,
    Loading,
    Error {
        message: String,
        stale: Option<Vec<String>>,
    },
    Empty(&'static str),
    Content(Vec<String>),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Idle => f.write_str("Nothing loaded yet."),
            View::Loading => f.write_str("Loading..."),
            View::Error { message, stale } => {
                write!(f, "Error: {message}")?;
                if let Some(lines) = stale {
                    f.write_str("\n(showing last successful result)")?;
                    for line in lines {
                        write!(f, "\n{line}")?;
                    }
                }
                Ok(())
            }
            View::Empty(message) => f.write_str(message),
            View::Content(lines) => f.write_str(&lines.join("\n")),
        }
    }
}

pub fn view<T>(state: &FetchState<T>, empty: &'static str, lines: impl Fn(&T) -> Vec<String>) -> View {
    match state.status() {
        FetchStatus::Idle => View::Idle,
        FetchStatus::Loading => View::Loading,
        FetchStatus::Error => View::Error {
            message: state.error().unwrap_or("Something went wrong").to_string(),
            stale: state.stale().map(&lines),
        },
        FetchStatus::Success => match state.data().map(&lines) {
            Some(content) if !content.is_empty() => View::Content(content),
            _ => View::Empty(empty),
        },
    }
}

fn money(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format_currency(v),
        None => to_fixed(None, 2, Sentinel::NotAvailable),
    }
}

fn percent(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format_signed_percent(v),
        None => to_fixed(None, 2, Sentinel::NotAvailable),
    }
}

fn news_lines(items: &[NewsItem], now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::with_capacity(items.len() * 3);
    for item in items {
        lines.push(format!("* {}", item.title));
        if !item.description.is_empty() {
            lines.push(format!("  {}", item.description));
        }
        let age = item.published_at.as_deref().and_then(|at| time_ago(at, now));
        match (item.source.as_deref(), age) {
            (Some(source), Some(age)) => lines.push(format!("  {source} | {age}")),
            (Some(source), None) => lines.push(format!("  {source}")),
            (None, Some(age)) => lines.push(format!("  {age}")),
            (None, None) => {}
        }
        if !item.url.is_empty() && item.url != "#" {
            lines.push(format!("  {}", item.url));
        }
    }
    lines
}

fn price_lines(price: &PriceSnapshot) -> Vec<String> {
    let mut lines = vec![
        format!("Current Price: {}", money(price.current_price)),
        format!("Change: {}", percent(price.change_percent)),
        format!("Volatility: {}", to_fixed(price.volatility, 2, Sentinel::NotAvailable)),
    ];
    if let Some(at) = &price.timestamp {
        lines.push(format!("As of: {at}"));
    }
    lines
}

pub fn news_feed(state: &FetchState<Vec<NewsItem>>, now: DateTime<Utc>) -> View {
    view(state, "No news available.", |items| news_lines(items, now))
}

pub fn news_analysis(state: &FetchState<NewsAnalysis>, now: DateTime<Utc>) -> View {
    view(state, "No analysis available.", |analysis| {
        let mut lines = vec![analysis.stock_name.clone()];
        lines.extend(price_lines(&analysis.price));
        if analysis.news.is_empty() {
            lines.push("No related news.".to_string());
        } else {
            lines.push("Related news:".to_string());
            lines.extend(news_lines(&analysis.news, now));
        }
        lines
    })
}

pub fn price_analysis(state: &FetchState<PriceSnapshot>) -> View {
    view(state, "No price data available.", |price| {
        let mut lines = vec![format!("Symbol: {}", price.symbol)];
        lines.extend(price_lines(price));
        lines
    })
}

pub fn sentiment(state: &FetchState<SentimentReport>) -> View {
    view(state, "No sentiment data available.", |report| {
        let mut lines = vec![
            format!("{}: {} ({:+.2})", report.stock_name, report.trend, report.overall_score),
        ];
        if !report.reason.is_empty() {
            lines.push(report.reason.clone());
        }
        lines.extend(report.results.iter().map(|item| {
            format!("[{} {:+.2}] {}", item.sentiment.as_str(), item.score, item.text)
        }));
        lines
    })
}

pub fn technical_analysis(state: &FetchState<TechnicalAnalysis>) -> View {
    view(state, "No analysis available.", |analysis| {
        let mut lines = vec![
            format!("{}: {}", analysis.ticker, analysis.signal.as_str()),
            format!("Entry: {}", money(Some(analysis.entry_price))),
            format!("Stop Loss: {}", money(analysis.stop_loss)),
            format!("Target: {}", money(analysis.target_price)),
            format!("ATR: {}", to_fixed(Some(analysis.atr), 2, Sentinel::NotAvailable)),
        ];
        if let Some(at) = &analysis.timestamp {
            lines.push(format!("As of: {at}"));
        }
        lines
    })
}

pub fn global_indices(state: &FetchState<GlobalIndices>) -> View {
    view(state, "No index data available.", |indices| {
        indices
            .values()
            .map(|index| {
                let label = index.name.as_deref().unwrap_or(&index.symbol);
                let line = format!(
                    "{label}: {} ({})",
                    to_fixed(Some(index.current_value), 2, Sentinel::Zero),
                    format_signed_percent(index.change_percent)
                );
                let bars = sparkline::bars(&index.trend);
                if bars.is_empty() {
                    line
                } else {
                    format!("{line} {bars}")
                }
            })
            .collect()
    })
}

pub fn portfolio(summary: &LedgerSummary, quotes: &FetchState<PriceRefresh>) -> View {
    let mut lines = Vec::new();
    match quotes.status() {
        FetchStatus::Loading => lines.push("Refreshing prices...".to_string()),
        FetchStatus::Error => lines.push(format!(
            "Price refresh failed: {}",
            quotes.error().unwrap_or("Something went wrong")
        )),
        FetchStatus::Idle | FetchStatus::Success => {}
    }

    lines.push(format!("Cash: {}", format_currency(summary.cash)));
    lines.push(format!("Total Value: {}", format_currency(summary.total_value)));
    lines.push(format!(
        "Total Return: {} ({})",
        format_currency(summary.total_return),
        format_signed_percent(summary.return_percent)
    ));

    if summary.holdings.is_empty() {
        lines.push("No holdings yet.".to_string());
    }
    for holding in &summary.holdings {
        lines.push(format!(
            "{} x{} @ {} | now {} | P/L {}",
            holding.ticker,
            holding.quantity,
            format_currency(holding.purchase_price),
            to_fixed(holding.current_price, 2, Sentinel::Zero),
            to_fixed(holding.profit_loss, 2, Sentinel::Zero)
        ));
    }
    View::Content(lines)
}
