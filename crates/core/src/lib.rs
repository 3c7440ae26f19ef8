pub mod backend;
pub mod dashboard;
pub mod domain;
pub mod fetch;
pub mod format;
pub mod ledger;
pub mod notify;
pub mod panels;
pub mod refresh;
pub mod render;
pub mod sparkline;

#[cfg(test)]
pub(crate) mod testing;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:5000";
    const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_NEWS_REFRESH_SECS: u64 = 60;
    const DEFAULT_PORTFOLIO_REFRESH_SECS: u64 = 30;
    const DEFAULT_INDICES_REFRESH_SECS: u64 = 600;
    const DEFAULT_SENTIMENT_REFRESH_SECS: u64 = 1800;
    const DEFAULT_STARTING_CASH: f64 = 10_000.0;
    const DEFAULT_NEWS_SYMBOL: &str = "TSLA";
    const DEFAULT_INDICES_REGION: &str = "americas";
    const DEFAULT_PORT: u16 = 3000;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RefreshIntervals {
        pub news: Duration,
        pub portfolio: Duration,
        pub indices: Duration,
        pub sentiment: Duration,
    }

    impl Default for RefreshIntervals {
        fn default() -> Self {
            Self {
                news: Duration::from_secs(DEFAULT_NEWS_REFRESH_SECS),
                portfolio: Duration::from_secs(DEFAULT_PORTFOLIO_REFRESH_SECS),
                indices: Duration::from_secs(DEFAULT_INDICES_REFRESH_SECS),
                sentiment: Duration::from_secs(DEFAULT_SENTIMENT_REFRESH_SECS),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub backend_base_url: String,
        pub backend_timeout: Duration,
        pub sentry_dsn: Option<String>,
        pub refresh: RefreshIntervals,
        pub starting_cash: f64,
        pub news_symbol: String,
        pub indices_region: String,
        pub port: u16,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                backend_base_url: DEFAULT_BACKEND_BASE_URL.to_string(),
                backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
                sentry_dsn: None,
                refresh: RefreshIntervals::default(),
                starting_cash: DEFAULT_STARTING_CASH,
                news_symbol: DEFAULT_NEWS_SYMBOL.to_string(),
                indices_region: DEFAULT_INDICES_REGION.to_string(),
                port: DEFAULT_PORT,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let text = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
            let secs = |key: &str, default: u64| {
                Duration::from_secs(
                    text(key)
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .unwrap_or(default),
                )
            };

            let settings = Self {
                backend_base_url: text("BACKEND_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BACKEND_BASE_URL.to_string()),
                backend_timeout: secs("BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS),
                sentry_dsn: text("SENTRY_DSN"),
                refresh: RefreshIntervals {
                    news: secs("NEWS_REFRESH_SECS", DEFAULT_NEWS_REFRESH_SECS),
                    portfolio: secs("PORTFOLIO_REFRESH_SECS", DEFAULT_PORTFOLIO_REFRESH_SECS),
                    indices: secs("INDICES_REFRESH_SECS", DEFAULT_INDICES_REFRESH_SECS),
                    sentiment: secs("SENTIMENT_REFRESH_SECS", DEFAULT_SENTIMENT_REFRESH_SECS),
                },
                starting_cash: text("STARTING_CASH")
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .unwrap_or(DEFAULT_STARTING_CASH),
                news_symbol: text("NEWS_SYMBOL")
                    .map(|s| s.trim().to_uppercase())
                    .unwrap_or_else(|| DEFAULT_NEWS_SYMBOL.to_string()),
                indices_region: text("INDICES_REGION")
                    .map(|s| s.trim().to_lowercase())
                    .unwrap_or_else(|| DEFAULT_INDICES_REGION.to_string()),
                port: text("PORT")
                    .and_then(|s| s.trim().parse::<u16>().ok())
                    .unwrap_or(DEFAULT_PORT),
            };

            settings.validate()?;
            Ok(settings)
        }

        fn validate(&self) -> anyhow::Result<()> {
            let url = reqwest::Url::parse(&self.backend_base_url)
                .with_context(|| format!("BACKEND_BASE_URL is not a URL: {}", self.backend_base_url))?;
            anyhow::ensure!(
                matches!(url.scheme(), "http" | "https"),
                "BACKEND_BASE_URL must be http(s) (got {})",
                url.scheme()
            );
            anyhow::ensure!(
                self.starting_cash.is_finite() && self.starting_cash > 0.0,
                "STARTING_CASH must be positive (got {})",
                self.starting_cash
            );
            Ok(())
        }
    }

}
