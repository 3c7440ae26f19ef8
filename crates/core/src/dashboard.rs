use crate::backend::Backend;
use crate::config::{RefreshIntervals, Settings};
use crate::notify::Notifier;
use crate::panels::{
    GlobalIndicesPanel, NewsAnalysisPanel, NewsFeedPanel, PortfolioPanel, PriceAnalysisPanel,
    SentimentPanel, TechnicalAnalysisPanel,
};
use crate::refresh::RefreshHandle;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Dashboard {
    intervals: RefreshIntervals,
    notifier: Notifier,
    news: NewsFeedPanel,
    news_analysis: NewsAnalysisPanel,
    price: PriceAnalysisPanel,
    sentiment: SentimentPanel,
    technical: TechnicalAnalysisPanel,
    indices: GlobalIndicesPanel,
    portfolio: PortfolioPanel,
    timers: Mutex<Vec<RefreshHandle>>,
}

impl Dashboard {
    pub fn new(settings: &Settings, backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        let news_symbol = Some(settings.news_symbol.clone());
        Self {
            intervals: settings.refresh,
            news: NewsFeedPanel::new(backend.clone(), notifier.clone(), news_symbol),
            news_analysis: NewsAnalysisPanel::new(backend.clone(), notifier.clone()),
            price: PriceAnalysisPanel::new(backend.clone(), notifier.clone()),
            sentiment: SentimentPanel::new(backend.clone(), notifier.clone()),
            technical: TechnicalAnalysisPanel::new(backend.clone(), notifier.clone()),
            indices: GlobalIndicesPanel::new(
                backend.clone(),
                notifier.clone(),
                settings.indices_region.clone(),
            ),
            portfolio: PortfolioPanel::new(backend, notifier.clone(), settings.starting_cash),
            notifier,
            timers: Mutex::new(Vec::new()),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn news(&self) -> &NewsFeedPanel {
        &self.news
    }

    pub fn news_analysis(&self) -> &NewsAnalysisPanel {
        &self.news_analysis
    }

    pub fn price(&self) -> &PriceAnalysisPanel {
        &self.price
    }

    pub fn sentiment(&self) -> &SentimentPanel {
        &self.sentiment
    }

    pub fn technical(&self) -> &TechnicalAnalysisPanel {
        &self.technical
    }

    pub fn indices(&self) -> &GlobalIndicesPanel {
        &self.indices
    }

    pub fn portfolio(&self) -> &PortfolioPanel {
        &self.portfolio
    }

    pub async fn mount(&self) {
        let handles: Vec<RefreshHandle> = [
            self.news.mount(self.intervals.news),
            self.portfolio.mount(self.intervals.portfolio),
            self.indices.mount(self.intervals.indices),
            self.sentiment.mount(self.intervals.sentiment),
        ]
        .into_iter()
        .flatten()
        .collect();
        tracing::info!(timers = handles.len(), "dashboard mounted");
        *self.timers.lock().await = handles;
    }

    pub async fn unmount(&self) {
        self.timers.lock().await.clear();
        tokio::join!(
            self.news.teardown(),
            self.news_analysis.teardown(),
            self.price.teardown(),
            self.sentiment.teardown(),
            self.technical.teardown(),
            self.indices.teardown(),
            self.portfolio.teardown(),
        );
        tracing::info!("dashboard unmounted");
    }

    pub async fn refresh_once(&self) {
        let portfolio = async {
            if self.portfolio.portfolio().has_holdings().await {
                self.portfolio.refresh_prices().await;
            }
        };
        tokio::join!(
            self.news.refresh(),
            self.indices.refresh(),
            self.sentiment.refresh(),
            portfolio,
        );
    }

    pub async fn render(&self, now: DateTime<Utc>) -> String {
        let sections = [
            ("News", self.news.render(now).await),
            ("News Analysis", self.news_analysis.render(now).await),
            ("Price Analysis", self.price.render().await),
            ("Sentiment", self.sentiment.render().await),
            ("Technical Analysis", self.technical.render().await),
            ("Global Indices", self.indices.render().await),
            ("Portfolio", self.portfolio.render().await),
        ];

        let mut out = String::new();
        for (title, view) in sections {
            let _ = writeln!(out, "== {title} ==\n{view}\n");
        }
        out
    }
}
