use crate::backend::Backend;
use crate::domain::AddStockReceipt;
use crate::fetch::{FetchError, FetchState, Panel, Settled};
use crate::format::format_currency;
use crate::ledger::{Holding, Ledger, LedgerSummary};
use crate::notify::Notifier;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

const PANEL: &str = "portfolio";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceRefresh {
    pub updated: BTreeMap<String, f64>,
    pub failed: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct Portfolio {
    backend: Arc<dyn Backend>,
    ledger: Arc<Mutex<Ledger>>,
    // Held from the add-stock request until the ledger is updated.
    buying: Arc<Mutex<()>>,
    trades: Panel<AddStockReceipt>,
    quotes: Panel<PriceRefresh>,
}

impl Portfolio {
    pub fn new(backend: Arc<dyn Backend>, starting_balance: f64, notifier: Notifier) -> Self {
        Self {
            backend,
            ledger: Arc::new(Mutex::new(Ledger::new(starting_balance))),
            buying: Arc::new(Mutex::new(())),
            trades: Panel::new(PANEL, notifier.clone()),
            quotes: Panel::new(PANEL, notifier),
        }
    }

    pub async fn summary(&self) -> LedgerSummary {
        self.ledger.lock().await.summary()
    }

    pub async fn has_holdings(&self) -> bool {
        !self.ledger.lock().await.is_empty()
    }

    pub async fn trades_state(&self) -> FetchState<AddStockReceipt> {
        self.trades.snapshot().await
    }

    pub async fn quotes_state(&self) -> FetchState<PriceRefresh> {
        self.quotes.snapshot().await
    }

    /// Buys run one at a time. `Ok(None)` means the purchase was dropped: the
    /// ledger was reset while it was in flight or the portfolio was torn down.
    pub async fn add_holding(&self, ticker: &str, quantity: i64) -> Result<Option<Holding>, FetchError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(self.trades.reject(FetchError::validation("Please enter a stock ticker")));
        }
        let quantity = match u32::try_from(quantity) {
            Ok(q) if q > 0 => q,
            _ => {
                return Err(self.trades.reject(FetchError::validation(
                    "Quantity must be a positive whole number",
                )))
            }
        };

        let _buying = self.buying.lock().await;
        let epoch = self.ledger.lock().await.epoch();
        let request = async {
            let receipt = self.backend.add_stock(&ticker, quantity).await?;
            self.ledger
                .lock()
                .await
                .preview_buy(&receipt.ticker, receipt.quantity, receipt.price)
                .map_err(|err| FetchError::validation(err.to_string()))?;
            Ok::<_, FetchError>(receipt)
        };
        let receipt = match self.trades.execute(request).await {
            Settled::Success(receipt) => receipt,
            Settled::Failed(err) => return Err(err),
            Settled::Superseded | Settled::TornDown => return Ok(None),
        };

        let mut ledger = self.ledger.lock().await;
        if ledger.epoch() != epoch {
            tracing::info!(%ticker, "ledger was reset during purchase; not applied");
            return Ok(None);
        }
        let held = ledger
            .buy(&receipt.ticker, receipt.quantity, receipt.price)
            .map(Holding::clone)
            .map_err(|err| FetchError::validation(err.to_string()))?;
        drop(ledger);

        tracing::info!(
            ticker = %held.ticker,
            quantity = receipt.quantity,
            price = receipt.price,
            "holding added"
        );
        self.trades.notifier().info(
            PANEL,
            "Stock Added",
            format!(
                "Added {} shares of {} at {}",
                receipt.quantity,
                receipt.ticker,
                format_currency(receipt.price)
            ),
        );
        Ok(Some(held))
    }

    pub async fn remove_holding(&self, ticker: &str) -> Result<Option<Holding>, FetchError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(self.trades.reject(FetchError::validation("Please enter a stock ticker")));
        }
        if self.trades.is_torn_down().await {
            return Ok(None);
        }

        let removed = self.ledger.lock().await.remove(&ticker);
        let Some(held) = removed else {
            return Err(self.trades.reject(FetchError::validation(format!(
                "{ticker} is not in the portfolio"
            ))));
        };

        tracing::info!(%ticker, quantity = held.quantity, "holding removed");
        self.trades.notifier().info(
            PANEL,
            "Stock Removed",
            format!("Removed {ticker} from portfolio"),
        );
        Ok(Some(held))
    }

    pub async fn refresh_prices(&self) -> Settled<PriceRefresh> {
        let (tickers, epoch) = {
            let ledger = self.ledger.lock().await;
            (ledger.tickers(), ledger.epoch())
        };

        let backend = Arc::clone(&self.backend);
        let refresh = match self.quotes.execute(fan_out(backend, tickers)).await {
            Settled::Success(refresh) => refresh,
            other => return other,
        };

        {
            let mut ledger = self.ledger.lock().await;
            if ledger.epoch() != epoch {
                tracing::info!("ledger was reset during price refresh; not applied");
                return Settled::Superseded;
            }
            for (ticker, price) in &refresh.updated {
                ledger.apply_quote(ticker, *price);
            }
        }

        if !refresh.failed.is_empty() {
            let detail = refresh
                .failed
                .iter()
                .map(|(ticker, message)| format!("{ticker}: {message}"))
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(failed = refresh.failed.len(), %detail, "some prices could not be refreshed");
            self.quotes
                .notifier()
                .error(PANEL, "Error", format!("Could not refresh {detail}"));
        }
        Settled::Success(refresh)
    }

    pub async fn reset(&self) {
        if self.trades.is_torn_down().await {
            return;
        }
        let starting_balance = {
            let mut ledger = self.ledger.lock().await;
            ledger.reset();
            ledger.starting_balance()
        };
        self.trades.reset().await;
        self.quotes.reset().await;

        tracing::info!(starting_balance, "portfolio reset");
        self.trades.notifier().info(
            PANEL,
            "Portfolio Reset",
            format!("Cash restored to {}", format_currency(starting_balance)),
        );
    }

    pub async fn teardown(&self) {
        self.trades.teardown().await;
        self.quotes.teardown().await;
    }
}

async fn fan_out(backend: Arc<dyn Backend>, tickers: Vec<String>) -> Result<PriceRefresh, FetchError> {
    let requested = tickers.len();
    let mut tasks = JoinSet::new();
    for ticker in tickers {
        let backend = Arc::clone(&backend);
        tasks.spawn(async move {
            let quote = backend.get_price(&ticker).await;
            (ticker, quote)
        });
    }

    let mut refresh = PriceRefresh::default();
    let mut first_error: Option<(String, FetchError)> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((ticker, Ok(quote))) => {
                refresh.updated.insert(ticker, quote.price);
            }
            Ok((ticker, Err(err))) => {
                refresh.failed.insert(ticker.clone(), err.user_message());
                // Keep the alphabetically first failure so the outcome does
                // not depend on completion order.
                if first_error.as_ref().map_or(true, |(t, _)| ticker < *t) {
                    first_error = Some((ticker, err));
                }
            }
            Err(err) => tracing::error!(error = %err, "price task did not complete"),
        }
    }

    match first_error {
        Some((_, err)) if requested > 0 && refresh.updated.is_empty() => Err(err),
        _ => Ok(refresh),
    }
}
