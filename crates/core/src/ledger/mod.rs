mod portfolio;

pub use portfolio::{Portfolio, PriceRefresh};

use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

pub const DEFAULT_STARTING_BALANCE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub ticker: String,
    pub quantity: u32,
    pub purchase_price: f64,
    pub current_price: Option<f64>,
}

impl Holding {
    pub fn cost_basis(&self) -> f64 {
        self.purchase_price * f64::from(self.quantity)
    }

    pub fn profit_loss(&self) -> Option<f64> {
        self.current_price
            .map(|current| (current - self.purchase_price) * f64::from(self.quantity))
    }

    pub fn market_value(&self) -> Option<f64> {
        self.current_price
            .map(|current| current * f64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Not enough cash: need ${needed:.2}, available ${available:.2}")]
    InsufficientFunds { needed: f64, available: f64 },
    #[error("Position in {ticker} is too large")]
    PositionTooLarge { ticker: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingSummary {
    pub ticker: String,
    pub quantity: u32,
    pub purchase_price: f64,
    pub current_price: Option<f64>,
    pub market_value: Option<f64>,
    pub profit_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub starting_balance: f64,
    pub cash: f64,
    pub market_value: f64,
    pub total_value: f64,
    pub total_return: f64,
    pub return_percent: f64,
    pub holdings: Vec<HoldingSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    starting_balance: f64,
    cash: f64,
    holdings: BTreeMap<String, Holding>,
    epoch: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_BALANCE)
    }
}

impl Ledger {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            starting_balance,
            cash: starting_balance,
            holdings: BTreeMap::new(),
            epoch: 0,
        }
    }

    pub fn starting_balance(&self) -> f64 {
        self.starting_balance
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        self.holdings.get(ticker)
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.holdings.keys().cloned().collect()
    }

    pub fn preview_buy(&self, ticker: &str, quantity: u32, price: f64) -> Result<Holding, LedgerError> {
        let cost = price * f64::from(quantity);
        if cost > self.cash {
            return Err(LedgerError::InsufficientFunds {
                needed: cost,
                available: self.cash,
            });
        }

        match self.holdings.get(ticker) {
            Some(held) => {
                let total = held.quantity.checked_add(quantity).ok_or_else(|| {
                    LedgerError::PositionTooLarge {
                        ticker: ticker.to_string(),
                    }
                })?;
                Ok(Holding {
                    ticker: ticker.to_string(),
                    quantity: total,
                    purchase_price: (held.cost_basis() + cost) / f64::from(total),
                    current_price: Some(price),
                })
            }
            None => Ok(Holding {
                ticker: ticker.to_string(),
                quantity,
                purchase_price: price,
                current_price: Some(price),
            }),
        }
    }

    pub fn buy(&mut self, ticker: &str, quantity: u32, price: f64) -> Result<&Holding, LedgerError> {
        let merged = self.preview_buy(ticker, quantity, price)?;
        self.cash -= price * f64::from(quantity);
        match self.holdings.entry(ticker.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(merged);
                Ok(slot.into_mut())
            }
            Entry::Vacant(slot) => Ok(slot.insert(merged)),
        }
    }

    /// Sells the whole position at its last known price, or at cost when no
    /// quote has arrived yet.
    pub fn remove(&mut self, ticker: &str) -> Option<Holding> {
        let held = self.holdings.remove(ticker)?;
        self.cash += held.market_value().unwrap_or_else(|| held.cost_basis());
        Some(held)
    }

    pub fn apply_quote(&mut self, ticker: &str, price: f64) -> bool {
        match self.holdings.get_mut(ticker) {
            Some(held) => {
                held.current_price = Some(price);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.holdings.clear();
        self.cash = self.starting_balance;
        self.epoch += 1;
    }

    pub fn summary(&self) -> LedgerSummary {
        let holdings: Vec<HoldingSummary> = self
            .holdings
            .values()
            .map(|h| HoldingSummary {
                ticker: h.ticker.clone(),
                quantity: h.quantity,
                purchase_price: h.purchase_price,
                current_price: h.current_price,
                market_value: h.market_value(),
                profit_loss: h.profit_loss(),
            })
            .collect();
        let market_value: f64 = holdings.iter().filter_map(|h| h.market_value).sum();
        let total_value = market_value + self.cash;
        let total_return = total_value - self.starting_balance;
        let return_percent = if self.starting_balance > 0.0 {
            total_return / self.starting_balance * 100.0
        } else {
            0.0
        };

        LedgerSummary {
            starting_balance: self.starting_balance,
            cash: self.cash,
            market_value,
            total_value,
            total_return,
            return_percent,
            holdings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_debits_cash_and_records_holding() {
        let mut ledger = Ledger::default();
        let held = ledger.buy("AAPL", 10, 150.0).unwrap().clone();
        assert_eq!(held.quantity, 10);
        assert_eq!(held.purchase_price, 150.0);
        assert_eq!(ledger.cash(), 8_500.0);
    }

    #[test]
    fn insufficient_funds_leaves_ledger_untouched() {
        let mut ledger = Ledger::default();
        ledger.buy("AAPL", 10, 150.0).unwrap();
        let before = ledger.clone();

        let err = ledger.buy("NVDA", 100, 900.0).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                needed: 90_000.0,
                available: 8_500.0
            }
        );
        assert_eq!(err.to_string(), "Not enough cash: need $90000.00, available $8500.00");
        assert_eq!(ledger, before);
    }

    #[test]
    fn spending_exactly_the_balance_is_allowed() {
        let mut ledger = Ledger::new(1_000.0);
        ledger.buy("F", 100, 10.0).unwrap();
        assert_eq!(ledger.cash(), 0.0);
    }

    #[test]
    fn repeat_buys_merge_at_weighted_average() {
        let mut ledger = Ledger::default();
        ledger.buy("MSFT", 2, 100.0).unwrap();
        let held = ledger.buy("MSFT", 6, 200.0).unwrap().clone();

        assert_eq!(held.quantity, 8);
        assert_eq!(held.purchase_price, 175.0);
        assert_eq!(ledger.cash(), 10_000.0 - 200.0 - 1_200.0);
        assert_eq!(ledger.tickers(), vec!["MSFT".to_string()]);
    }

    #[test]
    fn preview_buy_does_not_change_the_book() {
        let mut ledger = Ledger::default();
        ledger.buy("MSFT", 2, 100.0).unwrap();
        let before = ledger.clone();

        let merged = ledger.preview_buy("MSFT", 2, 300.0).unwrap();
        assert_eq!(merged.quantity, 4);
        assert_eq!(merged.purchase_price, 200.0);
        assert_eq!(ledger, before);
        assert!(matches!(
            ledger.preview_buy("MSFT", u32::MAX, 0.0),
            Err(LedgerError::PositionTooLarge { .. })
        ));
    }

    #[test]
    fn remove_sells_at_last_known_price() {
        let mut ledger = Ledger::default();
        ledger.buy("AAPL", 10, 100.0).unwrap();
        ledger.apply_quote("AAPL", 120.0);

        let sold = ledger.remove("AAPL").unwrap();
        assert_eq!(sold.quantity, 10);
        assert!(ledger.is_empty());
        assert_eq!(ledger.cash(), 9_000.0 + 1_200.0);
        assert_eq!(ledger.remove("AAPL"), None);
        assert_eq!(ledger.epoch(), 0);
    }

    #[test]
    fn remove_without_quote_refunds_cost() {
        let mut ledger = Ledger::default();
        ledger.buy("AMD", 4, 50.0).unwrap();
        ledger.holdings.get_mut("AMD").unwrap().current_price = None;

        ledger.remove("AMD").unwrap();
        assert_eq!(ledger.cash(), DEFAULT_STARTING_BALANCE);
    }

    #[test]
    fn reset_restores_starting_balance_and_bumps_epoch() {
        let mut ledger = Ledger::default();
        ledger.buy("AAPL", 3, 100.0).unwrap();
        ledger.buy("TSLA", 1, 250.0).unwrap();

        ledger.reset();
        assert!(ledger.is_empty());
        assert_eq!(ledger.cash(), DEFAULT_STARTING_BALANCE);
        assert_eq!(ledger.epoch(), 1);
    }

    #[test]
    fn summary_tracks_profit_and_loss() {
        let mut ledger = Ledger::default();
        ledger.buy("AAPL", 10, 100.0).unwrap();
        ledger.buy("TSLA", 2, 250.0).unwrap();
        assert!(ledger.apply_quote("AAPL", 110.0));
        assert!(ledger.apply_quote("TSLA", 200.0));
        assert!(!ledger.apply_quote("GOOG", 1.0));

        let summary = ledger.summary();
        assert_eq!(summary.cash, 8_500.0);
        assert_eq!(summary.market_value, 1_100.0 + 400.0);
        assert_eq!(summary.total_value, 10_000.0);
        assert_eq!(summary.total_return, 0.0);

        let aapl = &summary.holdings[0];
        assert_eq!(aapl.ticker, "AAPL");
        assert_eq!(aapl.profit_loss, Some(100.0));
        assert_eq!(summary.holdings[1].profit_loss, Some(-100.0));
    }

    #[test]
    fn holding_without_quote_has_no_profit_loss() {
        let held = Holding {
            ticker: "AMD".into(),
            quantity: 4,
            purchase_price: 50.0,
            current_price: None,
        };
        assert_eq!(held.profit_loss(), None);
        assert_eq!(held.market_value(), None);
        assert_eq!(held.cost_basis(), 200.0);
    }
}
