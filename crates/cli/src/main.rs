use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockinsight_core::backend::{Backend, HttpBackend};
use stockinsight_core::config::Settings;
use stockinsight_core::dashboard::Dashboard;
use stockinsight_core::fetch::Settled;
use stockinsight_core::notify::{Level, Notification, Notifier};
use stockinsight_core::panels::{
    GlobalIndicesPanel, NewsAnalysisPanel, NewsFeedPanel, PortfolioPanel, PriceAnalysisPanel,
    SentimentPanel, TechnicalAnalysisPanel, DEFAULT_RISK_REWARD_RATIO,
};
use stockinsight_core::render::View;

#[derive(Debug, Parser)]
#[command(name = "stockinsight", about = "Stock analysis dashboard in the terminal")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Latest market news.
    News {
        /// Only news about this ticker. Defaults to NEWS_SYMBOL.
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Price snapshot plus related news for a company.
    NewsAnalysis { company: String },
    /// Current price, change and volatility.
    Price { symbol: String },
    /// Sentiment of recent coverage.
    Sentiment { symbol: String },
    /// Entry, stop loss and target levels.
    Technical {
        symbol: String,
        /// Between 1 and 5.
        #[arg(long, default_value_t = DEFAULT_RISK_REWARD_RATIO)]
        risk_reward: f64,
    },
    /// Major indices with a trend sparkline.
    Indices {
        /// Defaults to INDICES_REGION.
        #[arg(long)]
        region: Option<String>,
    },
    /// Simulated portfolio. Starts from STARTING_CASH on every run.
    Portfolio {
        /// Buy order as TICKER:QUANTITY. Repeatable.
        #[arg(long = "buy", value_parser = parse_order)]
        orders: Vec<Order>,
        /// Sell a whole position after buying. Repeatable.
        #[arg(long = "remove", value_name = "TICKER")]
        removals: Vec<String>,
        /// Re-price holdings after buying.
        #[arg(long)]
        refresh: bool,
    },
    /// Backend health check.
    Health,
    /// Every panel, refreshed on its own timer until ctrl-c.
    Watch {
        /// Refresh everything once, print, and exit.
        #[arg(long)]
        once: bool,
        /// Seconds between redraws.
        #[arg(long, default_value_t = 10)]
        redraw_secs: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Order {
    ticker: String,
    quantity: i64,
}

fn parse_order(raw: &str) -> Result<Order, String> {
    let (ticker, quantity) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected TICKER:QUANTITY, got {raw:?}"))?;
    let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("quantity must be a whole number, got {quantity:?}"))?;
    Ok(Order {
        ticker: ticker.trim().to_string(),
        quantity,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let backend: Arc<dyn Backend> = Arc::new(
        HttpBackend::from_settings(&settings).context("backend client setup failed")?,
    );
    let notifier = Notifier::default();
    let mut toasts = notifier.subscribe();

    let ok = match run(args.command, &settings, backend, notifier, &mut toasts).await {
        Ok(ok) => ok,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            return Err(e);
        }
    };
    print_notifications(&mut toasts);

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Runs one command and prints its view. Returns false when the panel ended
/// in an error state.
async fn run(
    command: Command,
    settings: &Settings,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    toasts: &mut broadcast::Receiver<Notification>,
) -> anyhow::Result<bool> {
    let now = Utc::now();
    let ok = match command {
        Command::News { symbol } => {
            let symbol = symbol.or_else(|| Some(settings.news_symbol.clone()));
            let panel = NewsFeedPanel::new(backend, notifier, symbol);
            let settled = panel.refresh().await;
            show(&panel.render(now).await, &settled)
        }
        Command::NewsAnalysis { company } => {
            let panel = NewsAnalysisPanel::new(backend, notifier);
            let settled = panel.analyze(&company).await;
            show(&panel.render(now).await, &settled)
        }
        Command::Price { symbol } => {
            let panel = PriceAnalysisPanel::new(backend, notifier);
            let settled = panel.analyze(&symbol).await;
            show(&panel.render().await, &settled)
        }
        Command::Sentiment { symbol } => {
            let panel = SentimentPanel::new(backend, notifier);
            let settled = panel.analyze(&symbol).await;
            show(&panel.render().await, &settled)
        }
        Command::Technical {
            symbol,
            risk_reward,
        } => {
            let panel = TechnicalAnalysisPanel::new(backend, notifier);
            let settled = panel.analyze(&symbol, Some(risk_reward)).await;
            show(&panel.render().await, &settled)
        }
        Command::Indices { region } => {
            let region = region.unwrap_or_else(|| settings.indices_region.clone());
            let panel = GlobalIndicesPanel::new(backend, notifier, region);
            let settled = panel.refresh().await;
            show(&panel.render().await, &settled)
        }
        Command::Portfolio {
            orders,
            removals,
            refresh,
        } => {
            let panel = PortfolioPanel::new(backend, notifier, settings.starting_cash);
            let mut ok = true;
            for order in &orders {
                if let Err(e) = panel.add_holding(&order.ticker, order.quantity).await {
                    tracing::warn!(ticker = %order.ticker, error = %e, "buy order failed");
                    ok = false;
                }
            }
            for ticker in &removals {
                if let Err(e) = panel.remove_holding(ticker).await {
                    tracing::warn!(%ticker, error = %e, "remove failed");
                    ok = false;
                }
            }
            if refresh {
                ok &= !matches!(panel.refresh_prices().await, Settled::Failed(_));
            }
            println!("{}", panel.render().await);
            ok
        }
        Command::Health => match backend.health().await {
            Ok(health) => {
                println!("{}: {}", health.status, health.message);
                true
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                false
            }
        },
        Command::Watch { once, redraw_secs } => {
            let dashboard = Dashboard::new(settings, backend, notifier);
            if once {
                dashboard.refresh_once().await;
                println!("{}", dashboard.render(Utc::now()).await);
            } else {
                watch(&dashboard, Duration::from_secs(redraw_secs.max(1)), toasts).await?;
            }
            true
        }
    };
    Ok(ok)
}

async fn watch(
    dashboard: &Dashboard,
    redraw: Duration,
    toasts: &mut broadcast::Receiver<Notification>,
) -> anyhow::Result<()> {
    dashboard.mount().await;
    let mut ticker = tokio::time::interval(redraw);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c failed")?;
                break;
            }
            _ = ticker.tick() => {
                print_notifications(toasts);
                println!("{}", dashboard.render(Utc::now()).await);
            }
        }
    }
    dashboard.unmount().await;
    Ok(())
}

fn show<T>(view: &View, settled: &Settled<T>) -> bool {
    println!("{view}");
    !matches!(settled, Settled::Failed(_)) && !matches!(view, View::Error { .. })
}

fn print_notifications(rx: &mut broadcast::Receiver<Notification>) {
    loop {
        match rx.try_recv() {
            Ok(n) => {
                let level = match n.level {
                    Level::Info => "info",
                    Level::Error => "error",
                };
                eprintln!("[{level}] {}: {}", n.title, n.message);
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "dropped notifications");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
