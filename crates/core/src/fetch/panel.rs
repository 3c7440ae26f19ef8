use crate::fetch::{FetchError, FetchState};
use crate::notify::Notifier;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

const DEFAULT_FAILURE_TITLE: &str = "Error";
const VALIDATION_TITLE: &str = "Error";

#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Success(T),
    Failed(FetchError),
    Superseded,
    TornDown,
}

impl<T> Settled<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    state: FetchState<T>,
    torn_down: bool,
}

/// Request executor and view-state store for one mounted panel.
///
/// Every `execute` draws a ticket from a monotonically increasing counter. The
/// newest ticket wins: an older in-flight request is dropped as soon as a newer
/// one is issued, and its result is never applied. Handles are cheap to clone
/// and all clones share the same state.
#[derive(Debug)]
pub struct Panel<T> {
    name: &'static str,
    failure_title: &'static str,
    success_title: Option<&'static str>,
    slot: Arc<Mutex<Slot<T>>>,
    tickets: Arc<watch::Sender<u64>>,
    notifier: Notifier,
}

impl<T> Clone for Panel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            failure_title: self.failure_title,
            success_title: self.success_title,
            slot: Arc::clone(&self.slot),
            tickets: Arc::clone(&self.tickets),
            notifier: self.notifier.clone(),
        }
    }
}

impl<T: Clone> Panel<T> {
    pub fn new(name: &'static str, notifier: Notifier) -> Self {
        let (tickets, _) = watch::channel(0u64);
        Self {
            name,
            failure_title: DEFAULT_FAILURE_TITLE,
            success_title: None,
            slot: Arc::new(Mutex::new(Slot {
                state: FetchState::idle(),
                torn_down: false,
            })),
            tickets: Arc::new(tickets),
            notifier,
        }
    }

    pub fn with_failure_title(mut self, title: &'static str) -> Self {
        self.failure_title = title;
        self
    }

    pub fn with_success_title(mut self, title: &'static str) -> Self {
        self.success_title = Some(title);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn snapshot(&self) -> FetchState<T> {
        self.slot.lock().await.state.clone()
    }

    pub async fn is_torn_down(&self) -> bool {
        self.slot.lock().await.torn_down
    }

    pub async fn execute<F>(&self, request: F) -> Settled<T>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        self.run(request, None).await
    }

    /// Like [`Panel::execute`], and publishes `message` under the success
    /// title once the result is applied.
    pub async fn execute_announced<F>(&self, message: String, request: F) -> Settled<T>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        self.run(request, Some(message)).await
    }

    async fn run<F>(&self, request: F, announce: Option<String>) -> Settled<T>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        let mut ticket = 0;
        {
            let mut slot = self.slot.lock().await;
            if slot.torn_down {
                return Settled::TornDown;
            }
            self.tickets.send_modify(|latest| {
                *latest += 1;
                ticket = *latest;
            });
            slot.state.begin();
        }
        tracing::debug!(panel = self.name, ticket, "request issued");

        let mut watcher = self.tickets.subscribe();
        let result = tokio::select! {
            result = request => result,
            _ = superseded(&mut watcher, ticket) => {
                tracing::debug!(panel = self.name, ticket, "request cancelled by a newer one");
                return self.dropped().await;
            }
        };

        self.settle(ticket, result, announce).await
    }

    pub fn reject(&self, err: FetchError) -> FetchError {
        tracing::warn!(panel = self.name, kind = err.kind(), error = %err, "input rejected");
        self.notifier
            .error(self.name, VALIDATION_TITLE, err.user_message());
        err
    }

    pub async fn reset(&self) {
        let mut slot = self.slot.lock().await;
        self.tickets.send_modify(|latest| *latest += 1);
        slot.state.reset();
    }

    pub async fn teardown(&self) {
        let mut slot = self.slot.lock().await;
        slot.torn_down = true;
        self.tickets.send_modify(|latest| *latest += 1);
        tracing::debug!(panel = self.name, "panel torn down");
    }

    async fn dropped(&self) -> Settled<T> {
        if self.slot.lock().await.torn_down {
            Settled::TornDown
        } else {
            Settled::Superseded
        }
    }

    async fn settle(
        &self,
        ticket: u64,
        result: Result<T, FetchError>,
        announce: Option<String>,
    ) -> Settled<T> {
        let mut slot = self.slot.lock().await;
        if slot.torn_down {
            tracing::debug!(panel = self.name, ticket, "result arrived after teardown; ignored");
            return Settled::TornDown;
        }
        if *self.tickets.borrow() != ticket {
            tracing::warn!(panel = self.name, ticket, "discarding stale response");
            return Settled::Superseded;
        }

        match result {
            Ok(data) => {
                slot.state.succeed(data.clone(), Utc::now());
                drop(slot);
                tracing::info!(panel = self.name, ticket, "request succeeded");
                if let (Some(title), Some(message)) = (self.success_title, announce) {
                    self.notifier.info(self.name, title, message);
                }
                Settled::Success(data)
            }
            Err(err) => {
                let message = err.user_message();
                slot.state.fail(message.clone());
                drop(slot);
                tracing::warn!(
                    panel = self.name,
                    ticket,
                    kind = err.kind(),
                    error = %message,
                    "request failed"
                );
                self.notifier.error(self.name, self.failure_title, message);
                Settled::Failed(err)
            }
        }
    }
}

async fn superseded(watcher: &mut watch::Receiver<u64>, ticket: u64) {
    loop {
        if *watcher.borrow_and_update() != ticket {
            return;
        }
        if watcher.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
