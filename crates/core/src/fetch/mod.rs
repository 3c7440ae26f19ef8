//! The view-state lifecycle every panel shares: `idle -> loading -> success | error`.

pub mod error;
pub mod panel;

pub use error::FetchError;
pub use panel::{Panel, Settled};

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Current status of one panel.
///
/// `data` is present exactly when the status is `Success`, and `error` exactly
/// when it is `Error`. The previous payload moves to `stale` while a newer
/// request is loading or after it failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchState<T> {
    status: FetchStatus,
    data: Option<T>,
    stale: Option<T>,
    error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            stale: None,
            error: None,
            last_updated: None,
        }
    }
}

impl<T> FetchState<T> {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn stale(&self) -> Option<&T> {
        self.stale.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn begin(&mut self) {
        if let Some(previous) = self.data.take() {
            self.stale = Some(previous);
        }
        self.status = FetchStatus::Loading;
        self.error = None;
    }

    pub fn succeed(&mut self, data: T, at: DateTime<Utc>) {
        self.status = FetchStatus::Success;
        self.data = Some(data);
        self.stale = None;
        self.error = None;
        self.last_updated = Some(at);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if let Some(previous) = self.data.take() {
            self.stale = Some(previous);
        }
        self.status = FetchStatus::Error;
        self.error = Some(message.into());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
