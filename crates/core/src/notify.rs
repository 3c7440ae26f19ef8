use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub panel: String,
    pub level: Level,
    pub title: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn info(&self, panel: &str, title: &str, message: impl Into<String>) {
        self.publish(panel, Level::Info, title, message.into());
    }

    pub fn error(&self, panel: &str, title: &str, message: impl Into<String>) {
        self.publish(panel, Level::Error, title, message.into());
    }

    fn publish(&self, panel: &str, level: Level, title: &str, message: String) {
        let notification = Notification {
            id: Uuid::new_v4(),
            panel: panel.to_string(),
            level,
            title: title.to_string(),
            message,
            at: Utc::now(),
        };
        let _ = self.tx.send(notification);
    }
}

#[derive(Debug, Clone)]
pub struct NotificationLog {
    entries: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(notification);
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let notifier = Notifier::default();
        notifier.error("news", "Error", "backend down");
    }

    #[test]
    fn subscribers_receive_published_notifications() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();

        notifier.error("price", "Analysis Failed", "Server error: 500");
        notifier.info("portfolio", "Portfolio Reset", "reset");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.panel, "price");
        assert_eq!(first.level, Level::Error);
        assert_eq!(first.message, "Server error: 500");
        assert_eq!(rx.try_recv().unwrap().title, "Portfolio Reset");
    }

    #[test]
    fn log_keeps_only_the_newest_entries() {
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        let mut log = NotificationLog::new(2);
        for i in 0..3 {
            notifier.info("news", "Info", format!("n{i}"));
            log.push(rx.try_recv().unwrap());
        }
        let messages: Vec<_> = log.entries().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["n1", "n2"]);
    }
}
