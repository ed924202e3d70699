//! Progress and error notifications.
//!
//! Every significant operation (opening, commands, import, export, compaction)
//! publishes onto a single broadcast channel. Each subscriber gets its own
//! ordered stream; a subscriber that falls behind receives `Lagged` and skips
//! ahead instead of blocking the worker or anyone else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as _;
use tokio::sync::broadcast;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoEvent {
    pub message: String,
    /// Fraction in `[0, 1]` when the operation reports progress.
    pub progress: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEvent {
    pub message: String,
    pub progress: Option<f32>,
    pub code: String,
    pub attributes: BTreeMap<String, String>,
    pub remediation: Option<String>,
    pub cause: Option<String>,
}

impl ErrorEvent {
    pub fn from_error(err: &StoreError, progress: Option<f32>) -> Self {
        Self {
            message: err.to_string(),
            progress,
            code: err.code().as_str().to_string(),
            attributes: err.attributes(),
            remediation: err.remediation().map(str::to_string),
            cause: err.source().map(|s| s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Info(InfoEvent),
    Error(ErrorEvent),
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn message(&self) -> &str {
        match &self.kind {
            EventKind::Info(info) => &info.message,
            EventKind::Error(err) => &err.message,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match &self.kind {
            EventKind::Error(err) => Some(err),
            EventKind::Info(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(EventKind::Info(InfoEvent {
            message: message.into(),
            progress: None,
        }));
    }

    pub fn progress(&self, message: impl Into<String>, fraction: f32) {
        self.emit(EventKind::Info(InfoEvent {
            message: message.into(),
            progress: Some(fraction.clamp(0.0, 1.0)),
        }));
    }

    pub fn error(&self, err: &StoreError) {
        self.error_at(err, None);
    }

    pub fn error_at(&self, err: &StoreError, progress: Option<f32>) {
        tracing::warn!(code = %err.code(), error = %err, "Store error");
        self.emit(EventKind::Error(ErrorEvent::from_error(
            err,
            progress.map(|p| p.clamp(0.0, 1.0)),
        )));
    }

    /// Publishes to all current subscribers. Without subscribers the event is dropped.
    pub fn emit(&self, kind: EventKind) {
        let event = Event {
            at: Utc::now(),
            kind,
        };
        tracing::debug!(
            text = event.message(),
            subscriber_count = self.tx.receiver_count(),
            "Event"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.info("first");
        bus.progress("second", 0.5);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap().message(), "first");
            let second = rx.recv().await.unwrap();
            assert!(matches!(
                second.kind,
                EventKind::Info(InfoEvent { progress: Some(p), .. }) if p == 0.5
            ));
        }
    }

    #[tokio::test]
    async fn test_error_event_carries_context() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.error(&StoreError::File {
            path: "/data/a.png".into(),
            reason: "truncated".to_string(),
        });

        let event = rx.recv().await.unwrap();
        let err = event.as_error().unwrap();
        assert_eq!(err.code, "error-file");
        assert_eq!(err.attributes.get("path").map(String::as_str), Some("/data/a.png"));
        assert!(err.remediation.is_none());
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_without_blocking() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();
        for i in 0..5 {
            bus.info(format!("event {i}"));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(slow.recv().await.unwrap().message(), "event 3");
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let bus = EventBus::new(1);
        bus.info("nobody listens");
        assert_eq!(bus.subscriber_count(), 0);
    }
}
