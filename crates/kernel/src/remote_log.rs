//! Forwarding of local log events to the server log.
//!
//! [`RemoteLogLayer`] sits in the host's subscriber stack and copies events
//! into a [`RemoteLogSink`] while the sink is enabled. The engine drains the
//! sink on every tick and sends each record as a `Log` command.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use worldlink_protocol::LogSeverity;

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLogRecord {
    pub message: String,
    /// `None` for trace and debug, which the server logs by default.
    pub severity: Option<LogSeverity>,
}

/// Shared queue between the layer and the engine. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RemoteLogSink {
    records: Arc<Mutex<Vec<RemoteLogRecord>>>,
    enabled: Arc<AtomicBool>,
    forwarding: Arc<AtomicBool>,
}

impl RemoteLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer feeding this sink.
    pub fn layer(&self) -> RemoteLogLayer {
        RemoteLogLayer { sink: self.clone() }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.records.lock().clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enabled and not in the middle of [`forward`](Self::forward).
    pub fn is_capturing(&self) -> bool {
        self.is_enabled() && !self.forwarding.load(Ordering::Relaxed)
    }

    pub fn push(&self, record: RemoteLogRecord) {
        if self.is_enabled() {
            self.records.lock().push(record);
        }
    }

    pub fn drain(&self) -> Vec<RemoteLogRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    /// Drain the queue into `send`. Events logged while sending are not
    /// captured, so forwarded records never produce new ones.
    pub fn forward(&self, mut send: impl FnMut(RemoteLogRecord)) -> usize {
        let records = self.drain();
        let count = records.len();
        self.forwarding.store(true, Ordering::Relaxed);
        for record in records {
            send(record);
        }
        self.forwarding.store(false, Ordering::Relaxed);
        count
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

pub fn severity_for(level: &Level) -> Option<LogSeverity> {
    match *level {
        Level::ERROR => Some(LogSeverity::Error),
        Level::WARN => Some(LogSeverity::Warn),
        Level::INFO => Some(LogSeverity::Info),
        _ => None,
    }
}

/// `tracing` layer capturing events for the server log.
#[derive(Debug, Clone)]
pub struct RemoteLogLayer {
    sink: RemoteLogSink,
}

impl<S: Subscriber> Layer<S> for RemoteLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.sink.is_capturing() {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink.push(RemoteLogRecord {
            message: visitor.finish(),
            severity: severity_for(event.metadata().level()),
        });
    }
}

/// Flattens an event into `message key=value ...`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        format!("{} {}", self.message, self.fields.join(" "))
    }
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn severity_mapping() {
        assert_eq!(severity_for(&Level::ERROR), Some(LogSeverity::Error));
        assert_eq!(severity_for(&Level::WARN), Some(LogSeverity::Warn));
        assert_eq!(severity_for(&Level::INFO), Some(LogSeverity::Info));
        assert_eq!(severity_for(&Level::DEBUG), None);
        assert_eq!(severity_for(&Level::TRACE), None);
    }

    #[test]
    fn layer_captures_only_when_enabled() {
        let sink = RemoteLogSink::new();
        let subscriber = tracing_subscriber::registry().with(sink.layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("before");
            sink.set_enabled(true);
            tracing::warn!(entity = 42, "mesh missing");
            tracing::debug!("detail");
        });
        let records = sink.drain();
        assert_eq!(
            records,
            vec![
                RemoteLogRecord {
                    message: "mesh missing entity=42".into(),
                    severity: Some(LogSeverity::Warn),
                },
                RemoteLogRecord {
                    message: "detail".into(),
                    severity: None,
                },
            ]
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn events_during_forward_are_not_captured() {
        let sink = RemoteLogSink::new();
        sink.set_enabled(true);
        let subscriber = tracing_subscriber::registry().with(sink.layer());
        let mut sent = Vec::new();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("first");
            let count = sink.forward(|record| {
                tracing::trace!(?record, "outbound");
                sent.push(record);
            });
            assert_eq!(count, 1);
            tracing::info!("second");
        });
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sink.drain(),
            vec![RemoteLogRecord {
                message: "second".into(),
                severity: Some(LogSeverity::Info),
            }]
        );
    }

    #[test]
    fn disabling_clears_queue() {
        let sink = RemoteLogSink::new();
        sink.set_enabled(true);
        sink.push(RemoteLogRecord {
            message: "x".into(),
            severity: None,
        });
        assert_eq!(sink.len(), 1);
        sink.set_enabled(false);
        assert!(sink.is_empty());
    }
}
