//! Event sinks.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

/// Receives pipeline events.
///
/// Called synchronously by the pipeline, under its lock when shared, so
/// implementations must not block and must never panic.
pub trait EventSink: Send + Sync {
    /// Emits an event of the given type (see [`names`](super::names)).
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event. Installed on new pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// An event kept by a [`RecordingEventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Event type, one of [`names`](super::names).
    pub event_type: String,
    /// Payload as emitted.
    pub data: Option<Value>,
}

impl RecordedEvent {
    /// Returns a payload field, if the payload is an object holding `key`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }
}

/// Keeps every event in emission order, for front-ends that replay pipeline
/// history and for tests.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Returns the recorded events of exactly this type.
    #[must_use]
    pub fn of_type(&self, event_type: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns how many events of this type were recorded.
    #[must_use]
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|event| event.event_type == event_type)
            .count()
    }

    /// Returns the most recent event of this type.
    #[must_use]
    pub fn last(&self, event_type: &str) -> Option<RecordedEvent> {
        self.events
            .read()
            .iter()
            .rev()
            .find(|event| event.event_type == event_type)
            .cloned()
    }

    /// Forgets all recorded events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push(RecordedEvent {
            event_type: event_type.to_owned(),
            data,
        });
    }
}
