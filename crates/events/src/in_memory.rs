//! In-memory append-only event store.
//!
//! Intended for tests, simulation buffers and reference semantics. Not
//! optimized for performance.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use stratum_core::{ExpectedVersion, SequenceNumber, Version};

use crate::store::{
    EventStore, EventStoreError, ReadDirection, StoredEvent, StreamName, StreamSelector,
    UncommittedEvent,
};

#[derive(Debug, Default)]
struct Inner {
    /// Global log in sequence order. Stream deletion removes entries but the
    /// sequence counter never rewinds.
    log: Vec<StoredEvent>,
    versions: HashMap<StreamName, Version>,
    last_sequence: SequenceNumber,
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_poisoned() -> EventStoreError {
    EventStoreError::Backend("event store lock poisoned".to_string())
}

fn selected(selector: &StreamSelector, event: &StoredEvent) -> bool {
    match selector {
        StreamSelector::Stream(name) => &event.stream_name == name,
        StreamSelector::All => true,
        StreamSelector::Category(prefix) => event.stream_name.has_prefix(prefix),
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        stream: &StreamName,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;

        let current = inner.versions.get(stream).copied().unwrap_or_default();
        if !expected_version.matches(current) {
            return Err(EventStoreError::ConcurrencyConflict {
                stream: stream.clone(),
                expected: expected_version,
                actual: current,
            });
        }

        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut version = current;
        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            let sequence = inner.last_sequence.next();
            version = version.next();
            let stored = StoredEvent {
                event_id: event.event_id,
                stream_name: stream.clone(),
                sequence_number: sequence,
                stream_version: version,
                event_type: event.event_type,
                payload: event.payload,
                metadata: event.metadata,
                recorded_at: Utc::now(),
            };
            inner.last_sequence = sequence;
            inner.log.push(stored.clone());
            committed.push(stored);
        }
        inner.versions.insert(stream.clone(), version);

        tracing::debug!(
            stream = %stream,
            count = committed.len(),
            version = %version,
            "appended events"
        );

        Ok(committed)
    }

    fn read(
        &self,
        selector: &StreamSelector,
        from: SequenceNumber,
        direction: ReadDirection,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        let mut events: Vec<StoredEvent> = match direction {
            ReadDirection::Forward => inner
                .log
                .iter()
                .filter(|e| e.sequence_number >= from && selected(selector, e))
                .cloned()
                .collect(),
            ReadDirection::Backward => inner
                .log
                .iter()
                .filter(|e| e.sequence_number <= from && selected(selector, e))
                .cloned()
                .collect(),
        };
        if direction == ReadDirection::Backward {
            events.reverse();
        }
        Ok(events)
    }

    fn delete_stream(&self, stream: &StreamName) -> Result<(), EventStoreError> {
        let mut inner = self.inner.write().map_err(|_| lock_poisoned())?;
        inner.log.retain(|e| &e.stream_name != stream);
        inner.versions.remove(stream);
        tracing::debug!(stream = %stream, "deleted stream");
        Ok(())
    }

    fn last_sequence_number(&self) -> Result<SequenceNumber, EventStoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.last_sequence)
    }

    fn current_version(&self, stream: &StreamName) -> Result<Version, EventStoreError> {
        let inner = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(inner.versions.get(stream).copied().unwrap_or_default())
    }
}
