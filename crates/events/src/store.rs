//! The event log contract: streams, append with optimistic concurrency,
//! forward/backward reads and stream deletion.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use stratum_core::{EventId, ExpectedVersion, SequenceNumber, Version};

use crate::event::Event;

/// Name of an event stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl core::fmt::Display for StreamName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event ready to be appended to a stream (no sequence number yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: EventId,
    pub event_type: String,
    pub payload: JsonValue,
    pub metadata: JsonMap<String, JsonValue>,
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event.
    pub fn from_typed<E>(
        event: &E,
        metadata: JsonMap<String, JsonValue>,
    ) -> Result<Self, EventStoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::Serialization(format!("payload serialization failed: {e}"))
        })?;
        Ok(Self {
            event_id: EventId::new(),
            event_type: event.event_type().to_string(),
            payload,
            metadata,
        })
    }
}

/// A recorded event: owned by its stream, positioned in the global log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub stream_name: StreamName,

    /// Global position; strictly increasing, never reused.
    pub sequence_number: SequenceNumber,
    /// Position within the stream.
    pub stream_version: Version,

    pub event_type: String,
    pub payload: JsonValue,
    pub metadata: JsonMap<String, JsonValue>,
    pub recorded_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Deserialize the payload into a typed event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, EventStoreError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            EventStoreError::Serialization(format!(
                "payload deserialization of '{}' failed: {e}",
                self.event_type
            ))
        })
    }

    /// Strip the assigned positions, e.g. to re-append a buffered event to
    /// another store.
    pub fn to_uncommitted(&self) -> UncommittedEvent {
        UncommittedEvent {
            event_id: self.event_id,
            event_type: self.event_type.clone(),
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A pending write: target stream, ordered event batch, expected version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsToPublish<E> {
    pub stream_name: StreamName,
    pub events: Vec<E>,
    pub expected_version: ExpectedVersion,
}

impl<E> EventsToPublish<E> {
    pub fn new(stream_name: StreamName, events: Vec<E>, expected_version: ExpectedVersion) -> Self {
        Self {
            stream_name,
            events,
            expected_version,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Event store operation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed; retryable after re-reading state.
    #[error("concurrency conflict on stream '{stream}': expected {expected:?}, actual {actual}")]
    ConcurrencyConflict {
        stream: StreamName,
        expected: ExpectedVersion,
        actual: Version,
    },

    #[error("payload (de)serialization failed: {0}")]
    Serialization(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl EventStoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }
}

/// Which part of the log to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSelector {
    /// A single named stream.
    Stream(StreamName),
    /// The virtual stream over all events in global order.
    All,
    /// All streams whose name starts with the given prefix.
    Category(String),
}

/// Read direction relative to the global sequence order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadDirection {
    Forward,
    Backward,
}

/// Append-only event log.
///
/// The log is the single point of real concurrency control: every append
/// carries an expected version for the target stream and fails with
/// [`EventStoreError::ConcurrencyConflict`] when it is stale, writing
/// nothing. Global sequence numbers are assigned on append, strictly
/// increasing and never reused, even across stream deletion.
pub trait EventStore: Send + Sync {
    /// Append events to a stream, checking the expected version first.
    fn append(
        &self,
        stream: &StreamName,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Read events in sequence order.
    ///
    /// `Forward` yields events with a sequence number `>= from` in ascending
    /// order; `Backward` yields events with a sequence number `<= from` in
    /// descending order.
    fn read(
        &self,
        selector: &StreamSelector,
        from: SequenceNumber,
        direction: ReadDirection,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Physically delete a stream. Destructive and idempotent; global
    /// sequence numbers of other streams are unaffected.
    fn delete_stream(&self, stream: &StreamName) -> Result<(), EventStoreError>;

    /// The highest sequence number assigned so far.
    fn last_sequence_number(&self) -> Result<SequenceNumber, EventStoreError>;

    /// The current version of a stream (0 if it does not exist).
    fn current_version(&self, stream: &StreamName) -> Result<Version, EventStoreError>;
}

impl<S> EventStore for std::sync::Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        stream: &StreamName,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(stream, events, expected_version)
    }

    fn read(
        &self,
        selector: &StreamSelector,
        from: SequenceNumber,
        direction: ReadDirection,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).read(selector, from, direction)
    }

    fn delete_stream(&self, stream: &StreamName) -> Result<(), EventStoreError> {
        (**self).delete_stream(stream)
    }

    fn last_sequence_number(&self) -> Result<SequenceNumber, EventStoreError> {
        (**self).last_sequence_number()
    }

    fn current_version(&self, stream: &StreamName) -> Result<Version, EventStoreError> {
        (**self).current_version(stream)
    }
}
