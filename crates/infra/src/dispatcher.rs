//! Command execution pipeline.
//!
//! `CommandDispatcher` routes a command through the bus (validation against
//! the live projection), serializes the decided events and appends them to
//! the log with the expected version. The initiating command is recorded in
//! each event's metadata so a later rebase can replay it; a `causation_id`
//! groups the events of one dispatch.
//!
//! The dispatcher does not feed projections; committed events reach them
//! through the subscription engine's catch-up.

use serde_json::{Map as JsonMap, Value as JsonValue, json};
use thiserror::Error;
use uuid::Uuid;

use stratum_core::DomainError;
use stratum_events::{
    EventStore, EventStoreError, StoredEvent, StreamName, UncommittedEvent,
};
use stratum_graph::{Command, CommandBus};

use crate::projection::GraphProjection;
use std::sync::Arc;

/// Metadata key carrying the serialized initiating command.
pub const INITIATING_COMMAND_METADATA_KEY: &str = "initiating_command";
/// Metadata key grouping all events of one dispatch.
pub const CAUSATION_ID_METADATA_KEY: &str = "causation_id";

#[derive(Debug, Error)]
pub enum DispatchError {
    /// A domain rule was broken; no event was produced.
    #[error("constraint violation: {0}")]
    Constraint(#[from] DomainError),

    /// Stale expected version on append; retryable after re-reading state.
    #[error("concurrency conflict on stream '{stream}': {message}")]
    Concurrency { stream: StreamName, message: String },

    #[error("event store error: {0}")]
    Store(EventStoreError),

    #[error("command serialization failed: {0}")]
    Serialization(String),
}

impl DispatchError {
    /// Whether re-reading current state and re-attempting can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Concurrency { .. })
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::ConcurrencyConflict { stream, .. } => DispatchError::Concurrency {
                stream: stream.clone(),
                message: value.to_string(),
            },
            _ => DispatchError::Store(value),
        }
    }
}

/// Executes commands against the event log.
pub struct CommandDispatcher<S> {
    store: S,
    bus: CommandBus,
    projection: Arc<GraphProjection>,
}

impl<S> CommandDispatcher<S> {
    pub fn new(store: S, bus: CommandBus, projection: Arc<GraphProjection>) -> Self {
        Self {
            store,
            bus,
            projection,
        }
    }

    pub fn bus(&self) -> &CommandBus {
        &self.bus
    }

    pub fn projection(&self) -> &Arc<GraphProjection> {
        &self.projection
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: EventStore> CommandDispatcher<S> {
    /// Validate, decide and append.
    ///
    /// Returns the committed events (with assigned sequence numbers), or a
    /// typed failure: a constraint violation never touches the log, a
    /// concurrency conflict appended nothing and is retryable.
    pub fn dispatch(&self, command: &Command) -> Result<Vec<StoredEvent>, DispatchError> {
        let to_publish = self.bus.handle(command, self.projection.as_ref())?;
        if to_publish.is_empty() {
            return Ok(vec![]);
        }

        let metadata = command_metadata(command)?;
        let uncommitted = to_publish
            .events
            .iter()
            .map(|event| UncommittedEvent::from_typed(event, metadata.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let committed =
            self.store
                .append(&to_publish.stream_name, uncommitted, to_publish.expected_version)?;

        tracing::info!(
            command = command.name(),
            stream = %to_publish.stream_name,
            events = committed.len(),
            "dispatched command"
        );

        Ok(committed)
    }
}

/// Event metadata for a dispatch: the serialized initiating command plus a
/// fresh causation id.
pub(crate) fn command_metadata(
    command: &Command,
) -> Result<JsonMap<String, JsonValue>, DispatchError> {
    let serialized = serde_json::to_value(command)
        .map_err(|e| DispatchError::Serialization(e.to_string()))?;
    let mut metadata = JsonMap::new();
    metadata.insert(INITIATING_COMMAND_METADATA_KEY.to_string(), serialized);
    metadata.insert(CAUSATION_ID_METADATA_KEY.to_string(), json!(Uuid::now_v7()));
    Ok(metadata)
}
