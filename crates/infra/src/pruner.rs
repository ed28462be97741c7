//! Two-phase content stream pruning.
//!
//! Phase one is a soft delete: streams that are no longer needed get a
//! removal event so projections drop their graph data, while the event
//! stream itself is kept. Phase two is the destructive step: event streams
//! not transitively required by any workspace-bound stream are physically
//! deleted from the log.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Map as JsonMap;

use stratum_core::{ContentStreamId, ExpectedVersion, SequenceNumber};
use stratum_events::{
    EventStore, EventStoreError, ReadDirection, StreamName, StreamSelector, UncommittedEvent,
};
use stratum_graph::{
    CONTENT_STREAM_PREFIX, ContentStreamStatus, GraphEvent, GraphReadModel,
    content_stream::content_stream_id_from_stream_name,
};

use crate::projection::GraphProjection;

/// Removes content streams that are not needed anymore.
pub struct ContentStreamPruner<S> {
    store: S,
    projection: Arc<GraphProjection>,
}

impl<S: EventStore> ContentStreamPruner<S> {
    pub fn new(store: S, projection: Arc<GraphProjection>) -> Self {
        Self { store, projection }
    }

    /// Soft-remove unneeded content streams from the projections.
    ///
    /// Emits a removal event per stream (so projections drop the stream's
    /// graph data) but keeps the event stream itself; physical deletion is
    /// [`ContentStreamPruner::prune_removed_from_event_stream`].
    ///
    /// By default only streams that are NO_LONGER_IN_USE are removed. With
    /// `remove_temporary`, dangling CREATED, FORKED and CLOSED streams (not
    /// bound to any workspace) are removed as well.
    ///
    /// The caller is expected to run catch-up afterwards so projections
    /// observe the removals.
    pub fn prune(&self, remove_temporary: bool) -> Result<Vec<ContentStreamId>, EventStoreError> {
        let mut removable = vec![ContentStreamStatus::NoLongerInUse];
        if remove_temporary {
            removable.extend([
                ContentStreamStatus::Created,
                ContentStreamStatus::Forked,
                ContentStreamStatus::Closed,
            ]);
        }

        let mut removed = Vec::new();
        for stream in self.projection.find_content_streams() {
            if !removable.contains(&stream.status) {
                continue;
            }
            let event = GraphEvent::ContentStreamWasRemoved {
                content_stream_id: stream.id,
            };
            let uncommitted = UncommittedEvent::from_typed(&event, JsonMap::new())?;
            self.store.append(
                &stream.event_stream_name(),
                vec![uncommitted],
                ExpectedVersion::Exact(stream.version),
            )?;
            tracing::info!(content_stream = %stream.id, status = %stream.status, "soft-removed content stream");
            removed.push(stream.id);
        }
        Ok(removed)
    }

    /// Physically delete event streams that no workspace-bound stream
    /// transitively requires. Destructive.
    ///
    /// A stream is required as long as it is reachable from any stream with
    /// status IN_USE_BY_WORKSPACE via `source_content_stream_id` edges:
    /// replaying a fork needs every stream beneath it, so chains of forks
    /// are retained in full.
    pub fn prune_removed_from_event_stream(&self) -> Result<Vec<StreamName>, EventStoreError> {
        let streams = self.projection.find_content_streams();

        // Reachability closure over source edges, each id visited once.
        let mut transitively_used: HashSet<ContentStreamId> = HashSet::new();
        let mut stack: Vec<ContentStreamId> = streams
            .iter()
            .filter(|s| s.status == ContentStreamStatus::InUseByWorkspace)
            .map(|s| s.id)
            .collect();
        while let Some(current) = stack.pop() {
            if !transitively_used.insert(current) {
                continue;
            }
            if let Some(source) = streams
                .iter()
                .find(|s| s.id == current)
                .and_then(|s| s.source_content_stream_id)
            {
                if !transitively_used.contains(&source) {
                    stack.push(source);
                }
            }
        }

        let mut removed = Vec::new();
        for stream_name in self.all_content_stream_event_names()? {
            let stream_id = content_stream_id_from_stream_name(&stream_name);
            if stream_id.is_some_and(|id| transitively_used.contains(&id)) {
                continue;
            }
            // Deleting a transitively used stream would corrupt replay of
            // its dependents; the closure above is what rules it out, and a
            // stream with an unparseable name is never deleted either.
            assert!(
                stream_id.is_some(),
                "stream {stream_name} carries the content stream prefix but no parseable id"
            );
            self.store.delete_stream(&stream_name)?;
            tracing::info!(stream = %stream_name, "deleted content stream events");
            removed.push(stream_name);
        }
        Ok(removed)
    }

    /// Delete every content stream's events. Destructive; intended for
    /// complete teardown before a full replay from another source.
    pub fn prune_all(&self) -> Result<(), EventStoreError> {
        for stream_name in self.all_content_stream_event_names()? {
            self.store.delete_stream(&stream_name)?;
        }
        Ok(())
    }

    /// Every content stream event stream present in the log, discovered
    /// through the category prefix (soft-removed streams included).
    fn all_content_stream_event_names(&self) -> Result<Vec<StreamName>, EventStoreError> {
        let events = self.store.read(
            &StreamSelector::Category(CONTENT_STREAM_PREFIX.to_string()),
            SequenceNumber::none(),
            ReadDirection::Forward,
        )?;
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        for event in events {
            if seen.insert(event.stream_name.clone()) {
                names.push(event.stream_name);
            }
        }
        Ok(names)
    }
}
