//! The content graph projection: content streams, workspaces and the node
//! graph per stream.
//!
//! Forking a content stream copies no events; the projection clones the
//! source stream's node table at the fork point, so the new stream starts
//! as an exact copy and diverges from there. This projection is the
//! in-memory reference; relational implementations satisfy the same
//! [`Projection`] contract.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use stratum_core::{ContentStreamId, NodeAggregateId, WorkspaceName};
use stratum_dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
use stratum_events::{Projection, ProjectionError, ProjectionStatus, StoredEvent};
use stratum_graph::{
    ContentStream, ContentStreamStatus, GraphEvent, GraphReadModel, NodeTypeName, PropertyValues,
    WorkspaceRecord, content_stream::content_stream_id_from_stream_name,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeRecord {
    pub(crate) node_type_name: NodeTypeName,
    pub(crate) origins: BTreeSet<OriginDimensionSpacePoint>,
    pub(crate) covered: DimensionSpacePointSet,
    pub(crate) properties: BTreeMap<OriginDimensionSpacePoint, PropertyValues>,
    pub(crate) parents: BTreeMap<DimensionSpacePoint, NodeAggregateId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct GraphState {
    pub(crate) content_streams: HashMap<ContentStreamId, ContentStream>,
    pub(crate) workspaces: HashMap<WorkspaceName, WorkspaceRecord>,
    pub(crate) nodes: HashMap<ContentStreamId, HashMap<NodeAggregateId, NodeRecord>>,
}

/// In-memory content graph read model.
#[derive(Debug, Default)]
pub struct GraphProjection {
    state: RwLock<GraphState>,
    /// `Some` while a simulation is open; holds the state to restore.
    simulation_snapshot: Mutex<Option<GraphState>>,
}

impl GraphProjection {
    pub fn new() -> Self {
        Self::default()
    }

    // Lock poisoning can only follow a panic mid-mutation; recovering the
    // guard keeps the rollback path (simulation guard, transactional)
    // operational during unwinding.
    fn read_state(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, GraphState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` in a rollback-only scope: the projection state is
    /// snapshotted first and unconditionally restored afterwards, success,
    /// failure or panic.
    ///
    /// # Panics
    ///
    /// Panics immediately when a simulation is already open on this
    /// projection; nested simulation is a programming error, not a
    /// recoverable condition.
    pub fn in_simulation<T>(&self, f: impl FnOnce() -> T) -> T {
        {
            let mut slot = self
                .simulation_snapshot
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            assert!(
                slot.is_none(),
                "nested simulation: a simulation is already open on this projection"
            );
            *slot = Some(self.read_state().clone());
        }
        let _guard = SimulationGuard { projection: self };
        f()
    }

    pub fn node_exists(&self, stream: &ContentStreamId, node: &NodeAggregateId) -> bool {
        self.read_state()
            .nodes
            .get(stream)
            .is_some_and(|nodes| nodes.contains_key(node))
    }

    pub fn node_properties(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
        origin: &OriginDimensionSpacePoint,
    ) -> Option<PropertyValues> {
        self.read_state()
            .nodes
            .get(stream)?
            .get(node)?
            .properties
            .get(origin)
            .cloned()
    }

    pub fn node_type_name(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
    ) -> Option<NodeTypeName> {
        self.read_state()
            .nodes
            .get(stream)?
            .get(node)
            .map(|record| record.node_type_name.clone())
    }

    /// Narrow administrative accessor for tests; not part of the read-model
    /// contract.
    pub(crate) fn state_for_testing(&self) -> GraphState {
        self.read_state().clone()
    }

    fn apply_event(
        state: &mut GraphState,
        event: &GraphEvent,
        envelope: &StoredEvent,
    ) -> Result<(), ProjectionError> {
        match event {
            GraphEvent::ContentStreamWasCreated { content_stream_id } => {
                state
                    .content_streams
                    .insert(*content_stream_id, ContentStream::created(*content_stream_id));
                state.nodes.entry(*content_stream_id).or_default();
            }
            GraphEvent::ContentStreamWasForked {
                new_content_stream_id,
                source_content_stream_id,
                ..
            } => {
                state.content_streams.insert(
                    *new_content_stream_id,
                    ContentStream::forked_from(*new_content_stream_id, *source_content_stream_id),
                );
                let copied = state
                    .nodes
                    .get(source_content_stream_id)
                    .cloned()
                    .unwrap_or_default();
                state.nodes.insert(*new_content_stream_id, copied);
            }
            GraphEvent::ContentStreamWasClosed { content_stream_id } => {
                transition(state, envelope, content_stream_id, ContentStreamStatus::Closed)?;
            }
            GraphEvent::ContentStreamWasReopened { content_stream_id } => {
                transition(
                    state,
                    envelope,
                    content_stream_id,
                    ContentStreamStatus::InUseByWorkspace,
                )?;
            }
            GraphEvent::ContentStreamWasRemoved { content_stream_id } => {
                // Soft delete: the graph data goes, the control-plane row
                // stays so the pruner can still walk source edges.
                if let Some(row) = state.content_streams.get_mut(content_stream_id) {
                    if row.status != ContentStreamStatus::NoLongerInUse {
                        row.transition_to(ContentStreamStatus::NoLongerInUse)
                            .map_err(|e| apply_error(envelope, e))?;
                    }
                }
                state.nodes.remove(content_stream_id);
            }
            GraphEvent::WorkspaceWasCreated {
                workspace_name,
                base_workspace_name,
                new_content_stream_id,
            } => {
                state.workspaces.insert(workspace_name.clone(), WorkspaceRecord {
                    name: workspace_name.clone(),
                    base_workspace_name: base_workspace_name.clone(),
                    current_content_stream_id: *new_content_stream_id,
                });
                transition(
                    state,
                    envelope,
                    new_content_stream_id,
                    ContentStreamStatus::InUseByWorkspace,
                )?;
            }
            GraphEvent::WorkspaceWasPublished {
                workspace_name,
                new_content_stream_id,
                previous_content_stream_id,
            }
            | GraphEvent::WorkspaceWasRebased {
                workspace_name,
                new_content_stream_id,
                previous_content_stream_id,
            }
            | GraphEvent::WorkspaceWasDiscarded {
                workspace_name,
                new_content_stream_id,
                previous_content_stream_id,
            } => {
                let workspace = state.workspaces.get_mut(workspace_name).ok_or_else(|| {
                    apply_error_msg(envelope, format!("unknown workspace '{workspace_name}'"))
                })?;
                workspace.current_content_stream_id = *new_content_stream_id;
                transition(
                    state,
                    envelope,
                    new_content_stream_id,
                    ContentStreamStatus::InUseByWorkspace,
                )?;
                // The superseded stream is retained for replay until pruned.
                if let Some(previous) = state.content_streams.get_mut(previous_content_stream_id) {
                    if previous.status != ContentStreamStatus::NoLongerInUse {
                        previous
                            .transition_to(ContentStreamStatus::NoLongerInUse)
                            .map_err(|e| apply_error(envelope, e))?;
                    }
                }
            }
            GraphEvent::NodeAggregateWithNodeWasCreated {
                content_stream_id,
                node_aggregate_id,
                node_type_name,
                origin,
                covered_dimension_space_points,
                parent_node_aggregate_id,
                initial_property_values,
            } => {
                let mut parents = BTreeMap::new();
                if let Some(parent) = parent_node_aggregate_id {
                    for point in covered_dimension_space_points {
                        parents.insert(point.clone(), *parent);
                    }
                }
                state
                    .nodes
                    .entry(*content_stream_id)
                    .or_default()
                    .insert(*node_aggregate_id, NodeRecord {
                        node_type_name: node_type_name.clone(),
                        origins: BTreeSet::from([origin.clone()]),
                        covered: covered_dimension_space_points.clone(),
                        properties: BTreeMap::from([(
                            origin.clone(),
                            initial_property_values.clone(),
                        )]),
                        parents,
                    });
            }
            GraphEvent::NodePropertiesWereSet {
                content_stream_id,
                node_aggregate_id,
                origin,
                property_values,
                ..
            } => {
                let record = node_mut(state, envelope, content_stream_id, node_aggregate_id)?;
                let merged = record
                    .properties
                    .get(origin)
                    .cloned()
                    .unwrap_or_default()
                    .merged_with(property_values);
                record.properties.insert(origin.clone(), merged);
            }
            GraphEvent::NodeVariantWasCreated {
                content_stream_id,
                node_aggregate_id,
                source_origin,
                target_origin,
                covered_dimension_space_points,
                ..
            } => {
                let record = node_mut(state, envelope, content_stream_id, node_aggregate_id)?;
                record.origins.insert(target_origin.clone());
                let inherited = record
                    .properties
                    .get(source_origin)
                    .cloned()
                    .unwrap_or_default();
                record.properties.insert(target_origin.clone(), inherited);
                let source_parent = record.parents.get(source_origin.as_point()).copied();
                for point in covered_dimension_space_points {
                    record.covered.insert(point.clone());
                    if let Some(parent) = source_parent {
                        record.parents.entry(point.clone()).or_insert(parent);
                    }
                }
            }
            GraphEvent::NodeAggregateWasMoved {
                content_stream_id,
                node_aggregate_id,
                dimension_space_point,
                new_parent_node_aggregate_id,
            } => {
                let record = node_mut(state, envelope, content_stream_id, node_aggregate_id)?;
                record
                    .parents
                    .insert(dimension_space_point.clone(), *new_parent_node_aggregate_id);
            }
            GraphEvent::NodeAggregateWasRemoved {
                content_stream_id,
                node_aggregate_id,
                affected_covered_dimension_space_points,
            } => {
                let record = node_mut(state, envelope, content_stream_id, node_aggregate_id)?;
                for point in affected_covered_dimension_space_points {
                    record.covered.remove(point);
                    record.parents.remove(point);
                }
                record
                    .origins
                    .retain(|o| !affected_covered_dimension_space_points.contains(o.as_point()));
                record
                    .properties
                    .retain(|o, _| !affected_covered_dimension_space_points.contains(o.as_point()));
                if record.covered.is_empty() {
                    if let Some(nodes) = state.nodes.get_mut(content_stream_id) {
                        nodes.remove(node_aggregate_id);
                    }
                }
            }
        }

        // Events are owned by their stream; mirror the stream's version.
        if let Some(stream_id) = content_stream_id_from_stream_name(&envelope.stream_name) {
            if let Some(row) = state.content_streams.get_mut(&stream_id) {
                row.version = envelope.stream_version;
            }
        }

        Ok(())
    }
}

struct SimulationGuard<'a> {
    projection: &'a GraphProjection,
}

impl Drop for SimulationGuard<'_> {
    fn drop(&mut self) {
        let snapshot = self
            .projection
            .simulation_snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(snapshot) = snapshot {
            *self.projection.write_state() = snapshot;
        }
    }
}

fn apply_error(envelope: &StoredEvent, error: impl core::fmt::Display) -> ProjectionError {
    ProjectionError::Apply {
        event_type: envelope.event_type.clone(),
        message: error.to_string(),
    }
}

fn apply_error_msg(envelope: &StoredEvent, message: String) -> ProjectionError {
    ProjectionError::Apply {
        event_type: envelope.event_type.clone(),
        message,
    }
}

fn transition(
    state: &mut GraphState,
    envelope: &StoredEvent,
    stream: &ContentStreamId,
    next: ContentStreamStatus,
) -> Result<(), ProjectionError> {
    let row = state.content_streams.get_mut(stream).ok_or_else(|| {
        apply_error_msg(envelope, format!("unknown content stream {stream}"))
    })?;
    row.transition_to(next).map_err(|e| apply_error(envelope, e))
}

fn node_mut<'a>(
    state: &'a mut GraphState,
    envelope: &StoredEvent,
    stream: &ContentStreamId,
    node: &NodeAggregateId,
) -> Result<&'a mut NodeRecord, ProjectionError> {
    state
        .nodes
        .get_mut(stream)
        .and_then(|nodes| nodes.get_mut(node))
        .ok_or_else(|| {
            apply_error_msg(
                envelope,
                format!("unknown node aggregate {node} in content stream {stream}"),
            )
        })
}

impl Projection for GraphProjection {
    fn set_up(&self) -> Result<(), ProjectionError> {
        // No external storage to prepare for the in-memory reference.
        Ok(())
    }

    fn status(&self) -> ProjectionStatus {
        ProjectionStatus::Ok
    }

    fn apply(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        let decoded: GraphEvent = event
            .decode()
            .map_err(|e| apply_error(event, e))?;
        let mut state = self.write_state();
        Self::apply_event(&mut state, &decoded, event)
    }

    fn transactional(
        &self,
        work: &mut dyn FnMut() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        let snapshot = self.read_state().clone();
        let result = work();
        if result.is_err() {
            *self.write_state() = snapshot;
        }
        result
    }

    fn reset_state(&self) -> Result<(), ProjectionError> {
        *self.write_state() = GraphState::default();
        Ok(())
    }
}

impl GraphReadModel for GraphProjection {
    fn find_content_stream(&self, id: &ContentStreamId) -> Option<ContentStream> {
        self.read_state().content_streams.get(id).cloned()
    }

    fn find_content_streams(&self) -> Vec<ContentStream> {
        let mut streams: Vec<ContentStream> =
            self.read_state().content_streams.values().cloned().collect();
        streams.sort_by_key(|s| s.id);
        streams
    }

    fn find_workspace(&self, name: &WorkspaceName) -> Option<WorkspaceRecord> {
        self.read_state().workspaces.get(name).cloned()
    }

    fn covered_dimension_space_points(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
    ) -> Option<DimensionSpacePointSet> {
        self.read_state()
            .nodes
            .get(stream)?
            .get(node)
            .map(|record| record.covered.clone())
    }

    fn origin_dimension_space_points(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
    ) -> Option<BTreeSet<OriginDimensionSpacePoint>> {
        self.read_state()
            .nodes
            .get(stream)?
            .get(node)
            .map(|record| record.origins.clone())
    }

    fn parent_node_aggregate(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
        point: &DimensionSpacePoint,
    ) -> Option<NodeAggregateId> {
        self.read_state()
            .nodes
            .get(stream)?
            .get(node)?
            .parents
            .get(point)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Map as JsonMap;
    use stratum_core::{EventId, SequenceNumber, Version};
    use stratum_events::{Event as _, StreamName};
    use stratum_graph::content_stream::content_stream_event_stream_name;

    fn envelope_for(event: &GraphEvent, stream: &StreamName, seq: u64, version: u64) -> StoredEvent {
        StoredEvent {
            event_id: EventId::new(),
            stream_name: stream.clone(),
            sequence_number: SequenceNumber::from_u64(seq),
            stream_version: Version::from_u64(version),
            event_type: event.event_type().to_string(),
            payload: serde_json::to_value(event).unwrap(),
            metadata: JsonMap::new(),
            recorded_at: Utc::now(),
        }
    }

    fn apply(projection: &GraphProjection, event: &GraphEvent, stream: &StreamName, seq: u64, version: u64) {
        projection
            .apply(&envelope_for(event, stream, seq, version))
            .unwrap();
    }

    fn created_stream(projection: &GraphProjection) -> ContentStreamId {
        let id = ContentStreamId::new();
        let stream = content_stream_event_stream_name(&id);
        apply(
            projection,
            &GraphEvent::ContentStreamWasCreated { content_stream_id: id },
            &stream,
            1,
            1,
        );
        id
    }

    #[test]
    fn fork_copies_the_source_node_table() {
        let projection = GraphProjection::new();
        let source = created_stream(&projection);
        let node = NodeAggregateId::new();
        let stream = content_stream_event_stream_name(&source);

        apply(
            &projection,
            &GraphEvent::NodeAggregateWithNodeWasCreated {
                content_stream_id: source,
                node_aggregate_id: node,
                node_type_name: NodeTypeName::try_new("acme:document").unwrap(),
                origin: OriginDimensionSpacePoint::default(),
                covered_dimension_space_points: DimensionSpacePointSet::from_iter([
                    DimensionSpacePoint::default(),
                ]),
                parent_node_aggregate_id: None,
                initial_property_values: PropertyValues::empty(),
            },
            &stream,
            2,
            2,
        );

        let fork = ContentStreamId::new();
        let fork_stream = content_stream_event_stream_name(&fork);
        apply(
            &projection,
            &GraphEvent::ContentStreamWasForked {
                new_content_stream_id: fork,
                source_content_stream_id: source,
                source_version: Version::from_u64(2),
            },
            &fork_stream,
            3,
            1,
        );

        assert!(projection.node_exists(&fork, &node));
        assert_eq!(
            projection.find_content_stream(&fork).unwrap().source_content_stream_id,
            Some(source)
        );
    }

    #[test]
    fn removal_shrinks_coverage_and_drops_empty_records() {
        let projection = GraphProjection::new();
        let stream_id = created_stream(&projection);
        let node = NodeAggregateId::new();
        let stream = content_stream_event_stream_name(&stream_id);
        let point = DimensionSpacePoint::default();

        apply(
            &projection,
            &GraphEvent::NodeAggregateWithNodeWasCreated {
                content_stream_id: stream_id,
                node_aggregate_id: node,
                node_type_name: NodeTypeName::try_new("acme:document").unwrap(),
                origin: OriginDimensionSpacePoint::from_point(point.clone()),
                covered_dimension_space_points: DimensionSpacePointSet::from_iter([point.clone()]),
                parent_node_aggregate_id: None,
                initial_property_values: PropertyValues::empty(),
            },
            &stream,
            2,
            2,
        );
        apply(
            &projection,
            &GraphEvent::NodeAggregateWasRemoved {
                content_stream_id: stream_id,
                node_aggregate_id: node,
                affected_covered_dimension_space_points: DimensionSpacePointSet::from_iter([point]),
            },
            &stream,
            3,
            3,
        );

        assert!(!projection.node_exists(&stream_id, &node));
    }

    #[test]
    fn transactional_rolls_back_on_error() {
        let projection = GraphProjection::new();
        let stream_id = created_stream(&projection);
        let before = projection.state_for_testing();

        let fork = ContentStreamId::new();
        let fork_stream = content_stream_event_stream_name(&fork);
        let fork_event = GraphEvent::ContentStreamWasForked {
            new_content_stream_id: fork,
            source_content_stream_id: stream_id,
            source_version: Version::from_u64(1),
        };
        let envelope = envelope_for(&fork_event, &fork_stream, 2, 1);

        let result = projection.transactional(&mut || {
            projection.apply(&envelope)?;
            Err(ProjectionError::Storage("injected failure".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(projection.state_for_testing(), before);
    }

    #[test]
    fn simulation_restores_state_on_exit() {
        let projection = GraphProjection::new();
        let stream_id = created_stream(&projection);
        let before = projection.state_for_testing();

        projection.in_simulation(|| {
            let fork = ContentStreamId::new();
            let fork_stream = content_stream_event_stream_name(&fork);
            apply(
                &projection,
                &GraphEvent::ContentStreamWasForked {
                    new_content_stream_id: fork,
                    source_content_stream_id: stream_id,
                    source_version: Version::from_u64(1),
                },
                &fork_stream,
                2,
                1,
            );
            assert!(projection.find_content_stream(&fork).is_some());
        });

        assert_eq!(projection.state_for_testing(), before);
    }

    #[test]
    #[should_panic(expected = "nested simulation")]
    fn nested_simulation_panics() {
        let projection = GraphProjection::new();
        projection.in_simulation(|| {
            projection.in_simulation(|| {});
        });
    }
}
