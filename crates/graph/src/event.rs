//! The closed set of domain events.
//!
//! Events are facts; they record what happened to a content stream. Every
//! node-level event names the stream it belongs to and the dimension space
//! points it affects, so downstream consumers (projections, catch-up hooks)
//! never have to re-derive coverage.

use serde::{Deserialize, Serialize};

use stratum_core::{ContentStreamId, NodeAggregateId, Version, WorkspaceName};
use stratum_dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint, VariantType};
use stratum_events::Event;

use crate::node::{NodeTypeName, PropertyValues};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GraphEvent {
    ContentStreamWasCreated {
        content_stream_id: ContentStreamId,
    },
    /// The copy-on-read marker: no events are copied on fork; projections
    /// treat the new stream as a view of the source up to this point.
    ContentStreamWasForked {
        new_content_stream_id: ContentStreamId,
        source_content_stream_id: ContentStreamId,
        source_version: Version,
    },
    ContentStreamWasClosed {
        content_stream_id: ContentStreamId,
    },
    ContentStreamWasReopened {
        content_stream_id: ContentStreamId,
    },
    /// Soft delete; physical stream deletion is a separate destructive step.
    ContentStreamWasRemoved {
        content_stream_id: ContentStreamId,
    },
    WorkspaceWasCreated {
        workspace_name: WorkspaceName,
        base_workspace_name: Option<WorkspaceName>,
        new_content_stream_id: ContentStreamId,
    },
    WorkspaceWasPublished {
        workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        previous_content_stream_id: ContentStreamId,
    },
    WorkspaceWasRebased {
        workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        previous_content_stream_id: ContentStreamId,
    },
    WorkspaceWasDiscarded {
        workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        previous_content_stream_id: ContentStreamId,
    },
    NodeAggregateWithNodeWasCreated {
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        node_type_name: NodeTypeName,
        origin: OriginDimensionSpacePoint,
        covered_dimension_space_points: DimensionSpacePointSet,
        parent_node_aggregate_id: Option<NodeAggregateId>,
        initial_property_values: PropertyValues,
    },
    NodePropertiesWereSet {
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        origin: OriginDimensionSpacePoint,
        affected_dimension_space_points: DimensionSpacePointSet,
        property_values: PropertyValues,
    },
    NodeVariantWasCreated {
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        source_origin: OriginDimensionSpacePoint,
        target_origin: OriginDimensionSpacePoint,
        covered_dimension_space_points: DimensionSpacePointSet,
        variant_type: VariantType,
    },
    NodeAggregateWasMoved {
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        dimension_space_point: DimensionSpacePoint,
        new_parent_node_aggregate_id: NodeAggregateId,
    },
    NodeAggregateWasRemoved {
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        affected_covered_dimension_space_points: DimensionSpacePointSet,
    },
}

impl Event for GraphEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GraphEvent::ContentStreamWasCreated { .. } => "contentstream.was_created",
            GraphEvent::ContentStreamWasForked { .. } => "contentstream.was_forked",
            GraphEvent::ContentStreamWasClosed { .. } => "contentstream.was_closed",
            GraphEvent::ContentStreamWasReopened { .. } => "contentstream.was_reopened",
            GraphEvent::ContentStreamWasRemoved { .. } => "contentstream.was_removed",
            GraphEvent::WorkspaceWasCreated { .. } => "workspace.was_created",
            GraphEvent::WorkspaceWasPublished { .. } => "workspace.was_published",
            GraphEvent::WorkspaceWasRebased { .. } => "workspace.was_rebased",
            GraphEvent::WorkspaceWasDiscarded { .. } => "workspace.was_discarded",
            GraphEvent::NodeAggregateWithNodeWasCreated { .. } => {
                "node.aggregate_with_node_was_created"
            }
            GraphEvent::NodePropertiesWereSet { .. } => "node.properties_were_set",
            GraphEvent::NodeVariantWasCreated { .. } => "node.variant_was_created",
            GraphEvent::NodeAggregateWasMoved { .. } => "node.aggregate_was_moved",
            GraphEvent::NodeAggregateWasRemoved { .. } => "node.aggregate_was_removed",
        }
    }
}
