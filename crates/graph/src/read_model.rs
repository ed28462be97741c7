//! The minimal read-model surface command handlers validate against.

use std::collections::BTreeSet;

use stratum_core::{ContentStreamId, NodeAggregateId, WorkspaceName};
use stratum_dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};

use crate::content_stream::ContentStream;

/// A workspace's control-plane row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRecord {
    pub name: WorkspaceName,
    pub base_workspace_name: Option<WorkspaceName>,
    pub current_content_stream_id: ContentStreamId,
}

/// What command handlers may ask of the projected state.
///
/// Deliberately narrow: handlers load the minimal state needed for their
/// invariant checks, nothing more. Implemented by the graph projection (and
/// by in-test fakes).
pub trait GraphReadModel {
    fn find_content_stream(&self, id: &ContentStreamId) -> Option<ContentStream>;

    fn find_content_streams(&self) -> Vec<ContentStream>;

    fn find_workspace(&self, name: &WorkspaceName) -> Option<WorkspaceRecord>;

    /// The dimension space points in which the node aggregate is visible,
    /// or `None` if the aggregate does not exist in the stream.
    fn covered_dimension_space_points(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
    ) -> Option<DimensionSpacePointSet>;

    /// The origin points at which variants of the aggregate were authored,
    /// or `None` if the aggregate does not exist in the stream.
    fn origin_dimension_space_points(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
    ) -> Option<BTreeSet<OriginDimensionSpacePoint>>;

    /// The parent of the node aggregate in one dimension space point.
    fn parent_node_aggregate(
        &self,
        stream: &ContentStreamId,
        node: &NodeAggregateId,
        point: &DimensionSpacePoint,
    ) -> Option<NodeAggregateId>;
}
