//! The write API: the closed set of commands.
//!
//! Commands are immutable, named, serializable intents. Each carries the
//! workspace it targets; `copy_for_workspace` rewrites a command onto
//! another workspace, which is how rebase and partial publish replay a
//! workspace's changes against a different base.

use serde::{Deserialize, Serialize};

use stratum_core::{ContentStreamId, NodeAggregateId, WorkspaceName};
use stratum_dimension::{DimensionSpacePoint, OriginDimensionSpacePoint};

use crate::node::{NodeTypeName, PropertyValues};

/// Create the root workspace (no base) with a fresh content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRootWorkspace {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

impl CreateRootWorkspace {
    pub fn create(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            new_content_stream_id: ContentStreamId::new(),
        }
    }

    /// Pin the generated stream id, e.g. for deterministic test runs.
    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }
}

/// Create a workspace on top of a base workspace, forking its stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkspace {
    pub workspace_name: WorkspaceName,
    pub base_workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

impl CreateWorkspace {
    pub fn create(workspace_name: WorkspaceName, base_workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            base_workspace_name,
            new_content_stream_id: ContentStreamId::new(),
        }
    }

    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }
}

/// Create a node aggregate with its first node variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNodeAggregateWithNode {
    pub workspace_name: WorkspaceName,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub origin: OriginDimensionSpacePoint,
    pub parent_node_aggregate_id: Option<NodeAggregateId>,
    pub initial_property_values: PropertyValues,
}

/// Set properties of one node variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNodeProperties {
    pub workspace_name: WorkspaceName,
    pub node_aggregate_id: NodeAggregateId,
    pub origin: OriginDimensionSpacePoint,
    pub property_values: PropertyValues,
}

/// Create a new variant of a node in another dimension space point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNodeVariant {
    pub workspace_name: WorkspaceName,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub target_origin: OriginDimensionSpacePoint,
}

/// Move a node aggregate below a new parent in one dimension space point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveNodeAggregate {
    pub workspace_name: WorkspaceName,
    pub node_aggregate_id: NodeAggregateId,
    pub dimension_space_point: DimensionSpacePoint,
    pub new_parent_node_aggregate_id: NodeAggregateId,
}

/// Remove a node aggregate in one covered dimension space point (and its
/// specializations).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNodeAggregate {
    pub workspace_name: WorkspaceName,
    pub node_aggregate_id: NodeAggregateId,
    pub covered_dimension_space_point: DimensionSpacePoint,
}

/// Publish a workspace's changes to its base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishWorkspace {
    pub workspace_name: WorkspaceName,
    /// The stream the workspace continues on after publishing.
    pub new_content_stream_id: ContentStreamId,
}

impl PublishWorkspace {
    pub fn create(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            new_content_stream_id: ContentStreamId::new(),
        }
    }

    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }
}

/// Replay a workspace's own commands onto a fresh fork of its base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseWorkspace {
    pub workspace_name: WorkspaceName,
    pub rebased_content_stream_id: ContentStreamId,
}

impl RebaseWorkspace {
    pub fn create(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            rebased_content_stream_id: ContentStreamId::new(),
        }
    }

    pub fn with_rebased_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.rebased_content_stream_id = id;
        self
    }
}

/// Throw away a workspace's changes: continue on a fresh fork of the base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardWorkspace {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

impl DiscardWorkspace {
    pub fn create(workspace_name: WorkspaceName) -> Self {
        Self {
            workspace_name,
            new_content_stream_id: ContentStreamId::new(),
        }
    }

    pub fn with_new_content_stream_id(mut self, id: ContentStreamId) -> Self {
        self.new_content_stream_id = id;
        self
    }
}

/// Detach a content stream pending a publish or rebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseContentStream {
    pub workspace_name: WorkspaceName,
    pub content_stream_id: ContentStreamId,
}

/// Reattach a previously closed content stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenContentStream {
    pub workspace_name: WorkspaceName,
    pub content_stream_id: ContentStreamId,
}

/// Branch a new content stream off an existing one without copying events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkContentStream {
    pub workspace_name: WorkspaceName,
    pub source_content_stream_id: ContentStreamId,
    pub new_content_stream_id: ContentStreamId,
}

/// Mark a content stream as removed (soft delete; physical deletion is the
/// pruner's separate, destructive step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveContentStream {
    pub workspace_name: WorkspaceName,
    pub content_stream_id: ContentStreamId,
}

/// The closed set of commands. Dispatch is exhaustive; an unmatched variant
/// cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    CreateRootWorkspace(CreateRootWorkspace),
    CreateWorkspace(CreateWorkspace),
    CreateNodeAggregateWithNode(CreateNodeAggregateWithNode),
    SetNodeProperties(SetNodeProperties),
    CreateNodeVariant(CreateNodeVariant),
    MoveNodeAggregate(MoveNodeAggregate),
    RemoveNodeAggregate(RemoveNodeAggregate),
    PublishWorkspace(PublishWorkspace),
    RebaseWorkspace(RebaseWorkspace),
    DiscardWorkspace(DiscardWorkspace),
    CloseContentStream(CloseContentStream),
    ReopenContentStream(ReopenContentStream),
    ForkContentStream(ForkContentStream),
    RemoveContentStream(RemoveContentStream),
}

impl stratum_events::Command for Command {
    fn workspace_name(&self) -> &WorkspaceName {
        match self {
            Command::CreateRootWorkspace(c) => &c.workspace_name,
            Command::CreateWorkspace(c) => &c.workspace_name,
            Command::CreateNodeAggregateWithNode(c) => &c.workspace_name,
            Command::SetNodeProperties(c) => &c.workspace_name,
            Command::CreateNodeVariant(c) => &c.workspace_name,
            Command::MoveNodeAggregate(c) => &c.workspace_name,
            Command::RemoveNodeAggregate(c) => &c.workspace_name,
            Command::PublishWorkspace(c) => &c.workspace_name,
            Command::RebaseWorkspace(c) => &c.workspace_name,
            Command::DiscardWorkspace(c) => &c.workspace_name,
            Command::CloseContentStream(c) => &c.workspace_name,
            Command::ReopenContentStream(c) => &c.workspace_name,
            Command::ForkContentStream(c) => &c.workspace_name,
            Command::RemoveContentStream(c) => &c.workspace_name,
        }
    }

    fn copy_for_workspace(&self, target: &WorkspaceName) -> Self {
        let mut copy = self.clone();
        let workspace_name = match &mut copy {
            Command::CreateRootWorkspace(c) => &mut c.workspace_name,
            Command::CreateWorkspace(c) => &mut c.workspace_name,
            Command::CreateNodeAggregateWithNode(c) => &mut c.workspace_name,
            Command::SetNodeProperties(c) => &mut c.workspace_name,
            Command::CreateNodeVariant(c) => &mut c.workspace_name,
            Command::MoveNodeAggregate(c) => &mut c.workspace_name,
            Command::RemoveNodeAggregate(c) => &mut c.workspace_name,
            Command::PublishWorkspace(c) => &mut c.workspace_name,
            Command::RebaseWorkspace(c) => &mut c.workspace_name,
            Command::DiscardWorkspace(c) => &mut c.workspace_name,
            Command::CloseContentStream(c) => &mut c.workspace_name,
            Command::ReopenContentStream(c) => &mut c.workspace_name,
            Command::ForkContentStream(c) => &mut c.workspace_name,
            Command::RemoveContentStream(c) => &mut c.workspace_name,
        };
        *workspace_name = target.clone();
        copy
    }
}

impl Command {
    /// Whether this command is replayed during rebase / partial publish.
    ///
    /// Only node-level edits are; workspace and stream lifecycle commands
    /// describe the branch topology itself and must not be replayed onto a
    /// different base.
    pub fn is_rebaseable(&self) -> bool {
        matches!(
            self,
            Command::CreateNodeAggregateWithNode(_)
                | Command::SetNodeProperties(_)
                | Command::CreateNodeVariant(_)
                | Command::MoveNodeAggregate(_)
                | Command::RemoveNodeAggregate(_)
        )
    }

    /// Stable command name, used e.g. in event metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateRootWorkspace(_) => "CreateRootWorkspace",
            Command::CreateWorkspace(_) => "CreateWorkspace",
            Command::CreateNodeAggregateWithNode(_) => "CreateNodeAggregateWithNode",
            Command::SetNodeProperties(_) => "SetNodeProperties",
            Command::CreateNodeVariant(_) => "CreateNodeVariant",
            Command::MoveNodeAggregate(_) => "MoveNodeAggregate",
            Command::RemoveNodeAggregate(_) => "RemoveNodeAggregate",
            Command::PublishWorkspace(_) => "PublishWorkspace",
            Command::RebaseWorkspace(_) => "RebaseWorkspace",
            Command::DiscardWorkspace(_) => "DiscardWorkspace",
            Command::CloseContentStream(_) => "CloseContentStream",
            Command::ReopenContentStream(_) => "ReopenContentStream",
            Command::ForkContentStream(_) => "ForkContentStream",
            Command::RemoveContentStream(_) => "RemoveContentStream",
        }
    }
}
