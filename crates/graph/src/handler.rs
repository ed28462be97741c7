//! Command dispatch and per-command constraint checks.
//!
//! One handler per command, dispatched by exhaustive match. A handler loads
//! the minimal read-model state it needs, fails fast on the first violated
//! constraint, and returns the events to publish together with the expected
//! version of the target stream. Handlers never write to storage.

use std::collections::HashSet;
use std::sync::Arc;

use stratum_core::{DomainError, DomainResult, ExpectedVersion, WorkspaceName};
use stratum_dimension::{DimensionSpacePoint, InterDimensionalVariationGraph};
use stratum_events::{Command as _, EventsToPublish};

use crate::command::{
    CloseContentStream, Command, CreateNodeAggregateWithNode, CreateNodeVariant,
    CreateRootWorkspace, CreateWorkspace, DiscardWorkspace, ForkContentStream, MoveNodeAggregate,
    PublishWorkspace, RebaseWorkspace, RemoveContentStream, RemoveNodeAggregate,
    ReopenContentStream, SetNodeProperties,
};
use crate::content_stream::{ContentStream, ContentStreamStatus, content_stream_event_stream_name};
use crate::event::GraphEvent;
use crate::read_model::{GraphReadModel, WorkspaceRecord};

/// Routes each command to its handler.
#[derive(Debug, Clone)]
pub struct CommandBus {
    variation_graph: Arc<InterDimensionalVariationGraph>,
}

impl CommandBus {
    pub fn new(variation_graph: Arc<InterDimensionalVariationGraph>) -> Self {
        Self { variation_graph }
    }

    pub fn variation_graph(&self) -> &InterDimensionalVariationGraph {
        &self.variation_graph
    }

    /// Validate `command` against the current state and decide its events.
    pub fn handle(
        &self,
        command: &Command,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        tracing::debug!(
            command = command.name(),
            workspace = %command.workspace_name(),
            "handling command"
        );
        match command {
            Command::CreateRootWorkspace(c) => self.handle_create_root_workspace(c, state),
            Command::CreateWorkspace(c) => self.handle_create_workspace(c, state),
            Command::CreateNodeAggregateWithNode(c) => {
                self.handle_create_node_aggregate_with_node(c, state)
            }
            Command::SetNodeProperties(c) => self.handle_set_node_properties(c, state),
            Command::CreateNodeVariant(c) => self.handle_create_node_variant(c, state),
            Command::MoveNodeAggregate(c) => self.handle_move_node_aggregate(c, state),
            Command::RemoveNodeAggregate(c) => self.handle_remove_node_aggregate(c, state),
            Command::PublishWorkspace(c) => self.handle_publish_workspace(c, state),
            Command::RebaseWorkspace(c) => self.handle_rebase_workspace(c, state),
            Command::DiscardWorkspace(c) => self.handle_discard_workspace(c, state),
            Command::CloseContentStream(c) => self.handle_close_content_stream(c, state),
            Command::ReopenContentStream(c) => self.handle_reopen_content_stream(c, state),
            Command::ForkContentStream(c) => self.handle_fork_content_stream(c, state),
            Command::RemoveContentStream(c) => self.handle_remove_content_stream(c, state),
        }
    }

    fn require_point_in_space(&self, point: &DimensionSpacePoint) -> DomainResult<()> {
        if self.variation_graph.contains(point) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "dimension space point {point} is outside the declared space"
            )))
        }
    }

    fn handle_create_root_workspace(
        &self,
        command: &CreateRootWorkspace,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        if state.find_workspace(&command.workspace_name).is_some() {
            return Err(DomainError::conflict(format!(
                "workspace '{}' already exists",
                command.workspace_name
            )));
        }
        require_stream_absent(state, command.new_content_stream_id)?;

        Ok(EventsToPublish::new(
            content_stream_event_stream_name(&command.new_content_stream_id),
            vec![
                GraphEvent::ContentStreamWasCreated {
                    content_stream_id: command.new_content_stream_id,
                },
                GraphEvent::WorkspaceWasCreated {
                    workspace_name: command.workspace_name.clone(),
                    base_workspace_name: None,
                    new_content_stream_id: command.new_content_stream_id,
                },
            ],
            ExpectedVersion::NoStream,
        ))
    }

    fn handle_create_workspace(
        &self,
        command: &CreateWorkspace,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        if state.find_workspace(&command.workspace_name).is_some() {
            return Err(DomainError::conflict(format!(
                "workspace '{}' already exists",
                command.workspace_name
            )));
        }
        let base = require_workspace(state, &command.base_workspace_name)?;
        let base_stream = require_stream(state, base.current_content_stream_id)?;
        require_stream_absent(state, command.new_content_stream_id)?;

        Ok(EventsToPublish::new(
            content_stream_event_stream_name(&command.new_content_stream_id),
            vec![
                GraphEvent::ContentStreamWasForked {
                    new_content_stream_id: command.new_content_stream_id,
                    source_content_stream_id: base_stream.id,
                    source_version: base_stream.version,
                },
                GraphEvent::WorkspaceWasCreated {
                    workspace_name: command.workspace_name.clone(),
                    base_workspace_name: Some(command.base_workspace_name.clone()),
                    new_content_stream_id: command.new_content_stream_id,
                },
            ],
            ExpectedVersion::NoStream,
        ))
    }

    fn handle_create_node_aggregate_with_node(
        &self,
        command: &CreateNodeAggregateWithNode,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let stream = writable_workspace_stream(state, &command.workspace_name)?;
        self.require_point_in_space(command.origin.as_point())?;

        if state
            .covered_dimension_space_points(&stream.id, &command.node_aggregate_id)
            .is_some()
        {
            return Err(DomainError::conflict(format!(
                "node aggregate {} already exists in content stream {}",
                command.node_aggregate_id, stream.id
            )));
        }

        if let Some(parent) = command.parent_node_aggregate_id {
            let parent_covered = state
                .covered_dimension_space_points(&stream.id, &parent)
                .ok_or_else(|| {
                    DomainError::invariant(format!(
                        "parent node aggregate {parent} does not exist in content stream {}",
                        stream.id
                    ))
                })?;
            if !parent_covered.contains(command.origin.as_point()) {
                return Err(DomainError::invariant(format!(
                    "parent node aggregate {parent} does not cover origin {}",
                    command.origin
                )));
            }
        }

        let covered = self
            .variation_graph
            .specialization_set(command.origin.as_point())?;

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::NodeAggregateWithNodeWasCreated {
                content_stream_id: stream.id,
                node_aggregate_id: command.node_aggregate_id,
                node_type_name: command.node_type_name.clone(),
                origin: command.origin.clone(),
                covered_dimension_space_points: covered,
                parent_node_aggregate_id: command.parent_node_aggregate_id,
                initial_property_values: command.initial_property_values.clone(),
            }],
            ExpectedVersion::Exact(stream.version),
        ))
    }

    fn handle_set_node_properties(
        &self,
        command: &SetNodeProperties,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let stream = writable_workspace_stream(state, &command.workspace_name)?;
        self.require_point_in_space(command.origin.as_point())?;

        let origins = state
            .origin_dimension_space_points(&stream.id, &command.node_aggregate_id)
            .ok_or_else(|| node_aggregate_not_found(command.node_aggregate_id, stream.id))?;
        if !origins.contains(&command.origin) {
            return Err(DomainError::invariant(format!(
                "node aggregate {} has no variant at origin {}",
                command.node_aggregate_id, command.origin
            )));
        }

        let covered = state
            .covered_dimension_space_points(&stream.id, &command.node_aggregate_id)
            .unwrap_or_default();
        let affected = covered.intersection(
            &self
                .variation_graph
                .specialization_set(command.origin.as_point())?,
        );

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::NodePropertiesWereSet {
                content_stream_id: stream.id,
                node_aggregate_id: command.node_aggregate_id,
                origin: command.origin.clone(),
                affected_dimension_space_points: affected,
                property_values: command.property_values.clone(),
            }],
            ExpectedVersion::Exact(stream.version),
        ))
    }

    fn handle_create_node_variant(
        &self,
        command: &CreateNodeVariant,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let stream = writable_workspace_stream(state, &command.workspace_name)?;

        // Also validates both points and rejects source == target.
        let variant_type = self
            .variation_graph
            .variant_type(command.source_origin.as_point(), command.target_origin.as_point())?;

        let origins = state
            .origin_dimension_space_points(&stream.id, &command.node_aggregate_id)
            .ok_or_else(|| node_aggregate_not_found(command.node_aggregate_id, stream.id))?;
        if !origins.contains(&command.source_origin) {
            return Err(DomainError::invariant(format!(
                "node aggregate {} has no variant at source origin {}",
                command.node_aggregate_id, command.source_origin
            )));
        }
        if origins.contains(&command.target_origin) {
            return Err(DomainError::conflict(format!(
                "node aggregate {} already has a variant at {}",
                command.node_aggregate_id, command.target_origin
            )));
        }

        let covered = self
            .variation_graph
            .specialization_set(command.target_origin.as_point())?;

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::NodeVariantWasCreated {
                content_stream_id: stream.id,
                node_aggregate_id: command.node_aggregate_id,
                source_origin: command.source_origin.clone(),
                target_origin: command.target_origin.clone(),
                covered_dimension_space_points: covered,
                variant_type,
            }],
            ExpectedVersion::Exact(stream.version),
        ))
    }

    fn handle_move_node_aggregate(
        &self,
        command: &MoveNodeAggregate,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let stream = writable_workspace_stream(state, &command.workspace_name)?;
        self.require_point_in_space(&command.dimension_space_point)?;

        let covered = state
            .covered_dimension_space_points(&stream.id, &command.node_aggregate_id)
            .ok_or_else(|| node_aggregate_not_found(command.node_aggregate_id, stream.id))?;
        if !covered.contains(&command.dimension_space_point) {
            return Err(DomainError::invariant(format!(
                "node aggregate {} is not visible in {}",
                command.node_aggregate_id, command.dimension_space_point
            )));
        }

        if command.new_parent_node_aggregate_id == command.node_aggregate_id {
            return Err(DomainError::invariant(format!(
                "node aggregate {} cannot be moved below itself",
                command.node_aggregate_id
            )));
        }

        let parent_covered = state
            .covered_dimension_space_points(&stream.id, &command.new_parent_node_aggregate_id)
            .ok_or_else(|| {
                DomainError::invariant(format!(
                    "new parent node aggregate {} does not exist in content stream {}",
                    command.new_parent_node_aggregate_id, stream.id
                ))
            })?;
        if !parent_covered.contains(&command.dimension_space_point) {
            return Err(DomainError::invariant(format!(
                "new parent node aggregate {} does not cover {}",
                command.new_parent_node_aggregate_id, command.dimension_space_point
            )));
        }

        // The new parent must not be a descendant of the moved node.
        let mut visited = HashSet::new();
        let mut ancestor = Some(command.new_parent_node_aggregate_id);
        while let Some(current) = ancestor {
            if current == command.node_aggregate_id {
                return Err(DomainError::invariant(format!(
                    "node aggregate {} cannot be moved below its own descendant {}",
                    command.node_aggregate_id, command.new_parent_node_aggregate_id
                )));
            }
            if !visited.insert(current) {
                break;
            }
            ancestor =
                state.parent_node_aggregate(&stream.id, &current, &command.dimension_space_point);
        }

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::NodeAggregateWasMoved {
                content_stream_id: stream.id,
                node_aggregate_id: command.node_aggregate_id,
                dimension_space_point: command.dimension_space_point.clone(),
                new_parent_node_aggregate_id: command.new_parent_node_aggregate_id,
            }],
            ExpectedVersion::Exact(stream.version),
        ))
    }

    fn handle_remove_node_aggregate(
        &self,
        command: &RemoveNodeAggregate,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let stream = writable_workspace_stream(state, &command.workspace_name)?;
        self.require_point_in_space(&command.covered_dimension_space_point)?;

        let covered = state
            .covered_dimension_space_points(&stream.id, &command.node_aggregate_id)
            .ok_or_else(|| node_aggregate_not_found(command.node_aggregate_id, stream.id))?;
        if !covered.contains(&command.covered_dimension_space_point) {
            return Err(DomainError::invariant(format!(
                "node aggregate {} is not visible in {}",
                command.node_aggregate_id, command.covered_dimension_space_point
            )));
        }

        let affected = covered.intersection(
            &self
                .variation_graph
                .specialization_set(&command.covered_dimension_space_point)?,
        );

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::NodeAggregateWasRemoved {
                content_stream_id: stream.id,
                node_aggregate_id: command.node_aggregate_id,
                affected_covered_dimension_space_points: affected,
            }],
            ExpectedVersion::Exact(stream.version),
        ))
    }

    fn handle_publish_workspace(
        &self,
        command: &PublishWorkspace,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let (workspace, base_stream) =
            workspace_with_base_stream(state, &command.workspace_name)?;
        require_stream_absent(state, command.new_content_stream_id)?;

        Ok(EventsToPublish::new(
            content_stream_event_stream_name(&command.new_content_stream_id),
            vec![
                GraphEvent::ContentStreamWasForked {
                    new_content_stream_id: command.new_content_stream_id,
                    source_content_stream_id: base_stream.id,
                    source_version: base_stream.version,
                },
                GraphEvent::WorkspaceWasPublished {
                    workspace_name: command.workspace_name.clone(),
                    new_content_stream_id: command.new_content_stream_id,
                    previous_content_stream_id: workspace.current_content_stream_id,
                },
            ],
            ExpectedVersion::NoStream,
        ))
    }

    fn handle_rebase_workspace(
        &self,
        command: &RebaseWorkspace,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let (workspace, base_stream) =
            workspace_with_base_stream(state, &command.workspace_name)?;
        require_stream_absent(state, command.rebased_content_stream_id)?;

        Ok(EventsToPublish::new(
            content_stream_event_stream_name(&command.rebased_content_stream_id),
            vec![
                GraphEvent::ContentStreamWasForked {
                    new_content_stream_id: command.rebased_content_stream_id,
                    source_content_stream_id: base_stream.id,
                    source_version: base_stream.version,
                },
                GraphEvent::WorkspaceWasRebased {
                    workspace_name: command.workspace_name.clone(),
                    new_content_stream_id: command.rebased_content_stream_id,
                    previous_content_stream_id: workspace.current_content_stream_id,
                },
            ],
            ExpectedVersion::NoStream,
        ))
    }

    fn handle_discard_workspace(
        &self,
        command: &DiscardWorkspace,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let (workspace, base_stream) =
            workspace_with_base_stream(state, &command.workspace_name)?;
        require_stream_absent(state, command.new_content_stream_id)?;

        Ok(EventsToPublish::new(
            content_stream_event_stream_name(&command.new_content_stream_id),
            vec![
                GraphEvent::ContentStreamWasForked {
                    new_content_stream_id: command.new_content_stream_id,
                    source_content_stream_id: base_stream.id,
                    source_version: base_stream.version,
                },
                GraphEvent::WorkspaceWasDiscarded {
                    workspace_name: command.workspace_name.clone(),
                    new_content_stream_id: command.new_content_stream_id,
                    previous_content_stream_id: workspace.current_content_stream_id,
                },
            ],
            ExpectedVersion::NoStream,
        ))
    }

    fn handle_close_content_stream(
        &self,
        command: &CloseContentStream,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let mut stream = require_stream(state, command.content_stream_id)?;
        let expected = ExpectedVersion::Exact(stream.version);
        stream.transition_to(ContentStreamStatus::Closed)?;

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::ContentStreamWasClosed {
                content_stream_id: command.content_stream_id,
            }],
            expected,
        ))
    }

    fn handle_reopen_content_stream(
        &self,
        command: &ReopenContentStream,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let mut stream = require_stream(state, command.content_stream_id)?;
        if stream.status != ContentStreamStatus::Closed {
            return Err(DomainError::invariant(format!(
                "content stream {} is not closed (status {})",
                stream.id, stream.status
            )));
        }
        let expected = ExpectedVersion::Exact(stream.version);
        stream.transition_to(ContentStreamStatus::InUseByWorkspace)?;

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::ContentStreamWasReopened {
                content_stream_id: command.content_stream_id,
            }],
            expected,
        ))
    }

    fn handle_fork_content_stream(
        &self,
        command: &ForkContentStream,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let source = require_stream(state, command.source_content_stream_id)?;
        if source.status == ContentStreamStatus::NoLongerInUse {
            return Err(DomainError::invariant(format!(
                "content stream {} is no longer in use and cannot be forked",
                source.id
            )));
        }
        require_stream_absent(state, command.new_content_stream_id)?;

        Ok(EventsToPublish::new(
            content_stream_event_stream_name(&command.new_content_stream_id),
            vec![GraphEvent::ContentStreamWasForked {
                new_content_stream_id: command.new_content_stream_id,
                source_content_stream_id: source.id,
                source_version: source.version,
            }],
            ExpectedVersion::NoStream,
        ))
    }

    fn handle_remove_content_stream(
        &self,
        command: &RemoveContentStream,
        state: &dyn GraphReadModel,
    ) -> DomainResult<EventsToPublish<GraphEvent>> {
        let mut stream = require_stream(state, command.content_stream_id)?;
        if stream.status == ContentStreamStatus::InUseByWorkspace {
            return Err(DomainError::invariant(format!(
                "content stream {} is in use by a workspace and cannot be removed",
                stream.id
            )));
        }
        let expected = ExpectedVersion::Exact(stream.version);
        stream.transition_to(ContentStreamStatus::NoLongerInUse)?;

        Ok(EventsToPublish::new(
            stream.event_stream_name(),
            vec![GraphEvent::ContentStreamWasRemoved {
                content_stream_id: command.content_stream_id,
            }],
            expected,
        ))
    }
}

fn require_workspace(
    state: &dyn GraphReadModel,
    name: &WorkspaceName,
) -> DomainResult<WorkspaceRecord> {
    state
        .find_workspace(name)
        .ok_or_else(|| DomainError::not_found(format!("workspace '{name}'")))
}

fn require_stream(
    state: &dyn GraphReadModel,
    id: stratum_core::ContentStreamId,
) -> DomainResult<ContentStream> {
    state
        .find_content_stream(&id)
        .ok_or_else(|| DomainError::not_found(format!("content stream {id}")))
}

fn require_stream_absent(
    state: &dyn GraphReadModel,
    id: stratum_core::ContentStreamId,
) -> DomainResult<()> {
    if state.find_content_stream(&id).is_some() {
        return Err(DomainError::conflict(format!(
            "content stream {id} already exists"
        )));
    }
    Ok(())
}

/// The stream a workspace currently writes to, rejecting closed or
/// superseded streams.
fn writable_workspace_stream(
    state: &dyn GraphReadModel,
    workspace_name: &WorkspaceName,
) -> DomainResult<ContentStream> {
    let workspace = require_workspace(state, workspace_name)?;
    let stream = require_stream(state, workspace.current_content_stream_id)?;
    match stream.status {
        ContentStreamStatus::Created
        | ContentStreamStatus::Forked
        | ContentStreamStatus::InUseByWorkspace => Ok(stream),
        ContentStreamStatus::Closed => Err(DomainError::invariant(format!(
            "content stream {} of workspace '{workspace_name}' is closed",
            stream.id
        ))),
        ContentStreamStatus::NoLongerInUse => Err(DomainError::invariant(format!(
            "content stream {} of workspace '{workspace_name}' is no longer in use",
            stream.id
        ))),
    }
}

fn workspace_with_base_stream(
    state: &dyn GraphReadModel,
    workspace_name: &WorkspaceName,
) -> DomainResult<(WorkspaceRecord, ContentStream)> {
    let workspace = require_workspace(state, workspace_name)?;
    let base_name = workspace.base_workspace_name.clone().ok_or_else(|| {
        DomainError::invariant(format!(
            "workspace '{workspace_name}' has no base workspace"
        ))
    })?;
    let base = require_workspace(state, &base_name)?;
    let base_stream = require_stream(state, base.current_content_stream_id)?;
    Ok((workspace, base_stream))
}

fn node_aggregate_not_found(
    node: stratum_core::NodeAggregateId,
    stream: stratum_core::ContentStreamId,
) -> DomainError {
    DomainError::not_found(format!(
        "node aggregate {node} in content stream {stream}"
    ))
}
