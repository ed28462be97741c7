//! Workspace publish / rebase / discard orchestration.
//!
//! Publish and rebase never mutate an existing content stream in place:
//! both replay the workspace's own commands through the command simulator
//! and only commit the buffered events once the whole run applied cleanly.
//! A failure mid-operation reopens the workspace's stream and leaves prior
//! state intact.

use thiserror::Error;

use stratum_core::{ContentStreamId, ExpectedVersion, SequenceNumber, WorkspaceName};
use stratum_events::{
    EventStore, EventStoreError, ReadDirection, StoredEvent, StreamSelector,
};
use stratum_graph::{
    Command, GraphReadModel, command::{CloseContentStream, DiscardWorkspace, PublishWorkspace, RebaseWorkspace, ReopenContentStream},
    content_stream_event_stream_name,
};

use crate::dispatcher::{
    CAUSATION_ID_METADATA_KEY, CommandDispatcher, DispatchError, INITIATING_COMMAND_METADATA_KEY,
};
use crate::simulator::{CommandSimulator, SimulationError};
use crate::subscription::{SubscriptionEngine, SubscriptionEngineError};
use std::sync::Arc;

#[derive(Debug, Error)]
pub enum WorkspacePublishingError {
    #[error("workspace '{0}' not found")]
    WorkspaceNotFound(WorkspaceName),

    #[error("workspace '{0}' has no base workspace")]
    NoBaseWorkspace(WorkspaceName),

    #[error("content stream {0} not found")]
    ContentStreamNotFound(ContentStreamId),

    /// A replayed command failed its constraint checks during simulation.
    #[error("command {command_index} failed during simulation: {source}")]
    Simulation {
        command_index: usize,
        #[source]
        source: SimulationError,
    },

    /// Forking / rebinding inside the simulation failed.
    #[error("simulation preparation failed: {0}")]
    Preparation(#[source] SimulationError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Engine(#[from] SubscriptionEngineError),

    #[error("catch-up reported errors: {0}")]
    CatchUp(String),

    #[error("stored command could not be deserialized: {0}")]
    CommandDeserialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Events appended to the base stream.
    pub published_events: usize,
    /// The stream the workspace continues on.
    pub new_content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseResult {
    /// Commands replayed onto the new base.
    pub rebased_commands: usize,
    pub new_content_stream_id: ContentStreamId,
}

/// Drives publish, rebase and discard for one repository.
pub struct WorkspacePublishingService<S: EventStore> {
    dispatcher: CommandDispatcher<S>,
    engine: Arc<SubscriptionEngine<S>>,
}

impl<S: EventStore> WorkspacePublishingService<S> {
    pub fn new(dispatcher: CommandDispatcher<S>, engine: Arc<SubscriptionEngine<S>>) -> Self {
        Self { dispatcher, engine }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S> {
        &self.dispatcher
    }

    /// Apply the workspace's changes onto its base, then continue the
    /// workspace on a fresh fork of the advanced base.
    pub fn publish_workspace(
        &self,
        workspace_name: &WorkspaceName,
    ) -> Result<PublishResult, WorkspacePublishingError> {
        let projection = self.dispatcher.projection().clone();
        let workspace = projection
            .find_workspace(workspace_name)
            .ok_or_else(|| WorkspacePublishingError::WorkspaceNotFound(workspace_name.clone()))?;
        let base_name = workspace
            .base_workspace_name
            .clone()
            .ok_or_else(|| WorkspacePublishingError::NoBaseWorkspace(workspace_name.clone()))?;
        let base_workspace = projection
            .find_workspace(&base_name)
            .ok_or_else(|| WorkspacePublishingError::WorkspaceNotFound(base_name.clone()))?;
        let previous_stream = workspace.current_content_stream_id;

        let commands = self.extract_rebaseable_commands(previous_stream)?;

        self.close_stream(workspace_name, previous_stream)?;

        let result: Result<PublishResult, WorkspacePublishingError> = (|| {
            let base_stream = projection
                .find_content_stream(&base_workspace.current_content_stream_id)
                .ok_or(WorkspacePublishingError::ContentStreamNotFound(
                    base_workspace.current_content_stream_id,
                ))?;
            let base_version = base_stream.version;
            let base_stream_name = content_stream_event_stream_name(&base_stream.id);

            // Constraint-check the workspace's commands against the base.
            let simulator = CommandSimulator::new(
                projection.as_ref(),
                self.dispatcher.bus(),
                base_name.clone(),
            );
            run_simulation(&simulator, None, &commands)?;
            let buffered = simulator.buffered_events()?;

            if !buffered.is_empty() {
                // Optimistic append: if the base advanced concurrently this
                // fails as a retryable conflict and nothing is written.
                let uncommitted = buffered.iter().map(StoredEvent::to_uncommitted).collect();
                self.dispatcher.store().append(
                    &base_stream_name,
                    uncommitted,
                    ExpectedVersion::Exact(base_version),
                )?;
                self.sync()?;
            }

            let publish = PublishWorkspace::create(workspace_name.clone());
            let new_content_stream_id = publish.new_content_stream_id;
            self.dispatcher.dispatch(&Command::PublishWorkspace(publish))?;
            self.sync()?;

            tracing::info!(
                workspace = %workspace_name,
                published_events = buffered.len(),
                "published workspace"
            );

            Ok(PublishResult {
                published_events: buffered.len(),
                new_content_stream_id,
            })
        })();

        if result.is_err() {
            self.reopen_stream_best_effort(workspace_name, previous_stream);
        }
        result
    }

    /// Replay the workspace's own commands onto a fresh fork of its base.
    pub fn rebase_workspace(
        &self,
        workspace_name: &WorkspaceName,
    ) -> Result<RebaseResult, WorkspacePublishingError> {
        let projection = self.dispatcher.projection().clone();
        let workspace = projection
            .find_workspace(workspace_name)
            .ok_or_else(|| WorkspacePublishingError::WorkspaceNotFound(workspace_name.clone()))?;
        workspace
            .base_workspace_name
            .clone()
            .ok_or_else(|| WorkspacePublishingError::NoBaseWorkspace(workspace_name.clone()))?;
        let previous_stream = workspace.current_content_stream_id;

        let commands = self.extract_rebaseable_commands(previous_stream)?;

        self.close_stream(workspace_name, previous_stream)?;

        let result: Result<RebaseResult, WorkspacePublishingError> = (|| {
            let rebase = RebaseWorkspace::create(workspace_name.clone());
            let new_content_stream_id = rebase.rebased_content_stream_id;

            let simulator = CommandSimulator::new(
                projection.as_ref(),
                self.dispatcher.bus(),
                workspace_name.clone(),
            );
            run_simulation(
                &simulator,
                Some(Command::RebaseWorkspace(rebase)),
                &commands,
            )?;
            let buffered = simulator.buffered_events()?;

            self.commit_buffered(&buffered)?;
            self.sync()?;

            tracing::info!(
                workspace = %workspace_name,
                rebased_commands = commands.len(),
                "rebased workspace"
            );

            Ok(RebaseResult {
                rebased_commands: commands.len(),
                new_content_stream_id,
            })
        })();

        if result.is_err() {
            self.reopen_stream_best_effort(workspace_name, previous_stream);
        }
        result
    }

    /// Throw the workspace's changes away; continue on a fresh fork of the
    /// base.
    pub fn discard_workspace(
        &self,
        workspace_name: &WorkspaceName,
    ) -> Result<ContentStreamId, WorkspacePublishingError> {
        let discard = DiscardWorkspace::create(workspace_name.clone());
        let new_content_stream_id = discard.new_content_stream_id;
        self.dispatcher.dispatch(&Command::DiscardWorkspace(discard))?;
        self.sync()?;
        Ok(new_content_stream_id)
    }

    /// The workspace's own commands, re-read from its stream's event
    /// metadata (one command per causation id, node-level commands only).
    fn extract_rebaseable_commands(
        &self,
        stream: ContentStreamId,
    ) -> Result<Vec<Command>, WorkspacePublishingError> {
        let events = self.dispatcher.store().read(
            &StreamSelector::Stream(content_stream_event_stream_name(&stream)),
            SequenceNumber::none(),
            ReadDirection::Forward,
        )?;

        let mut commands = Vec::new();
        let mut last_causation: Option<serde_json::Value> = None;
        for event in &events {
            let causation = event.metadata.get(CAUSATION_ID_METADATA_KEY);
            if causation.is_some() && causation == last_causation.as_ref() {
                continue;
            }
            last_causation = causation.cloned();

            let Some(raw) = event.metadata.get(INITIATING_COMMAND_METADATA_KEY) else {
                continue;
            };
            let command: Command = serde_json::from_value(raw.clone())
                .map_err(|e| WorkspacePublishingError::CommandDeserialization(e.to_string()))?;
            if command.is_rebaseable() {
                commands.push(command);
            }
        }
        Ok(commands)
    }

    /// Commit buffered simulation events to the real log, preserving order.
    ///
    /// The target streams are private to this operation (a fresh fork), so
    /// no concurrent writer exists and no expected version applies.
    fn commit_buffered(&self, buffered: &[StoredEvent]) -> Result<(), WorkspacePublishingError> {
        let mut index = 0;
        while index < buffered.len() {
            let stream_name = buffered[index].stream_name.clone();
            let mut batch = Vec::new();
            while index < buffered.len() && buffered[index].stream_name == stream_name {
                batch.push(buffered[index].to_uncommitted());
                index += 1;
            }
            self.dispatcher
                .store()
                .append(&stream_name, batch, ExpectedVersion::Any)?;
        }
        Ok(())
    }

    fn close_stream(
        &self,
        workspace_name: &WorkspaceName,
        stream: ContentStreamId,
    ) -> Result<(), WorkspacePublishingError> {
        self.dispatcher
            .dispatch(&Command::CloseContentStream(CloseContentStream {
                workspace_name: workspace_name.clone(),
                content_stream_id: stream,
            }))?;
        self.sync()
    }

    fn reopen_stream_best_effort(&self, workspace_name: &WorkspaceName, stream: ContentStreamId) {
        let reopen = Command::ReopenContentStream(ReopenContentStream {
            workspace_name: workspace_name.clone(),
            content_stream_id: stream,
        });
        if let Err(error) = self
            .dispatcher
            .dispatch(&reopen)
            .map_err(WorkspacePublishingError::from)
            .and_then(|_| self.sync())
        {
            tracing::error!(
                workspace = %workspace_name,
                %error,
                "failed to reopen content stream after aborted publish/rebase"
            );
        }
    }

    fn sync(&self) -> Result<(), WorkspacePublishingError> {
        let result = self.engine.catch_up()?;
        if let Some(error) = result.errors.first() {
            return Err(WorkspacePublishingError::CatchUp(format!(
                "subscription '{}': {}",
                error.subscription_id, error.message
            )));
        }
        Ok(())
    }
}

/// Run the optional preparation command and then every workspace command
/// through the simulation, mapping failures to their origin.
fn run_simulation(
    simulator: &CommandSimulator<'_>,
    preparation: Option<Command>,
    commands: &[Command],
) -> Result<(), WorkspacePublishingError> {
    simulator.run(|scope| {
        if let Some(preparation) = &preparation {
            scope
                .handle(preparation)
                .map_err(WorkspacePublishingError::Preparation)?;
        }
        for (command_index, command) in commands.iter().enumerate() {
            scope.handle(command).map_err(|source| {
                WorkspacePublishingError::Simulation {
                    command_index,
                    source,
                }
            })?;
        }
        Ok(())
    })
}
