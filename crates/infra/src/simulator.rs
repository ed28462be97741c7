//! Dry-run command execution for publish and rebase.
//!
//! The simulator answers "if these commands were applied to workspace W,
//! which events would result, and would any fail?" without committing
//! anything: constraint checks and projection updates run against the live
//! projection inside a rollback-only scope, and the produced events go to a
//! private in-memory buffer with its own sequence counter, never to the
//! real log.

use thiserror::Error;

use stratum_core::{DomainError, ExpectedVersion, SequenceNumber, WorkspaceName};
use stratum_events::{
    Command as _, EventStore, EventStoreError, InMemoryEventStore, Projection, ProjectionError,
    ReadDirection, StoredEvent, StreamSelector, UncommittedEvent,
};
use stratum_graph::{Command, CommandBus};

use crate::dispatcher::command_metadata;
use crate::projection::GraphProjection;

#[derive(Debug, Error)]
pub enum SimulationError {
    /// The first violated constraint; aborts the simulated command.
    #[error(transparent)]
    Constraint(#[from] DomainError),

    #[error("simulation buffer error: {0}")]
    Buffer(#[from] EventStoreError),

    #[error("projection error during simulation: {0}")]
    Projection(#[from] ProjectionError),

    #[error("command serialization failed: {0}")]
    Serialization(String),
}

/// Replays commands against the live projection without committing.
///
/// One simulator drives one simulation run; the buffered events remain
/// readable after the run for the caller to commit or discard.
pub struct CommandSimulator<'a> {
    projection: &'a GraphProjection,
    bus: &'a CommandBus,
    workspace_name: WorkspaceName,
    buffer: InMemoryEventStore,
}

impl<'a> CommandSimulator<'a> {
    pub fn new(
        projection: &'a GraphProjection,
        bus: &'a CommandBus,
        workspace_name: WorkspaceName,
    ) -> Self {
        Self {
            projection,
            bus,
            workspace_name,
            buffer: InMemoryEventStore::new(),
        }
    }

    /// Run `f` inside the rollback-only scope.
    ///
    /// Whatever `f` did to the projection is rolled back when this returns,
    /// success or failure. Panics immediately if another simulation is
    /// already open on the same projection.
    pub fn run<T>(&self, f: impl FnOnce(&SimulationScope<'_>) -> T) -> T {
        self.projection
            .in_simulation(|| f(&SimulationScope { simulator: self }))
    }

    /// Convenience: simulate a command sequence, stopping at the first
    /// failure; returns the buffered events on success.
    pub fn simulate_commands(
        &self,
        commands: &[Command],
    ) -> Result<Vec<StoredEvent>, SimulationError> {
        self.run(|scope| {
            for command in commands {
                scope.handle(command)?;
            }
            Ok::<(), SimulationError>(())
        })?;
        Ok(self.buffered_events()?)
    }

    /// All events buffered so far, in buffer sequence order.
    pub fn buffered_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.buffer.read(
            &StreamSelector::All,
            SequenceNumber::none(),
            ReadDirection::Forward,
        )
    }

    pub fn current_sequence_number(&self) -> Result<SequenceNumber, EventStoreError> {
        self.buffer.last_sequence_number()
    }
}

/// Handle to a running simulation; only exists inside [`CommandSimulator::run`].
pub struct SimulationScope<'a> {
    simulator: &'a CommandSimulator<'a>,
}

impl SimulationScope<'_> {
    /// Handle one command within the running simulation.
    ///
    /// The command is rewritten to the simulation workspace so constraint
    /// checks stay consistent, its events are buffered, and the buffered
    /// events are immediately replayed into the (uncommitted) projection so
    /// the next command sees their effects.
    pub fn handle(&self, command: &Command) -> Result<(), SimulationError> {
        let simulator = self.simulator;
        let rewritten = command.copy_for_workspace(&simulator.workspace_name);

        let to_publish = simulator.bus.handle(&rewritten, simulator.projection)?;
        if to_publish.is_empty() {
            return Ok(());
        }

        let metadata =
            command_metadata(&rewritten).map_err(|e| SimulationError::Serialization(e.to_string()))?;
        let uncommitted = to_publish
            .events
            .iter()
            .map(|event| UncommittedEvent::from_typed(event, metadata.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let sequence_before_commit = simulator.buffer.last_sequence_number()?;

        // The buffer is process-local and single-owner, so the expected
        // version of the persistent stream does not apply here.
        simulator.buffer.append(
            &to_publish.stream_name,
            uncommitted,
            ExpectedVersion::Any,
        )?;

        // Read back everything past the pre-append position and feed it to
        // the projection within the open (to-be-rolled-back) scope.
        let replay = simulator.buffer.read(
            &StreamSelector::All,
            sequence_before_commit.next(),
            ReadDirection::Forward,
        )?;
        for event in &replay {
            simulator.projection.apply(event)?;
        }

        Ok(())
    }
}
