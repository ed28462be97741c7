//! Integration tests for the full write core.
//!
//! Command → CommandBus → EventStore → SubscriptionEngine → GraphProjection,
//! plus the simulator-driven publish/rebase path and the pruner.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use stratum_core::{
    ContentStreamId, ExpectedVersion, NodeAggregateId, SequenceNumber, Version, WorkspaceName,
};
use stratum_dimension::{
    ContentDimension, ContentDimensionId, ContentDimensionValue, DimensionSpacePoint,
    InterDimensionalVariationGraph, OriginDimensionSpacePoint,
};
use stratum_events::{
    CatchUpHook, EventStore, InMemoryEventStore, Projection, ProjectionError, ProjectionStatus,
    ReadDirection, RunMode, StoredEvent, StreamSelector, SubscriptionGroup, SubscriptionId,
    SubscriptionStatus, UncommittedEvent,
};
use stratum_graph::{
    Command, CommandBus, ContentStreamStatus, GraphReadModel, NodeTypeName, PropertyValues,
    command::{
        CreateNodeAggregateWithNode, CreateNodeVariant, CreateRootWorkspace, CreateWorkspace,
        ForkContentStream, RemoveContentStream, SetNodeProperties,
    },
    content_stream_event_stream_name,
};

use crate::dispatcher::CommandDispatcher;
use crate::projection::GraphProjection;
use crate::pruner::ContentStreamPruner;
use crate::publishing::{WorkspacePublishingError, WorkspacePublishingService};
use crate::simulator::CommandSimulator;
use crate::subscription::{
    InMemorySubscriptionStore, ProjectionSubscriber, SubscriptionEngine, SubscriptionStore,
};

type Store = Arc<InMemoryEventStore>;

const GRAPH_SUBSCRIPTION: &str = "contentGraph";

fn value(s: &str) -> ContentDimensionValue {
    ContentDimensionValue::try_new(s).unwrap()
}

fn language_space() -> Arc<InterDimensionalVariationGraph> {
    Arc::new(
        InterDimensionalVariationGraph::try_create(vec![
            ContentDimension::try_create(
                ContentDimensionId::try_new("language").unwrap(),
                vec![
                    (value("en"), None),
                    (value("de"), Some(value("en"))),
                    (value("de-ch"), Some(value("de"))),
                ],
            )
            .unwrap(),
        ])
        .unwrap(),
    )
}

fn point(language: &str) -> DimensionSpacePoint {
    DimensionSpacePoint::from_coordinates([(
        ContentDimensionId::try_new("language").unwrap(),
        value(language),
    )])
}

fn origin(language: &str) -> OriginDimensionSpacePoint {
    OriginDimensionSpacePoint::from_point(point(language))
}

fn workspace(name: &str) -> WorkspaceName {
    WorkspaceName::try_new(name).unwrap()
}

/// A recording projection with a switchable failure, for engine tests.
#[derive(Default)]
struct RecordingProjection {
    applied: Mutex<Vec<SequenceNumber>>,
    fail_on_event_type: Mutex<Option<String>>,
}

impl RecordingProjection {
    fn applied(&self) -> Vec<SequenceNumber> {
        self.applied.lock().unwrap().clone()
    }

    fn fail_on(&self, event_type: Option<&str>) {
        *self.fail_on_event_type.lock().unwrap() = event_type.map(str::to_string);
    }
}

impl Projection for RecordingProjection {
    fn set_up(&self) -> Result<(), ProjectionError> {
        Ok(())
    }

    fn status(&self) -> ProjectionStatus {
        ProjectionStatus::Ok
    }

    fn apply(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        if self
            .fail_on_event_type
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|t| t == event.event_type)
        {
            return Err(ProjectionError::Apply {
                event_type: event.event_type.clone(),
                message: "injected failure".to_string(),
            });
        }
        self.applied.lock().unwrap().push(event.sequence_number);
        Ok(())
    }

    fn reset_state(&self) -> Result<(), ProjectionError> {
        self.applied.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(Default)]
struct CountingHook {
    before_events: AtomicUsize,
    after_events: AtomicUsize,
    batches: AtomicUsize,
    runs: AtomicUsize,
}

impl CatchUpHook for CountingHook {
    fn on_before_event(&self, _event: &StoredEvent) {
        self.before_events.fetch_add(1, Ordering::SeqCst);
    }

    fn on_after_event(&self, _event: &StoredEvent) {
        self.after_events.fetch_add(1, Ordering::SeqCst);
    }

    fn on_after_batch_completed(&self) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }

    fn on_after_catch_up(&self) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

struct TestRig {
    store: Store,
    projection: Arc<GraphProjection>,
    subscription_store: Arc<InMemorySubscriptionStore>,
    engine: Arc<SubscriptionEngine<Store>>,
    service: WorkspacePublishingService<Store>,
    recording: Arc<RecordingProjection>,
    hook: Arc<CountingHook>,
}

impl TestRig {
    fn new() -> Self {
        stratum_observability::init();
        let store: Store = Arc::new(InMemoryEventStore::new());
        let projection = Arc::new(GraphProjection::new());
        let recording = Arc::new(RecordingProjection::default());
        let hook = Arc::new(CountingHook::default());
        let subscription_store = Arc::new(InMemorySubscriptionStore::new());

        let subscribers = vec![
            ProjectionSubscriber::new(
                SubscriptionId::try_new(GRAPH_SUBSCRIPTION).unwrap(),
                SubscriptionGroup::projections(),
                RunMode::FromBeginning,
                projection.clone() as Arc<dyn Projection>,
            ),
            ProjectionSubscriber::new(
                SubscriptionId::try_new("recording").unwrap(),
                SubscriptionGroup::projections(),
                RunMode::FromBeginning,
                recording.clone() as Arc<dyn Projection>,
            )
            .with_hook(hook.clone() as Arc<dyn CatchUpHook>),
        ];

        let engine = Arc::new(SubscriptionEngine::new(
            store.clone(),
            subscription_store.clone() as Arc<dyn SubscriptionStore>,
            subscribers,
        ));
        engine.setup().unwrap();
        engine.boot().unwrap();

        let bus = CommandBus::new(language_space());
        let dispatcher = CommandDispatcher::new(store.clone(), bus, projection.clone());
        let service = WorkspacePublishingService::new(dispatcher, engine.clone());

        Self {
            store,
            projection,
            subscription_store,
            engine,
            service,
            recording,
            hook,
        }
    }

    fn dispatch(&self, command: Command) -> Vec<StoredEvent> {
        let committed = self.service.dispatcher().dispatch(&command).unwrap();
        self.engine.catch_up().unwrap();
        committed
    }

    /// Root workspace `live` with a fresh content stream.
    fn create_live(&self) -> ContentStreamId {
        let command = CreateRootWorkspace::create(workspace("live"));
        let stream = command.new_content_stream_id;
        self.dispatch(Command::CreateRootWorkspace(command));
        stream
    }

    fn create_workspace_on(&self, name: &str, base: &str) -> ContentStreamId {
        let command = CreateWorkspace::create(workspace(name), workspace(base));
        let stream = command.new_content_stream_id;
        self.dispatch(Command::CreateWorkspace(command));
        stream
    }

    fn create_node(&self, ws: &str, language: &str) -> NodeAggregateId {
        let node = NodeAggregateId::new();
        self.dispatch(Command::CreateNodeAggregateWithNode(
            CreateNodeAggregateWithNode {
                workspace_name: workspace(ws),
                node_aggregate_id: node,
                node_type_name: NodeTypeName::try_new("acme:document").unwrap(),
                origin: origin(language),
                parent_node_aggregate_id: None,
                initial_property_values: PropertyValues::empty(),
            },
        ));
        node
    }

    fn graph_subscription(&self) -> crate::subscription::Subscription {
        self.subscription_store
            .load(&SubscriptionId::try_new(GRAPH_SUBSCRIPTION).unwrap())
            .unwrap()
    }

    fn recording_subscription(&self) -> crate::subscription::Subscription {
        self.subscription_store
            .load(&SubscriptionId::try_new("recording").unwrap())
            .unwrap()
    }
}

fn set_properties_command(ws: &str, node: NodeAggregateId, language: &str) -> Command {
    Command::SetNodeProperties(SetNodeProperties {
        workspace_name: workspace(ws),
        node_aggregate_id: node,
        origin: origin(language),
        property_values: [("title".to_string(), serde_json::json!("Home"))]
            .into_iter()
            .collect(),
    })
}

#[test]
fn command_pipeline_updates_the_read_model_through_catch_up() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let node = rig.create_node("live", "de");

    assert!(rig.projection.node_exists(&live_stream, &node));
    let covered = rig
        .projection
        .covered_dimension_space_points(&live_stream, &node)
        .unwrap();
    assert!(covered.contains(&point("de")));
    assert!(covered.contains(&point("de-ch")));
    assert!(!covered.contains(&point("en")));

    // Position equals the last successfully applied sequence number.
    assert_eq!(
        rig.graph_subscription().position(),
        rig.store.last_sequence_number().unwrap()
    );
    assert_eq!(rig.graph_subscription().status(), SubscriptionStatus::Active);
}

#[test]
fn stale_expected_version_fails_the_append_without_writing() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let stream_name = content_stream_event_stream_name(&live_stream);
    let before = rig.store.last_sequence_number().unwrap();

    let event = stratum_graph::GraphEvent::ContentStreamWasClosed {
        content_stream_id: live_stream,
    };
    let uncommitted =
        UncommittedEvent::from_typed(&event, serde_json::Map::new()).unwrap();
    let result = rig.store.append(
        &stream_name,
        vec![uncommitted],
        ExpectedVersion::Exact(Version::from_u64(1)),
    );

    assert!(result.unwrap_err().is_concurrency_conflict());
    assert_eq!(rig.store.last_sequence_number().unwrap(), before);
}

#[test]
fn dispatch_surfaces_concurrency_conflicts_as_retryable() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();

    // Make the projection's view of the stream version stale.
    let event = stratum_graph::GraphEvent::ContentStreamWasClosed {
        content_stream_id: live_stream,
    };
    let uncommitted = UncommittedEvent::from_typed(&event, serde_json::Map::new()).unwrap();
    rig.store
        .append(
            &content_stream_event_stream_name(&live_stream),
            vec![uncommitted],
            ExpectedVersion::Any,
        )
        .unwrap();

    let command = Command::CreateNodeAggregateWithNode(CreateNodeAggregateWithNode {
        workspace_name: workspace("live"),
        node_aggregate_id: NodeAggregateId::new(),
        node_type_name: NodeTypeName::try_new("acme:document").unwrap(),
        origin: origin("en"),
        parent_node_aggregate_id: None,
        initial_property_values: PropertyValues::empty(),
    });
    let error = rig.service.dispatcher().dispatch(&command).unwrap_err();
    assert!(error.is_retryable());

    // After catching up, the retry succeeds.
    rig.engine.catch_up().unwrap();
    // The stream is now closed, so reopen it first to make it writable.
    rig.dispatch(Command::ReopenContentStream(
        stratum_graph::command::ReopenContentStream {
            workspace_name: workspace("live"),
            content_stream_id: live_stream,
        },
    ));
    rig.service.dispatcher().dispatch(&command).unwrap();
}

#[test]
fn simulation_is_deterministic() {
    let rig = TestRig::new();
    rig.create_live();
    let node = rig.create_node("live", "de");

    let commands = vec![
        set_properties_command("live", node, "de"),
        Command::CreateNodeVariant(CreateNodeVariant {
            workspace_name: workspace("live"),
            node_aggregate_id: node,
            source_origin: origin("de"),
            target_origin: origin("de-ch"),
        }),
    ];

    let fingerprint = |events: &[StoredEvent]| -> Vec<(String, serde_json::Value)> {
        events
            .iter()
            .map(|e| (e.event_type.clone(), e.payload.clone()))
            .collect()
    };

    let bus = rig.service.dispatcher().bus().clone();
    let first = CommandSimulator::new(rig.projection.as_ref(), &bus, workspace("live"))
        .simulate_commands(&commands)
        .unwrap();
    let second = CommandSimulator::new(rig.projection.as_ref(), &bus, workspace("live"))
        .simulate_commands(&commands)
        .unwrap();

    assert!(!first.is_empty());
    assert_eq!(fingerprint(&first), fingerprint(&second));
}

#[test]
fn simulation_leaves_live_state_untouched() {
    let rig = TestRig::new();
    rig.create_live();
    let node = rig.create_node("live", "de");
    let state_before = rig.projection.state_for_testing();
    let sequence_before = rig.store.last_sequence_number().unwrap();

    let bus = rig.service.dispatcher().bus().clone();

    // Successful run.
    CommandSimulator::new(rig.projection.as_ref(), &bus, workspace("live"))
        .simulate_commands(&[set_properties_command("live", node, "de")])
        .unwrap();
    assert_eq!(rig.projection.state_for_testing(), state_before);

    // Failing run: the second command violates a constraint.
    let failing = CommandSimulator::new(rig.projection.as_ref(), &bus, workspace("live"))
        .simulate_commands(&[
            set_properties_command("live", node, "de"),
            set_properties_command("live", NodeAggregateId::new(), "de"),
        ]);
    assert!(failing.is_err());
    assert_eq!(rig.projection.state_for_testing(), state_before);

    // Nothing ever reached the real log.
    assert_eq!(rig.store.last_sequence_number().unwrap(), sequence_before);
}

#[test]
fn catch_up_fail_stops_and_retries_from_the_saved_position() {
    let rig = TestRig::new();
    rig.create_live();
    let node = rig.create_node("live", "de");
    let position_before = rig.recording_subscription().position();

    // The next properties event will fail in the recording projection.
    rig.recording.fail_on(Some("node.properties_were_set"));
    rig.service
        .dispatcher()
        .dispatch(&set_properties_command("live", node, "de"))
        .unwrap();
    let failing_sequence = rig.store.last_sequence_number().unwrap();

    let result = rig.engine.catch_up().unwrap();
    assert!(!result.finished);
    assert_eq!(result.errors.len(), 1);

    let subscription = rig.recording_subscription();
    assert_eq!(subscription.status(), SubscriptionStatus::Error);
    assert_eq!(subscription.retry_attempt(), 1);
    assert_eq!(subscription.position(), position_before);
    assert_eq!(
        subscription.error().unwrap().previous_status,
        SubscriptionStatus::Active
    );
    assert!(!rig.recording.applied().contains(&failing_sequence));

    // Retrying without a fix increments the attempt, position stays.
    rig.engine.catch_up().unwrap();
    assert_eq!(rig.recording_subscription().retry_attempt(), 2);
    assert_eq!(rig.recording_subscription().position(), position_before);

    // After the fix, the retry resumes from the saved position.
    rig.recording.fail_on(None);
    let result = rig.engine.catch_up().unwrap();
    assert!(result.finished);
    let subscription = rig.recording_subscription();
    assert_eq!(subscription.status(), SubscriptionStatus::Active);
    assert_eq!(subscription.retry_attempt(), 0);
    assert_eq!(subscription.position(), failing_sequence);
    assert!(rig.recording.applied().contains(&failing_sequence));
}

#[test]
fn after_event_hooks_fire_exactly_once_per_applied_event() {
    let rig = TestRig::new();
    rig.create_live();
    let node = rig.create_node("live", "de");

    let before = rig.hook.before_events.load(Ordering::SeqCst);
    let after = rig.hook.after_events.load(Ordering::SeqCst);
    assert_eq!(before, after);

    rig.recording.fail_on(Some("node.properties_were_set"));
    rig.service
        .dispatcher()
        .dispatch(&set_properties_command("live", node, "de"))
        .unwrap();
    rig.engine.catch_up().unwrap();

    // The failing event fired its before hook but not its after hook.
    assert_eq!(
        rig.hook.before_events.load(Ordering::SeqCst),
        rig.hook.after_events.load(Ordering::SeqCst) + 1
    );

    rig.recording.fail_on(None);
    rig.engine.catch_up().unwrap();
    // Applied exactly once now; the before hook ran twice (initial + retry).
    assert_eq!(rig.hook.after_events.load(Ordering::SeqCst), after + 1);
}

#[test]
fn reset_rewinds_to_zero_and_replays_history() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let node = rig.create_node("live", "de");
    let state_before = rig.projection.state_for_testing();

    let id = SubscriptionId::try_new(GRAPH_SUBSCRIPTION).unwrap();
    rig.engine.reset(&id).unwrap();
    let subscription = rig.graph_subscription();
    assert_eq!(subscription.status(), SubscriptionStatus::New);
    assert_eq!(subscription.position(), SequenceNumber::none());
    assert!(!rig.projection.node_exists(&live_stream, &node));

    rig.engine.boot().unwrap();
    assert_eq!(
        rig.graph_subscription().position(),
        rig.store.last_sequence_number().unwrap()
    );
    assert_eq!(rig.projection.state_for_testing(), state_before);
}

#[test]
fn from_now_subscriptions_skip_history() {
    let rig = TestRig::new();
    rig.create_live();

    let late = Arc::new(RecordingProjection::default());
    let engine = SubscriptionEngine::new(
        rig.store.clone(),
        Arc::new(InMemorySubscriptionStore::new()) as Arc<dyn SubscriptionStore>,
        vec![ProjectionSubscriber::new(
            SubscriptionId::try_new("late").unwrap(),
            SubscriptionGroup::projections(),
            RunMode::FromNow,
            late.clone() as Arc<dyn Projection>,
        )],
    );
    engine.setup().unwrap();
    engine.catch_up().unwrap();
    assert!(late.applied().is_empty());

    rig.create_node("live", "en");
    engine.catch_up().unwrap();
    assert!(!late.applied().is_empty());
}

#[test]
fn publish_applies_workspace_changes_to_the_base() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let ws_stream = rig.create_workspace_on("user-alice", "live");
    let node = rig.create_node("user-alice", "de");

    assert!(!rig.projection.node_exists(&live_stream, &node));

    let result = rig.service.publish_workspace(&workspace("user-alice")).unwrap();
    assert!(result.published_events > 0);

    // The base now has the node; the workspace continues on a fresh fork.
    assert!(rig.projection.node_exists(&live_stream, &node));
    let ws = rig.projection.find_workspace(&workspace("user-alice")).unwrap();
    assert_eq!(ws.current_content_stream_id, result.new_content_stream_id);
    assert_ne!(ws.current_content_stream_id, ws_stream);
    assert!(rig
        .projection
        .node_exists(&result.new_content_stream_id, &node));

    let previous = rig.projection.find_content_stream(&ws_stream).unwrap();
    assert_eq!(previous.status, ContentStreamStatus::NoLongerInUse);
}

#[test]
fn rebase_replays_commands_onto_the_advanced_base() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let node_before_fork = rig.create_node("live", "en");
    let ws_stream = rig.create_workspace_on("user-alice", "live");

    // Base advances after the fork, workspace edits independently.
    let node_in_live = rig.create_node("live", "de");
    let node_in_ws = rig.create_node("user-alice", "en");
    assert!(!rig.projection.node_exists(&ws_stream, &node_in_live));

    let result = rig.service.rebase_workspace(&workspace("user-alice")).unwrap();
    assert_eq!(result.rebased_commands, 1);

    let rebased = result.new_content_stream_id;
    let ws = rig.projection.find_workspace(&workspace("user-alice")).unwrap();
    assert_eq!(ws.current_content_stream_id, rebased);

    // The rebased stream sees the base's history and the replayed edit.
    assert!(rig.projection.node_exists(&rebased, &node_before_fork));
    assert!(rig.projection.node_exists(&rebased, &node_in_live));
    assert!(rig.projection.node_exists(&rebased, &node_in_ws));
    assert_eq!(
        rig.projection.find_content_stream(&rebased).unwrap().source_content_stream_id,
        Some(live_stream)
    );
    assert_eq!(
        rig.projection.find_content_stream(&ws_stream).unwrap().status,
        ContentStreamStatus::NoLongerInUse
    );
}

#[test]
fn failed_rebase_reopens_the_previous_stream() {
    let rig = TestRig::new();
    rig.create_live();
    let ws_stream = rig.create_workspace_on("user-alice", "live");

    // The same aggregate id lands in the workspace and (afterwards) in the
    // base, so the replay must conflict.
    let node = NodeAggregateId::new();
    let create = |ws: &str| {
        Command::CreateNodeAggregateWithNode(CreateNodeAggregateWithNode {
            workspace_name: workspace(ws),
            node_aggregate_id: node,
            node_type_name: NodeTypeName::try_new("acme:document").unwrap(),
            origin: origin("en"),
            parent_node_aggregate_id: None,
            initial_property_values: PropertyValues::empty(),
        })
    };
    rig.dispatch(create("user-alice"));
    rig.dispatch(create("live"));

    let error = rig.service.rebase_workspace(&workspace("user-alice")).unwrap_err();
    match error {
        WorkspacePublishingError::Simulation { command_index, .. } => {
            assert_eq!(command_index, 0);
        }
        other => panic!("expected simulation failure, got {other:?}"),
    }

    // The workspace still points at its reopened stream.
    let ws = rig.projection.find_workspace(&workspace("user-alice")).unwrap();
    assert_eq!(ws.current_content_stream_id, ws_stream);
    assert_eq!(
        rig.projection.find_content_stream(&ws_stream).unwrap().status,
        ContentStreamStatus::InUseByWorkspace
    );
}

#[test]
fn discard_drops_the_workspace_changes() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let ws_stream = rig.create_workspace_on("user-alice", "live");
    let node = rig.create_node("user-alice", "en");

    let new_stream = rig.service.discard_workspace(&workspace("user-alice")).unwrap();

    assert!(!rig.projection.node_exists(&new_stream, &node));
    assert!(!rig.projection.node_exists(&live_stream, &node));
    assert_eq!(
        rig.projection.find_content_stream(&ws_stream).unwrap().status,
        ContentStreamStatus::NoLongerInUse
    );
}

#[test]
fn pruner_never_deletes_transitively_used_streams() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();
    let stream_a = rig.create_workspace_on("user-a", "live");
    let stream_b = rig.create_workspace_on("user-b", "user-a");
    assert_eq!(
        rig.projection.find_content_stream(&stream_b).unwrap().source_content_stream_id,
        Some(stream_a)
    );

    // user-a moves on; its old stream is superseded but still the source
    // of user-b's stream.
    rig.service.rebase_workspace(&workspace("user-a")).unwrap();
    assert_eq!(
        rig.projection.find_content_stream(&stream_a).unwrap().status,
        ContentStreamStatus::NoLongerInUse
    );

    let pruner = ContentStreamPruner::new(rig.store.clone(), rig.projection.clone());
    let soft_removed = pruner.prune(false).unwrap();
    rig.engine.catch_up().unwrap();
    assert!(soft_removed.contains(&stream_a));

    let deleted = pruner.prune_removed_from_event_stream().unwrap();

    // stream_a is reachable from user-b via source edges: never deleted.
    assert!(!deleted.contains(&content_stream_event_stream_name(&stream_a)));
    for kept in [live_stream, stream_a, stream_b] {
        let events = rig
            .store
            .read(
                &StreamSelector::Stream(content_stream_event_stream_name(&kept)),
                SequenceNumber::none(),
                ReadDirection::Forward,
            )
            .unwrap();
        assert!(!events.is_empty(), "stream {kept} must survive pruning");
    }
}

#[test]
fn pruner_deletes_unreachable_streams_and_sequence_numbers_are_not_reused() {
    let rig = TestRig::new();
    let live_stream = rig.create_live();

    // A dangling fork nobody uses.
    let fork = ForkContentStream {
        workspace_name: workspace("live"),
        source_content_stream_id: live_stream,
        new_content_stream_id: ContentStreamId::new(),
    };
    let dangling = fork.new_content_stream_id;
    rig.dispatch(Command::ForkContentStream(fork));
    rig.dispatch(Command::RemoveContentStream(RemoveContentStream {
        workspace_name: workspace("live"),
        content_stream_id: dangling,
    }));

    let pruner = ContentStreamPruner::new(rig.store.clone(), rig.projection.clone());
    pruner.prune(false).unwrap();
    rig.engine.catch_up().unwrap();
    let sequence_before = rig.store.last_sequence_number().unwrap();

    let deleted = pruner.prune_removed_from_event_stream().unwrap();
    assert!(deleted.contains(&content_stream_event_stream_name(&dangling)));

    let gone = rig
        .store
        .read(
            &StreamSelector::Stream(content_stream_event_stream_name(&dangling)),
            SequenceNumber::none(),
            ReadDirection::Forward,
        )
        .unwrap();
    assert!(gone.is_empty());

    // Deletion never recycles sequence numbers.
    let node = rig.create_node("live", "en");
    let committed = rig
        .store
        .read(&StreamSelector::All, SequenceNumber::none(), ReadDirection::Forward)
        .unwrap();
    let last = committed.last().unwrap();
    assert!(last.sequence_number > sequence_before);
    assert!(rig.projection.node_exists(&live_stream, &node));
}
