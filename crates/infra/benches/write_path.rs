use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use stratum_core::{NodeAggregateId, WorkspaceName};
use stratum_dimension::{
    ContentDimension, ContentDimensionId, ContentDimensionValue, DimensionSpacePoint,
    InterDimensionalVariationGraph, OriginDimensionSpacePoint,
};
use stratum_events::{InMemoryEventStore, Projection, RunMode, SubscriptionGroup, SubscriptionId};
use stratum_graph::{
    Command, CommandBus, NodeTypeName, PropertyValues,
    command::{CreateNodeAggregateWithNode, CreateRootWorkspace, SetNodeProperties},
};
use stratum_infra::{
    CommandDispatcher, CommandSimulator, GraphProjection, InMemorySubscriptionStore,
    ProjectionSubscriber, SubscriptionEngine, SubscriptionStore,
};

fn language_space() -> Arc<InterDimensionalVariationGraph> {
    let value = |s: &str| ContentDimensionValue::try_new(s).unwrap();
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

fn origin(language: &str) -> OriginDimensionSpacePoint {
    OriginDimensionSpacePoint::from_point(DimensionSpacePoint::from_coordinates([(
        ContentDimensionId::try_new("language").unwrap(),
        ContentDimensionValue::try_new(language).unwrap(),
    )]))
}

struct Rig {
    dispatcher: CommandDispatcher<Arc<InMemoryEventStore>>,
    engine: SubscriptionEngine<Arc<InMemoryEventStore>>,
    projection: Arc<GraphProjection>,
    node: NodeAggregateId,
}

fn rig() -> Rig {
    let store = Arc::new(InMemoryEventStore::new());
    let projection = Arc::new(GraphProjection::new());
    let engine = SubscriptionEngine::new(
        store.clone(),
        Arc::new(InMemorySubscriptionStore::new()) as Arc<dyn SubscriptionStore>,
        vec![ProjectionSubscriber::new(
            SubscriptionId::try_new("contentGraph").unwrap(),
            SubscriptionGroup::projections(),
            RunMode::FromBeginning,
            projection.clone() as Arc<dyn Projection>,
        )],
    );
    engine.setup().unwrap();
    engine.boot().unwrap();

    let dispatcher = CommandDispatcher::new(
        store,
        CommandBus::new(language_space()),
        projection.clone(),
    );

    let live = WorkspaceName::live();
    dispatcher
        .dispatch(&Command::CreateRootWorkspace(CreateRootWorkspace::create(
            live.clone(),
        )))
        .unwrap();
    engine.catch_up().unwrap();

    let node = NodeAggregateId::new();
    dispatcher
        .dispatch(&Command::CreateNodeAggregateWithNode(
            CreateNodeAggregateWithNode {
                workspace_name: live,
                node_aggregate_id: node,
                node_type_name: NodeTypeName::try_new("acme:document").unwrap(),
                origin: origin("de"),
                parent_node_aggregate_id: None,
                initial_property_values: PropertyValues::empty(),
            },
        ))
        .unwrap();
    engine.catch_up().unwrap();

    Rig {
        dispatcher,
        engine,
        projection,
        node,
    }
}

fn set_properties(node: NodeAggregateId, title: &str) -> Command {
    Command::SetNodeProperties(SetNodeProperties {
        workspace_name: WorkspaceName::live(),
        node_aggregate_id: node,
        origin: origin("de"),
        property_values: [("title".to_string(), serde_json::json!(title))]
            .into_iter()
            .collect(),
    })
}

fn bench_dispatch_and_catch_up(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_path");
    group.throughput(Throughput::Elements(1));

    group.bench_function("dispatch_set_properties", |b| {
        let rig = rig();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let command = set_properties(rig.node, &format!("title-{i}"));
            black_box(rig.dispatcher.dispatch(&command).unwrap());
            rig.engine.catch_up().unwrap();
        });
    });

    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    group.throughput(Throughput::Elements(16));

    group.bench_function("simulate_16_commands", |b| {
        let rig = rig();
        let commands: Vec<Command> = (0..16)
            .map(|i| set_properties(rig.node, &format!("title-{i}")))
            .collect();
        let bus = rig.dispatcher.bus().clone();
        b.iter(|| {
            let simulator =
                CommandSimulator::new(rig.projection.as_ref(), &bus, WorkspaceName::live());
            black_box(simulator.simulate_commands(&commands).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dispatch_and_catch_up, bench_simulation);
criterion_main!(benches);
