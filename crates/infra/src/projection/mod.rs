//! Read-model projections fed by the subscription engine.

mod graph;

pub use graph::GraphProjection;
