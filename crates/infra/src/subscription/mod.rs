//! Subscription tracking and the catch-up engine.

mod engine;
mod entity;
mod postgres;
mod store;

pub use engine::{
    ProcessedError, ProcessedResult, ProjectionSubscriber, SubscriptionEngine,
    SubscriptionEngineError,
};
pub use entity::Subscription;
pub use postgres::PostgresSubscriptionStore;
pub use store::{InMemorySubscriptionStore, SubscriptionStore};
