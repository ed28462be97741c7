//! `stratum-graph` — the content graph write domain.
//!
//! The closed command set, the closed event set, the content stream
//! lifecycle and the command handlers. Handlers validate against the
//! current read-model state (via [`GraphReadModel`]) and the declared
//! dimension space, then return the events to publish; they never write to
//! storage themselves.

pub mod command;
pub mod content_stream;
pub mod event;
pub mod handler;
pub mod node;
pub mod read_model;

pub use command::Command;
pub use content_stream::{
    CONTENT_STREAM_PREFIX, ContentStream, ContentStreamStatus, content_stream_event_stream_name,
};
pub use event::GraphEvent;
pub use handler::CommandBus;
pub use node::{NodeTypeName, PropertyValues};
pub use read_model::{GraphReadModel, WorkspaceRecord};
