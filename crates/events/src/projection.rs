//! The projection contract consumed by read models.

use thiserror::Error;

use crate::store::StoredEvent;

/// Errors from projection operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("projection setup failed: {0}")]
    Setup(String),

    #[error("applying event '{event_type}' failed: {message}")]
    Apply { event_type: String, message: String },

    #[error("projection storage error: {0}")]
    Storage(String),
}

/// Setup status of a projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionStatus {
    Ok,
    SetupRequired(String),
    Error(String),
}

/// A read model fed from the event log.
///
/// Projections never mutate their own subscription bookkeeping; the
/// subscription engine owns cursor state. `apply` takes `&self` — read
/// models that keep in-process state use interior mutability, which is what
/// lets the engine share one projection between catch-up and inspection.
pub trait Projection: Send + Sync {
    /// Create required storage (tables, indexes, ...). Idempotent.
    fn set_up(&self) -> Result<(), ProjectionError>;

    /// Setup status, e.g. whether storage is missing or stale.
    fn status(&self) -> ProjectionStatus;

    /// Apply a single event. Must resolve at the event's stated position:
    /// applying the same event twice at the same position is a defect of the
    /// caller, not something to compensate for here.
    fn apply(&self, event: &StoredEvent) -> Result<(), ProjectionError>;

    /// Run `work` with exactly-once semantics under crash: if it fails,
    /// every state change it made must be rolled back. The default
    /// implementation is for projections whose `apply` is already atomic.
    fn transactional(
        &self,
        work: &mut dyn FnMut() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        work()
    }

    /// Truncate all state so history can be replayed from scratch.
    fn reset_state(&self) -> Result<(), ProjectionError>;
}

impl<P> Projection for std::sync::Arc<P>
where
    P: Projection + ?Sized,
{
    fn set_up(&self) -> Result<(), ProjectionError> {
        (**self).set_up()
    }

    fn status(&self) -> ProjectionStatus {
        (**self).status()
    }

    fn apply(&self, event: &StoredEvent) -> Result<(), ProjectionError> {
        (**self).apply(event)
    }

    fn transactional(
        &self,
        work: &mut dyn FnMut() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        (**self).transactional(work)
    }

    fn reset_state(&self) -> Result<(), ProjectionError> {
        (**self).reset_state()
    }
}
