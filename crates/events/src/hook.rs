//! Catch-up hooks: cross-cutting side effects around projection catch-up.

use crate::store::StoredEvent;
use crate::subscription::SubscriptionStatus;

/// Fired by the subscription engine around catch-up runs and events.
///
/// After-event hooks fire exactly once per successfully applied event,
/// never for a failed or rolled-back one. All methods default to no-ops so
/// hooks only implement what they care about.
pub trait CatchUpHook: Send + Sync {
    /// A catch-up run is about to start for a subscription in `status`.
    fn on_before_catch_up(&self, _status: SubscriptionStatus) {}

    /// `event` is about to be applied.
    fn on_before_event(&self, _event: &StoredEvent) {}

    /// `event` was applied and the position advanced.
    fn on_after_event(&self, _event: &StoredEvent) {}

    /// A batch finished (successfully or by fail-stop).
    fn on_after_batch_completed(&self) {}

    /// The whole catch-up run is done.
    fn on_after_catch_up(&self) {}
}
