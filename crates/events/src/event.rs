//! The domain-agnostic event contract.

/// A domain event: an immutable fact.
///
/// Events are append-only; once recorded they are never modified. The type
/// tag is the stable wire identifier used for routing and deserialization.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "contentstream.was_forked").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type (schema evolution).
    fn schema_version(&self) -> u32 {
        1
    }
}
