//! The durable per-projection cursor + status row.

use chrono::{DateTime, Utc};

use stratum_core::SequenceNumber;
use stratum_events::{
    RunMode, SubscriptionError, SubscriptionGroup, SubscriptionId, SubscriptionStatus,
};

/// One projection's catch-up bookkeeping.
///
/// Mutable by design, but exclusively through the subscription engine: the
/// mutators are crate-private, so projections (and everything else outside
/// this crate) can only read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: SubscriptionId,
    group: SubscriptionGroup,
    run_mode: RunMode,
    status: SubscriptionStatus,
    /// Last successfully applied global sequence number.
    position: SequenceNumber,
    error: Option<SubscriptionError>,
    retry_attempt: u32,
    last_saved_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, group: SubscriptionGroup, run_mode: RunMode) -> Self {
        Self {
            id,
            group,
            run_mode,
            status: SubscriptionStatus::New,
            position: SequenceNumber::none(),
            error: None,
            retry_attempt: 0,
            last_saved_at: None,
        }
    }

    /// Reconstruct a row loaded from durable storage.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: SubscriptionId,
        group: SubscriptionGroup,
        run_mode: RunMode,
        status: SubscriptionStatus,
        position: SequenceNumber,
        error: Option<SubscriptionError>,
        retry_attempt: u32,
        last_saved_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            group,
            run_mode,
            status,
            position,
            error,
            retry_attempt,
            last_saved_at,
        }
    }

    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn group(&self) -> &SubscriptionGroup {
        &self.group
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn position(&self) -> SequenceNumber {
        self.position
    }

    pub fn error(&self) -> Option<&SubscriptionError> {
        self.error.as_ref()
    }

    pub fn retry_attempt(&self) -> u32 {
        self.retry_attempt
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub(crate) fn set_status(&mut self, status: SubscriptionStatus) {
        self.status = status;
    }

    /// Pin the position without touching status; used when a subscription
    /// starts at the current end of the log.
    pub(crate) fn set_position(&mut self, position: SequenceNumber) {
        self.position = position;
    }

    /// Advance past a successfully applied event; recovers from a prior
    /// error state. A booting subscription stays in BOOTING until its
    /// replay completes.
    pub(crate) fn advance_to(&mut self, position: SequenceNumber) {
        debug_assert!(position > self.position, "position must only move forward");
        self.position = position;
        self.error = None;
        self.retry_attempt = 0;
        if self.status == SubscriptionStatus::Error {
            self.status = SubscriptionStatus::Active;
        }
    }

    /// Capture a processing failure together with the status we were in.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(SubscriptionError::from_previous_status_and_message(
            self.status,
            message,
        ));
        self.status = SubscriptionStatus::Error;
        self.retry_attempt += 1;
    }

    /// Rewind to the very beginning, as if freshly registered.
    pub(crate) fn reset(&mut self) {
        self.position = SequenceNumber::none();
        self.status = SubscriptionStatus::New;
        self.error = None;
        self.retry_attempt = 0;
    }

    pub(crate) fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.last_saved_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> Subscription {
        Subscription::new(
            SubscriptionId::try_new("contentGraph").unwrap(),
            SubscriptionGroup::projections(),
            RunMode::FromBeginning,
        )
    }

    #[test]
    fn failure_captures_prior_status_and_counts_retries() {
        let mut sub = subscription();
        sub.set_status(SubscriptionStatus::Active);

        sub.fail("boom");
        assert_eq!(sub.status(), SubscriptionStatus::Error);
        assert_eq!(sub.retry_attempt(), 1);
        let error = sub.error().unwrap();
        assert_eq!(error.previous_status, SubscriptionStatus::Active);
        assert_eq!(error.message, "boom");

        sub.fail("boom again");
        assert_eq!(sub.retry_attempt(), 2);
        assert_eq!(sub.error().unwrap().previous_status, SubscriptionStatus::Error);
    }

    #[test]
    fn advancing_recovers_from_error() {
        let mut sub = subscription();
        sub.set_status(SubscriptionStatus::Active);
        sub.fail("boom");

        sub.advance_to(SequenceNumber::from_u64(3));
        assert_eq!(sub.status(), SubscriptionStatus::Active);
        assert_eq!(sub.position(), SequenceNumber::from_u64(3));
        assert!(sub.error().is_none());
        assert_eq!(sub.retry_attempt(), 0);
    }

    #[test]
    fn reset_rewinds_to_new() {
        let mut sub = subscription();
        sub.set_status(SubscriptionStatus::Active);
        sub.advance_to(SequenceNumber::from_u64(9));

        sub.reset();
        assert_eq!(sub.status(), SubscriptionStatus::New);
        assert_eq!(sub.position(), SequenceNumber::none());
    }
}
