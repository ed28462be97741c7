//! The catch-up engine: ordered event replay with retry and error capture.
//!
//! Events are applied one at a time, in strict sequence order, inside the
//! projection's own transactional scope. The position is saved after every
//! applied event, so a crash can at most re-deliver the event whose
//! transaction did not commit, never skip one. On failure the batch
//! fail-stops: the error and the prior status are captured, the retry
//! counter is incremented, and the next catch-up retries from the last
//! saved position.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use stratum_events::{
    CatchUpHook, EventStore, EventStoreError, Projection, ProjectionError, ReadDirection, RunMode,
    StreamSelector, SubscriptionGroup, SubscriptionId, SubscriptionStatus,
};

use super::entity::Subscription;
use super::store::SubscriptionStore;

/// One projection registered with the engine.
pub struct ProjectionSubscriber {
    pub id: SubscriptionId,
    pub group: SubscriptionGroup,
    pub run_mode: RunMode,
    pub projection: Arc<dyn Projection>,
    pub hooks: Vec<Arc<dyn CatchUpHook>>,
}

impl ProjectionSubscriber {
    pub fn new(
        id: SubscriptionId,
        group: SubscriptionGroup,
        run_mode: RunMode,
        projection: Arc<dyn Projection>,
    ) -> Self {
        Self {
            id,
            group,
            run_mode,
            projection,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn CatchUpHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionEngineError {
    #[error("unknown subscription '{0}'")]
    UnknownSubscription(SubscriptionId),

    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),
}

/// A per-subscription failure surfaced by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedError {
    pub subscription_id: SubscriptionId,
    pub message: String,
}

/// Summary of a boot or catch-up run.
#[derive(Debug, Clone, Default)]
pub struct ProcessedResult {
    pub processed_events: usize,
    pub finished: bool,
    pub errors: Vec<ProcessedError>,
}

/// Drives registered projections over the event log.
pub struct SubscriptionEngine<S: EventStore> {
    event_store: S,
    subscription_store: Arc<dyn SubscriptionStore>,
    subscribers: Vec<ProjectionSubscriber>,
}

impl<S: EventStore> SubscriptionEngine<S> {
    pub fn new(
        event_store: S,
        subscription_store: Arc<dyn SubscriptionStore>,
        subscribers: Vec<ProjectionSubscriber>,
    ) -> Self {
        Self {
            event_store,
            subscription_store,
            subscribers,
        }
    }

    /// Set up all projections and register missing subscription rows.
    ///
    /// Idempotent: existing rows and already set-up projections are left
    /// alone. No global "already set up" registry is involved; the durable
    /// rows are the only state.
    pub fn setup(&self) -> Result<(), SubscriptionEngineError> {
        for subscriber in &self.subscribers {
            subscriber.projection.set_up()?;
            if self.subscription_store.load(&subscriber.id).is_none() {
                let mut row = Subscription::new(
                    subscriber.id.clone(),
                    subscriber.group.clone(),
                    subscriber.run_mode,
                );
                if subscriber.run_mode == RunMode::FromNow {
                    // Skip history: start at the current end of the log.
                    row.set_position(self.event_store.last_sequence_number()?);
                    row.set_status(SubscriptionStatus::Active);
                }
                self.save(&mut row);
                tracing::info!(subscription = %subscriber.id, "registered subscription");
            }
        }
        Ok(())
    }

    /// Replay full history into NEW subscriptions, then activate them.
    pub fn boot(&self) -> Result<ProcessedResult, SubscriptionEngineError> {
        self.process(&[SubscriptionStatus::New, SubscriptionStatus::Booting])
    }

    /// Apply all events after each subscription's stored position.
    ///
    /// Subscriptions in ERROR are retried from their last saved position;
    /// retries are idempotent because projections resolve at the stated
    /// position.
    pub fn catch_up(&self) -> Result<ProcessedResult, SubscriptionEngineError> {
        self.process(&[SubscriptionStatus::Active, SubscriptionStatus::Error])
    }

    /// Truncate the projection's state and rewind its subscription to NEW.
    pub fn reset(&self, id: &SubscriptionId) -> Result<(), SubscriptionEngineError> {
        let subscriber = self
            .subscribers
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| SubscriptionEngineError::UnknownSubscription(id.clone()))?;
        subscriber.projection.reset_state()?;

        let mut row = self
            .subscription_store
            .load(id)
            .unwrap_or_else(|| {
                Subscription::new(subscriber.id.clone(), subscriber.group.clone(), subscriber.run_mode)
            });
        row.reset();
        self.save(&mut row);
        tracing::info!(subscription = %id, "reset subscription");
        Ok(())
    }

    /// Administratively take a subscription out of processing.
    pub fn detach(&self, id: &SubscriptionId) -> Result<(), SubscriptionEngineError> {
        let mut row = self
            .subscription_store
            .load(id)
            .ok_or_else(|| SubscriptionEngineError::UnknownSubscription(id.clone()))?;
        row.set_status(SubscriptionStatus::Detached);
        self.save(&mut row);
        Ok(())
    }

    /// Current subscription rows, for operator inspection.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscribers
            .iter()
            .filter_map(|s| self.subscription_store.load(&s.id))
            .collect()
    }

    fn process(
        &self,
        statuses: &[SubscriptionStatus],
    ) -> Result<ProcessedResult, SubscriptionEngineError> {
        let mut processed_events = 0;
        let mut errors = Vec::new();

        for subscriber in &self.subscribers {
            let Some(mut row) = self.subscription_store.load(&subscriber.id) else {
                // Not registered; setup() has not run for this subscriber.
                continue;
            };
            if !statuses.contains(&row.status()) {
                continue;
            }

            for hook in &subscriber.hooks {
                hook.on_before_catch_up(row.status());
            }

            if row.status() == SubscriptionStatus::New {
                row.set_status(SubscriptionStatus::Booting);
                self.save(&mut row);
            }

            let failed = self.apply_events(subscriber, &mut row, &mut processed_events, &mut errors)?;

            for hook in &subscriber.hooks {
                hook.on_after_batch_completed();
            }

            if !failed && row.status() == SubscriptionStatus::Booting {
                let next = if subscriber.run_mode == RunMode::Once {
                    SubscriptionStatus::Detached
                } else {
                    SubscriptionStatus::Active
                };
                row.set_status(next);
                self.save(&mut row);
            }

            for hook in &subscriber.hooks {
                hook.on_after_catch_up();
            }
        }

        Ok(ProcessedResult {
            processed_events,
            finished: errors.is_empty(),
            errors,
        })
    }

    /// Apply pending events to one subscription; returns whether it failed.
    fn apply_events(
        &self,
        subscriber: &ProjectionSubscriber,
        row: &mut Subscription,
        processed_events: &mut usize,
        errors: &mut Vec<ProcessedError>,
    ) -> Result<bool, SubscriptionEngineError> {
        let events = self.event_store.read(
            &StreamSelector::All,
            row.position().next(),
            ReadDirection::Forward,
        )?;

        for event in &events {
            for hook in &subscriber.hooks {
                hook.on_before_event(event);
            }

            let result: Result<(), ProjectionError> = subscriber
                .projection
                .transactional(&mut || subscriber.projection.apply(event));

            match result {
                Ok(()) => {
                    row.advance_to(event.sequence_number);
                    self.save(row);
                    *processed_events += 1;
                    for hook in &subscriber.hooks {
                        hook.on_after_event(event);
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        subscription = %subscriber.id,
                        sequence_number = %event.sequence_number,
                        error = %error,
                        "event application failed; subscription enters ERROR"
                    );
                    row.fail(error.to_string());
                    self.save(row);
                    errors.push(ProcessedError {
                        subscription_id: subscriber.id.clone(),
                        message: error.to_string(),
                    });
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn save(&self, row: &mut Subscription) {
        row.mark_saved(Utc::now());
        self.subscription_store.save(row);
    }
}
