//! Durable persistence of subscription rows.

use std::collections::HashMap;
use std::sync::RwLock;

use stratum_events::{SubscriptionGroup, SubscriptionId};

use super::entity::Subscription;

/// Persists the subscription table (id, group, status, position,
/// retry_attempt, last_saved_at, error).
///
/// This is the durable control-plane state the engine depends on being
/// crash-consistent with the event log.
pub trait SubscriptionStore: Send + Sync {
    fn load(&self, id: &SubscriptionId) -> Option<Subscription>;

    fn load_group(&self, group: &SubscriptionGroup) -> Vec<Subscription>;

    /// Insert or update a row.
    fn save(&self, subscription: &Subscription);

    fn remove(&self, id: &SubscriptionId);
}

/// In-memory subscription store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    rows: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn load(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.rows.read().ok()?.get(id).cloned()
    }

    fn load_group(&self, group: &SubscriptionGroup) -> Vec<Subscription> {
        let Ok(rows) = self.rows.read() else {
            return Vec::new();
        };
        let mut subscriptions: Vec<Subscription> = rows
            .values()
            .filter(|s| s.group() == group)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| a.id().cmp(b.id()));
        subscriptions
    }

    fn save(&self, subscription: &Subscription) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(subscription.id().clone(), subscription.clone());
        }
    }

    fn remove(&self, id: &SubscriptionId) {
        if let Ok(mut rows) = self.rows.write() {
            rows.remove(id);
        }
    }
}
