//! Subscription identity and status vocabulary.
//!
//! The mutable `Subscription` entity itself lives with the engine that owns
//! it; these types are the shared, externally visible vocabulary.

use serde::{Deserialize, Serialize};

use stratum_core::{DomainError, DomainResult};

/// Identity of a subscription (e.g. `"contentGraph"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub fn try_new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > 150 {
            return Err(DomainError::invalid_id(format!(
                "SubscriptionId must be 1-150 characters, got {:?}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Batches related subscriptions (e.g. all projections of one repository).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionGroup(String);

impl SubscriptionGroup {
    pub fn try_new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::invalid_id("SubscriptionGroup must not be empty"));
        }
        Ok(Self(value))
    }

    /// The default group for read-model projections.
    pub fn projections() -> Self {
        Self("projections".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SubscriptionGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a subscription participates in catch-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Boot from sequence 0, then stay caught up.
    FromBeginning,
    /// Skip history; only process events recorded after setup.
    FromNow,
    /// Boot from sequence 0 once, then detach.
    Once,
}

/// Lifecycle status of a subscription.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    New,
    Booting,
    Active,
    Error,
    Detached,
}

impl core::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SubscriptionStatus::New => "NEW",
            SubscriptionStatus::Booting => "BOOTING",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Error => "ERROR",
            SubscriptionStatus::Detached => "DETACHED",
        };
        f.write_str(s)
    }
}

/// A captured processing failure: what went wrong and where we were.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionError {
    pub previous_status: SubscriptionStatus,
    pub message: String,
}

impl SubscriptionError {
    pub fn from_previous_status_and_message(
        previous_status: SubscriptionStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            previous_status,
            message: message.into(),
        }
    }
}
