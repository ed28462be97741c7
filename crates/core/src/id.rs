//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a content stream (one branch of the event log).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentStreamId(Uuid);

/// Identifier of a node aggregate (all dimension variants of one logical node).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAggregateId(Uuid);

/// Identifier of a single recorded event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(ContentStreamId, "ContentStreamId");
impl_uuid_newtype!(NodeAggregateId, "NodeAggregateId");
impl_uuid_newtype!(EventId, "EventId");

/// Name of a workspace (the user-facing pointer to a content stream).
///
/// Lowercase alphanumerics plus `-`, at most 36 characters. The `live`
/// workspace is the root of every workspace hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceName(String);

const LIVE_WORKSPACE_NAME: &str = "live";

impl WorkspaceName {
    pub fn try_new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() || value.len() > 36 {
            return Err(DomainError::invalid_id(format!(
                "WorkspaceName must be 1-36 characters, got {:?}",
                value
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::invalid_id(format!(
                "WorkspaceName must be lowercase alphanumeric or '-', got {:?}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// The `live` workspace, root of the workspace hierarchy.
    pub fn live() -> Self {
        Self(LIVE_WORKSPACE_NAME.to_string())
    }

    pub fn is_live(&self) -> bool {
        self.0 == LIVE_WORKSPACE_NAME
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkspaceName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_name_accepts_lowercase_and_dashes() {
        assert!(WorkspaceName::try_new("user-alice").is_ok());
        assert!(WorkspaceName::try_new("live").is_ok());
        assert!(WorkspaceName::try_new("review-42").is_ok());
    }

    #[test]
    fn workspace_name_rejects_invalid_input() {
        assert!(WorkspaceName::try_new("").is_err());
        assert!(WorkspaceName::try_new("UPPER").is_err());
        assert!(WorkspaceName::try_new("with space").is_err());
        assert!(WorkspaceName::try_new("x".repeat(37)).is_err());
    }

    #[test]
    fn live_workspace_is_live() {
        assert!(WorkspaceName::live().is_live());
        assert!(!WorkspaceName::try_new("user-bob").unwrap().is_live());
    }
}
