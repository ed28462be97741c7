//! Stream versions, optimistic concurrency expectations and global sequence numbers.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Per-stream version: the number of events recorded in a stream.
///
/// A stream that does not exist (yet) has version 0.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl core::fmt::Display for Version {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Optimistic concurrency expectation for an append to a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Skip version checking (single-owner streams, migrations).
    Any,
    /// Require that the stream does not exist yet.
    NoStream,
    /// Require the stream to be at an exact version.
    Exact(Version),
}

impl ExpectedVersion {
    pub fn matches(self, actual: Version) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => actual == Version::initial(),
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: Version) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Global position in the event log.
///
/// Sequence numbers are strictly increasing across all streams and are never
/// reused, not even after a stream has been deleted.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The position before the first event.
    pub fn none() -> Self {
        Self(0)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl core::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_version_matching() {
        assert!(ExpectedVersion::Any.matches(Version::from_u64(7)));
        assert!(ExpectedVersion::NoStream.matches(Version::initial()));
        assert!(!ExpectedVersion::NoStream.matches(Version::from_u64(1)));
        assert!(ExpectedVersion::Exact(Version::from_u64(3)).matches(Version::from_u64(3)));
        assert!(!ExpectedVersion::Exact(Version::from_u64(3)).matches(Version::from_u64(4)));
    }

    #[test]
    fn expected_version_check_reports_conflict() {
        let err = ExpectedVersion::Exact(Version::from_u64(1))
            .check(Version::from_u64(2))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
