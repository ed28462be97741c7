//! Content streams: isolated, independently versioned branches of the log.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stratum_core::{ContentStreamId, DomainError, DomainResult, Version};
use stratum_events::StreamName;

/// Prefix of every content stream's event stream name; the pruner discovers
/// all content stream streams through this category.
pub const CONTENT_STREAM_PREFIX: &str = "contentstream:";

/// The event stream a content stream's events are appended to.
pub fn content_stream_event_stream_name(id: &ContentStreamId) -> StreamName {
    StreamName::new(format!("{CONTENT_STREAM_PREFIX}{id}"))
}

/// The inverse of [`content_stream_event_stream_name`].
pub fn content_stream_id_from_stream_name(name: &StreamName) -> Option<ContentStreamId> {
    name.as_str()
        .strip_prefix(CONTENT_STREAM_PREFIX)
        .and_then(|raw| ContentStreamId::from_str(raw).ok())
}

/// Lifecycle status of a content stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentStreamStatus {
    /// Freshly created, not yet bound to a workspace.
    Created,
    /// Created as a branch of another stream, not yet bound.
    Forked,
    /// The current stream of a workspace.
    InUseByWorkspace,
    /// Temporarily detached (e.g. mid-publish).
    Closed,
    /// Superseded; retained for replay until pruned.
    NoLongerInUse,
}

impl ContentStreamStatus {
    /// Valid lifecycle transitions.
    pub fn can_transition_to(self, next: ContentStreamStatus) -> bool {
        use ContentStreamStatus::*;
        matches!(
            (self, next),
            (Created | Forked, InUseByWorkspace)
                | (Created | Forked | InUseByWorkspace, Closed)
                | (Closed, InUseByWorkspace)
                | (Created | Forked | InUseByWorkspace | Closed, NoLongerInUse)
        )
    }
}

impl core::fmt::Display for ContentStreamStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ContentStreamStatus::Created => "CREATED",
            ContentStreamStatus::Forked => "FORKED",
            ContentStreamStatus::InUseByWorkspace => "IN_USE_BY_WORKSPACE",
            ContentStreamStatus::Closed => "CLOSED",
            ContentStreamStatus::NoLongerInUse => "NO_LONGER_IN_USE",
        };
        f.write_str(s)
    }
}

/// One content stream's control-plane row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStream {
    pub id: ContentStreamId,
    pub status: ContentStreamStatus,
    /// The branch point, if this stream was forked off another one.
    pub source_content_stream_id: Option<ContentStreamId>,
    /// Number of events recorded in this stream.
    pub version: Version,
}

impl ContentStream {
    pub fn created(id: ContentStreamId) -> Self {
        Self {
            id,
            status: ContentStreamStatus::Created,
            source_content_stream_id: None,
            version: Version::initial(),
        }
    }

    pub fn forked_from(id: ContentStreamId, source: ContentStreamId) -> Self {
        Self {
            id,
            status: ContentStreamStatus::Forked,
            source_content_stream_id: Some(source),
            version: Version::initial(),
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition_to(&mut self, next: ContentStreamStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "content stream {} cannot transition from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn event_stream_name(&self) -> StreamName {
        content_stream_event_stream_name(&self.id)
    }
}
