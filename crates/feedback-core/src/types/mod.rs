//! Core types used throughout the feedback service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a feedback record.
///
/// Opaque to callers; never changes once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(pub String);

impl FeedbackId {
    /// Create a feedback ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Render a numeric sequence value as an ID (16 lowercase hex digits).
    #[must_use]
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("{seq:016x}"))
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FeedbackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A feedback entry that has been validated and sanitized but not stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
    /// Free-form classification tag (e.g. "bug").
    pub kind: String,
    /// Sanitized feedback text.
    pub feedback: String,
    /// Insertion time, server clock.
    pub created_at: DateTime<Utc>,
}

impl NewFeedback {
    /// Create a new entry stamped with the current UTC time.
    #[must_use]
    pub fn new(kind: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self::at(kind, feedback, Utc::now())
    }

    /// Create a new entry with an explicit creation time.
    #[must_use]
    pub fn at(kind: impl Into<String>, feedback: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            feedback: feedback.into(),
            created_at,
        }
    }

    /// Attach the store-assigned ID, producing the persisted record.
    #[must_use]
    pub fn into_record(self, id: FeedbackId) -> FeedbackRecord {
        FeedbackRecord {
            id,
            kind: self.kind,
            feedback: self.feedback,
            created_at: self.created_at,
        }
    }
}

/// A persisted feedback record.
///
/// Serialized as `{"id", "type", "feedback", "createdAt"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Store-assigned identifier.
    pub id: FeedbackId,
    /// Classification tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Sanitized feedback text.
    pub feedback: String,
    /// Insertion time (UTC).
    pub created_at: DateTime<Utc>,
}
