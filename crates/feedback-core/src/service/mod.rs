//! The feedback service: every read and write of the collection goes through here.

use std::sync::Arc;

use thiserror::Error;

use crate::sanitize::Sanitize;
use crate::store::{FeedbackStore, StoreError};
use crate::types::{FeedbackId, FeedbackRecord, NewFeedback};
use crate::validation::{self, ValidationError};

/// Number of records returned by [`FeedbackService::list_recent`] by default.
pub const DEFAULT_RECENT_LIMIT: usize = 20;

/// Feedback service errors.
#[derive(Error, Debug)]
pub enum FeedbackError {
    /// The submission was rejected before reaching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store failed to persist or query.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Sanitizes submissions and performs bounded, ordered reads.
pub struct FeedbackService {
    store: Arc<dyn FeedbackStore>,
    sanitizer: Arc<dyn Sanitize>,
    recent_limit: usize,
}

impl FeedbackService {
    /// Create a service over the given store and sanitizer.
    #[must_use]
    pub fn new(store: Arc<dyn FeedbackStore>, sanitizer: Arc<dyn Sanitize>) -> Self {
        Self {
            store,
            sanitizer,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    /// Set how many records [`FeedbackService::list_recent`] returns at most.
    ///
    /// Clamped to `1..=DEFAULT_RECENT_LIMIT`; the listing can be narrowed, never widened.
    #[must_use]
    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit.clamp(1, DEFAULT_RECENT_LIMIT);
        self
    }

    /// Maximum number of records returned by [`FeedbackService::list_recent`].
    #[must_use]
    pub const fn recent_limit(&self) -> usize {
        self.recent_limit
    }

    /// Validate, sanitize and persist a submission.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::Validation` if a field is blank or too long, or
    /// if nothing is left of the text after sanitization. Returns
    /// `FeedbackError::Storage` if the write fails; it is not retried.
    pub async fn submit(&self, kind: &str, feedback: &str) -> Result<FeedbackId, FeedbackError> {
        let kind = validation::validate_kind(kind)?;
        let text = validation::validate_feedback(feedback)?;

        let clean = self.sanitizer.sanitize(&text);
        let clean = clean.trim();
        if clean.is_empty() {
            return Err(ValidationError::EmptyAfterSanitize.into());
        }

        let id = self.store.insert(NewFeedback::new(kind, clean)).await?;
        tracing::debug!(%id, "Stored feedback");
        Ok(id)
    }

    /// Return up to the configured limit of records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::Storage` if the query fails.
    pub async fn list_recent(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        Ok(self.store.recent(self.recent_limit).await?)
    }
}

impl std::fmt::Debug for FeedbackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackService")
            .field("recent_limit", &self.recent_limit)
            .finish_non_exhaustive()
    }
}
