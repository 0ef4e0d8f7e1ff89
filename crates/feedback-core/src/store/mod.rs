//! Feedback persistence.
//!
//! [`FeedbackStore`] is the seam between the service and the database.
//! [`SledFeedbackStore`] is the durable implementation; [`MemoryFeedbackStore`]
//! keeps everything in process and is what tests substitute.

mod memory;
mod sled_store;

pub use memory::MemoryFeedbackStore;
pub use sled_store::SledFeedbackStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{FeedbackId, FeedbackRecord, NewFeedback};

/// Feedback store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or opened.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Underlying database error.
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A collection of feedback records.
///
/// Each insert is a single atomic write. No update or delete exists.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Persist a new record and return its assigned ID.
    ///
    /// Once this returns `Ok`, the record is visible to [`FeedbackStore::recent`].
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn insert(&self, entry: NewFeedback) -> Result<FeedbackId, StoreError>;

    /// Return up to `limit` records, newest `created_at` first.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError>;
}
