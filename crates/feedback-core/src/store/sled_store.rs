//! Feedback store backed by sled.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{FeedbackStore, StoreError};
use crate::types::{FeedbackId, FeedbackRecord, NewFeedback};

const TREE_NAME: &str = "feedbacks";

/// Flips the sign bit so negative timestamps sort before positive ones.
const SIGN_BIT: u64 = 1 << 63;

/// Durable feedback store.
///
/// Keys are the big-endian creation time (microseconds) followed by the
/// big-endian sequence id, so a reverse scan yields newest first.
pub struct SledFeedbackStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledFeedbackStore {
    /// Open or create a store at the given directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| {
            StoreError::Unavailable(format!(
                "Failed to open feedback database at {}: {e}",
                path.display()
            ))
        })?;

        let store = Self::with_db(db)?;
        tracing::info!(
            path = %path.display(),
            records = store.count(),
            "Opened feedback store"
        );
        Ok(store)
    }

    /// Create a store on an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if the tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        let tree = db
            .open_tree(TREE_NAME)
            .map_err(|e| StoreError::Unavailable(format!("Failed to open feedbacks tree: {e}")))?;

        Ok(Self { db, tree })
    }

    /// Get the underlying sled database.
    #[must_use]
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Count stored records.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree.len()
    }

    fn record_key(created_at: DateTime<Utc>, seq: u64) -> [u8; 16] {
        let micros = u64::from_be_bytes(created_at.timestamp_micros().to_be_bytes()) ^ SIGN_BIT;

        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&micros.to_be_bytes());
        key[8..].copy_from_slice(&seq.to_be_bytes());
        key
    }

    /// Remove an inserted record again if its flush failed, so a failed write
    /// never shows up in `recent`.
    fn commit_or_rollback(
        &self,
        key: [u8; 16],
        flushed: sled::Result<usize>,
    ) -> Result<(), StoreError> {
        let Err(e) = flushed else {
            return Ok(());
        };
        if let Err(remove_err) = self.tree.remove(key) {
            tracing::warn!(error = %remove_err, "Failed to roll back unflushed feedback record");
        }
        Err(e.into())
    }
}

#[async_trait]
impl FeedbackStore for SledFeedbackStore {
    async fn insert(&self, entry: NewFeedback) -> Result<FeedbackId, StoreError> {
        let seq = self.db.generate_id()?;
        let id = FeedbackId::from_sequence(seq);
        let key = Self::record_key(entry.created_at, seq);
        let value = serde_json::to_vec(&entry.into_record(id.clone()))?;

        self.tree.insert(key, value)?;
        let flushed = self.tree.flush_async().await;
        self.commit_or_rollback(key, flushed)?;

        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError> {
        let mut records = Vec::with_capacity(limit.min(self.tree.len()));

        for result in self.tree.iter().rev().take(limit) {
            let (_, value) = result?;
            records.push(serde_json::from_slice(&value)?);
        }

        Ok(records)
    }
}

impl std::fmt::Debug for SledFeedbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledFeedbackStore")
            .field("records", &self.count())
            .finish_non_exhaustive()
    }
}
