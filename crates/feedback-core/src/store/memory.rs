//! In-memory feedback store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{FeedbackStore, StoreError};
use crate::types::{FeedbackId, FeedbackRecord, NewFeedback};

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    // (sequence, record); sequence breaks ties between equal timestamps
    records: Vec<(u64, FeedbackRecord)>,
}

/// Feedback store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryFeedbackStore {
    inner: RwLock<Inner>,
}

impl MemoryFeedbackStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[async_trait]
impl FeedbackStore for MemoryFeedbackStore {
    async fn insert(&self, entry: NewFeedback) -> Result<FeedbackId, StoreError> {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let id = FeedbackId::from_sequence(seq);
        inner.records.push((seq, entry.into_record(id.clone())));
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<FeedbackRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<&(u64, FeedbackRecord)> = inner.records.iter().collect();
        entries.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });

        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
