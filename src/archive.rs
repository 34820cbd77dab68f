//! Recycle archive: copy-then-delete of retired staging objects.

use crate::error::{Result, ReviewError};
use crate::store::{DEFAULT_CONTENT_TYPE, ObjectStore, StoreError};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one archive batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Folder holding this batch, e.g. `recycle/1718000000000/`
    pub batch: String,
    /// Keys copied into the batch and removed from their original location
    pub archived: Vec<String>,
    /// Keys that were already absent
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    Archived,
    Skipped,
}

pub struct RecycleArchiver {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    concurrency: usize,
}

impl RecycleArchiver {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, concurrency: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Archives `keys` into a batch stamped with the current time.
    pub async fn archive(&self, keys: &[String]) -> Result<ArchiveReport> {
        self.archive_at(keys, Utc::now().timestamp_millis()).await
    }

    /// Archives `keys` into `<prefix><stamp>/`.
    ///
    /// Every key is driven to completion even when another one fails; the
    /// first failure is returned afterwards. Already-archived keys are not
    /// restored, and absent keys are skipped, so the call can simply be retried.
    pub async fn archive_at(&self, keys: &[String], stamp: i64) -> Result<ArchiveReport> {
        let batch = format!("{}{stamp}/", self.prefix);

        let pending: Vec<_> = keys
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, key)| {
                let batch = batch.clone();
                async move {
                    let outcome = self.archive_one(&key, &batch).await;
                    (index, key, outcome)
                }
            })
            .collect();

        let mut outcomes: Vec<(usize, String, std::result::Result<KeyOutcome, StoreError>)> =
            stream::iter(pending)
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = ArchiveReport {
            batch,
            archived: Vec::new(),
            skipped: Vec::new(),
        };
        let mut first_error = None;

        for (_, key, outcome) in outcomes {
            match outcome {
                Ok(KeyOutcome::Archived) => report.archived.push(key),
                Ok(KeyOutcome::Skipped) => report.skipped.push(key),
                Err(err) => {
                    warn!(key = %key, batch = %report.batch, error = %err, "archive failed");
                    first_error.get_or_insert_with(|| match err {
                        StoreError::Backend(message) => {
                            ReviewError::Store(format!("failed to archive '{key}': {message}"))
                        }
                        other => ReviewError::from(other),
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!(
                    batch = %report.batch,
                    archived = report.archived.len(),
                    skipped = report.skipped.len(),
                    "archive batch complete"
                );
                Ok(report)
            }
        }
    }

    async fn archive_one(
        &self,
        key: &str,
        batch: &str,
    ) -> std::result::Result<KeyOutcome, StoreError> {
        let meta = match self.store.head(key).await {
            Ok(meta) => meta,
            Err(StoreError::NotFound(_)) => return Ok(KeyOutcome::Skipped),
            Err(err) => return Err(err),
        };

        // A concurrent archiver may have removed it since the head.
        let object = match self.store.get(key).await {
            Ok(object) => object,
            Err(StoreError::NotFound(_)) => return Ok(KeyOutcome::Skipped),
            Err(err) => return Err(err),
        };

        let content_type = if meta.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            meta.content_type.as_str()
        };

        self.store
            .put(&format!("{batch}{key}"), object.body, content_type)
            .await?;
        self.store.delete(key).await?;
        Ok(KeyOutcome::Archived)
    }
}
