//! Transaction lifecycle: discover staged pairs, expose the raw signature,
//! and move a pair to its terminal state.
//!
//! The stores offer no multi-key transactions, so commit and reject are
//! sequences of idempotent steps. A failure aborts the remaining steps without
//! undoing earlier ones; re-running the same call converges.

use crate::archive::{ArchiveReport, RecycleArchiver};
use crate::config::ReviewConfig;
use crate::error::{Result, ReviewError};
use crate::keys::{JSON_CONTENT_TYPE, TransactionRef, ensure_not_reserved, is_pending_signature};
use crate::store::{ListRequest, ObjectStore, StoreError};
use crate::users::UserIndex;
use crate::verify::{SignatureVerifier, TrustUpstream};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSignature {
    pub signature: String,
    pub sig_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub payload_key: String,
    pub archive: ArchiveReport,
    /// `false` when the best-effort index rebuild failed
    pub index_rebuilt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectOutcome {
    pub archive: ArchiveReport,
}

pub struct ReviewEngine {
    config: ReviewConfig,
    staging: Arc<dyn ObjectStore>,
    admin: Arc<dyn ObjectStore>,
    archiver: RecycleArchiver,
    index: Arc<UserIndex>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ReviewEngine {
    /// Builds an engine over the staging (public) and admin buckets.
    ///
    /// Commits trust upstream verification until a verifier is installed with
    /// [`with_verifier`](Self::with_verifier).
    pub fn new(
        config: ReviewConfig,
        staging: Arc<dyn ObjectStore>,
        admin: Arc<dyn ObjectStore>,
    ) -> Self {
        let archiver = RecycleArchiver::new(
            staging.clone(),
            config.recycle_prefix.clone(),
            config.archive_concurrency,
        );
        let index = Arc::new(UserIndex::new(admin.clone(), config.user_index_key.clone()));
        Self {
            config,
            staging,
            admin,
            archiver,
            index,
            verifier: Arc::new(TrustUpstream),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn admin_store(&self) -> &Arc<dyn ObjectStore> {
        &self.admin
    }

    pub fn user_index(&self) -> &Arc<UserIndex> {
        &self.index
    }

    /// Signature keys in the staging bucket, in store order.
    ///
    /// A signature whose payload is missing is still listed.
    pub async fn list_pending(&self) -> Result<Vec<String>> {
        let listing = self
            .staging
            .list(ListRequest::new("").max_keys(self.config.list_page_size))
            .await?;

        Ok(listing
            .keys
            .into_iter()
            .filter(|key| is_pending_signature(key, &self.config.recycle_prefix))
            .collect())
    }

    /// Returns the trimmed signature text without looking at the payload.
    pub async fn fetch_raw_signature(
        &self,
        namespace: &str,
        filename: &str,
    ) -> Result<RawSignature> {
        let tx = TransactionRef::from_signature(namespace, filename)?;
        let sig_key = tx.signature_key();

        let object = self.staging.get(&sig_key).await.map_err(|err| match err {
            StoreError::NotFound(_) => {
                ReviewError::NotFound(format!("signature file {sig_key} does not exist"))
            }
            other => ReviewError::Store(format!("failed to fetch {sig_key}: {other}")),
        })?;

        let signature = String::from_utf8_lossy(&object.body).trim().to_string();
        Ok(RawSignature { signature, sig_key })
    }

    /// Promotes the staged payload into the admin bucket and retires the pair.
    pub async fn commit(&self, namespace: &str, filename: &str) -> Result<CommitOutcome> {
        let tx = TransactionRef::from_signature(namespace, filename)?;
        ensure_not_reserved(tx.namespace(), &self.config.user_index_key)?;
        let payload_key = tx.payload_key();

        let payload = self.staging.get(&payload_key).await.map_err(|err| match err {
            StoreError::NotFound(_) => {
                ReviewError::NotFound(format!("payload {payload_key} does not exist"))
            }
            other => ReviewError::from(other),
        })?;

        let signature = if self.verifier.requires_signature() {
            self.load_signature_for_verification(&tx).await?
        } else {
            String::new()
        };
        self.verifier.verify(&tx, &payload.body, &signature).await?;

        self.admin
            .put(&payload_key, payload.body, JSON_CONTENT_TYPE)
            .await?;
        debug!(payload_key = %payload_key, bucket = self.admin.bucket(), "payload promoted");

        let archive = self
            .archiver
            .archive(&[payload_key.clone(), tx.signature_key()])
            .await?;

        let index_rebuilt = self.index.refresh().await;

        info!(
            payload_key = %payload_key,
            batch = %archive.batch,
            index_rebuilt,
            "transaction committed"
        );
        Ok(CommitOutcome {
            payload_key,
            archive,
            index_rebuilt,
        })
    }

    /// Retires the pair without touching the admin bucket.
    pub async fn reject(&self, namespace: &str, filename: &str) -> Result<RejectOutcome> {
        let tx = TransactionRef::from_signature(namespace, filename)?;

        let archive = self
            .archiver
            .archive(&[tx.payload_key(), tx.signature_key()])
            .await?;

        info!(sig_key = %tx.signature_key(), batch = %archive.batch, "transaction rejected");
        Ok(RejectOutcome { archive })
    }

    async fn load_signature_for_verification(&self, tx: &TransactionRef) -> Result<String> {
        match self.staging.get(&tx.signature_key()).await {
            Ok(object) => Ok(String::from_utf8_lossy(&object.body).trim().to_string()),
            Err(StoreError::NotFound(_)) => Err(ReviewError::SignatureRejected(format!(
                "{} is missing",
                tx.signature_key()
            ))),
            Err(err) => Err(err.into()),
        }
    }
}
