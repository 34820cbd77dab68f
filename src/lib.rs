// ============================================================================
// Stagegate Library
// ============================================================================

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod store;
pub mod users;
pub mod verify;
pub mod web;

// Re-export main types for convenience
pub use archive::{ArchiveReport, RecycleArchiver};
pub use config::{AppConfig, ReviewConfig, StoreBackend};
pub use engine::{CommitOutcome, RawSignature, RejectOutcome, ReviewEngine};
pub use error::{Result, ReviewError};
pub use keys::TransactionRef;
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, StoreError};
pub use users::{SaveUserRequest, UserDirectory, UserIndex};
pub use verify::{RequireSignature, SignatureVerifier, TrustUpstream};
pub use web::{AppState, build_router};

use std::sync::Arc;

// ============================================================================
// Store wiring
// ============================================================================

/// Staging and admin buckets opened for one configuration.
pub struct Buckets {
    pub staging: Arc<dyn ObjectStore>,
    pub admin: Arc<dyn ObjectStore>,
}

impl Buckets {
    /// Two fresh in-memory buckets named after the configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use stagegate::{Buckets, ReviewConfig, ReviewEngine};
    ///
    /// let config = ReviewConfig::default();
    /// let buckets = Buckets::in_memory(&config);
    /// let engine = ReviewEngine::new(config, buckets.staging, buckets.admin);
    /// assert_eq!(engine.config().recycle_prefix, "recycle/");
    /// ```
    pub fn in_memory(config: &ReviewConfig) -> Self {
        Self {
            staging: Arc::new(MemoryObjectStore::new(config.public_bucket.clone())),
            admin: Arc::new(MemoryObjectStore::new(config.admin_bucket.clone())),
        }
    }

    /// Filesystem buckets under `<root>/<bucket name>`.
    pub async fn filesystem(config: &ReviewConfig, root: &std::path::Path) -> Result<Self> {
        let staging = FsObjectStore::open(
            config.public_bucket.clone(),
            root.join(&config.public_bucket),
        )
        .await?;
        let admin =
            FsObjectStore::open(config.admin_bucket.clone(), root.join(&config.admin_bucket))
                .await?;
        Ok(Self {
            staging: Arc::new(staging),
            admin: Arc::new(admin),
        })
    }

    /// Opens the buckets selected by `backend`.
    pub async fn open(
        backend: StoreBackend,
        config: &ReviewConfig,
        root: &std::path::Path,
    ) -> Result<Self> {
        match backend {
            StoreBackend::Memory => Ok(Self::in_memory(config)),
            StoreBackend::Filesystem => Self::filesystem(config, root).await,
        }
    }
}
