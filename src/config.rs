use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Settings of the review engine itself.
///
/// Injected into the engine, archiver and index builder at construction.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Bucket holding promoted records, user records and the user index
    pub admin_bucket: String,

    /// Bucket holding staged transactions and the recycle archive
    pub public_bucket: String,

    /// Store region, informational for the bundled backends
    pub region: String,

    /// Prefix of the recycle archive inside the public bucket, ends with `/`
    pub recycle_prefix: String,

    /// Key of the user index inside the admin bucket
    pub user_index_key: String,

    /// Maximum keys requested when listing pending transactions
    pub list_page_size: usize,

    /// Maximum concurrent copy-then-delete operations per archive batch
    pub archive_concurrency: usize,
}

impl ReviewConfig {
    pub fn new(admin_bucket: &str, public_bucket: &str) -> Self {
        Self {
            admin_bucket: admin_bucket.to_string(),
            public_bucket: public_bucket.to_string(),
            region: "local".to_string(),
            recycle_prefix: "recycle/".to_string(),
            user_index_key: "user.json".to_string(),
            list_page_size: 1000,
            archive_concurrency: 8,
        }
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn recycle_prefix(mut self, prefix: &str) -> Self {
        self.recycle_prefix = prefix.to_string();
        self
    }

    pub fn user_index_key(mut self, key: &str) -> Self {
        self.user_index_key = key.to_string();
        self
    }

    pub fn list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size;
        self
    }

    pub fn archive_concurrency(mut self, limit: usize) -> Self {
        self.archive_concurrency = limit;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.admin_bucket.is_empty() || self.public_bucket.is_empty() {
            return Err("bucket names cannot be empty".to_string());
        }

        if self.admin_bucket == self.public_bucket {
            return Err("admin and public buckets must differ".to_string());
        }

        if self.recycle_prefix.is_empty() || !self.recycle_prefix.ends_with('/') {
            return Err("recycle_prefix must be non-empty and end with '/'".to_string());
        }

        if self.user_index_key.is_empty() || self.user_index_key.contains('/') {
            return Err("user_index_key must be a top-level key".to_string());
        }

        if self.list_page_size == 0 {
            return Err("list_page_size must be > 0".to_string());
        }

        if self.archive_concurrency == 0 {
            return Err("archive_concurrency must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self::new("review-admin", "review-public")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Filesystem,
}

impl StoreBackend {
    fn from_env(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "fs" | "filesystem" | "file" => Ok(Self::Filesystem),
            _ => Err(anyhow::anyhow!(
                "STORE_BACKEND must be one of: memory, filesystem"
            )),
        }
    }
}

/// Process configuration for the HTTP server binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub store_root: PathBuf,
    pub public_dir: Option<PathBuf>,
    pub review: ReviewConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let store_backend = StoreBackend::from_env(
            &env::var("STORE_BACKEND").unwrap_or_else(|_| "filesystem".to_string()),
        )?;

        let store_root =
            PathBuf::from(env::var("STORE_ROOT").unwrap_or_else(|_| "stagegate_data".to_string()));

        let public_dir = match env::var("PUBLIC_DIR") {
            Ok(dir) if dir.is_empty() => None,
            Ok(dir) => Some(PathBuf::from(dir)),
            Err(_) => Some(PathBuf::from("public")),
        };

        let defaults = ReviewConfig::default();
        let admin_bucket = env::var("ADMIN_BUCKET").unwrap_or(defaults.admin_bucket);
        let public_bucket = env::var("PUBLIC_BUCKET").unwrap_or(defaults.public_bucket);

        let mut review = ReviewConfig::new(&admin_bucket, &public_bucket)
            .region(&env::var("REGION").unwrap_or(defaults.region));

        if let Ok(raw) = env::var("LIST_PAGE_SIZE") {
            review = review.list_page_size(
                raw.parse::<usize>()
                    .context("LIST_PAGE_SIZE must be a valid usize")?,
            );
        }

        if let Ok(raw) = env::var("ARCHIVE_CONCURRENCY") {
            review = review.archive_concurrency(
                raw.parse::<usize>()
                    .context("ARCHIVE_CONCURRENCY must be a valid usize")?,
            );
        }

        review.validate().map_err(anyhow::Error::msg)?;

        Ok(Self {
            host,
            port,
            store_backend,
            store_root,
            public_dir,
            review,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
