//! Object store capability surface.
//!
//! The review engine never talks to a vendor SDK directly. It consumes the
//! [`ObjectStore`] trait, which models one bucket with get/put/head/delete and
//! prefix listing. None of these operations are atomic across keys.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsObjectStore;
pub use memory::{MemoryObjectStore, StoreOp};

/// Content type used when a stored object carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Parameters of a listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// When set, keys containing the delimiter after the prefix are grouped
    /// into `common_prefixes` instead of being returned individually.
    pub delimiter: Option<String>,
    pub max_keys: Option<usize>,
}

impl ListRequest {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutput {
    pub keys: Vec<String>,
    /// Grouped prefixes, each ending with the delimiter.
    pub common_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size: u64,
}

/// A single bucket in a remote object store.
///
/// Implementations must distinguish "not found" ([`StoreError::NotFound`]) from
/// every other failure. `delete` of an absent key succeeds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human readable bucket name, used in logs.
    fn bucket(&self) -> &str;

    async fn list(&self, request: ListRequest) -> StoreResult<ListOutput>;

    async fn get(&self, key: &str) -> StoreResult<StoredObject>;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> StoreResult<()>;

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Applies prefix/delimiter/max_keys semantics to an ordered key sequence.
///
/// Shared by the bundled stores so both group keys identically.
pub(crate) fn list_from_sorted<'a>(
    keys: impl Iterator<Item = &'a str>,
    request: &ListRequest,
) -> ListOutput {
    let limit = request.max_keys.unwrap_or(usize::MAX);
    let mut output = ListOutput::default();
    let mut returned = 0usize;

    for key in keys {
        if returned >= limit {
            break;
        }
        let Some(rest) = key.strip_prefix(request.prefix.as_str()) else {
            continue;
        };

        if let Some(delimiter) = request.delimiter.as_deref()
            && !delimiter.is_empty()
            && let Some(pos) = rest.find(delimiter)
        {
            let grouped = format!("{}{}", request.prefix, &rest[..pos + delimiter.len()]);
            if output.common_prefixes.last() != Some(&grouped) {
                output.common_prefixes.push(grouped);
                returned += 1;
            }
            continue;
        }

        output.keys.push(key.to_string());
        returned += 1;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_groups_by_delimiter() {
        let keys = [
            "alice/alice.json",
            "alice/alice.pwd",
            "bob/bob.json",
            "user.json",
        ];
        let output = list_from_sorted(keys.into_iter(), &ListRequest::new("").delimiter("/"));

        assert_eq!(output.common_prefixes, vec!["alice/", "bob/"]);
        assert_eq!(output.keys, vec!["user.json"]);
    }

    #[test]
    fn list_respects_prefix_and_max_keys() {
        let keys = ["a/1", "a/2", "a/3", "b/1"];
        let output = list_from_sorted(keys.into_iter(), &ListRequest::new("a/").max_keys(2));

        assert_eq!(output.keys, vec!["a/1", "a/2"]);
        assert!(output.common_prefixes.is_empty());
    }
}
