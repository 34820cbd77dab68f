use super::{
    DEFAULT_CONTENT_TYPE, ListOutput, ListRequest, ObjectMeta, ObjectStore, StoreError,
    StoreResult, StoredObject, list_from_sorted,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::{Mutex, RwLock};

/// Store operation kinds, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    Put,
    Head,
    Delete,
}

/// In-process bucket.
///
/// Keys are kept ordered so listings are stable. Faults can be injected per
/// operation and key to exercise partial-failure paths.
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    faults: Mutex<HashSet<(StoreOp, String)>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(HashSet::new()),
        }
    }

    /// Makes every `op` on `key` fail with a backend error until cleared.
    /// For [`StoreOp::List`] the key is matched against the request prefix.
    pub async fn fail_on(&self, op: StoreOp, key: impl Into<String>) {
        self.faults.lock().await.insert((op, key.into()));
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn check_fault(&self, op: StoreOp, key: &str) -> StoreResult<()> {
        if self.faults.lock().await.contains(&(op, key.to_string())) {
            return Err(StoreError::Backend(format!(
                "injected {op:?} failure for '{key}' in bucket '{}'",
                self.bucket
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, request: ListRequest) -> StoreResult<ListOutput> {
        self.check_fault(StoreOp::List, &request.prefix).await?;
        let objects = self.objects.read().await;
        Ok(list_from_sorted(objects.keys().map(String::as_str), &request))
    }

    async fn get(&self, key: &str) -> StoreResult<StoredObject> {
        self.check_fault(StoreOp::Get, key).await?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> StoreResult<()> {
        self.check_fault(StoreOp::Put, key).await?;
        if key.is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        self.check_fault(StoreOp::Head, key).await?;
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| ObjectMeta {
                content_type: object.content_type.clone(),
                size: object.body.len() as u64,
            })
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_fault(StoreOp::Delete, key).await?;
        self.objects.write().await.remove(key);
        Ok(())
    }
}
