//! Local filesystem bucket.
//!
//! Objects live under `<root>/objects/<key>` and their content types under
//! `<root>/meta/<key>`. Writes go through a temp file in the target directory
//! followed by a rename, so readers never observe a torn object.

use super::{
    DEFAULT_CONTENT_TYPE, ListOutput, ListRequest, ObjectMeta, ObjectStore, StoreError,
    StoreResult, StoredObject, list_from_sorted,
};
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
/// Prefix of in-flight temp files; hidden from listings.
const TEMP_PREFIX: &str = ".stagegate-";

pub struct FsObjectStore {
    bucket: String,
    root: PathBuf,
}

impl FsObjectStore {
    /// Opens (creating if needed) a bucket rooted at `root`.
    pub async fn open(bucket: impl Into<String>, root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(OBJECTS_DIR)).await?;
        tokio::fs::create_dir_all(root.join(META_DIR)).await?;
        Ok(Self {
            bucket: bucket.into(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(OBJECTS_DIR).join(validate_key(key)?))
    }

    fn meta_path(&self, key: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(META_DIR).join(validate_key(key)?))
    }

    async fn collect_keys(&self) -> StoreResult<Vec<String>> {
        let base = self.root.join(OBJECTS_DIR);
        let mut keys = Vec::new();
        let mut pending = vec![base.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                    continue;
                }
                let relative = path
                    .strip_prefix(&base)
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn read_content_type(&self, key: &str) -> StoreResult<String> {
        match tokio::fs::read_to_string(self.meta_path(key)?).await {
            Ok(content_type) if !content_type.trim().is_empty() => {
                Ok(content_type.trim().to_string())
            }
            Ok(_) => Ok(DEFAULT_CONTENT_TYPE.to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(DEFAULT_CONTENT_TYPE.to_string()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Rejects keys that would escape the bucket directory or map to a directory.
fn validate_key(key: &str) -> StoreResult<&str> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(key)
}

fn not_found_as(key: &str, err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        err.into()
    }
}

async fn write_atomic(path: PathBuf, body: Vec<u8>) -> StoreResult<()> {
    tokio::task::spawn_blocking(move || -> StoreResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::Backend(format!("no parent for {}", path.display())))?;
        std::fs::create_dir_all(parent)?;
        let mut temp = Builder::new().prefix(TEMP_PREFIX).tempfile_in(parent)?;
        temp.write_all(&body)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Backend(format!("write task failed: {e}")))?
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, request: ListRequest) -> StoreResult<ListOutput> {
        let keys = self.collect_keys().await?;
        Ok(list_from_sorted(keys.iter().map(String::as_str), &request))
    }

    async fn get(&self, key: &str) -> StoreResult<StoredObject> {
        let body = tokio::fs::read(self.object_path(key)?)
            .await
            .map_err(|err| not_found_as(key, err))?;
        let content_type = self.read_content_type(key).await?;
        Ok(StoredObject { body, content_type })
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> StoreResult<()> {
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        write_atomic(self.meta_path(key)?, content_type.as_bytes().to_vec()).await?;
        write_atomic(self.object_path(key)?, body).await
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        let metadata = tokio::fs::metadata(self.object_path(key)?)
            .await
            .map_err(|err| not_found_as(key, err))?;
        if metadata.is_dir() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(ObjectMeta {
            content_type: self.read_content_type(key).await?,
            size: metadata.len(),
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        for path in [self.object_path(key)?, self.meta_path(key)?] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn round_trips_objects_and_content_type() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open("public", dir.path()).await.unwrap();

        store
            .put("alice/alice.json", br#"{"role":"admin"}"#.to_vec(), "application/json")
            .await
            .unwrap();

        let object = store.get("alice/alice.json").await.unwrap();
        assert_eq!(object.body, br#"{"role":"admin"}"#);
        assert_eq!(object.content_type, "application/json");
        assert_eq!(store.head("alice/alice.json").await.unwrap().size, 16);
    }

    #[tokio::test]
    async fn missing_objects_report_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open("public", dir.path()).await.unwrap();

        assert!(store.get("nobody/x.json").await.unwrap_err().is_not_found());
        assert!(store.head("nobody/x.json").await.unwrap_err().is_not_found());
        store.delete("nobody/x.json").await.unwrap();
    }

    #[tokio::test]
    async fn lists_nested_keys_with_delimiter() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open("admin", dir.path()).await.unwrap();
        for key in ["bob/bob.json", "alice/alice.json", "user.json"] {
            store.put(key, b"[]".to_vec(), "").await.unwrap();
        }

        let all = store.list(ListRequest::new("")).await.unwrap();
        assert_eq!(all.keys, vec!["alice/alice.json", "bob/bob.json", "user.json"]);

        let grouped = store.list(ListRequest::new("").delimiter("/")).await.unwrap();
        assert_eq!(grouped.common_prefixes, vec!["alice/", "bob/"]);
        assert_eq!(grouped.keys, vec!["user.json"]);
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open("admin", dir.path()).await.unwrap();

        for key in ["../etc/passwd", "/abs", "a//b", "a/./b", ""] {
            assert!(matches!(
                store.put(key, vec![], "").await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }
}
