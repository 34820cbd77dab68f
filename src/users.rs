//! User namespaces in the admin bucket: the `user.json` index and the
//! per-user record/credential pair.

use crate::error::{Result, ReviewError};
use crate::keys::{
    JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE, ensure_not_reserved, user_credential_key,
    user_record_key, validate_namespace,
};
use crate::store::{ListRequest, ObjectStore};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Denormalized listing of namespaces, rebuilt from the admin bucket layout.
pub struct UserIndex {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl UserIndex {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lists the top-level prefixes of the admin bucket and overwrites the
    /// index with them, sorted. Nothing is written if the listing fails.
    pub async fn rebuild(&self) -> Result<Vec<String>> {
        let listing = self
            .store
            .list(ListRequest::new("").delimiter("/"))
            .await?;

        let users: Vec<String> = listing
            .common_prefixes
            .iter()
            .map(|prefix| prefix.trim_end_matches('/').to_string())
            .filter(|name| !name.trim().is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let body = serde_json::to_vec_pretty(&users)?;
        self.store.put(&self.key, body, JSON_CONTENT_TYPE).await?;

        info!(bucket = self.store.bucket(), users = users.len(), "user index rebuilt");
        Ok(users)
    }

    /// Reads the index, rebuilding it when it does not exist yet.
    pub async fn load_or_rebuild(&self) -> Result<Vec<String>> {
        match self.store.get(&self.key).await {
            Ok(object) => serde_json::from_slice(&object.body).map_err(|err| {
                ReviewError::Parse(format!("{} is not a list of names: {err}", self.key))
            }),
            Err(err) if err.is_not_found() => self.rebuild().await,
            Err(err) => Err(err.into()),
        }
    }

    /// Rebuild that only logs on failure. Used after writes whose success must
    /// not depend on the cache.
    pub async fn refresh(&self) -> bool {
        match self.rebuild().await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "user index rebuild failed");
                false
            }
        }
    }
}

/// Body of a user save request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveUserRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub data: JsonValue,
    #[serde(default)]
    pub is_new: bool,
    pub encrypted_password: Option<String>,
    #[serde(default)]
    pub update_password: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveUserOutcome {
    pub credential_written: bool,
    pub index_rebuilt: bool,
}

/// Per-user records in the admin bucket.
pub struct UserDirectory {
    store: Arc<dyn ObjectStore>,
    index: Arc<UserIndex>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn ObjectStore>, index: Arc<UserIndex>) -> Self {
        Self { store, index }
    }

    pub fn index(&self) -> &Arc<UserIndex> {
        &self.index
    }

    fn checked<'a>(&self, username: &'a str) -> Result<&'a str> {
        ensure_not_reserved(validate_namespace(username)?, self.index.key())
    }

    pub async fn get(&self, username: &str) -> Result<JsonValue> {
        let username = self.checked(username)?;
        let object = self.store.get(&user_record_key(username)).await?;
        serde_json::from_slice(&object.body)
            .map_err(|err| ReviewError::Parse(format!("record of '{username}' is not JSON: {err}")))
    }

    /// Writes the record, then the credential artifact when asked to. A failed
    /// credential write is logged and reported but does not fail the save.
    pub async fn save(&self, request: SaveUserRequest) -> Result<SaveUserOutcome> {
        let username = request
            .username
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ReviewError::invalid_argument("username is required"))?;
        let username = self.checked(username)?;

        let body = serde_json::to_vec_pretty(&request.data)?;
        self.store
            .put(&user_record_key(username), body, JSON_CONTENT_TYPE)
            .await?;

        let mut credential_written = false;
        if request.update_password
            && let Some(secret) = request.encrypted_password.as_deref().filter(|s| !s.is_empty())
        {
            match self
                .store
                .put(
                    &user_credential_key(username),
                    secret.as_bytes().to_vec(),
                    TEXT_CONTENT_TYPE,
                )
                .await
            {
                Ok(()) => credential_written = true,
                Err(err) => warn!(username, error = %err, "credential write failed"),
            }
        }

        info!(username, is_new = request.is_new, credential_written, "user saved");
        let index_rebuilt = self.index.refresh().await;
        Ok(SaveUserOutcome {
            credential_written,
            index_rebuilt,
        })
    }

    /// Removes the record and credential artifact. Absent objects are fine.
    pub async fn delete(&self, username: &str) -> Result<bool> {
        let username = self.checked(username)?;
        let record_key = user_record_key(username);
        let credential_key = user_credential_key(username);

        let (record, credential) = futures::join!(
            self.store.delete(&record_key),
            self.store.delete(&credential_key)
        );

        let mut failed = false;
        for (key, outcome) in [(&record_key, record), (&credential_key, credential)] {
            if let Err(err) = outcome {
                warn!(key = %key, error = %err, "user file delete failed");
                failed = true;
            }
        }
        if failed {
            return Err(ReviewError::Store("some files failed to delete".to_string()));
        }

        info!(username, "user deleted");
        Ok(self.index.refresh().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryObjectStore, StoreOp};
    use serde_json::json;

    fn directory(store: &Arc<MemoryObjectStore>) -> UserDirectory {
        let index = Arc::new(UserIndex::new(store.clone(), "user.json"));
        UserDirectory::new(store.clone(), index)
    }

    #[tokio::test]
    async fn rebuild_lists_top_level_namespaces() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        for key in ["bob/bob.json", "alice/alice.json", "alice/alice.pwd", "loose.json"] {
            store.put(key, b"{}".to_vec(), "").await.unwrap();
        }
        let index = UserIndex::new(store.clone(), "user.json");

        let users = index.rebuild().await.unwrap();
        assert_eq!(users, vec!["alice", "bob"]);

        let stored: Vec<String> =
            serde_json::from_slice(&store.get("user.json").await.unwrap().body).unwrap();
        assert_eq!(stored, users);
    }

    #[tokio::test]
    async fn rebuild_is_deterministic() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        store.put("zed/zed.json", b"{}".to_vec(), "").await.unwrap();
        store.put("amy/amy.json", b"{}".to_vec(), "").await.unwrap();
        let index = UserIndex::new(store.clone(), "user.json");

        index.rebuild().await.unwrap();
        let first = store.get("user.json").await.unwrap().body;
        index.rebuild().await.unwrap();
        let second = store.get("user.json").await.unwrap().body;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_listing_keeps_old_index() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        store.put("user.json", b"[\"old\"]".to_vec(), "").await.unwrap();
        store.put("new/new.json", b"{}".to_vec(), "").await.unwrap();
        store.fail_on(StoreOp::List, "").await;
        let index = UserIndex::new(store.clone(), "user.json");

        assert!(matches!(index.rebuild().await, Err(ReviewError::Store(_))));
        assert_eq!(index.load_or_rebuild().await.unwrap(), vec!["old"]);
    }

    #[tokio::test]
    async fn load_rebuilds_missing_index_and_rejects_garbage() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        store.put("dan/dan.json", b"{}".to_vec(), "").await.unwrap();
        let index = UserIndex::new(store.clone(), "user.json");

        assert_eq!(index.load_or_rebuild().await.unwrap(), vec!["dan"]);

        store.put("user.json", b"not json".to_vec(), "").await.unwrap();
        assert!(matches!(
            index.load_or_rebuild().await,
            Err(ReviewError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn save_writes_record_credential_and_index() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        let users = directory(&store);

        let outcome = users
            .save(SaveUserRequest {
                username: Some("erin".into()),
                data: json!({"role": "viewer"}),
                is_new: true,
                encrypted_password: Some("c2VjcmV0".into()),
                update_password: true,
            })
            .await
            .unwrap();

        assert!(outcome.credential_written);
        assert!(outcome.index_rebuilt);
        assert_eq!(users.get("erin").await.unwrap(), json!({"role": "viewer"}));
        assert_eq!(store.get("erin/erin.pwd").await.unwrap().body, b"c2VjcmV0");
        assert_eq!(users.index().load_or_rebuild().await.unwrap(), vec!["erin"]);
    }

    #[tokio::test]
    async fn save_skips_credential_unless_requested() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        let users = directory(&store);

        let outcome = users
            .save(SaveUserRequest {
                username: Some("fay".into()),
                encrypted_password: Some("c2VjcmV0".into()),
                ..SaveUserRequest::default()
            })
            .await
            .unwrap();

        assert!(!outcome.credential_written);
        assert!(!store.contains("fay/fay.pwd").await);
    }

    #[tokio::test]
    async fn save_tolerates_credential_failure() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        store.fail_on(StoreOp::Put, "gus/gus.pwd").await;
        let users = directory(&store);

        let outcome = users
            .save(SaveUserRequest {
                username: Some("gus".into()),
                encrypted_password: Some("x".into()),
                update_password: true,
                ..SaveUserRequest::default()
            })
            .await
            .unwrap();

        assert!(!outcome.credential_written);
        assert!(store.contains("gus/gus.json").await);
    }

    #[tokio::test]
    async fn save_requires_username() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        let err = directory(&store)
            .save(SaveUserRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_removes_both_files_and_updates_index() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        store.put("hal/hal.json", b"{}".to_vec(), "").await.unwrap();
        store.put("hal/hal.pwd", b"x".to_vec(), "").await.unwrap();
        store.put("ivy/ivy.json", b"{}".to_vec(), "").await.unwrap();
        let users = directory(&store);

        assert!(users.delete("hal").await.unwrap());
        assert!(!store.contains("hal/hal.json").await);
        assert!(!store.contains("hal/hal.pwd").await);
        assert_eq!(users.index().load_or_rebuild().await.unwrap(), vec!["ivy"]);

        // already gone: still fine
        users.delete("hal").await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_partial_failure() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        store.put("jo/jo.json", b"{}".to_vec(), "").await.unwrap();
        store.fail_on(StoreOp::Delete, "jo/jo.pwd").await;
        let users = directory(&store);

        let err = users.delete("jo").await.unwrap_err();
        assert!(matches!(err, ReviewError::Store(ref msg) if msg == "some files failed to delete"));
    }

    #[tokio::test]
    async fn index_key_is_not_a_username() {
        let store = Arc::new(MemoryObjectStore::new("admin"));
        let users = directory(&store);

        let request = SaveUserRequest {
            username: Some("user.json".to_string()),
            data: json!({}),
            ..SaveUserRequest::default()
        };
        assert!(matches!(
            users.save(request).await,
            Err(ReviewError::InvalidArgument(_))
        ));
        assert!(users.delete("user.json").await.is_err());
        assert!(store.is_empty().await);
    }
}
