//! Key layout of staged transactions, recycle entries and user records.

use crate::error::{Result, ReviewError};

pub const SIGNATURE_SUFFIX: &str = ".signature";
pub const PAYLOAD_SUFFIX: &str = ".json";
pub const CREDENTIAL_SUFFIX: &str = ".pwd";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// A namespace path segment: non-empty, no separators, not a dot segment.
pub fn validate_namespace(namespace: &str) -> Result<&str> {
    if namespace.trim().is_empty() {
        return Err(ReviewError::invalid_argument("namespace must not be empty"));
    }
    if namespace.contains('/') || namespace.contains('\\') || namespace == "." || namespace == ".."
    {
        return Err(ReviewError::invalid_argument(format!(
            "invalid namespace '{namespace}'"
        )));
    }
    Ok(namespace)
}

/// Refuses a namespace named like the index object at the top of the admin
/// bucket. Filesystem buckets cannot hold both `user.json` and `user.json/`.
pub fn ensure_not_reserved<'a>(namespace: &'a str, index_key: &str) -> Result<&'a str> {
    if namespace == index_key {
        return Err(ReviewError::invalid_argument(format!(
            "namespace '{namespace}' is reserved"
        )));
    }
    Ok(namespace)
}

/// Identifies one staged transaction by namespace and base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRef {
    namespace: String,
    base: String,
}

impl TransactionRef {
    /// Parses `<base>.signature` under `namespace`.
    ///
    /// The suffix is checked before the base is derived, and an empty base is
    /// refused, so a short or foreign filename never yields a guessed key.
    pub fn from_signature(namespace: &str, filename: &str) -> Result<Self> {
        let namespace = validate_namespace(namespace)?;
        let Some(base) = filename.strip_suffix(SIGNATURE_SUFFIX) else {
            return Err(ReviewError::invalid_argument(format!(
                "only {SIGNATURE_SUFFIX} files are supported, got '{filename}'"
            )));
        };
        if base.is_empty() || base.contains('/') {
            return Err(ReviewError::invalid_argument(format!(
                "invalid signature file name '{filename}'"
            )));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            base: base.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn payload_key(&self) -> String {
        format!("{}/{}{PAYLOAD_SUFFIX}", self.namespace, self.base)
    }

    pub fn signature_key(&self) -> String {
        format!("{}/{}{SIGNATURE_SUFFIX}", self.namespace, self.base)
    }
}

/// Keys of the record and credential artifact owned by a user namespace.
pub fn user_record_key(username: &str) -> String {
    format!("{username}/{username}{PAYLOAD_SUFFIX}")
}

pub fn user_credential_key(username: &str) -> String {
    format!("{username}/{username}{CREDENTIAL_SUFFIX}")
}

/// `true` for listing keys that mark a pending transaction.
pub fn is_pending_signature(key: &str, recycle_prefix: &str) -> bool {
    key.ends_with(SIGNATURE_SUFFIX) && !key.starts_with(recycle_prefix)
}
