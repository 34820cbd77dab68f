use serde::Serialize;

use crate::engine::{CommitOutcome, RawSignature, RejectOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignatureResponse {
    pub signature: String,
    pub sig_key: String,
}

impl From<RawSignature> for RawSignatureResponse {
    fn from(raw: RawSignature) -> Self {
        Self {
            signature: raw.signature,
            sig_key: raw.sig_key,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub success: bool,
    pub message: String,
    pub payload_key: String,
    pub recycle_batch: String,
    pub index_rebuilt: bool,
}

impl From<CommitOutcome> for CommitResponse {
    fn from(outcome: CommitOutcome) -> Self {
        Self {
            success: true,
            message: "transaction committed and archived to recycle".to_string(),
            payload_key: outcome.payload_key,
            recycle_batch: outcome.archive.batch,
            index_rebuilt: outcome.index_rebuilt,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectResponse {
    pub success: bool,
    pub message: String,
    pub recycle_batch: String,
}

impl From<RejectOutcome> for RejectResponse {
    fn from(outcome: RejectOutcome) -> Self {
        Self {
            success: true,
            message: "transaction rejected and archived".to_string(),
            recycle_batch: outcome.archive.batch,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
