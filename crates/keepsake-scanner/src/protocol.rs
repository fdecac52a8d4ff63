//! Scanner message protocol
//!
//! Request: `{ id, operation: { kind, payload } }`.
//! Response: `{ id, success, data, error }` with the request's id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SAMPLE_LIMIT: u32 = 100;

fn default_sample_limit() -> u32 {
    DEFAULT_SAMPLE_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum ScanOperation {
    ListDatabases,
    GetDatabase {
        name: String,
    },
    GetCollections {
        name: String,
    },
    GetCollectionSample {
        database: String,
        collection: String,
        #[serde(default = "default_sample_limit")]
        limit: u32,
    },
    DeleteDatabase {
        name: String,
    },
}

impl ScanOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            ScanOperation::ListDatabases => "listDatabases",
            ScanOperation::GetDatabase { .. } => "getDatabase",
            ScanOperation::GetCollections { .. } => "getCollections",
            ScanOperation::GetCollectionSample { .. } => "getCollectionSample",
            ScanOperation::DeleteDatabase { .. } => "deleteDatabase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub id: String,
    pub operation: ScanOperation,
}

impl ScanRequest {
    pub fn new(id: impl Into<String>, operation: ScanOperation) -> Self {
        Self {
            id: id.into(),
            operation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub id: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ScanResponse {
    pub fn ok(id: String, data: Value) -> Self {
        Self {
            id,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(id: String, error: String) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(error),
        }
    }
}
