use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Resource ids are integers on some endpoints and strings on others
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// One page of query results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    pub results: Vec<Value>,
    pub total: u64,
    #[serde(default)]
    pub took: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryResponse {
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    /// Number of records matching the filters, independent of any limit
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Server-side query time in milliseconds
    pub fn took(&self) -> u64 {
        self.took
    }

    /// Any other response metadata, by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        match key {
            "total" | "took" | "results" => None,
            _ => self.extra.get(key),
        }
    }
}

/// Dataset information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub name: Option<String>,
    pub full_path: Option<String>,
    pub description: Option<String>,
    pub documents_count: Option<u64>,
    pub is_genomic: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Vault object (file, folder) record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub filename: Option<String>,
    pub full_path: Option<String>,
    pub object_type: Option<String>,
    pub size: Option<u64>,
    pub md5: Option<String>,
    pub mimetype: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Pre-signed URL for a single-part upload of the file contents
    pub upload_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Object creation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectCreateRequest {
    pub vault_id: String,
    pub parent_path: String,
    pub filename: String,
    pub object_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_folder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// Multipart initiate request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultipartInitRequest {
    pub parts: u64,
}

/// Multipart initiate response
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MultipartInitResponse {
    pub upload_id: Option<String>,
    #[serde(default)]
    pub part_urls: Vec<String>,
}

/// Receipt for one uploaded part
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u64,
    pub etag: String,
}

/// Multipart complete request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultipartCompleteRequest {
    pub upload_id: String,
    pub md5: String,
    pub parts: Vec<CompletedPart>,
}

/// Multipart complete response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartCompleteResponse {
    pub status: Option<String>,
    pub error: Option<String>,
}

/// Multipart abort request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultipartAbortRequest {
    pub upload_id: String,
}

/// Error response from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: Option<String>,
    pub non_field_errors: Option<Vec<String>>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> Option<String> {
        if let Some(errors) = self.non_field_errors.filter(|e| !e.is_empty()) {
            return Some(errors.join("\n"));
        }
        self.detail.or(self.message).or(self.error)
    }
}
