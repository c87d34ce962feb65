// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Flat multipart body as the parser produced it: nesting is still encoded
/// lexically in the key names (`supplierIdentification[legalBusinessName]`).
pub type FlatFormMap = Map<String, Value>;

/// Reconstructed form body: bracket keys expanded into nested objects,
/// string-encoded booleans normalized to real booleans.
pub type NestedFormObject = Map<String, Value>;

/// One uploaded image, held in memory for the lifetime of the request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Structured result of a product image analysis.
///
/// Exactly these four fields, nothing else: a reply missing a key or carrying
/// an extra one fails deserialization rather than producing a partial object.
/// `keywords` is a single comma-separated string, not an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProductInsight {
    pub short_description: String,
    pub description: String,
    pub tags: Vec<String>,
    pub keywords: String,
}

/// Metadata for a file part submitted alongside an intake form. The bytes
/// themselves are not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub id: Uuid,
    pub supplier: NestedFormObject,
    pub attachments: Vec<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}
