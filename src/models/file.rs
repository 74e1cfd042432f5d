use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub folder_id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Metadata entry under `file:<id>`: the public record plus the object-store
/// key, which never leaves the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(flatten)]
    pub record: FileRecord,
    pub key: String,
}

impl FileRecord {
    pub fn download_url(file_id: &str) -> String {
        format!("/api/files/{}", file_id)
    }
}
