//! Upload bookkeeping stored in a node's attributes.
//!
//! Shock keeps attributes as opaque JSON, so every value is written as a
//! string. Reads accept numbers as well, since other clients may have
//! written them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Attributes attached to a node while (and after) it is being uploaded.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadAttributes {
    /// "1" while chunks are still missing, "0" once the last one landed.
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<String>,

    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,

    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub file_time: Option<String>,

    /// Number of chunks written so far.
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub chunks: Option<String>,

    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<String>,

    /// Legacy spelling of `chunks`; preferred when present.
    #[serde(default, deserialize_with = "stringish", skip_serializing_if = "Option::is_none")]
    pub incomplete_chunks: Option<String>,
}

/// The triple that decides whether a stored node belongs to a local file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResumeKey {
    pub file_size: u64,
    pub file_name: String,
    /// Last modification time in milliseconds since the Unix epoch.
    pub file_time: i64,
}

impl ResumeKey {
    pub fn new(file_size: u64, file_name: impl Into<String>, file_time: i64) -> Self {
        Self {
            file_size,
            file_name: file_name.into(),
            file_time,
        }
    }

    /// Exact, string-wise comparison against stored attributes.
    pub fn matches(&self, attrs: &UploadAttributes) -> bool {
        attrs.file_size.as_deref() == Some(self.file_size.to_string().as_str())
            && attrs.file_name.as_deref() == Some(self.file_name.as_str())
            && attrs.file_time.as_deref() == Some(self.file_time.to_string().as_str())
    }

    /// Query parameters that select nodes carrying this key.
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            ("file_size", self.file_size.to_string()),
            ("file_name", self.file_name.clone()),
            ("file_time", self.file_time.to_string()),
        ]
    }
}

impl UploadAttributes {
    /// Attributes sent when a fresh node is allocated.
    pub fn allocation(key: &ResumeKey, chunk_size: u64) -> Self {
        Self {
            incomplete: Some("1".into()),
            file_size: Some(key.file_size.to_string()),
            file_name: Some(key.file_name.clone()),
            file_time: Some(key.file_time.to_string()),
            chunks: None,
            chunk_size: Some(chunk_size.to_string()),
            incomplete_chunks: None,
        }
    }

    /// Attributes sent alongside a chunk once `chunks_written` chunks
    /// (this one included) are on the store.
    pub fn after_chunk(key: &ResumeKey, chunks_written: u64, chunk_size: u64) -> Self {
        let last = chunks_written.saturating_mul(chunk_size) >= key.file_size;
        Self {
            incomplete: Some(if last { "0" } else { "1" }.into()),
            file_size: Some(key.file_size.to_string()),
            file_name: Some(key.file_name.clone()),
            file_time: Some(key.file_time.to_string()),
            chunks: Some(chunks_written.to_string()),
            chunk_size: Some(chunk_size.to_string()),
            incomplete_chunks: None,
        }
    }

    /// Index of the next chunk to send.
    pub fn resume_point(&self) -> u64 {
        self.incomplete_chunks
            .as_deref()
            .or(self.chunks.as_deref())
            .and_then(parse_count)
            .unwrap_or(0)
    }

    /// Chunk size recorded for the session, if any.
    pub fn recorded_chunk_size(&self) -> Option<u64> {
        self.chunk_size.as_deref().and_then(parse_count).filter(|c| *c > 0)
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete.as_deref() == Some("1")
    }
}

fn parse_count(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

fn stringish<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
