//! Node records as returned by Shock, and the `{data: ...}` envelope that
//! wraps every JSON response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::attributes::UploadAttributes;

/// Identifier of a node. Shock allocates these as UUID strings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One stored-file record: binary payload plus JSON attributes.
///
/// Only the fields the client looks at are typed; everything else the store
/// sends is ignored.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Node {
    pub id: NodeId,

    /// Free-form attributes. `null` when the node was created without any.
    #[serde(default)]
    pub attributes: Value,

    #[serde(default)]
    pub file: Option<NodeFile>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Payload description attached to a node.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NodeFile {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub checksum: Value,
}

impl Node {
    /// Attributes interpreted as upload bookkeeping, if they look like it.
    pub fn upload_attributes(&self) -> Option<UploadAttributes> {
        if !self.attributes.is_object() {
            return None;
        }
        serde_json::from_value(self.attributes.clone()).ok()
    }
}

/// `{data, error, status}` wrapper used by every Shock JSON response.
#[derive(Deserialize, Debug)]
pub struct Envelope<T> {
    pub data: Option<T>,

    #[serde(default)]
    pub error: Option<Value>,

    #[serde(default)]
    pub status: Option<u16>,
}

impl<T> Envelope<T> {
    /// Human readable form of the `error` member, which Shock sends either as
    /// a string or as a list of strings.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            other => Some(other.to_string()),
        }
    }
}
