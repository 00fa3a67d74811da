//! Wire and caller-facing data models for the Shock client.
//!
//! Node records and their envelope map to the store's JSON via `serde`;
//! upload attributes are the durable checkpoint of a resumable upload.

pub mod attributes;
pub mod node;
pub mod query;
pub mod upload;

pub use attributes::{ResumeKey, UploadAttributes};
pub use node::{Envelope, Node, NodeFile, NodeId};
pub use query::{FilterKind, NodeQuery, QueryValue, encode_query};
pub use upload::{UploadOptions, UploadOutcome, UploadProgress};
