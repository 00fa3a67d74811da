//! Client for the Shock object store with chunked, resumable uploads.
//!
//! [`ShockClient`] speaks the node REST surface; [`UploadService`] drives
//! uploads chunk by chunk on top of it, resuming from whatever the store
//! has already acknowledged.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use config::{ClientConfig, DEFAULT_CHUNK_SIZE};
pub use errors::{ShockError, ShockResult};
pub use models::{NodeId, NodeQuery, UploadOptions, UploadOutcome, UploadProgress};
pub use services::{
    shock_client::ShockClient,
    upload_file::{LocalFile, MemoryFile, UploadFile},
    upload_service::UploadService,
};
