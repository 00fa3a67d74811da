//! src/services/upload_service.rs
//!
//! UploadService: chunked, resumable uploads into Shock.
//!
//! One call to [`UploadService::upload`] drives a small state machine:
//!
//! ```text
//! Discovering ──► Allocating ──► SendingChunk(0) ──► … ──► Complete
//!      │                                  ▲
//!      └──── (matching node found) ───────┘
//! ```
//!
//! with `Failed` and `Cancelled` reachable from every step. Chunks are sent
//! strictly one after another; the only durable state is what the store has
//! acknowledged, recorded in the node's attributes.

use crate::{
    errors::ShockError,
    models::{
        Node, NodeId, ResumeKey, UploadAttributes, UploadOptions, UploadOutcome, UploadProgress,
    },
    services::{shock_client::ShockClient, upload_file::UploadFile},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-call upload bookkeeping. Never persisted.
#[derive(Debug, Clone)]
struct UploadSession {
    node_id: NodeId,
    /// Next chunk to send, 0-based.
    current_chunk: u64,
    chunk_size: u64,
    file_size: u64,
}

impl UploadSession {
    fn uploaded(&self) -> u64 {
        self.current_chunk
            .saturating_mul(self.chunk_size)
            .min(self.file_size)
    }

    fn is_done(&self) -> bool {
        self.current_chunk.saturating_mul(self.chunk_size) >= self.file_size
    }

    /// Byte range of the current chunk.
    fn chunk_range(&self) -> (u64, u64) {
        let start = self.current_chunk.saturating_mul(self.chunk_size);
        let end = start.saturating_add(self.chunk_size).min(self.file_size);
        (start, end)
    }

    fn progress(&self) -> UploadProgress {
        UploadProgress {
            file_size: self.file_size,
            uploaded_size: self.uploaded(),
            node_id: self.node_id.clone(),
        }
    }
}

#[derive(Debug)]
enum UploadState {
    Discovering,
    Allocating,
    SendingChunk(UploadSession),
    Complete(UploadSession),
    Failed(ShockError, Option<NodeId>),
    Cancelled(Option<NodeId>),
}

impl UploadState {
    fn after_confirmation(session: UploadSession) -> Self {
        if session.is_done() {
            Self::Complete(session)
        } else {
            Self::SendingChunk(session)
        }
    }
}

/// Uploads files to Shock in fixed-size chunks, resuming earlier attempts.
#[derive(Clone, Debug)]
pub struct UploadService {
    client: ShockClient,
}

impl UploadService {
    pub fn new(client: ShockClient) -> Self {
        Self { client }
    }

    /// Upload `file`, reporting progress and at most one error.
    ///
    /// `on_progress` fires once when the target node is known and again after
    /// every chunk the store confirms. `on_error` fires when discovery,
    /// allocation, a file read or a chunk write fails; the call then returns
    /// [`UploadOutcome::Failed`]. Cancellation is polled before each chunk is
    /// read and again before it is sent; once seen the call returns
    /// [`UploadOutcome::Cancelled`] without invoking either callback, leaving
    /// the node resumable.
    pub async fn upload<F, P, E>(
        &self,
        file: &F,
        options: UploadOptions,
        mut on_progress: P,
        on_error: E,
        cancel: &CancellationToken,
    ) -> UploadOutcome
    where
        F: UploadFile,
        P: FnMut(UploadProgress),
        E: FnOnce(ShockError),
    {
        let key = file.resume_key();
        let default_chunk_size = self.client.config().chunk_size;
        let mut state = UploadState::Discovering;

        info!(
            file = %key.file_name,
            size = key.file_size,
            "starting upload"
        );

        loop {
            state = match state {
                UploadState::Discovering => match self.discover(&key, &options).await {
                    Err(err) => UploadState::Failed(err, None),
                    Ok(found) if cancel.is_cancelled() => {
                        UploadState::Cancelled(found.map(|node| node.id))
                    }
                    Ok(None) => UploadState::Allocating,
                    Ok(Some(node)) => {
                        let session = resumed_session(node, key.file_size, default_chunk_size);
                        info!(
                            node = %session.node_id,
                            chunk = session.current_chunk,
                            chunk_size = session.chunk_size,
                            "resuming upload"
                        );
                        on_progress(session.progress());
                        UploadState::after_confirmation(session)
                    }
                },

                UploadState::Allocating => {
                    let chunk_size = default_chunk_size;
                    let parts = key.file_size.div_ceil(chunk_size);
                    let attrs = UploadAttributes::allocation(&key, chunk_size);
                    match self.client.create_node(&attrs, parts).await {
                        Err(err) => UploadState::Failed(err, None),
                        Ok(node) if cancel.is_cancelled() => UploadState::Cancelled(Some(node.id)),
                        Ok(node) => {
                            let session = UploadSession {
                                node_id: node.id,
                                current_chunk: 0,
                                chunk_size,
                                file_size: key.file_size,
                            };
                            info!(node = %session.node_id, parts, "allocated upload node");
                            on_progress(session.progress());
                            UploadState::after_confirmation(session)
                        }
                    }
                }

                UploadState::SendingChunk(session) => {
                    self.send_chunk(file, &key, session, &mut on_progress, cancel)
                        .await
                }

                UploadState::Complete(session) => {
                    info!(node = %session.node_id, size = session.file_size, "upload complete");
                    return UploadOutcome::Completed {
                        node_id: session.node_id,
                    };
                }

                UploadState::Failed(err, node_id) => {
                    warn!(error = %err, "upload failed");
                    on_error(err);
                    return UploadOutcome::Failed { node_id };
                }

                UploadState::Cancelled(node_id) => {
                    info!("upload cancelled");
                    return UploadOutcome::Cancelled { node_id };
                }
            };
        }
    }

    /// Find a node to resume: the known node if it matches, else (when
    /// allowed) the first node in the store carrying the same resume key.
    ///
    /// Failing to fetch the known node is not an error; the search path
    /// takes over.
    async fn discover(
        &self,
        key: &ResumeKey,
        options: &UploadOptions,
    ) -> Result<Option<Node>, ShockError> {
        if let Some(id) = &options.known_node_id {
            match self.client.get_node(id).await {
                Ok(node)
                    if node
                        .upload_attributes()
                        .is_some_and(|attrs| key.matches(&attrs)) =>
                {
                    debug!(node = %id, "known node matches file");
                    return Ok(Some(node));
                }
                Ok(_) => debug!(node = %id, "known node belongs to different content"),
                Err(err) => warn!(node = %id, "could not fetch known node: {}", err),
            }
        }

        if !options.attempt_resume {
            return Ok(None);
        }

        let found = self.client.find_resumable(key).await?;
        match &found {
            Some(node) => debug!(node = %node.id, "found resumable node"),
            None => debug!("no resumable node found"),
        }
        Ok(found)
    }

    async fn send_chunk<F, P>(
        &self,
        file: &F,
        key: &ResumeKey,
        mut session: UploadSession,
        on_progress: &mut P,
        cancel: &CancellationToken,
    ) -> UploadState
    where
        F: UploadFile,
        P: FnMut(UploadProgress),
    {
        if cancel.is_cancelled() {
            return UploadState::Cancelled(Some(session.node_id));
        }

        let index = session.current_chunk;
        let (start, end) = session.chunk_range();
        let bytes = match file.read_range(start, end).await {
            Ok(bytes) => bytes,
            Err(source) => {
                return UploadState::Failed(
                    ShockError::FileRead {
                        chunk: index,
                        source,
                    },
                    Some(session.node_id),
                );
            }
        };

        if cancel.is_cancelled() {
            return UploadState::Cancelled(Some(session.node_id));
        }

        let attrs = UploadAttributes::after_chunk(key, index + 1, session.chunk_size);
        let sent = self
            .client
            .put_chunk(&session.node_id, index + 1, file.name(), bytes, &attrs)
            .await;

        match sent {
            Ok(_) => {
                session.current_chunk = index + 1;
                debug!(
                    node = %session.node_id,
                    chunk = index,
                    uploaded = session.uploaded(),
                    "chunk confirmed"
                );
                on_progress(session.progress());
                UploadState::after_confirmation(session)
            }
            Err(err) => UploadState::Failed(err, Some(session.node_id)),
        }
    }
}

fn resumed_session(node: Node, file_size: u64, default_chunk_size: u64) -> UploadSession {
    let attrs = node.upload_attributes().unwrap_or_default();
    UploadSession {
        current_chunk: attrs.resume_point(),
        chunk_size: attrs.recorded_chunk_size().unwrap_or(default_chunk_size),
        file_size,
        node_id: node.id,
    }
}
