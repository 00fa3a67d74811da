//! Caller-facing types of the upload engine.

use serde::Serialize;

use super::node::NodeId;

/// Progress report, emitted once at start and after every confirmed chunk.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    pub file_size: u64,
    pub uploaded_size: u64,
    pub node_id: NodeId,
}

/// How an upload call should look for earlier attempts.
#[derive(Clone, Debug, Default)]
pub struct UploadOptions {
    /// Node of a previous attempt; checked before any search.
    pub known_node_id: Option<NodeId>,

    /// Search the store for a node matching the file when the known node
    /// is absent or does not match.
    pub attempt_resume: bool,
}

impl UploadOptions {
    pub fn resume() -> Self {
        Self {
            known_node_id: None,
            attempt_resume: true,
        }
    }

    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn with_known_node(mut self, id: impl Into<NodeId>) -> Self {
        self.known_node_id = Some(id.into());
        self
    }
}

/// Completion signal of an upload call.
///
/// Failures carry no error: it has already been handed to the error
/// callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed { node_id: NodeId },
    Failed { node_id: Option<NodeId> },
    Cancelled { node_id: Option<NodeId> },
}

impl UploadOutcome {
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::Completed { node_id } => Some(node_id),
            Self::Failed { node_id } | Self::Cancelled { node_id } => node_id.as_ref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
