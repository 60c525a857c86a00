//! Error types for twig

use thiserror::Error;

use crate::types::{NodeId, Role};

/// Result type alias using twig Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when operating on a conversation tree
#[derive(Error, Debug)]
pub enum Error {
    /// No node with this id exists
    #[error("Message not found: {0}")]
    NotFound(NodeId),

    /// The node exists but has the wrong role for the requested operation
    #[error("Message {id} is a {actual} message, expected {expected}")]
    WrongRole {
        id: NodeId,
        expected: Role,
        actual: Role,
    },

    /// The node exists but is not part of the active path
    #[error("Message {0} is not on the active path")]
    NotOnActivePath(NodeId),

    /// Two nodes were expected to share a parent
    #[error("Message {target} is not a sibling of {current}")]
    NotSibling { current: NodeId, target: NodeId },

    /// The root cannot gain siblings without creating a second root
    #[error("Message {0} is the root and cannot have siblings")]
    RootSibling(NodeId),

    /// A stream is already in progress
    #[error("Already streaming into message {0}")]
    AlreadyStreaming(NodeId),

    /// Loaded or mutated state breaks a tree invariant
    #[error("Invalid conversation tree: {0}")]
    InvalidTree(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid tree error
    pub fn invalid_tree(message: impl Into<String>) -> Self {
        Self::InvalidTree(message.into())
    }

    /// Check if the caller passed an id that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if the id was valid but the conversation state rejected the call
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Error::WrongRole { .. }
                | Error::NotOnActivePath(_)
                | Error::NotSibling { .. }
                | Error::RootSibling(_)
                | Error::AlreadyStreaming(_)
        )
    }
}
