//! Conversation change events

use serde::{Deserialize, Serialize};
use twig_types::NodeId;

/// Events emitted after each mutation completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A node was created
    MessageAdded {
        id: NodeId,
        parent_id: Option<NodeId>,
    },

    /// Nodes were deleted (the requested node and its descendants)
    MessagesRemoved { ids: Vec<NodeId> },

    /// A node's flags changed outside of streaming or summarization
    MessageUpdated { id: NodeId },

    /// The active path changed
    PathChanged { active_path: Vec<NodeId> },

    /// A node became the streaming target
    StreamStarted { id: NodeId },

    /// Streaming content changed (carries the full accumulated text)
    StreamUpdated { id: NodeId, content: String },

    /// Streaming ended; the node's content is final
    StreamFinished { id: NodeId },

    /// Nodes were flagged as summarized
    MessagesSummarized { ids: Vec<NodeId> },

    /// A summary node was spliced into the tree
    SummaryInserted {
        id: NodeId,
        parent_id: Option<NodeId>,
        adopted: Vec<NodeId>,
    },

    /// State was replaced by a load
    Loaded { conversation_id: String },

    /// Everything was cleared
    Cleared,
}

impl ConversationEvent {
    /// Whether this event changes which messages are shown
    pub fn affects_view(&self) -> bool {
        !matches!(self, ConversationEvent::StreamStarted { .. })
    }

    /// Whether this event is part of a token stream
    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            ConversationEvent::StreamStarted { .. }
                | ConversationEvent::StreamUpdated { .. }
                | ConversationEvent::StreamFinished { .. }
        )
    }
}
