//! Core types for conversation history

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opening tag wrapped around summary text when it is stored as a message.
const SUMMARY_OPEN: &str = "<context-summary>\n";
/// Closing tag for summary messages.
const SUMMARY_CLOSE: &str = "\n</context-summary>";

/// Opaque identifier for a message node.
///
/// Identifiers are generated once and never reused. The engine places no
/// meaning on their format beyond equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for display (first 8 characters)
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Get the role as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an attached file (typically an image)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Where the attachment lives (path, URL, or data URI)
    pub uri: String,
    /// MIME type, e.g. "image/png"
    pub mime_type: String,
}

impl Attachment {
    /// Create an image attachment reference
    pub fn image(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The payload of a node: who said what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Attachment>,
    /// Hidden from display but still sent to the model (e.g. tool output)
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// Replaced by a summary; kept for history only
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_summarized: bool,
    /// Synthetic summary standing in for older messages
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_summary: bool,
}

impl ChatMessage {
    /// Create a message with the given role and text
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
            hidden: false,
            is_summarized: false,
            is_summary: false,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an empty assistant message (streaming target)
    pub fn assistant_empty() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a summary message, wrapping the text in summary tags
    pub fn summary(summary_text: &str) -> Self {
        Self {
            is_summary: true,
            ..Self::system(format!("{SUMMARY_OPEN}{summary_text}{SUMMARY_CLOSE}"))
        }
    }

    /// Attach images
    pub fn with_images(mut self, images: Vec<Attachment>) -> Self {
        self.images = images;
        self
    }

    /// Mark as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// The summary text without its wrapping tags, if this is a summary
    pub fn summary_text(&self) -> Option<&str> {
        if !self.is_summary {
            return None;
        }
        let inner = self
            .content
            .strip_prefix(SUMMARY_OPEN)
            .and_then(|s| s.strip_suffix(SUMMARY_CLOSE))
            .unwrap_or(&self.content);
        Some(inner)
    }
}

/// A single node in the conversation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNode {
    pub id: NodeId,
    pub message: ChatMessage,
    /// `None` only for the root
    pub parent_id: Option<NodeId>,
    /// Children in creation order; the position is the branch index
    #[serde(default)]
    pub child_ids: Vec<NodeId>,
    /// Creation time in milliseconds since the epoch
    #[serde(default)]
    pub created_at: i64,
}

impl MessageNode {
    /// Create a childless node stamped with the current time
    pub fn new(id: NodeId, message: ChatMessage, parent_id: Option<NodeId>) -> Self {
        Self {
            id,
            message,
            parent_id,
            child_ids: Vec::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Whether this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.child_ids.is_empty()
    }

    /// Shortcut for the message role
    pub fn role(&self) -> Role {
        self.message.role
    }
}
