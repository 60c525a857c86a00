//! Serializable conversation state for persistence layers

use serde::{Deserialize, Serialize};
use twig_types::{MessageNode, NodeId, Result};

/// Everything needed to rebuild a [`Conversation`](crate::Conversation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub root_id: Option<NodeId>,
    pub active_path: Vec<NodeId>,
    /// Every node in the tree, oldest first
    pub nodes: Vec<MessageNode>,
}

impl ConversationSnapshot {
    /// Serialize to a single JSON line
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Conversation;
    use twig_types::ChatMessage;

    #[test]
    fn test_json_round_trip() {
        let mut conv = Conversation::with_id("c1");
        conv.add_message(ChatMessage::system("be brief")).unwrap();
        conv.add_message(ChatMessage::user("hi")).unwrap();
        let snapshot = conv.snapshot();

        let json = snapshot.to_json().unwrap();
        assert!(!json.contains('\n'));
        assert_eq!(ConversationSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let err = ConversationSnapshot::from_json("{not json").unwrap_err();
        assert!(matches!(err, twig_types::Error::Json(_)));
    }
}
