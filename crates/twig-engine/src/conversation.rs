//! Conversation state: node tree, active path, and streaming status

use std::collections::HashMap;

use tokio::sync::broadcast;
use twig_types::{ChatMessage, Error, MessageNode, NodeId, Result};

use crate::{
    events::ConversationEvent,
    path::PathTracker,
    snapshot::ConversationSnapshot,
    store::NodeStore,
    streaming::StreamState,
};

/// A branching conversation.
///
/// Owns the node tree and the active path. Every mutating method runs to
/// completion before returning, leaves the tree consistent, and emits
/// [`ConversationEvent`]s to subscribers. Read views are plain methods
/// recomputed on demand.
///
/// Callers must not start a second stream while one is active; doing so
/// returns [`Error::AlreadyStreaming`].
pub struct Conversation {
    pub(crate) id: String,
    pub(crate) store: NodeStore,
    pub(crate) path: PathTracker,
    pub(crate) stream: StreamState,
    pub(crate) event_tx: broadcast::Sender<ConversationEvent>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Create an empty conversation with a fresh id
    pub fn new() -> Self {
        Self::with_id(NodeId::generate().to_string())
    }

    /// Create an empty conversation with the given id
    pub fn with_id(id: impl Into<String>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            id: id.into(),
            store: NodeStore::new(),
            path: PathTracker::new(),
            stream: StreamState::default(),
            event_tx,
        }
    }

    /// Rehydrate a conversation from a snapshot
    pub fn from_snapshot(snapshot: ConversationSnapshot) -> Result<Self> {
        let mut conversation = Self::with_id(snapshot.conversation_id.clone());
        conversation.restore(snapshot)?;
        Ok(conversation)
    }

    /// Conversation id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.event_tx.subscribe()
    }

    /// The underlying node store
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Look up a node
    pub fn get(&self, id: &NodeId) -> Option<&MessageNode> {
        self.store.get(id)
    }

    /// Root node id
    pub fn root_id(&self) -> Option<&NodeId> {
        self.store.root_id()
    }

    /// The active path
    pub fn active_path(&self) -> &[NodeId] {
        self.path.current()
    }

    /// Append a message after the active path's tail and extend the path to it.
    pub fn add_message(&mut self, message: ChatMessage) -> Result<NodeId> {
        let parent_id = self.path.tail().cloned();
        let id = self.store.create(message, parent_id.as_ref())?;
        self.path.push(id.clone());

        self.emit(ConversationEvent::MessageAdded {
            id: id.clone(),
            parent_id,
        });
        self.emit_path_changed();
        self.debug_check();
        Ok(id)
    }

    /// Delete a message together with all of its descendants.
    ///
    /// If the message was on the active path, the path is cut back to its parent
    /// and then follows first children down to a leaf. Removing the streaming
    /// target ends the stream.
    pub fn remove_message(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        let position = self.path.position(id);
        let removed = self.store.remove_subtree(id)?;

        if self
            .stream
            .target()
            .is_some_and(|target| removed.contains(target))
        {
            self.stream.reset();
        }

        if let Some(pos) = position {
            let prefix = self.path.current()[..pos].to_vec();
            self.path.set(PathTracker::descend_to_leaf(&self.store, prefix));
        }

        tracing::debug!(id = %id, count = removed.len(), "removed messages");
        self.emit(ConversationEvent::MessagesRemoved {
            ids: removed.clone(),
        });
        if position.is_some() {
            self.emit_path_changed();
        }
        self.debug_check();
        Ok(removed)
    }

    /// Set or clear the hidden flag on a message
    pub fn set_hidden(&mut self, id: &NodeId, hidden: bool) -> Result<()> {
        self.store.set_hidden(id, hidden)?;
        self.emit(ConversationEvent::MessageUpdated { id: id.clone() });
        Ok(())
    }

    /// Drop every message and reset streaming state
    pub fn clear(&mut self) {
        self.store = NodeStore::new();
        self.path.clear();
        self.stream.reset();
        self.emit(ConversationEvent::Cleared);
    }

    /// Replace all state with the given nodes, root, and active path.
    ///
    /// The input is validated against every tree invariant before anything is
    /// replaced; on error the conversation is left untouched.
    pub fn load(
        &mut self,
        conversation_id: impl Into<String>,
        nodes: HashMap<NodeId, MessageNode>,
        root_id: Option<NodeId>,
        active_path: Vec<NodeId>,
    ) -> Result<()> {
        for (key, node) in &nodes {
            if *key != node.id {
                return Err(Error::invalid_tree(format!(
                    "node stored under {} has id {}",
                    key, node.id
                )));
            }
        }
        let store = NodeStore::from_nodes(nodes.into_values(), root_id)?;
        let mut path = PathTracker::new();
        path.set(active_path);
        path.validate(&store)?;

        self.id = conversation_id.into();
        self.store = store;
        self.path = path;
        self.stream.reset();

        tracing::info!(
            conversation = %self.id,
            nodes = self.store.len(),
            depth = self.path.current().len(),
            "loaded conversation"
        );
        self.emit(ConversationEvent::Loaded {
            conversation_id: self.id.clone(),
        });
        self.emit_path_changed();
        Ok(())
    }

    /// Load from a snapshot
    pub fn restore(&mut self, snapshot: ConversationSnapshot) -> Result<()> {
        let count = snapshot.nodes.len();
        let nodes = snapshot
            .nodes
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect::<HashMap<_, _>>();
        if nodes.len() != count {
            return Err(Error::invalid_tree("snapshot contains duplicate node ids"));
        }
        self.load(
            snapshot.conversation_id,
            nodes,
            snapshot.root_id,
            snapshot.active_path,
        )
    }

    /// Capture the full state for persistence
    pub fn snapshot(&self) -> ConversationSnapshot {
        let mut nodes: Vec<MessageNode> = self.store.iter().cloned().collect();
        nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        ConversationSnapshot {
            conversation_id: self.id.clone(),
            root_id: self.store.root_id().cloned(),
            active_path: self.path.current().to_vec(),
            nodes,
        }
    }

    /// Verify every tree and path invariant
    pub fn check_invariants(&self) -> Result<()> {
        self.store.check_invariants()?;
        self.path.validate(&self.store)?;
        if let Some(target) = self.stream.target() {
            self.store.require(target)?;
        }
        Ok(())
    }

    pub(crate) fn emit(&self, event: ConversationEvent) {
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn emit_path_changed(&self) {
        self.emit(ConversationEvent::PathChanged {
            active_path: self.path.current().to_vec(),
        });
    }

    /// Invariant violations are bugs, not runtime conditions.
    pub(crate) fn debug_check(&self) {
        if cfg!(debug_assertions) {
            if let Err(e) = self.check_invariants() {
                panic!("conversation invariant violated: {e}");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use twig_types::Role;

    /// Build `[sys, u1, a1, u2, a2]`-style threads from (role, text) pairs.
    pub(crate) fn thread(turns: &[(Role, &str)]) -> (Conversation, Vec<NodeId>) {
        let mut conv = Conversation::with_id("test");
        let ids = turns
            .iter()
            .map(|(role, text)| conv.add_message(ChatMessage::new(*role, *text)).unwrap())
            .collect();
        (conv, ids)
    }

    #[test]
    fn test_add_first_message() {
        let mut conv = Conversation::new();
        let m1 = conv.add_message(ChatMessage::user("hi")).unwrap();
        assert_eq!(conv.root_id(), Some(&m1));
        assert_eq!(conv.active_path(), &[m1]);
    }

    #[test]
    fn test_add_extends_path() {
        let (conv, ids) = thread(&[(Role::User, "hi"), (Role::Assistant, "hello")]);
        assert_eq!(conv.active_path(), ids.as_slice());
        assert_eq!(conv.get(&ids[1]).unwrap().parent_id.as_ref(), Some(&ids[0]));
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_on_path_cuts_and_descends() {
        let (mut conv, ids) = thread(&[
            (Role::System, "sys"),
            (Role::User, "q"),
            (Role::Assistant, "a"),
        ]);
        // Alternative answer branch under q
        let alt = conv.add_sibling_message(&ids[2], ChatMessage::assistant("b")).unwrap();

        let removed = conv.remove_message(&ids[2]).unwrap();
        assert_eq!(removed, vec![ids[2].clone()]);
        assert_eq!(conv.active_path(), &[ids[0].clone(), ids[1].clone(), alt]);
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_cascades_to_descendants() {
        let (mut conv, ids) = thread(&[
            (Role::User, "q"),
            (Role::Assistant, "a"),
            (Role::User, "q2"),
        ]);
        let removed = conv.remove_message(&ids[1]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(conv.get(&ids[2]).is_none());
        assert_eq!(conv.active_path(), &[ids[0].clone()]);
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_root_clears_everything() {
        let (mut conv, ids) = thread(&[(Role::User, "q"), (Role::Assistant, "a")]);
        conv.remove_message(&ids[0]).unwrap();
        assert!(conv.store().is_empty());
        assert!(conv.active_path().is_empty());
        assert!(conv.root_id().is_none());
    }

    #[test]
    fn test_remove_off_path_keeps_path() {
        let (mut conv, ids) = thread(&[(Role::User, "q"), (Role::Assistant, "a")]);
        let alt = conv.add_sibling_message(&ids[1], ChatMessage::assistant("b")).unwrap();
        conv.remove_message(&alt).unwrap();
        assert_eq!(conv.active_path(), ids.as_slice());
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let mut conv = Conversation::new();
        assert!(conv.remove_message(&NodeId::from("x")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove_streaming_target_ends_stream() {
        let (mut conv, _) = thread(&[(Role::User, "q")]);
        let target = conv.start_streaming().unwrap();
        conv.remove_message(&target).unwrap();
        assert!(!conv.is_streaming());
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_round_trip_through_snapshot() {
        let (mut conv, ids) = thread(&[
            (Role::System, "sys"),
            (Role::User, "q"),
            (Role::Assistant, "a"),
        ]);
        conv.start_regeneration(&ids[2]).unwrap();
        conv.append_to_streaming("b");
        conv.finish_streaming();

        let snapshot = conv.snapshot();
        let restored = Conversation::from_snapshot(snapshot.clone()).unwrap();

        assert_eq!(restored.id(), "test");
        assert_eq!(restored.active_path(), conv.active_path());
        let before: Vec<_> = conv.all_messages().into_iter().map(|n| (&n.id, &n.message)).collect();
        let after: Vec<_> = restored.all_messages().into_iter().map(|n| (&n.id, &n.message)).collect();
        assert_eq!(before, after);
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn test_load_rejects_bad_path_and_keeps_state() {
        let (mut conv, ids) = thread(&[(Role::User, "q"), (Role::Assistant, "a")]);
        let mut snapshot = conv.snapshot();
        snapshot.active_path = vec![ids[1].clone()];

        let err = conv.restore(snapshot).unwrap_err();
        assert!(matches!(err, Error::InvalidTree(_)));
        assert_eq!(conv.active_path(), ids.as_slice());
    }

    #[test]
    fn test_load_rejects_mismatched_key() {
        let (conv, _) = thread(&[(Role::User, "q")]);
        let snapshot = conv.snapshot();
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::from("other"), snapshot.nodes[0].clone());
        let mut fresh = Conversation::new();
        assert!(fresh.load("x", nodes, snapshot.root_id, snapshot.active_path).is_err());
    }

    #[test]
    fn test_clear() {
        let (mut conv, _) = thread(&[(Role::User, "q")]);
        conv.start_streaming().unwrap();
        conv.clear();
        assert!(conv.store().is_empty());
        assert!(!conv.is_streaming());
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_events_emitted_in_order() {
        let mut conv = Conversation::new();
        let mut rx = conv.subscribe();
        let id = conv.add_message(ChatMessage::user("hi")).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::MessageAdded {
                id: id.clone(),
                parent_id: None
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ConversationEvent::PathChanged {
                active_path: vec![id]
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_stream_updates() {
        let (mut conv, _) = thread(&[(Role::User, "q")]);
        let mut rx = conv.subscribe();
        let target = conv.start_streaming().unwrap();
        conv.append_to_streaming("Hel");

        let mut updates = Vec::new();
        while updates.len() < 2 {
            let event = rx.recv().await.unwrap();
            if event.is_stream() {
                updates.push(event);
            }
        }
        assert_eq!(
            updates,
            vec![
                ConversationEvent::StreamStarted { id: target.clone() },
                ConversationEvent::StreamUpdated {
                    id: target,
                    content: "Hel".into()
                },
            ]
        );
    }
}
