//! Edit and regenerate: new sibling branches that leave the originals intact

use twig_types::{Attachment, ChatMessage, Error, MessageNode, NodeId, Result, Role};

use crate::{conversation::Conversation, events::ConversationEvent, path::PathTracker};

impl Conversation {
    /// Create a new node under the same parent as `sibling_id`.
    ///
    /// The new node is appended to the parent's children; the sibling and its
    /// subtree are untouched. The active path does not change.
    pub fn add_sibling_message(&mut self, sibling_id: &NodeId, message: ChatMessage) -> Result<NodeId> {
        let parent_id = self
            .store
            .require(sibling_id)?
            .parent_id
            .clone()
            .ok_or_else(|| Error::RootSibling(sibling_id.clone()))?;
        let id = self.store.create(message, Some(&parent_id))?;

        self.emit(ConversationEvent::MessageAdded {
            id: id.clone(),
            parent_id: Some(parent_id),
        });
        self.debug_check();
        Ok(id)
    }

    /// Start a fresh reply alongside `existing_assistant_id` and stream into it.
    ///
    /// The active path is cut at the old reply and ends at the new, empty one.
    pub fn start_regeneration(&mut self, existing_assistant_id: &NodeId) -> Result<NodeId> {
        self.require_role(existing_assistant_id, Role::Assistant)?;
        if let Some(active) = self.stream.target() {
            return Err(Error::AlreadyStreaming(active.clone()));
        }
        let prefix = self.branch_prefix(existing_assistant_id)?;

        let id = self.add_sibling_message(existing_assistant_id, ChatMessage::assistant_empty())?;
        self.path.set(PathTracker::extend(prefix, id.clone()));
        tracing::debug!(original = %existing_assistant_id, id = %id, "regenerating reply");
        self.emit_path_changed();
        self.arm_stream(id.clone());
        self.debug_check();
        Ok(id)
    }

    /// Branch off an edited copy of `existing_user_message_id`.
    ///
    /// The active path ends at the new message; the original message and its
    /// replies stay reachable by switching back to it.
    pub fn start_edit_with_new_branch(
        &mut self,
        existing_user_message_id: &NodeId,
        new_content: impl Into<String>,
        images: Vec<Attachment>,
    ) -> Result<NodeId> {
        self.require_role(existing_user_message_id, Role::User)?;
        if let Some(active) = self.stream.target() {
            return Err(Error::AlreadyStreaming(active.clone()));
        }
        let prefix = self.branch_prefix(existing_user_message_id)?;

        let message = ChatMessage::user(new_content).with_images(images);
        let id = self.add_sibling_message(existing_user_message_id, message)?;
        self.path.set(PathTracker::extend(prefix, id.clone()));
        tracing::debug!(original = %existing_user_message_id, id = %id, "edited message into new branch");
        self.emit_path_changed();
        self.debug_check();
        Ok(id)
    }

    /// The user prompt an assistant reply answered, if its parent is a user message
    pub fn get_parent_user_message(&self, assistant_message_id: &NodeId) -> Option<&MessageNode> {
        let parent_id = self.store.get(assistant_message_id)?.parent_id.as_ref()?;
        self.store
            .get(parent_id)
            .filter(|parent| parent.role() == Role::User)
    }

    fn require_role(&self, id: &NodeId, expected: Role) -> Result<()> {
        let actual = self.store.require(id)?.role();
        if actual != expected {
            return Err(Error::WrongRole {
                id: id.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Active path before `id`, failing if `id` is not on it or is the root
    fn branch_prefix(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let pos = self
            .path
            .position(id)
            .ok_or_else(|| Error::NotOnActivePath(id.clone()))?;
        if pos == 0 {
            return Err(Error::RootSibling(id.clone()));
        }
        Ok(self.path.current()[..pos].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchInfo;
    use crate::conversation::tests::thread;

    #[test]
    fn test_regeneration_scenario() {
        let (mut conv, ids) = thread(&[(Role::User, "hi"), (Role::Assistant, "hello")]);
        let (m1, m2) = (ids[0].clone(), ids[1].clone());

        let m3 = conv.start_regeneration(&m2).unwrap();
        assert_eq!(conv.active_path(), &[m1, m3.clone()]);
        assert_eq!(
            conv.branch_info(&m3).unwrap(),
            BranchInfo {
                current_index: 1,
                total_count: 2,
                sibling_ids: vec![m2.clone(), m3.clone()]
            }
        );
        assert_eq!(conv.streaming_message_id(), Some(&m3));
        assert_eq!(conv.get(&m2).unwrap().message.content, "hello");
    }

    #[test]
    fn test_regeneration_adds_exactly_one_branch() {
        let (mut conv, ids) = thread(&[(Role::User, "hi"), (Role::Assistant, "hello")]);
        let before = conv.branch_info(&ids[1]).unwrap().total_count;
        conv.start_regeneration(&ids[1]).unwrap();
        assert_eq!(conv.branch_info(&ids[1]).unwrap().total_count, before + 1);
        assert!(conv.get(&ids[1]).is_some());
    }

    #[test]
    fn test_regeneration_drops_descendants_from_path() {
        let (mut conv, ids) = thread(&[
            (Role::User, "q1"),
            (Role::Assistant, "a1"),
            (Role::User, "q2"),
            (Role::Assistant, "a2"),
        ]);
        let new = conv.start_regeneration(&ids[1]).unwrap();
        assert_eq!(conv.active_path(), &[ids[0].clone(), new]);
        assert!(conv.get(&ids[3]).is_some());
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_regenerate_rejects_user_message() {
        let (mut conv, ids) = thread(&[(Role::User, "hi"), (Role::Assistant, "hello")]);
        let err = conv.start_regeneration(&ids[0]).unwrap_err();
        assert!(matches!(err, Error::WrongRole { expected: Role::Assistant, actual: Role::User, .. }));
        assert_eq!(conv.store().len(), 2);
    }

    #[test]
    fn test_regenerate_unknown_id() {
        let (mut conv, _) = thread(&[(Role::User, "hi")]);
        assert!(conv.start_regeneration(&NodeId::from("gone")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_regenerate_while_streaming_rejected() {
        let (mut conv, ids) = thread(&[(Role::User, "hi"), (Role::Assistant, "hello")]);
        conv.start_regeneration(&ids[1]).unwrap();
        let err = conv.start_regeneration(&ids[1]).unwrap_err();
        assert!(matches!(err, Error::AlreadyStreaming(_)));
        assert_eq!(conv.branch_info(&ids[1]).unwrap().total_count, 2);
    }

    #[test]
    fn test_regenerate_off_path_rejected() {
        let (mut conv, ids) = thread(&[(Role::User, "hi"), (Role::Assistant, "hello")]);
        conv.start_regeneration(&ids[1]).unwrap();
        conv.finish_streaming();
        let err = conv.start_regeneration(&ids[1]).unwrap_err();
        assert!(matches!(err, Error::NotOnActivePath(_)));
    }

    #[test]
    fn test_edit_creates_branch() {
        let (mut conv, ids) = thread(&[
            (Role::System, "sys"),
            (Role::User, "q"),
            (Role::Assistant, "a"),
        ]);
        let images = vec![Attachment::image("file:///cat.png", "image/png")];
        let edited = conv
            .start_edit_with_new_branch(&ids[1], "q, but better", images.clone())
            .unwrap();

        assert_eq!(conv.active_path(), &[ids[0].clone(), edited.clone()]);
        let node = conv.get(&edited).unwrap();
        assert_eq!(node.message.content, "q, but better");
        assert_eq!(node.message.images, images);
        assert!(!conv.is_streaming());
        assert_eq!(conv.get(&ids[1]).unwrap().child_ids, vec![ids[2].clone()]);
        conv.check_invariants().unwrap();
    }

    #[test]
    fn test_edit_rejects_assistant() {
        let (mut conv, ids) = thread(&[(Role::User, "q"), (Role::Assistant, "a")]);
        let err = conv.start_edit_with_new_branch(&ids[1], "x", vec![]).unwrap_err();
        assert!(matches!(err, Error::WrongRole { .. }));
    }

    #[test]
    fn test_edit_root_rejected() {
        let (mut conv, ids) = thread(&[(Role::User, "q"), (Role::Assistant, "a")]);
        let err = conv.start_edit_with_new_branch(&ids[0], "x", vec![]).unwrap_err();
        assert!(matches!(err, Error::RootSibling(_)));
        assert_eq!(conv.store().len(), 2);
    }

    #[test]
    fn test_add_sibling_unknown_is_not_found() {
        let (mut conv, _) = thread(&[(Role::User, "q")]);
        let err = conv
            .add_sibling_message(&NodeId::from("nope"), ChatMessage::user("x"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_add_sibling_keeps_path() {
        let (mut conv, ids) = thread(&[(Role::System, "s"), (Role::User, "q")]);
        conv.add_sibling_message(&ids[1], ChatMessage::user("other")).unwrap();
        assert_eq!(conv.active_path(), ids.as_slice());
    }

    #[test]
    fn test_parent_user_message() {
        let (conv, ids) = thread(&[
            (Role::System, "s"),
            (Role::Assistant, "greeting"),
            (Role::User, "q"),
            (Role::Assistant, "a"),
        ]);
        assert_eq!(conv.get_parent_user_message(&ids[3]).map(|n| &n.id), Some(&ids[2]));
        assert!(conv.get_parent_user_message(&ids[1]).is_none());
        assert!(conv.get_parent_user_message(&ids[0]).is_none());
        assert!(conv.get_parent_user_message(&NodeId::from("x")).is_none());
    }
}
