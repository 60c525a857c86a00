//! Node storage and parent/child adjacency

use std::collections::{HashMap, HashSet};

use twig_types::{ChatMessage, Error, MessageNode, NodeId, Result};

/// Owns every message node and keeps `parent_id` and `child_ids` in agreement.
///
/// All structural changes go through this type. Methods that temporarily break
/// the bidirectional link (`detach`, `reparent`) document what the caller must
/// do to restore it.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, MessageNode>,
    root_id: Option<NodeId>,
}

impl NodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from existing nodes, rejecting anything inconsistent.
    pub fn from_nodes(
        nodes: impl IntoIterator<Item = MessageNode>,
        root_id: Option<NodeId>,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        for node in nodes {
            let id = node.id.clone();
            if map.insert(id.clone(), node).is_some() {
                return Err(Error::invalid_tree(format!("duplicate node id {}", id)));
            }
        }
        let store = Self {
            nodes: map,
            root_id,
        };
        store.check_invariants()?;
        Ok(store)
    }

    /// Id of the root node, if any
    pub fn root_id(&self) -> Option<&NodeId> {
        self.root_id.as_ref()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a node exists
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node
    pub fn get(&self, id: &NodeId) -> Option<&MessageNode> {
        self.nodes.get(id)
    }

    /// Look up a node, failing with `NotFound`
    pub fn require(&self, id: &NodeId) -> Result<&MessageNode> {
        self.nodes.get(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Iterate over all nodes in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.values()
    }

    /// Create a node under `parent_id` (appended to its children) and return its id.
    ///
    /// Passing `None` is only valid while the store is empty; the node becomes the root.
    /// Under a summary node, new children are placed ahead of the summarized
    /// originals so the live thread stays first.
    pub fn create(&mut self, message: ChatMessage, parent_id: Option<&NodeId>) -> Result<NodeId> {
        let id = NodeId::generate();
        match parent_id {
            Some(pid) => {
                let insert_at = self.live_slot(self.require(pid)?);
                if let Some(parent) = self.nodes.get_mut(pid) {
                    parent.child_ids.insert(insert_at, id.clone());
                }
            }
            None => {
                if let Some(root) = &self.root_id {
                    return Err(Error::invalid_tree(format!(
                        "cannot add a second root; {} is already the root",
                        root
                    )));
                }
                self.root_id = Some(id.clone());
            }
        }

        let node = MessageNode::new(id.clone(), message, parent_id.cloned());
        self.nodes.insert(id.clone(), node);
        tracing::debug!(id = %id, parent = ?parent_id.map(|p| p.as_str()), "created node");
        Ok(id)
    }

    /// Remove `id` from its parent's children. The node keeps its `parent_id`,
    /// so the caller must either delete the node or give it a new parent.
    pub fn detach(&mut self, id: &NodeId) {
        let Some(parent_id) = self.nodes.get(id).and_then(|n| n.parent_id.clone()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.child_ids.retain(|c| c != id);
        }
    }

    /// Detach `id` from its old parent and record `new_parent_id`.
    ///
    /// The caller inserts `id` into the new parent's children at the position it
    /// needs; until then the tree is inconsistent.
    pub fn reparent(&mut self, id: &NodeId, new_parent_id: Option<NodeId>) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::NotFound(id.clone()));
        }
        self.detach(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent_id = new_parent_id;
        }
        Ok(())
    }

    /// Graft a fully built node between `node.parent_id` and the nodes listed in
    /// `node.child_ids`.
    ///
    /// `displaced` is the parent's child whose slot the new node takes over; when
    /// absent the new node is appended (ahead of any summarized branch when the
    /// parent is a summary). Every listed child is moved under the new
    /// node. Without a parent the new node becomes the root, so the old root must
    /// be among the adopted children.
    ///
    /// All checks run before anything is modified.
    pub fn splice(&mut self, node: MessageNode, displaced: Option<&NodeId>) -> Result<NodeId> {
        let id = node.id.clone();
        if self.contains(&id) {
            return Err(Error::invalid_tree(format!("node {} already exists", id)));
        }
        for child in &node.child_ids {
            self.require(child)?;
        }
        match &node.parent_id {
            Some(pid) => {
                let parent = self.require(pid)?;
                if let Some(d) = displaced {
                    if !parent.child_ids.contains(d) {
                        return Err(Error::invalid_tree(format!(
                            "{} is not a child of {}",
                            d, pid
                        )));
                    }
                }
            }
            None => {
                if let Some(root) = &self.root_id {
                    if !node.child_ids.contains(root) {
                        return Err(Error::invalid_tree(format!(
                            "new root {} does not adopt the current root {}",
                            id, root
                        )));
                    }
                }
            }
        }

        let parent_id = node.parent_id.clone();
        let adopted = node.child_ids.clone();
        self.nodes.insert(id.clone(), node);

        match &parent_id {
            Some(pid) => {
                let (slot, append_at) = match self.nodes.get(pid) {
                    Some(parent) => (
                        displaced.and_then(|d| parent.child_ids.iter().position(|c| c == d)),
                        self.live_slot(parent),
                    ),
                    None => (None, 0),
                };
                if let Some(parent) = self.nodes.get_mut(pid) {
                    match slot {
                        Some(pos) => parent.child_ids[pos] = id.clone(),
                        None => parent.child_ids.insert(append_at, id.clone()),
                    }
                }
            }
            None => self.root_id = Some(id.clone()),
        }

        for child in &adopted {
            self.reparent(child, Some(id.clone()))?;
        }

        tracing::debug!(id = %id, adopted = adopted.len(), "spliced node into tree");
        Ok(id)
    }

    /// Delete `id` and every descendant. Returns the removed ids, `id` first.
    pub fn remove_subtree(&mut self, id: &NodeId) -> Result<Vec<NodeId>> {
        self.require(id)?;
        self.detach(id);
        if self.root_id.as_ref() == Some(id) {
            self.root_id = None;
        }

        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.child_ids.into_iter().rev());
                removed.push(next);
            }
        }
        Ok(removed)
    }

    /// Replace a node's text content
    pub fn set_content(&mut self, id: &NodeId, content: impl Into<String>) -> Result<()> {
        let node = self.get_mut(id)?;
        node.message.content = content.into();
        Ok(())
    }

    /// Set or clear the summarized flag
    pub fn set_summarized(&mut self, id: &NodeId, summarized: bool) -> Result<()> {
        self.get_mut(id)?.message.is_summarized = summarized;
        Ok(())
    }

    /// Children that count as branches of `node`.
    ///
    /// Under a summary node the summarized originals hang off as a trailing
    /// chain; they are history, not an alternative, and are skipped here.
    pub fn live_children<'a>(
        &'a self,
        node: &'a MessageNode,
    ) -> impl Iterator<Item = &'a NodeId> + 'a {
        node.child_ids
            .iter()
            .filter(move |c| !(node.message.is_summary && self.is_summarized(c)))
    }

    /// Set the hidden flag
    pub fn set_hidden(&mut self, id: &NodeId, hidden: bool) -> Result<()> {
        self.get_mut(id)?.message.hidden = hidden;
        Ok(())
    }

    /// All nodes without children, oldest first
    pub fn leaves(&self) -> Vec<&MessageNode> {
        let mut leaves: Vec<_> = self.nodes.values().filter(|n| n.is_leaf()).collect();
        leaves.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        leaves
    }

    /// Walk parent links from `id` up to the root and return the root-first path.
    pub fn path_to(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let mut path = vec![self.require(id)?.id.clone()];
        let mut current = self.require(id)?.parent_id.clone();
        while let Some(pid) = current {
            if path.len() > self.nodes.len() {
                return Err(Error::invalid_tree(format!("cycle above {}", id)));
            }
            current = self.require(&pid)?.parent_id.clone();
            path.push(pid);
        }
        path.reverse();
        Ok(path)
    }

    /// Depth-first listing of the whole tree in branch order, with depths.
    pub fn depth_first(&self) -> Vec<(usize, &MessageNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, &NodeId)> = self.root_id.iter().map(|r| (0, r)).collect();
        while let Some((depth, id)) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push((depth, node));
                stack.extend(node.child_ids.iter().rev().map(|c| (depth + 1, c)));
            }
        }
        out
    }

    /// Verify root uniqueness, parent/child agreement, duplicate-free child
    /// lists, and that every node reaches the root.
    pub fn check_invariants(&self) -> Result<()> {
        let roots: Vec<_> = self
            .nodes
            .values()
            .filter(|n| n.parent_id.is_none())
            .map(|n| &n.id)
            .collect();
        match (roots.as_slice(), &self.root_id) {
            ([], None) if self.nodes.is_empty() => {}
            ([only], Some(root)) if *only == root => {}
            _ => {
                return Err(Error::invalid_tree(format!(
                    "expected a single root matching {:?}, found {} parentless nodes",
                    self.root_id.as_ref().map(|r| r.as_str()),
                    roots.len()
                )));
            }
        }

        for node in self.nodes.values() {
            let mut seen = HashSet::new();
            for child in &node.child_ids {
                if !seen.insert(child) {
                    return Err(Error::invalid_tree(format!(
                        "{} lists child {} twice",
                        node.id, child
                    )));
                }
                let listed = self.nodes.get(child).ok_or_else(|| {
                    Error::invalid_tree(format!("{} lists missing child {}", node.id, child))
                })?;
                if listed.parent_id.as_ref() != Some(&node.id) {
                    return Err(Error::invalid_tree(format!(
                        "{} lists {} as a child but its parent is {:?}",
                        node.id,
                        child,
                        listed.parent_id.as_ref().map(|p| p.as_str())
                    )));
                }
            }
            if let Some(pid) = &node.parent_id {
                let parent = self.nodes.get(pid).ok_or_else(|| {
                    Error::invalid_tree(format!("{} has missing parent {}", node.id, pid))
                })?;
                if !parent.child_ids.contains(&node.id) {
                    return Err(Error::invalid_tree(format!(
                        "{} points at parent {} which does not list it",
                        node.id, pid
                    )));
                }
            }
        }

        // Parent/child agreement holds, so a bounded walk to the root rules out cycles.
        for node in self.nodes.values() {
            self.path_to(&node.id)?;
        }
        Ok(())
    }

    fn get_mut(&mut self, id: &NodeId) -> Result<&mut MessageNode> {
        self.nodes.get_mut(id).ok_or_else(|| Error::NotFound(id.clone()))
    }

    /// Where a new child of `parent` goes: the end, or just before the
    /// summarized chain when `parent` is a summary
    fn live_slot(&self, parent: &MessageNode) -> usize {
        if parent.message.is_summary {
            parent
                .child_ids
                .iter()
                .position(|c| self.is_summarized(c))
                .unwrap_or(parent.child_ids.len())
        } else {
            parent.child_ids.len()
        }
    }

    fn is_summarized(&self, id: &NodeId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|n| n.message.is_summarized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(store: &mut NodeStore, texts: &[&str]) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = Vec::new();
        for text in texts {
            let id = store
                .create(ChatMessage::user(*text), ids.last())
                .unwrap();
            ids.push(id);
        }
        ids
    }

    #[test]
    fn test_first_node_becomes_root() {
        let mut store = NodeStore::new();
        let id = store.create(ChatMessage::user("hi"), None).unwrap();
        assert_eq!(store.root_id(), Some(&id));
        assert!(store.get(&id).unwrap().parent_id.is_none());
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_second_root_rejected() {
        let mut store = NodeStore::new();
        store.create(ChatMessage::user("hi"), None).unwrap();
        let err = store.create(ChatMessage::user("again"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidTree(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_create_under_unknown_parent() {
        let mut store = NodeStore::new();
        let err = store
            .create(ChatMessage::user("hi"), Some(&NodeId::from("nope")))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.is_empty());
    }

    #[test]
    fn test_children_keep_creation_order() {
        let mut store = NodeStore::new();
        let root = store.create(ChatMessage::system("sys"), None).unwrap();
        let a = store.create(ChatMessage::user("a"), Some(&root)).unwrap();
        let b = store.create(ChatMessage::user("b"), Some(&root)).unwrap();
        assert_eq!(store.get(&root).unwrap().child_ids, vec![a, b]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_reparent_then_insert_restores_consistency() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["a", "b", "c"]);
        let extra = store.create(ChatMessage::user("x"), Some(&ids[0])).unwrap();

        store.reparent(&ids[2], Some(extra.clone())).unwrap();
        assert!(store.check_invariants().is_err());

        store.nodes.get_mut(&extra).unwrap().child_ids.push(ids[2].clone());
        store.check_invariants().unwrap();
        assert!(store.get(&ids[1]).unwrap().is_leaf());
    }

    #[test]
    fn test_remove_subtree_cascades() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["a", "b", "c"]);
        let side = store.create(ChatMessage::user("side"), Some(&ids[1])).unwrap();

        let removed = store.remove_subtree(&ids[1]).unwrap();
        assert_eq!(removed[0], ids[1]);
        assert_eq!(removed.len(), 3);
        assert!(!store.contains(&side));
        assert!(store.get(&ids[0]).unwrap().is_leaf());
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_root_empties_store() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["a", "b"]);
        store.remove_subtree(&ids[0]).unwrap();
        assert!(store.is_empty());
        assert!(store.root_id().is_none());
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_path_to_walks_parents() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["a", "b", "c"]);
        assert_eq!(store.path_to(&ids[2]).unwrap(), ids);
    }

    #[test]
    fn test_splice_replaces_slot_and_adopts() {
        let mut store = NodeStore::new();
        let root = store.create(ChatMessage::system("sys"), None).unwrap();
        let first = store.create(ChatMessage::user("first"), Some(&root)).unwrap();
        let a = store.create(ChatMessage::user("a"), Some(&root)).unwrap();
        let b = store.create(ChatMessage::assistant("b"), Some(&a)).unwrap();

        let mut node = MessageNode::new(NodeId::generate(), ChatMessage::summary("s"), Some(root.clone()));
        node.child_ids = vec![b.clone()];
        let sid = store.splice(node, Some(&a)).unwrap();

        assert_eq!(store.get(&root).unwrap().child_ids, vec![first, sid.clone()]);
        assert_eq!(store.get(&b).unwrap().parent_id, Some(sid));
        assert!(store.get(&a).unwrap().is_leaf());
        // `a` still points at root, which no longer lists it
        assert!(store.check_invariants().is_err());
    }

    #[test]
    fn test_splice_new_root_must_adopt_old_root() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["a"]);
        let node = MessageNode::new(NodeId::generate(), ChatMessage::summary("s"), None);
        let err = store.splice(node, None).unwrap_err();
        assert!(matches!(err, Error::InvalidTree(_)));
        assert_eq!(store.root_id(), Some(&ids[0]));
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_new_children_of_summary_go_before_summarized() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["old"]);
        store.set_summarized(&ids[0], true).unwrap();
        let mut node = MessageNode::new(NodeId::generate(), ChatMessage::summary("s"), None);
        node.child_ids = vec![ids[0].clone()];
        let sid = store.splice(node, None).unwrap();
        store.check_invariants().unwrap();

        let fresh = store.create(ChatMessage::user("new"), Some(&sid)).unwrap();
        assert_eq!(store.get(&sid).unwrap().child_ids, vec![fresh, ids[0].clone()]);
    }

    #[test]
    fn test_splice_under_summary_goes_before_summarized() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["old"]);
        store.set_summarized(&ids[0], true).unwrap();
        let mut outer = MessageNode::new(NodeId::generate(), ChatMessage::summary("s1"), None);
        outer.child_ids = vec![ids[0].clone()];
        let s1 = store.splice(outer, None).unwrap();

        // second summary appended under the first, with no slot to take over
        let inner = MessageNode::new(NodeId::generate(), ChatMessage::summary("s2"), Some(s1.clone()));
        let s2 = store.splice(inner, None).unwrap();
        store.check_invariants().unwrap();
        assert_eq!(store.get(&s1).unwrap().child_ids, vec![s2, ids[0].clone()]);
    }

    #[test]
    fn test_live_children_skip_summarized_chain() {
        let mut store = NodeStore::new();
        let ids = chain(&mut store, &["old"]);
        store.set_summarized(&ids[0], true).unwrap();
        let mut node = MessageNode::new(NodeId::generate(), ChatMessage::summary("s"), None);
        node.child_ids = vec![ids[0].clone()];
        let sid = store.splice(node, None).unwrap();
        let fresh = store.create(ChatMessage::user("new"), Some(&sid)).unwrap();

        let summary = store.get(&sid).unwrap();
        let live: Vec<_> = store.live_children(summary).collect();
        assert_eq!(live, vec![&fresh]);

        // a summarized child of an ordinary node is still a branch
        store.set_summarized(&fresh, true).unwrap();
        let extra = store.create(ChatMessage::user("x"), Some(&fresh)).unwrap();
        store.set_summarized(&extra, true).unwrap();
        let plain = store.get(&fresh).unwrap();
        assert_eq!(store.live_children(plain).count(), 1);

        store.set_summarized(&ids[0], false).unwrap();
        store.set_summarized(&fresh, false).unwrap();
        assert_eq!(store.live_children(store.get(&sid).unwrap()).count(), 2);
    }

    #[test]
    fn test_from_nodes_rejects_dangling_child() {
        let mut root = MessageNode::new(NodeId::from("r"), ChatMessage::user("r"), None);
        root.child_ids.push(NodeId::from("ghost"));
        let err = NodeStore::from_nodes(vec![root], Some(NodeId::from("r"))).unwrap_err();
        assert!(matches!(err, Error::InvalidTree(_)));
    }

    #[test]
    fn test_from_nodes_rejects_cycle() {
        let mut a = MessageNode::new(NodeId::from("a"), ChatMessage::user("a"), Some(NodeId::from("b")));
        let mut b = MessageNode::new(NodeId::from("b"), ChatMessage::user("b"), Some(NodeId::from("a")));
        a.child_ids.push(NodeId::from("b"));
        b.child_ids.push(NodeId::from("a"));
        assert!(NodeStore::from_nodes(vec![a, b], None).is_err());
    }

    #[test]
    fn test_depth_first_order() {
        let mut store = NodeStore::new();
        let root = store.create(ChatMessage::system("sys"), None).unwrap();
        let a = store.create(ChatMessage::user("a"), Some(&root)).unwrap();
        let a1 = store.create(ChatMessage::assistant("a1"), Some(&a)).unwrap();
        let b = store.create(ChatMessage::user("b"), Some(&root)).unwrap();
        let listing: Vec<_> = store
            .depth_first()
            .into_iter()
            .map(|(d, n)| (d, n.id.clone()))
            .collect();
        assert_eq!(listing, vec![(0, root), (1, a), (2, a1), (1, b)]);
    }
}
