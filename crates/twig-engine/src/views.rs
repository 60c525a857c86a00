//! Derived read views over the tree and the active path

use std::collections::HashSet;

use twig_types::{MessageNode, NodeId, Result, Role};

use crate::conversation::Conversation;

impl Conversation {
    /// Messages to render: the active path minus hidden and summarized nodes.
    pub fn visible_messages(&self) -> Vec<&MessageNode> {
        self.path_nodes()
            .filter(|n| !n.message.hidden && !n.message.is_summarized)
            .collect()
    }

    /// Every message on the active path, unfiltered. Each summary node is
    /// preceded by the originals it replaced, so nothing is lost when this
    /// view is persisted. No node appears twice.
    pub fn all_messages(&self) -> Vec<&MessageNode> {
        let mut seen: HashSet<&NodeId> = self.path.current().iter().collect();
        let mut out = Vec::with_capacity(self.path.current().len());
        for node in self.path_nodes() {
            if node.message.is_summary {
                for id in self.summarized_run(&node.id) {
                    if let Some(original) = self.store.get(&id) {
                        if seen.insert(&original.id) {
                            out.push(original);
                        }
                    }
                }
            }
            out.push(node);
        }
        out
    }

    /// Messages to send to the model: the active path minus summarized nodes.
    /// Hidden nodes are kept.
    pub fn messages_for_context(&self) -> Vec<&MessageNode> {
        self.path_nodes()
            .filter(|n| !n.message.is_summarized)
            .collect()
    }

    /// Whether the last message on the active path can be regenerated
    pub fn can_regenerate(&self) -> bool {
        !self.is_streaming()
            && self
                .path
                .tail()
                .and_then(|id| self.store.get(id))
                .is_some_and(|n| n.role() == Role::Assistant)
    }

    /// All nodes without children, on or off the active path
    pub fn get_leaf_nodes(&self) -> Vec<&MessageNode> {
        self.store.leaves()
    }

    /// Root-first path to `id` by walking parent links
    pub fn get_path_to_message(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        self.store.path_to(id)
    }

    /// Whole tree in branch order with depths, for outline displays
    pub fn tree(&self) -> Vec<(usize, &MessageNode)> {
        self.store.depth_first()
    }

    fn path_nodes(&self) -> impl Iterator<Item = &MessageNode> {
        self.path.current().iter().filter_map(|id| self.store.get(id))
    }
}
