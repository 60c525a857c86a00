//! The active path: root-to-leaf thread currently shown and sent to the model

use twig_types::{Error, NodeId, Result};

use crate::store::NodeStore;

/// Ordered ids from the root to the displayed node.
#[derive(Debug, Clone, Default)]
pub struct PathTracker {
    path: Vec<NodeId>,
}

impl PathTracker {
    /// Create an empty path
    pub fn new() -> Self {
        Self::default()
    }

    /// The current path
    pub fn current(&self) -> &[NodeId] {
        &self.path
    }

    /// Last id on the path
    pub fn tail(&self) -> Option<&NodeId> {
        self.path.last()
    }

    /// Whether the path is empty
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Position of `id` on the path
    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.path.iter().position(|p| p == id)
    }

    /// Whether `id` is on the path
    pub fn contains(&self, id: &NodeId) -> bool {
        self.position(id).is_some()
    }

    /// Prefix of the current path up to and including `id`
    pub fn truncate_at(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        let pos = self
            .position(id)
            .ok_or_else(|| Error::NotOnActivePath(id.clone()))?;
        Ok(self.path[..=pos].to_vec())
    }

    /// `path` with `id` appended
    pub fn extend(mut path: Vec<NodeId>, id: NodeId) -> Vec<NodeId> {
        path.push(id);
        path
    }

    /// Follow first children from the end of `path` until a leaf is reached.
    ///
    /// A summary's summarized chain is never entered.
    pub fn descend_to_leaf(store: &NodeStore, mut path: Vec<NodeId>) -> Vec<NodeId> {
        while let Some(first) = path
            .last()
            .and_then(|tail| store.get(tail))
            .and_then(|node| store.live_children(node).next())
        {
            // Guard against a malformed store looping forever
            if path.len() > store.len() {
                break;
            }
            path.push(first.clone());
        }
        path
    }

    /// Replace the path wholesale
    pub fn set(&mut self, path: Vec<NodeId>) {
        self.path = path;
    }

    /// Append a single id
    pub fn push(&mut self, id: NodeId) {
        self.path.push(id);
    }

    /// Empty the path
    pub fn clear(&mut self) {
        self.path.clear();
    }

    /// Check that the path starts at the root and each step is a child of the previous one.
    pub fn validate(&self, store: &NodeStore) -> Result<()> {
        let Some(first) = self.path.first() else {
            if store.is_empty() {
                return Ok(());
            }
            return Err(Error::invalid_tree("active path is empty but the tree is not"));
        };
        if store.root_id() != Some(first) {
            return Err(Error::invalid_tree(format!(
                "active path starts at {} instead of the root",
                first
            )));
        }
        for pair in self.path.windows(2) {
            let parent = store.require(&pair[0])?;
            if !parent.child_ids.contains(&pair[1]) {
                return Err(Error::invalid_tree(format!(
                    "active path steps from {} to {}, which is not its child",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }
}
