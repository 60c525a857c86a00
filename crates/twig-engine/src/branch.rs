//! Sibling navigation between alternative branches

use serde::{Deserialize, Serialize};
use twig_types::{Error, NodeId, Result};

use crate::{conversation::Conversation, path::PathTracker};

/// Which way to move among siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Prev,
    Next,
}

/// Position of a node among its siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub current_index: usize,
    pub total_count: usize,
    pub sibling_ids: Vec<NodeId>,
}

impl BranchInfo {
    /// Whether there is more than one branch to choose from
    pub fn has_alternatives(&self) -> bool {
        self.total_count > 1
    }

    /// Index reached by stepping once in `direction`, wrapping at both ends
    pub fn step(&self, direction: Direction) -> usize {
        match direction {
            Direction::Prev => (self.current_index + self.total_count - 1) % self.total_count,
            Direction::Next => (self.current_index + 1) % self.total_count,
        }
    }
}

impl Conversation {
    /// Where `id` sits among its siblings. The root is always `0 of 1`, as is
    /// the head of a summarized chain hanging under its summary.
    pub fn branch_info(&self, id: &NodeId) -> Result<BranchInfo> {
        let node = self.store.require(id)?;
        let only = || BranchInfo {
            current_index: 0,
            total_count: 1,
            sibling_ids: vec![id.clone()],
        };
        let Some(parent_id) = &node.parent_id else {
            return Ok(only());
        };
        let parent = self.store.require(parent_id)?;
        if !parent.child_ids.contains(id) {
            return Err(Error::invalid_tree(format!("{} missing from its parent", id)));
        }
        let siblings: Vec<NodeId> = self.store.live_children(parent).cloned().collect();
        let Some(current_index) = siblings.iter().position(|s| s == id) else {
            return Ok(only());
        };
        Ok(BranchInfo {
            current_index,
            total_count: siblings.len(),
            sibling_ids: siblings,
        })
    }

    /// Move the active path to the previous or next sibling of `id`, wrapping
    /// around. Returns `false` when `id` has no siblings.
    pub fn switch_branch(&mut self, id: &NodeId, direction: Direction) -> Result<bool> {
        let info = self.branch_info(id)?;
        if !info.has_alternatives() {
            return Ok(false);
        }
        let target = info.sibling_ids[info.step(direction)].clone();
        self.switch_to_message(id, &target)
    }

    /// Replace `current_id` on the active path with its sibling `target_id`,
    /// then follow first children down to a leaf.
    ///
    /// Not allowed while a stream is open, since the streaming message could
    /// drop off the path.
    pub fn switch_to_message(&mut self, current_id: &NodeId, target_id: &NodeId) -> Result<bool> {
        if let Some(active) = self.stream.target() {
            return Err(Error::AlreadyStreaming(active.clone()));
        }
        self.store.require(target_id)?;
        if !self.branch_info(current_id)?.sibling_ids.contains(target_id) {
            return Err(Error::NotSibling {
                current: current_id.clone(),
                target: target_id.clone(),
            });
        }
        let pos = self
            .path
            .position(current_id)
            .ok_or_else(|| Error::NotOnActivePath(current_id.clone()))?;

        let prefix = PathTracker::extend(self.path.current()[..pos].to_vec(), target_id.clone());
        let new_path = PathTracker::descend_to_leaf(&self.store, prefix);
        tracing::debug!(from = %current_id, to = %target_id, depth = new_path.len(), "switched branch");
        self.path.set(new_path);

        self.emit_path_changed();
        self.debug_check();
        Ok(true)
    }
}
