//! Summarization splice
//!
//! Older messages on the active path can be collapsed into a single synthetic
//! summary node. The originals stay in the tree, flagged as summarized, but drop
//! out of the views sent to the model and shown to the user.
//!
//! Deciding *when* to summarize and producing the summary text are left to the
//! caller; [`Conversation::summarization_transcript`] renders messages as plain
//! text for whatever produces the summary.

use twig_types::{ChatMessage, Error, MessageNode, NodeId, Result, Role};

use crate::{conversation::Conversation, events::ConversationEvent};

/// Long hidden messages (tool output and the like) are cut to this many chars
const MAX_HIDDEN_CHARS: usize = 2000;

impl Conversation {
    /// Flag each listed node as summarized. Fails without changing anything if
    /// any id is unknown.
    pub fn mark_as_summarized(&mut self, ids: &[NodeId]) -> Result<()> {
        for id in ids {
            self.store.require(id)?;
        }
        for id in ids {
            self.store.set_summarized(id, true)?;
        }
        self.emit(ConversationEvent::MessagesSummarized { ids: ids.to_vec() });
        Ok(())
    }

    /// Mark `ids` as summarized and splice in a summary with `summary_text`.
    ///
    /// If the splice fails the flags go back to what they were.
    pub fn summarize_messages(&mut self, ids: &[NodeId], summary_text: &str) -> Result<NodeId> {
        let mut previous = Vec::with_capacity(ids.len());
        for id in ids {
            previous.push((id.clone(), self.store.require(id)?.message.is_summarized));
        }
        self.mark_as_summarized(ids)?;
        match self.insert_summary_message(summary_text) {
            Ok(id) => Ok(id),
            Err(e) => {
                for (id, was) in &previous {
                    self.store.set_summarized(id, *was)?;
                }
                tracing::warn!(error = %e, count = ids.len(), "summary splice failed, flags restored");
                Err(e)
            }
        }
    }

    /// Splice a summary node into the active path and return its id.
    ///
    /// The summary goes right after any leading system messages. It takes the
    /// slot of the first message after them and adopts the first message on the
    /// path that is not summarized, which becomes its first child. The
    /// summarized run in between hangs off the summary as a trailing branch, so
    /// it stays in the tree but leaves the active path.
    ///
    /// All lookups happen before the tree is touched. Fails while a stream is
    /// open.
    pub fn insert_summary_message(&mut self, summary_text: &str) -> Result<NodeId> {
        if let Some(active) = self.stream.target() {
            return Err(Error::AlreadyStreaming(active.clone()));
        }
        let path = self.path.current().to_vec();
        let mut nodes = Vec::with_capacity(path.len());
        for id in &path {
            nodes.push(self.store.require(id)?);
        }

        let insert_index = nodes
            .iter()
            .position(|n| n.role() != Role::System)
            .unwrap_or(path.len());
        let parent_id = insert_index.checked_sub(1).map(|i| path[i].clone());
        let next_index = (insert_index..path.len()).find(|&i| !nodes[i].message.is_summarized);
        let next_id = next_index.map(|i| path[i].clone());
        let run = &path[insert_index..next_index.unwrap_or(path.len())];

        // Slot in the parent's children that the summary takes over
        let displaced = path.get(insert_index).cloned();

        let mut node = MessageNode::new(
            NodeId::generate(),
            ChatMessage::summary(summary_text),
            parent_id.clone(),
        );
        node.child_ids = next_id.iter().chain(run.first()).cloned().collect();
        let adopted = node.child_ids.clone();

        let summary_id = self.store.splice(node, displaced.as_ref())?;

        let mut new_path = path[..insert_index].to_vec();
        new_path.push(summary_id.clone());
        if let Some(next) = next_index {
            new_path.extend_from_slice(&path[next..]);
        }
        self.path.set(new_path);

        tracing::info!(
            id = %summary_id,
            replaced = run.len(),
            at = insert_index,
            "inserted summary"
        );
        self.emit(ConversationEvent::SummaryInserted {
            id: summary_id.clone(),
            parent_id,
            adopted,
        });
        self.emit_path_changed();
        self.debug_check();
        Ok(summary_id)
    }

    /// Originals a summary node stands in for, oldest first.
    ///
    /// These are the summarized chain hanging off the summary as a trailing branch.
    pub fn summarized_run(&self, summary_id: &NodeId) -> Vec<NodeId> {
        let mut run = Vec::new();
        let Some(summary) = self.store.get(summary_id).filter(|n| n.message.is_summary) else {
            return run;
        };
        let mut current = self.first_summarized_child(summary);
        while let Some(node) = current {
            run.push(node.id.clone());
            current = self.first_summarized_child(node);
        }
        run
    }

    /// Ids on the active path that a caller could summarize while keeping the
    /// last `keep_recent` messages: everything after the leading system
    /// messages and not already summarized.
    pub fn summarizable_ids(&self, keep_recent: usize) -> Vec<NodeId> {
        let path = self.path.current();
        let end = path.len().saturating_sub(keep_recent);
        path[..end]
            .iter()
            .filter_map(|id| self.store.get(id))
            .skip_while(|n| n.role() == Role::System)
            .filter(|n| !n.message.is_summarized && !n.message.is_summary)
            .filter(|n| self.stream.target() != Some(&n.id))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Render messages as plain text for a summarization prompt.
    ///
    /// The labelled format keeps a model from treating the text as a
    /// conversation to continue. Unknown ids are skipped.
    pub fn summarization_transcript(&self, ids: &[NodeId]) -> String {
        let mut out = String::new();
        for node in ids.iter().filter_map(|id| self.store.get(id)) {
            let message = &node.message;
            if let Some(summary) = message.summary_text() {
                out.push_str("[Earlier summary]: ");
                out.push_str(summary);
                out.push('\n');
                continue;
            }

            let label = match (message.role, message.hidden) {
                (Role::User, false) => "[User]: ".to_string(),
                (Role::Assistant, false) => "[Assistant]: ".to_string(),
                (Role::System, false) => "[System]: ".to_string(),
                (role, true) => format!("[Hidden {}]: ", role),
            };
            out.push_str(&label);

            if message.hidden && message.content.chars().count() > MAX_HIDDEN_CHARS {
                out.extend(message.content.chars().take(MAX_HIDDEN_CHARS));
                out.push_str("...(truncated)");
            } else {
                out.push_str(&message.content);
            }
            for _ in &message.images {
                out.push_str(" [image]");
            }
            out.push('\n');
        }
        out
    }

    fn first_summarized_child<'a>(&'a self, node: &MessageNode) -> Option<&'a MessageNode> {
        node.child_ids
            .iter()
            .filter_map(|c| self.store.get(c))
            .find(|c| c.message.is_summarized)
    }
}
