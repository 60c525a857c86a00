//! /branch command - move between sibling branches

use super::{CommandResult, visible_at};
use twig_engine::{Conversation, Direction, NodeId};

pub struct BranchCommand;

impl BranchCommand {
    /// Execute /branch command
    /// - `prev|next`: switch the deepest visible message that has siblings
    /// - `prev|next <n>`: switch visible message n
    pub fn execute(args: &str, conversation: &mut Conversation) -> CommandResult {
        let mut parts = args.split_whitespace();
        let direction = match parts.next() {
            Some("prev" | "p") => Direction::Prev,
            Some("next" | "n") => Direction::Next,
            _ => {
                return CommandResult::Message("Usage: /branch prev|next [index]".to_string());
            }
        };

        let target = match parts.next() {
            Some(arg) => match visible_at(conversation, arg) {
                Ok(id) => id,
                Err(msg) => return CommandResult::Message(msg),
            },
            None => match deepest_fork(conversation) {
                Some(id) => id,
                None => {
                    return CommandResult::Message(
                        "No alternative branches on the active path.".to_string(),
                    );
                }
            },
        };

        if conversation.is_streaming() {
            return CommandResult::Message("Wait for the reply to finish first.".to_string());
        }

        let depth = conversation.active_path().iter().position(|id| *id == target);
        match conversation.switch_branch(&target, direction) {
            Ok(true) => {
                let position = depth
                    .and_then(|d| conversation.active_path().get(d))
                    .and_then(|id| conversation.branch_info(id).ok())
                    .map(|info| format!(" {}/{}", info.current_index + 1, info.total_count))
                    .unwrap_or_default();
                CommandResult::Changed(format!("Switched to branch{}.", position))
            }
            Ok(false) => CommandResult::Message("That message has no other branches.".to_string()),
            Err(e) => CommandResult::Message(format!("Cannot switch branch: {}", e)),
        }
    }
}

/// Last visible message on the active path that has siblings
fn deepest_fork(conversation: &Conversation) -> Option<NodeId> {
    conversation
        .visible_messages()
        .iter()
        .rev()
        .find(|n| {
            conversation
                .branch_info(&n.id)
                .is_ok_and(|info| info.has_alternatives())
        })
        .map(|n| n.id.clone())
}
