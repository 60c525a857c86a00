//! /path, /tree and /leaves - read-only views of the conversation

use super::CommandResult;
use crate::utils::message_preview;
use twig_engine::Conversation;

pub struct PathCommand;

impl PathCommand {
    /// Visible messages on the active path, numbered for other commands
    pub fn execute(conversation: &Conversation) -> CommandResult {
        let visible = conversation.visible_messages();
        if visible.is_empty() {
            return CommandResult::Message("No messages yet.".to_string());
        }

        let mut output = String::new();
        for (i, node) in visible.iter().enumerate() {
            let branch = conversation
                .branch_info(&node.id)
                .ok()
                .filter(|info| info.has_alternatives())
                .map(|info| format!(" <{}/{}>", info.current_index + 1, info.total_count))
                .unwrap_or_default();
            output.push_str(&format!("{:>3}: {}{}\n", i, message_preview(node, 60), branch));
        }
        let hidden = conversation.all_messages().len() - visible.len();
        if hidden > 0 {
            output.push_str(&format!("({} hidden or summarized not shown)\n", hidden));
        }
        CommandResult::Message(output.trim_end().to_string())
    }
}

pub struct TreeCommand;

impl TreeCommand {
    /// Every node, indented by depth, with the active path marked
    pub fn execute(conversation: &Conversation) -> CommandResult {
        let tree = conversation.tree();
        if tree.is_empty() {
            return CommandResult::Message("No messages yet.".to_string());
        }

        let active = conversation.active_path();
        let mut output = String::new();
        for (depth, node) in tree {
            let marker = if active.contains(&node.id) { '*' } else { ' ' };
            output.push_str(&format!(
                "{} {}{} {}\n",
                marker,
                "  ".repeat(depth),
                node.id.short(),
                message_preview(node, 50)
            ));
        }
        CommandResult::Message(output.trim_end().to_string())
    }
}

pub struct LeavesCommand;

impl LeavesCommand {
    /// Branch endpoints, oldest first
    pub fn execute(conversation: &Conversation) -> CommandResult {
        let leaves = conversation.get_leaf_nodes();
        if leaves.is_empty() {
            return CommandResult::Message("No messages yet.".to_string());
        }

        let active_tail = conversation.active_path().last();
        let mut output = format!("{} branch endpoint(s):\n", leaves.len());
        for node in leaves {
            let depth = conversation
                .get_path_to_message(&node.id)
                .map(|p| p.len())
                .unwrap_or(0);
            let marker = if Some(&node.id) == active_tail { '*' } else { ' ' };
            output.push_str(&format!(
                "{} {} depth {:<3} {}\n",
                marker,
                node.id.short(),
                depth,
                message_preview(node, 50)
            ));
        }
        CommandResult::Message(output.trim_end().to_string())
    }
}
