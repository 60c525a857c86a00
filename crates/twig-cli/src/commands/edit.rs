//! /edit, /regen, /hide and /remove - commands that reshape the tree

use super::{CommandResult, visible_at};
use twig_engine::{Conversation, Role};

pub struct EditCommand;

impl EditCommand {
    /// `/edit <n> <text>`: branch off an edited copy of user message n
    pub fn execute(args: &str, conversation: &mut Conversation) -> CommandResult {
        let Some((index, text)) = args.split_once(' ') else {
            return CommandResult::Message("Usage: /edit <index> <new text>".to_string());
        };
        let text = text.trim();
        if text.is_empty() {
            return CommandResult::Message("Usage: /edit <index> <new text>".to_string());
        }

        let id = match visible_at(conversation, index) {
            Ok(id) => id,
            Err(msg) => return CommandResult::Message(msg),
        };
        let images = conversation
            .get(&id)
            .map(|n| n.message.images.clone())
            .unwrap_or_default();

        match conversation.start_edit_with_new_branch(&id, text, images) {
            Ok(_) => CommandResult::Respond("Edited into a new branch.".to_string()),
            Err(e) => CommandResult::Message(format!("Cannot edit: {}", e)),
        }
    }
}

pub struct RegenCommand;

impl RegenCommand {
    /// `/regen [n]`: stream a new sibling for assistant message n (default: the last reply)
    pub fn execute(args: &str, conversation: &mut Conversation) -> CommandResult {
        let id = if args.is_empty() {
            let last = conversation
                .visible_messages()
                .iter()
                .rev()
                .find(|n| n.role() == Role::Assistant)
                .map(|n| n.id.clone());
            match last {
                Some(id) => id,
                None => return CommandResult::Message("No reply to regenerate.".to_string()),
            }
        } else {
            match visible_at(conversation, args) {
                Ok(id) => id,
                Err(msg) => return CommandResult::Message(msg),
            }
        };

        match conversation.start_regeneration(&id) {
            Ok(_) => CommandResult::Respond("Regenerating...".to_string()),
            Err(e) => CommandResult::Message(format!("Cannot regenerate: {}", e)),
        }
    }
}

pub struct HideCommand;

impl HideCommand {
    /// `/hide <n>`
    pub fn execute(args: &str, conversation: &mut Conversation) -> CommandResult {
        let id = match visible_at(conversation, args) {
            Ok(id) => id,
            Err(msg) => return CommandResult::Message(msg),
        };
        match conversation.set_hidden(&id, true) {
            Ok(()) => CommandResult::Changed(format!("Hid message {}.", args)),
            Err(e) => CommandResult::Message(format!("Cannot hide: {}", e)),
        }
    }

    /// `/unhide`: reveal every hidden message on the active path
    pub fn unhide_all(conversation: &mut Conversation) -> CommandResult {
        let hidden: Vec<_> = conversation
            .all_messages()
            .into_iter()
            .filter(|n| n.message.hidden)
            .map(|n| n.id.clone())
            .collect();
        if hidden.is_empty() {
            return CommandResult::Message("No hidden messages.".to_string());
        }
        for id in &hidden {
            if let Err(e) = conversation.set_hidden(id, false) {
                return CommandResult::Message(format!("Cannot unhide: {}", e));
            }
        }
        CommandResult::Changed(format!("Revealed {} message(s).", hidden.len()))
    }
}

pub struct RemoveCommand;

impl RemoveCommand {
    /// `/remove <n>`: delete message n and its whole subtree
    pub fn execute(args: &str, conversation: &mut Conversation) -> CommandResult {
        let id = match visible_at(conversation, args) {
            Ok(id) => id,
            Err(msg) => return CommandResult::Message(msg),
        };
        match conversation.remove_message(&id) {
            Ok(removed) => CommandResult::Changed(format!("Removed {} message(s).", removed.len())),
            Err(e) => CommandResult::Message(format!("Cannot remove: {}", e)),
        }
    }
}
