//! /session command - show session info and stats

use std::path::Path;

use super::CommandResult;
use twig_engine::{Conversation, Role};

pub struct SessionCommand;

impl SessionCommand {
    pub fn execute(conversation: &Conversation, session_path: Option<&Path>) -> CommandResult {
        let mut output = String::from("Session Info\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');

        output.push_str(&format!("Conversation: {}\n", conversation.id()));
        match session_path {
            Some(path) => output.push_str(&format!("File:         {}\n", path.display())),
            None => output.push_str("File:         (not saved)\n"),
        }
        output.push('\n');

        let visible = conversation.visible_messages();
        let user_msgs = visible.iter().filter(|n| n.role() == Role::User).count();
        let assistant_msgs = visible.iter().filter(|n| n.role() == Role::Assistant).count();

        output.push_str(&format!("Messages:     {} in tree\n", conversation.store().len()));
        output.push_str(&format!(
            "              {} on active branch ({} user, {} assistant)\n",
            conversation.active_path().len(),
            user_msgs,
            assistant_msgs
        ));
        output.push_str(&format!(
            "              {} sent as context\n",
            conversation.messages_for_context().len()
        ));
        output.push_str(&format!(
            "Branches:     {}\n",
            conversation.get_leaf_nodes().len()
        ));
        if let Some(id) = conversation.streaming_message_id() {
            output.push_str(&format!("Streaming:    {}\n", id.short()));
        }

        CommandResult::Message(output.trim_end().to_string())
    }
}
