//! Slash commands for interactive mode

mod branch;
mod edit;
mod session;
mod summarize;
mod tree;

pub use branch::BranchCommand;
pub use edit::{EditCommand, HideCommand, RegenCommand, RemoveCommand};
pub use session::SessionCommand;
pub use summarize::SummarizeCommand;
pub use tree::{LeavesCommand, PathCommand, TreeCommand};

use std::path::Path;

use twig_engine::{Conversation, NodeId, SharedConversation};

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Show a message to the user; nothing changed
    Message(String),
    /// The conversation changed; save it and show the message
    Changed(String),
    /// The conversation changed and needs a streamed reply at the end of the path
    Respond(String),
    /// Clear the conversation
    Clear,
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    conversation: &SharedConversation,
    session_path: Option<&Path>,
) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "path" | "p" => conversation.read(|c| PathCommand::execute(c)),

        "tree" | "t" => conversation.read(|c| TreeCommand::execute(c)),

        "leaves" | "l" => conversation.read(|c| LeavesCommand::execute(c)),

        "branch" | "b" => conversation.write(|c| BranchCommand::execute(args, c)),

        "edit" | "e" => conversation.write(|c| EditCommand::execute(args, c)),

        "regen" | "r" => conversation.write(|c| RegenCommand::execute(args, c)),

        "hide" => conversation.write(|c| HideCommand::execute(args, c)),

        "unhide" => conversation.write(|c| HideCommand::unhide_all(c)),

        "remove" | "rm" => conversation.write(|c| RemoveCommand::execute(args, c)),

        "summarize" | "sum" => conversation.write(|c| SummarizeCommand::execute(args, c)),

        "session" | "s" => conversation.read(|c| SessionCommand::execute(c, session_path)),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        _ => CommandResult::Unknown(command),
    })
}

/// Resolve an index into the visible messages to a node id
fn visible_at(conversation: &Conversation, arg: &str) -> Result<NodeId, String> {
    let visible = conversation.visible_messages();
    let index: usize = arg.parse().map_err(|_| {
        format!(
            "Invalid index '{}'. Use a number shown by /path (0-{}).",
            arg,
            visible.len().saturating_sub(1)
        )
    })?;
    visible.get(index).map(|n| n.id.clone()).ok_or_else(|| {
        format!(
            "Invalid index {}. Valid range: 0-{}",
            index,
            visible.len().saturating_sub(1)
        )
    })
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?              Show this help message
  /path, /p                  Show the active branch with message indices
  /tree, /t                  Show every message in the tree
  /leaves, /l                List branch endpoints
  /branch, /b prev|next [n]  Switch message n (default: deepest fork) to a sibling branch
  /edit, /e <n> <text>       Edit user message n into a new branch and reply
  /regen, /r [n]             Regenerate assistant message n (default: last reply)
  /hide <n>                  Hide message n from display (still sent as context)
  /unhide                    Show all hidden messages on the active branch
  /remove, /rm <n>           Delete message n and everything after it in the tree
  /summarize, /sum [keep]    Fold older messages into a summary, keeping the last `keep` (default 2)
  /session, /s               Show session info
  /clear, /c                 Start a fresh conversation
  /quit, /exit, /q           Exit twig

Message indices refer to the numbers shown by /path."#
        .to_string()
}
