//! /summarize command - fold older messages into a summary node

use super::CommandResult;
use crate::utils::truncate_chars;
use twig_engine::Conversation;

const DEFAULT_KEEP_RECENT: usize = 2;
const LINE_CHARS: usize = 120;

pub struct SummarizeCommand;

impl SummarizeCommand {
    /// `/summarize [keep]`: summarize everything but the last `keep` messages
    pub fn execute(args: &str, conversation: &mut Conversation) -> CommandResult {
        let keep = if args.is_empty() {
            DEFAULT_KEEP_RECENT
        } else {
            match args.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    return CommandResult::Message(format!(
                        "Invalid count '{}'. Usage: /summarize [messages to keep]",
                        args
                    ));
                }
            }
        };

        if conversation.is_streaming() {
            return CommandResult::Message("Wait for the reply to finish first.".to_string());
        }

        let ids = conversation.summarizable_ids(keep);
        if ids.is_empty() {
            return CommandResult::Message("Nothing to summarize.".to_string());
        }

        let summary = local_summary(&conversation.summarization_transcript(&ids));
        match conversation.summarize_messages(&ids, &summary) {
            Ok(_) => CommandResult::Changed(format!("Summarized {} message(s).", ids.len())),
            Err(e) => CommandResult::Message(format!("Cannot summarize: {}", e)),
        }
    }
}

/// Condense a labelled transcript into one bullet per message
pub fn local_summary(transcript: &str) -> String {
    let bullets: Vec<String> = transcript
        .lines()
        .filter(|line| line.starts_with('['))
        .map(|line| format!("- {}", truncate_chars(line, LINE_CHARS)))
        .collect();
    format!(
        "Earlier conversation ({} messages):\n{}",
        bullets.len(),
        bullets.join("\n")
    )
}
