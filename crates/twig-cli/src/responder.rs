//! Reply producers that stream text into the conversation

use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use twig_engine::{ChatMessage, Role};

/// A stream of text deltas
pub type ChunkStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Produces an assistant reply for a context, chunk by chunk
#[async_trait]
pub trait Responder: Send + Sync {
    /// Start a reply. The stream ends early once `cancel` fires.
    async fn respond(
        &self,
        context: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> anyhow::Result<ChunkStream>;
}

/// Offline responder that answers by reflecting the latest user message.
///
/// Useful for exercising branching and streaming without a model behind it.
pub struct EchoResponder {
    chunk_chars: usize,
    delay: Duration,
}

impl EchoResponder {
    pub fn new(chunk_chars: usize, delay: Duration) -> Self {
        Self {
            chunk_chars: chunk_chars.max(1),
            delay,
        }
    }

    /// Full reply text for a context
    pub fn reply_for(context: &[ChatMessage]) -> String {
        let turns = context.iter().filter(|m| m.role == Role::User).count();
        let summarized = context.iter().any(|m| m.is_summary);
        match context.iter().rev().find(|m| m.role == Role::User) {
            Some(last) => {
                let mut reply = format!("You said: \"{}\"", last.content.trim());
                if !last.images.is_empty() {
                    reply.push_str(&format!(" (with {} image(s))", last.images.len()));
                }
                reply.push_str(&format!(
                    ". That is user turn {} in this branch{}.",
                    turns,
                    if summarized { ", after a summary" } else { "" }
                ));
                reply
            }
            None => "Nothing to reply to yet.".to_string(),
        }
    }
}

/// Split text into chunks of at most `size` characters
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(
        &self,
        context: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> anyhow::Result<ChunkStream> {
        let chunks = chunk_text(&Self::reply_for(&context), self.chunk_chars);
        let delay = self.delay;

        let stream: ChunkStream = Box::pin(async_stream::stream! {
            for chunk in chunks {
                if cancel.is_cancelled() {
                    break;
                }
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                yield chunk;
            }
        });
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_chunk_text_respects_char_boundaries() {
        assert_eq!(chunk_text("añbc", 2), vec!["añ", "bc"]);
        assert!(chunk_text("", 3).is_empty());
    }

    #[test]
    fn test_reply_uses_latest_user_message() {
        let context = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("second"),
        ];
        assert_eq!(
            EchoResponder::reply_for(&context),
            "You said: \"second\". That is user turn 2 in this branch."
        );
        assert_eq!(
            EchoResponder::reply_for(&[ChatMessage::system("sys")]),
            "Nothing to reply to yet."
        );
    }

    #[tokio::test]
    async fn test_stream_yields_whole_reply() {
        let responder = EchoResponder::new(3, Duration::ZERO);
        let context = vec![ChatMessage::user("hi")];
        let stream = responder
            .respond(context.clone(), CancellationToken::new())
            .await
            .unwrap();
        let text: String = stream.collect::<Vec<_>>().await.concat();
        assert_eq!(text, EchoResponder::reply_for(&context));
    }

    #[tokio::test]
    async fn test_cancel_stops_stream() {
        let responder = EchoResponder::new(1, Duration::from_millis(5));
        let cancel = CancellationToken::new();
        let mut stream = responder
            .respond(vec![ChatMessage::user("hello there")], cancel.clone())
            .await
            .unwrap();

        assert!(stream.next().await.is_some());
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }
}
