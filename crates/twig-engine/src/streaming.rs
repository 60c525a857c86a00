//! Incremental updates to the in-flight assistant reply

use twig_types::{ChatMessage, Error, NodeId, Result};

use crate::{conversation::Conversation, events::ConversationEvent};

/// The single streaming target and its accumulated text.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    target: Option<NodeId>,
    buffer: String,
}

impl StreamState {
    /// Node currently receiving content
    pub fn target(&self) -> Option<&NodeId> {
        self.target.as_ref()
    }

    /// Text accumulated so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub(crate) fn arm(&mut self, id: NodeId) {
        self.target = Some(id);
        self.buffer.clear();
    }

    pub(crate) fn reset(&mut self) {
        self.target = None;
        self.buffer.clear();
    }
}

impl Conversation {
    /// Whether a reply is streaming
    pub fn is_streaming(&self) -> bool {
        self.stream.target().is_some()
    }

    /// Id of the streaming target
    pub fn streaming_message_id(&self) -> Option<&NodeId> {
        self.stream.target()
    }

    /// Accumulated stream text
    pub fn stream_buffer(&self) -> &str {
        self.stream.buffer()
    }

    /// Add an empty assistant message at the end of the active path and
    /// start streaming into it.
    pub fn start_streaming(&mut self) -> Result<NodeId> {
        if let Some(active) = self.stream.target() {
            return Err(Error::AlreadyStreaming(active.clone()));
        }
        let id = self.add_message(ChatMessage::assistant_empty())?;
        self.arm_stream(id.clone());
        Ok(id)
    }

    /// Append a token delta. Does nothing when no stream is active.
    pub fn append_to_streaming(&mut self, delta: &str) {
        if self.stream.target.is_none() {
            return;
        }
        self.stream.buffer.push_str(delta);
        self.sync_stream_content();
    }

    /// Replace the streamed text wholesale. Does nothing when no stream is active.
    pub fn set_stream_content(&mut self, full: impl Into<String>) {
        if self.stream.target.is_none() {
            return;
        }
        self.stream.buffer = full.into();
        self.sync_stream_content();
    }

    /// End the stream. Whatever content the node holds is final; partial text
    /// from a cancelled stream is kept.
    pub fn finish_streaming(&mut self) -> Option<NodeId> {
        let id = self.stream.target.take()?;
        self.stream.buffer.clear();
        tracing::debug!(id = %id, "finished streaming");
        self.emit(ConversationEvent::StreamFinished { id: id.clone() });
        Some(id)
    }

    pub(crate) fn arm_stream(&mut self, id: NodeId) {
        tracing::debug!(id = %id, "started streaming");
        self.stream.arm(id.clone());
        self.emit(ConversationEvent::StreamStarted { id });
    }

    fn sync_stream_content(&mut self) {
        let Some(id) = self.stream.target.clone() else {
            return;
        };
        if let Err(e) = self.store.set_content(&id, self.stream.buffer.clone()) {
            // Target vanished underneath us; drop the stream rather than write elsewhere
            tracing::warn!("Streaming target {} missing: {}", id, e);
            self.stream.reset();
            return;
        }
        self.emit(ConversationEvent::StreamUpdated {
            id,
            content: self.stream.buffer.clone(),
        });
    }
}
