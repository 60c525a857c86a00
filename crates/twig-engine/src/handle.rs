//! A cloneable handle for sharing one conversation across threads.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::{conversation::Conversation, events::ConversationEvent, snapshot::ConversationSnapshot};

/// Single-writer, many-reader access to a [`Conversation`].
///
/// Cloning is cheap. Mutations hold the write lock for their whole duration,
/// so readers never observe a half-applied change.
#[derive(Clone)]
pub struct SharedConversation {
    inner: Arc<RwLock<Conversation>>,
}

impl SharedConversation {
    /// Wrap a conversation
    pub fn new(conversation: Conversation) -> Self {
        Self {
            inner: Arc::new(RwLock::new(conversation)),
        }
    }

    /// Run a read-only closure against the conversation
    pub fn read<R>(&self, f: impl FnOnce(&Conversation) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run a mutating closure with exclusive access
    pub fn write<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Consistent copy of the current state
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.inner.read().snapshot()
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.inner.read().subscribe()
    }
}

impl From<Conversation> for SharedConversation {
    fn from(conversation: Conversation) -> Self {
        Self::new(conversation)
    }
}
