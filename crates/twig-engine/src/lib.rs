//! twig-engine: Branching conversation state
//!
//! This crate holds a chat history as a tree of messages. Edits and
//! regenerations become sibling branches instead of overwriting history, old
//! messages can be folded into a summary node, and the in-progress assistant
//! reply can be updated token by token.

pub mod branch;
pub mod conversation;
pub mod edit;
pub mod events;
pub mod handle;
pub mod path;
pub mod snapshot;
pub mod store;
pub mod streaming;
pub mod summary;
pub mod views;

pub use branch::{BranchInfo, Direction};
pub use conversation::Conversation;
pub use events::ConversationEvent;
pub use handle::SharedConversation;
pub use path::PathTracker;
pub use snapshot::ConversationSnapshot;
pub use store::NodeStore;
pub use streaming::StreamState;
pub use twig_types::{Attachment, ChatMessage, Error, MessageNode, NodeId, Result, Role};
