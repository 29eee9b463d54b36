//! Per-chat conversation state registry
//!
//! Every chat gets its own mutex, so events for one chat are applied one at a
//! time while different chats proceed independently.

use super::ConversationState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared map from chat ID to that chat's state
#[derive(Default)]
pub struct ChatStates {
    chats: RwLock<HashMap<i64, Arc<Mutex<ConversationState>>>>,
}

impl ChatStates {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State slot for a chat, created as `Idle` on first use.
    ///
    /// Hold the returned mutex for the whole read-modify-write of one event.
    pub async fn entry(&self, chat_id: i64) -> Arc<Mutex<ConversationState>> {
        {
            let chats = self.chats.read().await;
            if let Some(slot) = chats.get(&chat_id) {
                return slot.clone();
            }
        }

        let mut chats = self.chats.write().await;
        chats
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::Idle)))
            .clone()
    }

    /// Snapshot of a chat's state, `None` if the chat was never seen
    pub async fn get(&self, chat_id: i64) -> Option<ConversationState> {
        let slot = {
            let chats = self.chats.read().await;
            chats.get(&chat_id).cloned()
        }?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Number of chats seen so far
    pub async fn len(&self) -> usize {
        self.chats.read().await.len()
    }

    /// Whether no chat has been seen yet
    pub async fn is_empty(&self) -> bool {
        self.chats.read().await.is_empty()
    }
}
