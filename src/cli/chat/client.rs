//! Chat controller: input handling, optimistic append, request dispatch and
//! loading/error bookkeeping.
//!
//! The user's message is appended before the proxy answers and is left in
//! place if the request fails, so the conversation can end with an
//! unanswered user turn.

use tracing::{debug, warn};

use super::conversation_state::ChatState;
use super::store::MessageStore;
use super::transport::ProxyTransport;
use crate::types::ChatMessage;

pub struct ChatClient<T, S> {
    transport: T,
    store: S,
    state: ChatState,
}

impl<T, S> ChatClient<T, S>
where
    T: ProxyTransport,
    S: MessageStore,
{
    /// Create a client, restoring any conversation left in `store`.
    pub fn new(transport: T, store: S) -> Self {
        let messages = match store.load() {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Ignoring unreadable chat history: {}", e);
                Vec::new()
            }
        };
        debug!("Restored {} messages", messages.len());

        Self {
            transport,
            store,
            state: ChatState::with_messages(messages),
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Append `text` as a user turn and mark a request as in flight.
    ///
    /// Returns `false` without touching state when `text` is blank or a
    /// request is already in flight. The turn is visible in
    /// [`state`](Self::state) before any reply arrives.
    pub fn begin_turn(&mut self, text: &str) -> bool {
        if text.trim().is_empty() || self.state.is_loading {
            return false;
        }

        self.append(ChatMessage::user(text));
        self.state.is_loading = true;
        self.state.error = None;
        true
    }

    /// Send the conversation and record the reply or the failure.
    ///
    /// Does nothing unless a turn was begun.
    pub async fn await_reply(&mut self) {
        if !self.state.is_loading {
            return;
        }

        let result = self.transport.send(&self.state.messages).await;
        match result {
            Ok(reply) => {
                self.append(ChatMessage::assistant(reply));
                self.state.is_loading = false;
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                self.state.is_loading = false;
                self.state.error = Some(e.to_string());
            }
        }
    }

    /// Drop the whole conversation, in memory and in the store.
    pub fn clear(&mut self) {
        self.state = ChatState::new();
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear chat history: {}", e);
        }
    }

    fn append(&mut self, message: ChatMessage) {
        debug!("Appending {:?} message {}", message.role(), message.id());
        self.state.messages.push(message);
        if let Err(e) = self.store.save(&self.state.messages) {
            warn!("Failed to save chat history: {}", e);
        }
    }
}
