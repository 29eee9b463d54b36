//! Conversation service
//!
//! Applies engine transitions per chat: the chat's state is locked for the
//! whole event, the next state is stored, then the reply is performed.

use crate::catalog::{NodeContent, NodeDefinition};
use crate::delivery::{DeliveryError, MediaDelivery};
use crate::engine::{ChatStates, ConversationEngine, ConversationState, Reply, Transition};
use crate::transport::{
    AdminNotifier, ChatTransport, CodeRedeemed, MediaKind, Requester, TransportError,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors surfaced to the fault boundary
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Media could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    /// A reply could not be sent
    #[error("Reply failed: {0}")]
    Transport(#[from] TransportError),
}

/// One incoming text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Chat the message came from
    pub chat_id: i64,
    /// Sender
    pub requester: Requester,
    /// Message text
    pub text: String,
}

/// Runs the conversation for every chat
pub struct ConversationService {
    engine: ConversationEngine,
    states: ChatStates,
    media: MediaDelivery,
    transport: Arc<dyn ChatTransport>,
    notifier: Arc<dyn AdminNotifier>,
    error_message: String,
}

impl ConversationService {
    /// Wire the service together
    #[must_use]
    pub fn new(
        engine: ConversationEngine,
        media: MediaDelivery,
        transport: Arc<dyn ChatTransport>,
        notifier: Arc<dyn AdminNotifier>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            states: ChatStates::new(),
            media,
            transport,
            notifier,
            error_message: error_message.into(),
        }
    }

    /// State machine
    #[must_use]
    pub const fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Media delivery and its handle cache
    #[must_use]
    pub const fn media(&self) -> &MediaDelivery {
        &self.media
    }

    /// Current state of a chat, `None` if it never wrote to us
    pub async fn state(&self, chat_id: i64) -> Option<ConversationState> {
        self.states.get(chat_id).await
    }

    /// Handle the start command: reset the chat and show the welcome menu.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the welcome message cannot be sent.
    pub async fn start(&self, chat_id: i64, requester: &Requester) -> Result<(), ServiceError> {
        info!(
            "User {} ({}) initiated /start in chat {}",
            requester.user_id, requester.display_name, chat_id
        );
        let slot = self.states.entry(chat_id).await;
        let mut state = slot.lock().await;
        let transition = self.engine.start();
        *state = transition.next;
        self.apply(chat_id, requester, &transition.reply).await
    }

    /// Handle one text message and return the transition that was applied.
    ///
    /// Events for the same chat are serialized; the next state is stored
    /// before the reply is sent, so a failed reply never leaves the chat
    /// waiting for a code it already redeemed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if the reply or media delivery fails.
    pub async fn handle(&self, event: &InboundEvent) -> Result<Transition, ServiceError> {
        let slot = self.states.entry(event.chat_id).await;
        let mut state = slot.lock().await;

        let transition = self.engine.handle(&state, &event.text);
        debug!(
            chat_id = event.chat_id,
            from = ?&*state,
            to = ?&transition.next,
            "Conversation transition"
        );
        if matches!(
            (&*state, &transition.next),
            (ConversationState::AwaitingCode(_), ConversationState::AwaitingCode(_))
        ) {
            debug!("Wrong code attempt from user {}", event.requester.user_id);
        }

        *state = transition.next.clone();
        self.apply(event.chat_id, &event.requester, &transition.reply)
            .await?;
        Ok(transition)
    }

    /// Handle a message and turn any failure into the configured error reply.
    ///
    /// The user never sees internal details; failures are logged here.
    pub async fn dispatch(&self, event: &InboundEvent) {
        if let Err(e) = self.handle(event).await {
            self.report_failure(event.chat_id, &event.requester, &e).await;
        }
    }

    /// Run the start command behind the same fault boundary as text messages
    pub async fn dispatch_start(&self, chat_id: i64, requester: &Requester) {
        if let Err(e) = self.start(chat_id, requester).await {
            self.report_failure(chat_id, requester, &e).await;
        }
    }

    /// Stop fetching new content; messages already in flight still get replies
    pub fn shutdown(&self) {
        self.media.close();
    }

    async fn report_failure(&self, chat_id: i64, requester: &Requester, err: &ServiceError) {
        error!(
            chat_id = chat_id,
            user_id = requester.user_id,
            "Message handler error: {}",
            err
        );
        if let Err(send_err) = self
            .transport
            .send_text(chat_id, &self.error_message, None)
            .await
        {
            error!(
                "Failed to send error message to chat {}: {}",
                chat_id, send_err
            );
        }
    }

    async fn apply(
        &self,
        chat_id: i64,
        requester: &Requester,
        reply: &Reply,
    ) -> Result<(), ServiceError> {
        match reply {
            Reply::Menu(text) => {
                self.transport
                    .send_text(chat_id, text, Some(self.engine.main_menu()))
                    .await?;
            }
            Reply::Prompt(text) => {
                self.transport
                    .send_text(chat_id, text, Some(self.engine.back_only()))
                    .await?;
            }
            Reply::Text(text) => {
                self.transport.send_text(chat_id, text, None).await?;
            }
            Reply::Deliver {
                node,
                redeemed_code,
            } => {
                if let Some(code) = redeemed_code {
                    self.notify_redeemed(requester, node, code).await;
                } else {
                    info!("User {} opened node {}", requester.user_id, node.name);
                }
                self.deliver(chat_id, node).await?;
            }
        }
        Ok(())
    }

    async fn notify_redeemed(&self, requester: &Requester, node: &NodeDefinition, code: &str) {
        let event = CodeRedeemed {
            requester: requester.clone(),
            node_name: node.name.clone(),
            code: code.to_string(),
        };
        info!("{}", event.audit_line());
        if let Err(e) = self.notifier.notify(&event).await {
            warn!("Failed to notify admin about node {}: {}", node.name, e);
        }
    }

    async fn deliver(&self, chat_id: i64, node: &NodeDefinition) -> Result<(), ServiceError> {
        let keyboard = self.engine.main_menu();
        match &node.content {
            NodeContent::Text(text) => {
                self.transport
                    .send_text(chat_id, text, Some(keyboard))
                    .await?;
            }
            NodeContent::Photo { key } => {
                self.media
                    .deliver(self.transport.as_ref(), chat_id, MediaKind::Photo, key, keyboard)
                    .await?;
            }
            NodeContent::Voice { key } => {
                self.media
                    .deliver(self.transport.as_ref(), chat_id, MediaKind::Voice, key, keyboard)
                    .await?;
            }
        }
        Ok(())
    }
}
