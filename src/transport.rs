//! Transport-agnostic messaging interfaces.
//!
//! The conversation service only talks to these traits; the Telegram
//! implementations live in [`crate::bot::telegram`].

use crate::content::ContentPayload;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors raised by a chat transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// Telegram API request failed
    #[error("Telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
    /// The platform accepted an upload but returned no reusable handle
    #[error("No delivery handle returned for {0}")]
    MissingHandle(String),
    /// Any other transport failure
    #[error("Transport error: {0}")]
    Other(String),
}

/// Reply keyboard attached to an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// Show these rows of buttons
    Rows(Vec<Vec<String>>),
    /// Explicitly hide any keyboard
    Remove,
}

impl ReplyKeyboard {
    /// Keyboard with a single button
    #[must_use]
    pub fn single(label: impl Into<String>) -> Self {
        Self::Rows(vec![vec![label.into()]])
    }

    /// Button rows, empty when the keyboard is removed
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        match self {
            Self::Rows(rows) => rows,
            Self::Remove => &[],
        }
    }
}

/// Media kinds the transport can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Photo message
    Photo,
    /// Voice message
    Voice,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => f.write_str("photo"),
            Self::Voice => f.write_str("voice"),
        }
    }
}

/// Opaque reference to media already uploaded to the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryHandle(pub String);

impl fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the media for an outgoing message comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Upload fresh bytes
    Upload(ContentPayload),
    /// Reuse an earlier upload
    Handle(DeliveryHandle),
}

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Platform user ID
    pub user_id: i64,
    /// Username or, failing that, first name
    pub display_name: String,
}

/// Audit event for a redeemed node code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRedeemed {
    /// User who entered the code
    pub requester: Requester,
    /// Node the code belongs to
    pub node_name: String,
    /// Code that was entered
    pub code: String,
}

impl CodeRedeemed {
    /// One-line audit message (Markdown)
    #[must_use]
    pub fn audit_line(&self) -> String {
        format!(
            "User @{} (`{}`) found code `{}` for node `{}`",
            self.requester.display_name, self.requester.user_id, self.code, self.node_name
        )
    }
}

/// Outbound side of a chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text reply, optionally replacing the keyboard.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TransportError>;

    /// Send media and return the handle the platform assigned to it.
    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        keyboard: &ReplyKeyboard,
    ) -> Result<DeliveryHandle, TransportError>;
}

/// Receiver of code redemption audit events
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    /// Deliver one audit event
    async fn notify(&self, event: &CodeRedeemed) -> Result<(), TransportError>;
}
