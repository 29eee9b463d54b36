use crate::transport::{
    AdminNotifier, ChatTransport, CodeRedeemed, DeliveryHandle, MediaKind, MediaSource,
    ReplyKeyboard, Requester, TransportError,
};
use async_trait::async_trait;
use teloxide::prelude::*;
// The domain `Requester` shadows the prelude trait of the same name
use teloxide::requests::Requester as _;
use teloxide::types::{
    ChatId, FileId, InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode,
    ReplyMarkup,
};

// Node texts are authored in legacy Markdown
#[allow(deprecated)]
const PARSE_MODE: ParseMode = ParseMode::Markdown;

/// Sender of a Telegram message.
///
/// Falls back to the first name when the user has no username.
#[must_use]
pub fn requester_from_message(msg: &Message) -> Requester {
    msg.from.as_ref().map_or_else(
        || Requester {
            user_id: 0,
            display_name: "Unknown".to_string(),
        },
        |user| Requester {
            user_id: user.id.0.cast_signed(),
            display_name: user
                .username
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| user.first_name.clone()),
        },
    )
}

fn to_markup(keyboard: &ReplyKeyboard) -> ReplyMarkup {
    match keyboard {
        ReplyKeyboard::Rows(rows) => {
            let buttons = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|label| KeyboardButton::new(label.clone()))
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            ReplyMarkup::Keyboard(KeyboardMarkup::new(buttons).resize_keyboard())
        }
        ReplyKeyboard::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

fn to_input_file(source: MediaSource) -> InputFile {
    match source {
        MediaSource::Upload(payload) => {
            InputFile::memory(payload.bytes.to_vec()).file_name(payload.key)
        }
        MediaSource::Handle(handle) => InputFile::file_id(FileId(handle.0)),
    }
}

/// Telegram implementation of [`ChatTransport`]
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a bot client
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TransportError> {
        let mut req = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(PARSE_MODE);
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(to_markup(keyboard));
        }
        req.await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        source: MediaSource,
        keyboard: &ReplyKeyboard,
    ) -> Result<DeliveryHandle, TransportError> {
        let label = match &source {
            MediaSource::Upload(payload) => payload.key.clone(),
            MediaSource::Handle(handle) => handle.to_string(),
        };
        let file = to_input_file(source);
        let markup = to_markup(keyboard);

        let handle = match kind {
            MediaKind::Photo => {
                let msg = self
                    .bot
                    .send_photo(ChatId(chat_id), file)
                    .reply_markup(markup)
                    .await?;
                // Last size is the largest rendition
                msg.photo()
                    .and_then(<[_]>::last)
                    .map(|size| DeliveryHandle(size.file.id.to_string()))
            }
            MediaKind::Voice => {
                let msg = self
                    .bot
                    .send_voice(ChatId(chat_id), file)
                    .reply_markup(markup)
                    .await?;
                msg.voice()
                    .map(|voice| DeliveryHandle(voice.file.id.to_string()))
            }
        };

        handle.ok_or(TransportError::MissingHandle(label))
    }
}

/// Sends code redemption audit lines to the admin chat
#[derive(Clone)]
pub struct TelegramAdminNotifier {
    bot: Bot,
    admin_chat: ChatId,
}

impl TelegramAdminNotifier {
    /// Notifier for the given admin chat
    #[must_use]
    pub const fn new(bot: Bot, admin_chat: ChatId) -> Self {
        Self { bot, admin_chat }
    }
}

#[async_trait]
impl AdminNotifier for TelegramAdminNotifier {
    async fn notify(&self, event: &CodeRedeemed) -> Result<(), TransportError> {
        self.bot
            .send_message(self.admin_chat, event.audit_line())
            .parse_mode(PARSE_MODE)
            .await?;
        Ok(())
    }
}
