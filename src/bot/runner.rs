use crate::bot::telegram::{requester_from_message, TelegramAdminNotifier, TelegramTransport};
use crate::catalog;
use crate::config::{CatalogFile, Settings};
use crate::content::ContentResolver;
use crate::delivery::{DeliveryHandleCache, MediaDelivery};
use crate::engine::{ConversationEngine, Messages};
use crate::service::{ConversationService, InboundEvent};
use crate::storage::S3ObjectStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message and the main menu
    #[command(description = "Start the bot.")]
    Start,
}

/// Build the conversation service from settings.
///
/// # Errors
///
/// Returns an error if the nodes file cannot be loaded or is invalid.
pub async fn build_service(bot: &Bot, settings: &Settings) -> Result<ConversationService> {
    let file = CatalogFile::load(&settings.nodes_file)?;
    let (catalog, personal) =
        catalog::from_file(file).context("Invalid node catalog")?;
    let gated = catalog.all().iter().filter(|node| node.is_gated()).count();
    info!(
        "Loaded {} nodes ({} gated) and {} personal answers.",
        catalog.len(),
        gated,
        personal.len()
    );

    let engine = ConversationEngine::new(catalog, personal, Messages::from_settings(settings));
    for name in engine.shadowed_nodes() {
        warn!("Node {} is named like a reserved button and cannot be selected", name);
    }

    let store = Arc::new(S3ObjectStore::new(settings).await);
    let resolver = ContentResolver::new(store, settings.minio_bucket.clone());
    let media = MediaDelivery::new(resolver, DeliveryHandleCache::new());
    info!("Object store client initialized for bucket {}.", settings.minio_bucket);

    Ok(ConversationService::new(
        engine,
        media,
        Arc::new(TelegramTransport::new(bot.clone())),
        Arc::new(TelegramAdminNotifier::new(
            bot.clone(),
            ChatId(settings.tg_admin_chat),
        )),
        settings.error_message.clone(),
    ))
}

/// Run the Telegram transport runtime.
///
/// # Errors
///
/// Returns an error if the service cannot be built.
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let bot = Bot::new(settings.tg_token.clone());
    let service = Arc::new(build_service(&bot, &settings).await?);

    sync_bot_name(&bot, &settings.name).await;

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![service.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    service.shutdown();
    info!("Dispatcher stopped.");
    Ok(())
}

async fn sync_bot_name(bot: &Bot, name: &str) {
    match bot.get_my_name().await {
        Ok(current) if current.name == name => {
            debug!("Bot name is already {}", name);
        }
        Ok(_) => match bot.set_my_name().name(name.to_string()).await {
            Ok(_) => info!("Bot name set to {}", name),
            Err(e) => warn!("Failed to set bot name: {}", e),
        },
        Err(e) => warn!("Failed to read bot name: {}", e),
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        // Only text messages enter the conversation
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text))
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    service: Arc<ConversationService>,
) -> Result<(), teloxide::RequestError> {
    let requester = requester_from_message(&msg);
    match cmd {
        Command::Start => service.dispatch_start(msg.chat.id.0, &requester).await,
    }
    respond(())
}

async fn handle_text(
    msg: Message,
    service: Arc<ConversationService>,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    let event = InboundEvent {
        chat_id: msg.chat.id.0,
        requester: requester_from_message(&msg),
        text: text.to_string(),
    };
    service.dispatch(&event).await;
    respond(())
}
