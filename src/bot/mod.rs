//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles commands, text and document messages
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `callback_data`: Parses and builds callback identifiers
//! - `ui_builder`: Creates keyboards
//! - `dialogue_manager`: The conversation state machine
//! - `effects`: Side effects (AI refresh, backups, broadcasts, support forwarding)

use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::dialogue::DialogueState;

pub mod callback_data;
pub mod callback_handler;
pub mod dialogue_manager;
pub mod effects;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::{command_handler, message_handler};

/// Commands understood by the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the main menu.")]
    Start,
    #[command(description = "list current car prices.")]
    Price,
    #[command(description = "show your Telegram id.")]
    Id,
    #[command(description = "open the admin panel.")]
    Admin,
    #[command(description = "display this text.")]
    Help,
}

/// The dispatcher's handler tree: commands, other messages, callback queries
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .enter_dialogue::<Message, InMemStorage<DialogueState>, DialogueState>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_handler),
                )
                .branch(dptree::endpoint(message_handler)),
        )
        .branch(
            Update::filter_callback_query()
                .enter_dialogue::<CallbackQuery, InMemStorage<DialogueState>, DialogueState>()
                .endpoint(callback_handler),
        )
}

/// Run the Telegram dispatcher until Ctrl-C
pub async fn run(bot: Bot, ctx: Arc<AppContext>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Failed to register bot commands");
    }

    info!("Starting Telegram dispatcher");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![ctx, InMemStorage::<DialogueState>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    info!("Telegram dispatcher stopped");
}
