//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use crate::context::AppContext;
use crate::dialogue::PriceDialogue;

use super::dialogue_manager::handle_callback;
use super::message_handler::{apply_outcome, chat_context, run_step};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: PriceDialogue,
    ctx: Arc<AppContext>,
) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    let data = q.data.clone().unwrap_or_default();
    debug!(user_id, data = %data, "Received callback query");

    let state = dialogue.get().await?.unwrap_or_default();
    let chat = chat_context(&ctx, user_id, q.from.language_code.as_deref()).await;
    let outcome = run_step(&ctx, &chat, |store| handle_callback(&chat, &state, &data, store)).await?;

    // Answer first to remove the loading state on the button
    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(notice) = outcome.notice.clone() {
        answer = answer.text(notice);
    }
    answer.await?;

    let (chat_id, message_id) = match &q.message {
        Some(message) => (message.chat().id, Some(message.id())),
        None => (ChatId(user_id), None),
    };
    apply_outcome(&bot, &ctx, &dialogue, &chat, chat_id, message_id, outcome).await
}
