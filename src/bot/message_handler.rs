//! Message Handler module for processing incoming Telegram messages
//!
//! Commands, free text and uploaded documents are turned into calls on the
//! dialogue engine; its replies are delivered here.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{Document, MessageId};
use teloxide::{ApiError, RequestError};
use tracing::{debug, error, info, warn};

use crate::calendar::offset_from_minutes;
use crate::context::AppContext;
use crate::dialogue::{DialogueState, PriceDialogue};
use crate::localization::{language_for, t_args_lang, t_lang};

use super::dialogue_manager::{
    handle_command, handle_document, handle_text, ChatContext, Outcome, Reply, ReplyMode,
};
use super::effects::run_effects;
use super::ui_builder::{main_menu_row, to_keyboard};
use super::Command;

/// Build the engine's view of the current user
pub(super) async fn chat_context(
    ctx: &AppContext,
    user_id: i64,
    language_code: Option<&str>,
) -> ChatContext {
    ChatContext {
        user_id,
        owner_id: ctx.config.owner_id,
        lang: language_for(language_code),
        now: Utc::now(),
        current_year: ctx.current_jalali_year(),
        ai_configured: ctx.ai_configured().await,
        tz_offset: offset_from_minutes(ctx.config.timezone_offset_minutes),
    }
}

/// Send one reply, editing `edit_target` when the reply asks for it
async fn deliver(bot: &Bot, chat_id: ChatId, edit_target: Option<MessageId>, reply: Reply) -> Result<()> {
    let keyboard = to_keyboard(&reply.buttons);

    if let (ReplyMode::Edit, Some(message_id)) = (reply.mode, edit_target) {
        match bot
            .edit_message_text(chat_id, message_id, reply.text.as_str())
            .reply_markup(keyboard.clone())
            .await
        {
            Ok(_) => return Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
            Err(e) => {
                debug!(chat_id = %chat_id, error = %e, "Edit failed, sending a new message");
            }
        }
    }

    bot.send_message(chat_id, reply.text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

/// Deliver an outcome: replies, state transition and effects
pub(super) async fn apply_outcome(
    bot: &Bot,
    ctx: &Arc<AppContext>,
    dialogue: &PriceDialogue,
    chat: &ChatContext,
    chat_id: ChatId,
    edit_target: Option<MessageId>,
    outcome: Outcome,
) -> Result<()> {
    for reply in outcome.replies {
        deliver(bot, chat_id, edit_target, reply).await?;
    }
    if let Some(next) = outcome.next_state {
        debug!(user_id = chat.user_id, state = ?next, "Dialogue transition");
        dialogue.update(next).await?;
    }
    run_effects(bot, ctx, chat_id, chat.user_id, &chat.lang, outcome.effects).await
}

/// Run an engine step against the store, recording the user as seen
pub(super) async fn run_step(
    ctx: &AppContext,
    chat: &ChatContext,
    step: impl FnOnce(&mut crate::store::BotData) -> Outcome,
) -> Result<Outcome> {
    let outcome = ctx
        .store
        .with_data(|data| {
            let registered = data.register_user(chat.user_id, chat.now);
            let outcome = step(data);
            let changed = outcome.changed || registered;
            (outcome, changed)
        })
        .await?;
    Ok(outcome)
}

/// Handle a recognised slash command
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: PriceDialogue,
    ctx: Arc<AppContext>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    debug!(user_id, command = ?cmd, "Received command");

    let chat = chat_context(&ctx, user_id, user.language_code.as_deref()).await;
    let outcome = run_step(&ctx, &chat, |data| handle_command(&chat, &cmd, data)).await?;
    apply_outcome(&bot, &ctx, &dialogue, &chat, msg.chat.id, None, outcome).await
}

/// Handle any other message: free text or a document
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: PriceDialogue,
    ctx: Arc<AppContext>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id;
    let chat = chat_context(&ctx, user_id, user.language_code.as_deref()).await;
    let state = dialogue.get().await?.unwrap_or_default();

    let outcome = if let Some(text) = msg.text() {
        debug!(user_id, state = ?state, "Received text message");
        run_step(&ctx, &chat, |data| handle_text(&chat, &state, text, data)).await?
    } else if let Some(document) = msg.document() {
        match receive_document(&bot, &ctx, &chat, chat_id, &state, document).await? {
            Some(outcome) => outcome,
            None => return Ok(()),
        }
    } else {
        debug!(user_id, "Ignoring unsupported message type");
        Outcome::send(t_lang("fallback", &chat.lang), vec![main_menu_row(&chat.lang)])
    };

    apply_outcome(&bot, &ctx, &dialogue, &chat, chat_id, None, outcome).await
}

/// Download a document the dialogue is waiting for and hand it to the engine.
/// Returns `None` when the user has already been told why it was rejected.
async fn receive_document(
    bot: &Bot,
    ctx: &AppContext,
    chat: &ChatContext,
    chat_id: ChatId,
    state: &DialogueState,
    document: &Document,
) -> Result<Option<Outcome>> {
    let file_name = document.file_name.clone().unwrap_or_default();
    let expected = matches!(state, DialogueState::AwaitingInput(input) if input.expects_document());
    if !expected {
        let outcome = run_step(ctx, chat, |data| handle_document(chat, state, &file_name, &[], data)).await?;
        return Ok(Some(outcome));
    }

    let limit = ctx.config.max_upload_bytes;
    if document.file.size as usize > limit {
        warn!(user_id = chat.user_id, size = document.file.size, "Upload rejected: too large");
        let text = t_args_lang(
            "upload-too-large",
            &[("limit", &(limit / (1024 * 1024)).to_string())],
            &chat.lang,
        );
        bot.send_message(chat_id, text).await?;
        return Ok(None);
    }

    let bytes = match download_file(bot, document.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(user_id = chat.user_id, error = %e, "Failed to download document");
            bot.send_message(chat_id, t_lang("download-failed", &chat.lang))
                .await?;
            return Ok(None);
        }
    };
    info!(user_id = chat.user_id, file = %file_name, bytes = bytes.len(), "Document downloaded");

    let outcome = run_step(ctx, chat, |data| handle_document(chat, state, &file_name, &bytes, data)).await?;
    Ok(Some(outcome))
}

/// Fetch a file from Telegram into memory
pub async fn download_file(bot: &Bot, file_id: teloxide::types::FileId) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}
