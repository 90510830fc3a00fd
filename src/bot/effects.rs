//! Side effects requested by the dialogue engine
//!
//! These run after the replies have been sent. Long-running work (AI refresh,
//! broadcasts) is spawned so the dispatcher is not blocked.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::localization::{t_args_lang, t_lang};
use crate::scheduler;

use super::dialogue_manager::Effect;

/// Pause between broadcast messages, below Telegram's 30 messages/s limit
const BROADCAST_PAUSE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

/// Run the effects of one dialogue step on behalf of `user_id` in `chat_id`
pub async fn run_effects(
    bot: &Bot,
    ctx: &Arc<AppContext>,
    chat_id: ChatId,
    user_id: i64,
    lang: &str,
    effects: Vec<Effect>,
) -> Result<()> {
    for effect in effects {
        debug!(user_id, effect = ?effect, "Running effect");
        match effect {
            Effect::RefreshAiPrices => spawn_ai_refresh(bot.clone(), Arc::clone(ctx), chat_id, lang),
            Effect::SendBackup => {
                if let Err(e) = send_backup(bot, ctx, chat_id).await {
                    error!(user_id, error = %e, "Failed to send backup");
                    bot.send_message(chat_id, t_lang("backup-failed", lang)).await?;
                }
            }
            Effect::Broadcast { audience, text } => {
                let recipients = ctx
                    .store
                    .read(|data| data.audience_ids(audience, Utc::now()))
                    .await;
                let bot = bot.clone();
                let lang = lang.to_string();
                tokio::spawn(async move {
                    let report = broadcast(&bot, &recipients, &text).await;
                    let summary = t_args_lang(
                        "broadcast-done",
                        &[
                            ("sent", &report.sent.to_string()),
                            ("failed", &report.failed.to_string()),
                        ],
                        &lang,
                    );
                    if let Err(e) = bot.send_message(chat_id, summary).await {
                        warn!(error = %e, "Failed to report broadcast result");
                    }
                });
            }
            Effect::ForwardToSupport { text } => {
                forward_to_support(bot, ctx, user_id, &text).await;
            }
            Effect::RestartBackupJob => scheduler::restart_backup_job(ctx).await,
            Effect::RestartPriceJob => scheduler::restart_price_job(ctx).await,
        }
    }
    Ok(())
}

fn spawn_ai_refresh(bot: Bot, ctx: Arc<AppContext>, chat_id: ChatId, lang: &str) {
    let lang = lang.to_string();
    tokio::spawn(async move {
        let text = match ctx.refresh_prices_from_ai().await {
            Ok(brands) => t_args_lang("ai-update-done", &[("brands", &brands.to_string())], &lang),
            Err(e) => t_args_lang("ai-update-failed", &[("error", &e.to_string())], &lang),
        };
        if let Err(e) = bot.send_message(chat_id, text).await {
            warn!(error = %e, "Failed to report AI refresh result");
        }
    });
}

/// Send the JSON document as a file
pub async fn send_backup(bot: &Bot, ctx: &AppContext, chat_id: ChatId) -> Result<()> {
    let bytes = ctx.store.export_bytes().await?;
    let now = Utc::now();
    let file_name = format!("backup_{}.json", now.format("%Y%m%d_%H%M"));
    let size = bytes.len();

    bot.send_document(chat_id, InputFile::memory(bytes).file_name(file_name))
        .caption(format!("🗄 Backup {}", now.format("%Y-%m-%d %H:%M UTC")))
        .await?;

    info!(chat_id = %chat_id, bytes = size, "Backup sent");
    Ok(())
}

/// Send `text` to every recipient, counting failures (blocked bot, deleted
/// account) without stopping
pub async fn broadcast(bot: &Bot, recipients: &[i64], text: &str) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for &id in recipients {
        match bot.send_message(ChatId(id), text).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                debug!(recipient = id, error = %e, "Broadcast delivery failed");
                report.failed += 1;
            }
        }
        tokio::time::sleep(BROADCAST_PAUSE).await;
    }
    info!(sent = report.sent, failed = report.failed, "Broadcast finished");
    report
}

async fn forward_to_support(bot: &Bot, ctx: &AppContext, user_id: i64, text: &str) {
    let mut staff = ctx.store.read(|data| data.support_staff()).await;
    if ctx.config.owner_id != 0 {
        staff.push(ctx.config.owner_id);
    }
    staff.sort_unstable();
    staff.dedup();
    staff.retain(|id| *id != user_id);

    if staff.is_empty() {
        warn!(user_id, "Support message received but nobody is on support");
        return;
    }

    let forwarded = t_args_lang(
        "support-forward",
        &[("user_id", &user_id.to_string()), ("text", text)],
        &ctx.config.default_locale,
    );
    for id in staff {
        if let Err(e) = bot.send_message(ChatId(id), forwarded.as_str()).await {
            warn!(recipient = id, error = %e, "Failed to forward support message");
        }
    }
}
