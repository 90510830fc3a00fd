//! Background jobs: periodic AI price refresh, automatic backups to the
//! owner and delivery of scheduled broadcasts.
//!
//! Each job is a tokio task whose abort handle is kept by [`Scheduler`];
//! starting a job again aborts the previous instance.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::bot::effects;
use crate::context::AppContext;
use crate::settings::Priority;

/// How often scheduled broadcasts are checked
pub const BROADCAST_CHECK_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    PriceRefresh,
    Backup,
    Broadcasts,
}

/// Tracks the abort handles of running jobs
pub struct Scheduler {
    handles: std::sync::Mutex<HashMap<Job, tokio::task::AbortHandle>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handles.lock().map(|h| h.len()).unwrap_or(0);
        write!(f, "Scheduler({count} jobs)")
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            handles: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Register a job, aborting the instance it replaces
    pub fn replace(&self, job: Job, handle: tokio::task::AbortHandle) {
        if let Ok(mut map) = self.handles.lock() {
            if let Some(previous) = map.insert(job, handle) {
                previous.abort();
            }
        }
    }

    /// Abort and forget a job. Returns `true` if it was running.
    pub fn cancel(&self, job: Job) -> bool {
        if let Ok(mut map) = self.handles.lock() {
            if let Some(handle) = map.remove(&job) {
                handle.abort();
                return true;
            }
        }
        false
    }

    pub fn is_running(&self, job: Job) -> bool {
        self.handles
            .lock()
            .map(|map| map.get(&job).is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    pub fn shutdown(&self) {
        if let Ok(mut map) = self.handles.lock() {
            for (_, handle) in map.drain() {
                handle.abort();
            }
        }
    }
}

/// A ticker that fires every `period`, skipping the immediate first tick
async fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    ticker
}

/// Start every job
pub async fn start(ctx: &Arc<AppContext>) {
    restart_price_job(ctx).await;
    restart_backup_job(ctx).await;
    start_broadcast_job(ctx);
}

/// (Re)start the AI price refresh from the current settings
pub async fn restart_price_job(ctx: &Arc<AppContext>) {
    let settings = ctx.store.read(|data| data.settings.clone()).await;
    if settings.update_interval == 0
        || settings.priority == Priority::Spreadsheet
        || settings.ai_kill_switch
    {
        if ctx.scheduler.cancel(Job::PriceRefresh) {
            info!("AI price refresh job stopped");
        }
        return;
    }

    let hours = settings.update_interval;
    let job_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let mut ticker = ticker(Duration::from_secs(u64::from(hours) * 3600)).await;
        loop {
            ticker.tick().await;
            let skip = job_ctx
                .store
                .read(|data| {
                    data.settings.priority == Priority::Spreadsheet || data.settings.ai_kill_switch
                })
                .await;
            if skip {
                debug!("Skipping AI price refresh");
                continue;
            }
            if let Err(e) = job_ctx.refresh_prices_from_ai().await {
                error!(error = %e, "Scheduled AI price refresh failed");
            }
        }
    });
    ctx.scheduler.replace(Job::PriceRefresh, handle.abort_handle());
    info!(hours, "AI price refresh job scheduled");
}

/// (Re)start the automatic backup from the stored interval
pub async fn restart_backup_job(ctx: &Arc<AppContext>) {
    let hours = ctx.store.read(|data| data.backup_interval).await;
    let owner = ctx.config.owner_id;
    let Some(bot) = ctx.bot.clone().filter(|_| hours > 0 && owner != 0) else {
        if ctx.scheduler.cancel(Job::Backup) {
            info!("Backup job stopped");
        }
        return;
    };

    let job_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let mut ticker = ticker(Duration::from_secs(u64::from(hours) * 3600)).await;
        loop {
            ticker.tick().await;
            if let Err(e) = effects::send_backup(&bot, &job_ctx, ChatId(owner)).await {
                error!(error = %e, "Automatic backup failed");
            }
        }
    });
    ctx.scheduler.replace(Job::Backup, handle.abort_handle());
    info!(hours, "Backup job scheduled");
}

/// Start the once-a-minute check for due broadcasts
pub fn start_broadcast_job(ctx: &Arc<AppContext>) {
    let Some(bot) = ctx.bot.clone() else {
        return;
    };

    let job_ctx = Arc::clone(ctx);
    let handle = tokio::spawn(async move {
        let mut ticker = ticker(Duration::from_secs(BROADCAST_CHECK_SECS)).await;
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let due = job_ctx
                .store
                .with_data(|data| {
                    let due: Vec<_> = data
                        .take_due_broadcasts(now)
                        .into_iter()
                        .map(|b| {
                            let recipients = data.audience_ids(b.audience, now);
                            (b, recipients)
                        })
                        .collect();
                    let changed = !due.is_empty();
                    (due, changed)
                })
                .await;

            match due {
                Ok(due) => {
                    for (broadcast, recipients) in due {
                        info!(id = %broadcast.id, recipients = recipients.len(), "Delivering scheduled broadcast");
                        effects::broadcast(&bot, &recipients, &broadcast.text).await;
                    }
                }
                Err(e) => error!(error = %e, "Failed to take due broadcasts, retrying next minute"),
            }
        }
    });
    ctx.scheduler.replace(Job::Broadcasts, handle.abort_handle());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_aborts_previous_job() {
        let scheduler = Scheduler::new();
        let first = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        scheduler.replace(Job::Backup, first.abort_handle());
        assert!(scheduler.is_running(Job::Backup));

        let second = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        scheduler.replace(Job::Backup, second.abort_handle());

        assert!(first.await.unwrap_err().is_cancelled());
        assert!(scheduler.cancel(Job::Backup));
        assert!(!scheduler.cancel(Job::Backup));
        assert!(second.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_price_job_follows_priority() {
        use crate::config::AppConfig;
        use crate::store::JsonStore;

        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("bot_data.json")).unwrap();
        let ctx = Arc::new(AppContext::new(AppConfig::default(), store, None).unwrap());

        ctx.store
            .update(|data| data.settings.priority = Priority::Spreadsheet)
            .await
            .unwrap();
        start(&ctx).await;
        assert!(!ctx.scheduler.is_running(Job::PriceRefresh));
        assert!(!ctx.scheduler.is_running(Job::Broadcasts));

        ctx.store
            .update(|data| data.settings.priority = Priority::Ai)
            .await
            .unwrap();
        restart_price_job(&ctx).await;
        assert!(ctx.scheduler.is_running(Job::PriceRefresh));

        ctx.store
            .update(|data| data.settings.ai_kill_switch = true)
            .await
            .unwrap();
        restart_price_job(&ctx).await;
        assert!(!ctx.scheduler.is_running(Job::PriceRefresh));
    }
}
