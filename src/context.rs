//! Shared application state used by the bot handlers, the REST handlers and
//! the scheduler.

use anyhow::{bail, Result};
use chrono::Utc;
use teloxide::Bot;
use tracing::{info, warn};

use crate::ai::AiClient;
use crate::calendar::{jalali_year, offset_from_minutes};
use crate::config::AppConfig;
use crate::scheduler::Scheduler;
use crate::spreadsheet::{import_workbook, ImportSummary, Niche};
use crate::store::JsonStore;

pub struct AppContext {
    pub config: AppConfig,
    pub store: JsonStore,
    pub ai: AiClient,
    pub scheduler: Scheduler,
    /// Present when a bot token is configured
    pub bot: Option<Bot>,
}

impl AppContext {
    pub fn new(config: AppConfig, store: JsonStore, bot: Option<Bot>) -> Result<Self> {
        let ai = AiClient::new(config.ai.clone(), config.api_keys.clone())?;
        Ok(Self {
            config,
            store,
            ai,
            scheduler: Scheduler::new(),
            bot,
        })
    }

    /// Current Jalali year in the configured timezone
    pub fn current_jalali_year(&self) -> i32 {
        let offset = offset_from_minutes(self.config.timezone_offset_minutes);
        jalali_year(Utc::now().with_timezone(&offset).date_naive())
    }

    /// Whether the selected AI provider has a usable key
    pub async fn ai_configured(&self) -> bool {
        let settings = self.store.read(|data| data.settings.clone()).await;
        self.ai.has_key(&settings)
    }

    /// Regenerate the AI car catalog. Returns the number of brands stored.
    ///
    /// The provider is called without holding the store lock.
    pub async fn refresh_prices_from_ai(&self) -> Result<usize> {
        let (settings, reference) = self
            .store
            .read(|data| {
                let reference = data.prices.active(data.settings.priority).cars.clone();
                (data.settings.clone(), reference)
            })
            .await;

        let cars = match self.ai.generate_prices(&settings, &reference).await {
            Ok(cars) => cars,
            Err(e) => {
                warn!(source = %settings.ai_source, error = %e, "AI price refresh failed");
                return Err(e.into());
            }
        };

        let brands = cars.brands.len();
        let now = Utc::now();
        self.store
            .update(|data| {
                data.prices.ai = cars;
                data.prices.ai_updated_at = Some(now);
                data.settings.last_updated = Some(now);
            })
            .await?;

        info!(brands, "AI prices stored");
        Ok(brands)
    }

    /// Import an uploaded workbook into the price book
    pub async fn import_spreadsheet(&self, bytes: &[u8], niche: Niche) -> Result<ImportSummary> {
        if bytes.is_empty() {
            bail!("uploaded file is empty");
        }
        let now = Utc::now();
        let summary = self
            .store
            .with_data(|data| match import_workbook(bytes, niche, &mut data.prices, now) {
                Ok(summary) => (Ok(summary), true),
                Err(e) => (Err(e), false),
            })
            .await??;
        Ok(summary)
    }
}
