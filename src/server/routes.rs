//! Dashboard endpoints under `/api`, plus `/health`.

use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::PriceSource;
use crate::context::AppContext;
use crate::models::{CarDatabase, MobileDatabase};
use crate::scheduler;
use crate::settings::{AppSettings, SettingsUpdate};
use crate::spreadsheet::Niche;

use super::error::ServerError;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/health", get(get_health))
        .route("/api/settings", get(get_settings).post(update_settings))
        .route("/api/prices", get(get_prices))
        .route("/api/update-ai", post(update_ai))
        .route("/api/upload", post(upload))
}

pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Current settings with API keys masked
async fn get_settings(State(ctx): State<Arc<AppContext>>) -> Json<AppSettings> {
    Json(ctx.store.read(|data| data.settings.masked()).await)
}

/// Partial update; the price refresh job is rescheduled from the result
async fn update_settings(
    State(ctx): State<Arc<AppContext>>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<AppSettings>, ServerError> {
    debug!(update = ?SettingsUpdateLog(&update), "Settings update received");
    let settings = ctx
        .store
        .update(|data| {
            data.settings.apply(update);
            data.settings.masked()
        })
        .await?;

    scheduler::restart_price_job(&ctx).await;
    info!(source = %settings.ai_source, priority = ?settings.priority, "Settings updated");
    Ok(Json(settings))
}

/// Logs an update without its API keys
struct SettingsUpdateLog<'a>(&'a SettingsUpdate);

impl std::fmt::Debug for SettingsUpdateLog<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsUpdate")
            .field("priority", &self.0.priority)
            .field("ai_source", &self.0.ai_source)
            .field("ai_kill_switch", &self.0.ai_kill_switch)
            .field("update_interval", &self.0.update_interval)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesResponse {
    pub source: PriceSource,
    pub last_updated: Option<DateTime<Utc>>,
    pub cars: CarDatabase,
    pub mobiles: MobileDatabase,
}

async fn get_prices(State(ctx): State<Arc<AppContext>>) -> Json<PricesResponse> {
    let response = ctx
        .store
        .read(|data| {
            let active = data.prices.active(data.settings.priority);
            PricesResponse {
                source: active.source,
                last_updated: active.updated_at,
                cars: active.cars.clone(),
                mobiles: data.prices.mobiles.clone(),
            }
        })
        .await;
    Json(response)
}

async fn update_ai(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ServerError> {
    let brands = ctx.refresh_prices_from_ai().await?;
    Ok(Json(json!({
        "message": "AI prices updated",
        "brands": brands,
    })))
}

/// Multipart upload: `file` (required) and `niche` (`cars` by default)
async fn upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ServerError> {
    let mut file: Option<Vec<u8>> = None;
    let mut niche = Niche::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                file = Some(bytes.to_vec());
            }
            "niche" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                niche = Niche::parse(&value)
                    .ok_or_else(|| ServerError::BadRequest(format!("unknown niche: {value}")))?;
            }
            other => debug!(field = %other, "Ignoring multipart field"),
        }
    }

    let file = file
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ServerError::BadRequest("No file uploaded".to_owned()))?;

    let summary = ctx.import_spreadsheet(&file, niche).await?;
    Ok(Json(json!({
        "message": "File processed successfully",
        "niche": summary.niche,
        "rows": summary.rows,
        "brands": summary.brands,
    })))
}
