//! Axum router for the admin dashboard.
//!
//! [`build`] assembles the REST routes with CORS, request tracing and the
//! upload size limit. When a dashboard directory is configured its files are
//! served for every other path.

pub mod error;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::context::AppContext;

pub use error::ServerError;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the complete router
pub fn build(ctx: Arc<AppContext>) -> Router {
    let mut app = Router::new()
        .merge(routes::router())
        .layer(DefaultBodyLimit::max(
            ctx.config.max_upload_bytes + MULTIPART_OVERHEAD,
        ));

    if let Some(dir) = &ctx.config.dashboard_dir {
        let index = Path::new(dir).join("index.html");
        info!(dir = %dir, "Serving dashboard files");
        app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    app.layer(cors_layer(ctx.config.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// CORS from a comma-separated origin list; any origin when unset
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = CorsLayer::new().allow_headers(Any).allow_methods(Any);
    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}
