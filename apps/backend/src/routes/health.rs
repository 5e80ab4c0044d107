use actix_web::{web, HttpResponse};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use crate::state::app_state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_version: &'static str,
    store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_error: Option<String>,
    time: String,
}

async fn health(app_state: web::Data<AppState>) -> HttpResponse {
    let time = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    match app_state.store().ping().await {
        Ok(()) => HttpResponse::Ok().json(HealthResponse {
            status: "ok",
            app_version: env!("CARGO_PKG_VERSION"),
            store: "ok",
            store_error: None,
            time,
        }),
        Err(e) => {
            warn!(error = %e, "health check: store unreachable");
            HttpResponse::ServiceUnavailable().json(HealthResponse {
                status: "degraded",
                app_version: env!("CARGO_PKG_VERSION"),
                store: "error",
                store_error: Some(e.detail().to_string()),
                time,
            })
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
