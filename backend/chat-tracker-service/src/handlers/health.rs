use crate::db;
use crate::sse::Broadcaster;
use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;

/// Endpoint: GET /
pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Chat Tracker API is running.")
}

/// Endpoint: GET /health
///
/// Reports unhealthy when the database cannot be reached.
pub async fn health(pool: web::Data<PgPool>, broadcaster: web::Data<Broadcaster>) -> HttpResponse {
    match db::ping(pool.get_ref()).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "service": crate::SERVICE_NAME,
            "sse_subscribers": broadcaster.len(),
        })),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
                "service": crate::SERVICE_NAME,
            }))
        }
    }
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health));
}
