/// Chat Tracker Service Library
///
/// REST API for projects, users and project messages, plus a Server-Sent
/// Events channel that pushes `new-project` notifications to every connected
/// browser.
///
/// # Modules
///
/// - `sse`: subscriber registry, fan-out and keep-alives
/// - `handlers`: HTTP endpoints
/// - `db`: PostgreSQL repositories and embedded migrations
/// - `models`: row types and request payloads
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod sse;

pub use config::Config;
pub use error::{AppError, Result};
pub use sse::Broadcaster;

use actix_cors::Cors;
use actix_web::{http::header, web};

/// Label used for logs, pool metrics and health output
pub const SERVICE_NAME: &str = "chat-tracker-service";

/// Mount every route plus the JSON extractor configuration.
///
/// Expects `web::Data<PgPool>` and `web::Data<Broadcaster>` to be registered
/// on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(handlers::json_config())
        .route("/metrics", web::get().to(metrics::serve_metrics))
        .configure(handlers::register_routes);
}

/// CORS policy for the browser frontend
pub fn build_cors(config: &config::CorsConfig) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(3600);

    if config.allows_any_origin() {
        return cors.allow_any_origin();
    }

    config
        .allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
        .supports_credentials()
}
