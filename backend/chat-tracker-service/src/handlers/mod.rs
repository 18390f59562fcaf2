/// HTTP handlers for chat tracker API
use crate::error::AppError;
use actix_web::web;
use tracing::debug;

pub mod events;
pub mod health;
pub mod messages;
pub mod projects;
pub mod users;

/// Malformed or non-JSON bodies become a `400` with a JSON error body.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!(error = %err, "Rejected request body");
        AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
    })
}

/// Unparsable ids can never match a row, so they answer like a missing one.
pub(crate) fn path_config(not_found: fn() -> AppError) -> web::PathConfig {
    web::PathConfig::default().error_handler(move |err, _req| {
        debug!(error = %err, "Rejected path parameter");
        not_found().into()
    })
}

/// Register every route of the service
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::register_routes)
        .configure(events::register_routes)
        .configure(projects::register_routes)
        .configure(users::register_routes)
        .configure(messages::register_routes);
}
