/// Message handlers
///
/// Listings include the author's name (and for the global listing, the
/// project's name) and are ordered newest first.
use crate::db::message_repo;
use crate::error::{AppError, Result};
use crate::models::{CreateMessagePayload, DeletedResponse, UpdateMessagePayload};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn not_found() -> AppError {
    AppError::NotFound("Message not found.".to_string())
}

/// Endpoint: POST /api/messages
pub async fn create_message(
    pool: web::Data<PgPool>,
    payload: web::Json<CreateMessagePayload>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let CreateMessagePayload {
        project_id,
        user_id,
        message,
    } = payload.into_inner();
    let (Some(project_id), Some(user_id), Some(message)) = (project_id, user_id, message) else {
        return Err(AppError::Validation(
            "project_id, user_id, and message are required.".to_string(),
        ));
    };

    let created = message_repo::create_message(pool.get_ref(), project_id, user_id, &message).await?;
    info!(message_id = created.id, project_id = %project_id, "Message created");
    Ok(HttpResponse::Created().json(created))
}

/// Endpoint: GET /api/messages
pub async fn list_messages(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let messages = message_repo::list_messages(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// Endpoint: GET /api/messages/project/{project_id}
pub async fn list_project_messages(
    pool: web::Data<PgPool>,
    project_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let messages = message_repo::list_messages_by_project(pool.get_ref(), *project_id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

/// Endpoint: GET /api/messages/{id}
pub async fn get_message(pool: web::Data<PgPool>, id: web::Path<i64>) -> Result<HttpResponse> {
    let message = message_repo::get_message_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(message))
}

/// Endpoint: PUT /api/messages/{id}
pub async fn update_message(
    pool: web::Data<PgPool>,
    id: web::Path<i64>,
    payload: web::Json<UpdateMessagePayload>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let content = payload.into_inner().message.unwrap_or_default();

    let message = message_repo::update_message(pool.get_ref(), *id, &content)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(message))
}

/// Endpoint: DELETE /api/messages/{id}
pub async fn delete_message(pool: web::Data<PgPool>, id: web::Path<i64>) -> Result<HttpResponse> {
    if !message_repo::delete_message(pool.get_ref(), *id).await? {
        return Err(not_found());
    }

    info!(message_id = *id, "Message deleted");
    Ok(HttpResponse::Ok().json(DeletedResponse {
        message: "Message deleted successfully.".to_string(),
    }))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/messages")
            .app_data(super::path_config(not_found))
            .route("", web::post().to(create_message))
            .route("", web::get().to(list_messages))
            .route("/project/{project_id}", web::get().to(list_project_messages))
            .route("/{id}", web::get().to(get_message))
            .route("/{id}", web::put().to(update_message))
            .route("/{id}", web::delete().to(delete_message)),
    );
}
