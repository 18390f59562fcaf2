use crate::db::user_repo;
use crate::error::{AppError, Result};
use crate::models::{DeletedResponse, UserPayload};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

fn not_found() -> AppError {
    AppError::NotFound("User not found.".to_string())
}

/// Endpoint: POST /api/users
pub async fn create_user(
    pool: web::Data<PgPool>,
    payload: web::Json<UserPayload>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let name = payload.into_inner().name.unwrap_or_default();

    let user = user_repo::create_user(pool.get_ref(), &name).await?;
    info!(user_id = %user.id, "User created");
    Ok(HttpResponse::Created().json(user))
}

/// Endpoint: GET /api/users
pub async fn list_users(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let users = user_repo::list_users(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

/// Endpoint: GET /api/users/{id}
pub async fn get_user(pool: web::Data<PgPool>, id: web::Path<Uuid>) -> Result<HttpResponse> {
    let user = user_repo::get_user_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(user))
}

/// Endpoint: PUT /api/users/{id}
pub async fn update_user(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    payload: web::Json<UserPayload>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let name = payload.into_inner().name.unwrap_or_default();

    let user = user_repo::update_user(pool.get_ref(), *id, &name)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(user))
}

/// Endpoint: DELETE /api/users/{id}
pub async fn delete_user(pool: web::Data<PgPool>, id: web::Path<Uuid>) -> Result<HttpResponse> {
    if !user_repo::delete_user(pool.get_ref(), *id).await? {
        return Err(not_found());
    }

    info!(user_id = %id, "User deleted");
    Ok(HttpResponse::Ok().json(DeletedResponse {
        message: "User deleted successfully.".to_string(),
    }))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .app_data(super::path_config(not_found))
            .route("", web::post().to(create_user))
            .route("", web::get().to(list_users))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}
