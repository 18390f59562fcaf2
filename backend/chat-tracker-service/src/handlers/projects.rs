/// Project handlers
///
/// Creating a project also notifies every SSE subscriber with a
/// `new-project` event.
use crate::db::project_repo;
use crate::error::{AppError, Result};
use crate::models::{DeletedResponse, ProjectCreatedEvent, ProjectPayload};
use crate::sse::{Broadcaster, Event};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

pub const NEW_PROJECT_EVENT: &str = "new-project";

fn not_found() -> AppError {
    AppError::NotFound("Project not found.".to_string())
}

/// Endpoint: POST /api/projects
pub async fn create_project(
    pool: web::Data<PgPool>,
    broadcaster: web::Data<Broadcaster>,
    payload: web::Json<ProjectPayload>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let name = payload.into_inner().name.unwrap_or_default();

    let project = project_repo::create_project(pool.get_ref(), &name).await?;
    info!(project_id = %project.id, "Project created");

    match Event::new(NEW_PROJECT_EVENT, &ProjectCreatedEvent::from(&project)) {
        Ok(event) => {
            broadcaster.broadcast(&event);
        }
        Err(e) => warn!(project_id = %project.id, error = %e, "Skipping new-project event"),
    }

    Ok(HttpResponse::Created().json(project))
}

/// Endpoint: GET /api/projects
pub async fn list_projects(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let projects = project_repo::list_projects(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(projects))
}

/// Endpoint: GET /api/projects/{id}
pub async fn get_project(pool: web::Data<PgPool>, id: web::Path<Uuid>) -> Result<HttpResponse> {
    let project = project_repo::get_project_by_id(pool.get_ref(), *id)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(project))
}

/// Endpoint: PUT /api/projects/{id}
pub async fn update_project(
    pool: web::Data<PgPool>,
    id: web::Path<Uuid>,
    payload: web::Json<ProjectPayload>,
) -> Result<HttpResponse> {
    payload.validate()?;
    let name = payload.into_inner().name.unwrap_or_default();

    let project = project_repo::update_project(pool.get_ref(), *id, &name)
        .await?
        .ok_or_else(not_found)?;
    Ok(HttpResponse::Ok().json(project))
}

/// Endpoint: DELETE /api/projects/{id}
pub async fn delete_project(pool: web::Data<PgPool>, id: web::Path<Uuid>) -> Result<HttpResponse> {
    if !project_repo::delete_project(pool.get_ref(), *id).await? {
        return Err(not_found());
    }

    info!(project_id = %id, "Project deleted");
    Ok(HttpResponse::Ok().json(DeletedResponse {
        message: "Project deleted successfully.".to_string(),
    }))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/projects")
            .app_data(super::path_config(not_found))
            .route("", web::post().to(create_project))
            .route("", web::get().to(list_projects))
            .route("/{id}", web::get().to(get_project))
            .route("/{id}", web::put().to(update_project))
            .route("/{id}", web::delete().to(delete_project)),
    );
}
