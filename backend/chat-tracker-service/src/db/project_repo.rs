use crate::models::Project;
use sqlx::PgPool;
use uuid::Uuid;

/// Create a new project
pub async fn create_project(pool: &PgPool, name: &str) -> Result<Project, sqlx::Error> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (name)
        VALUES ($1)
        RETURNING id, name, created_at
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(project)
}

/// All projects, newest first
pub async fn list_projects(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    let projects = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, name, created_at
        FROM projects
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

pub async fn get_project_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, name, created_at
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(project)
}

/// Rename a project. Returns `None` if it does not exist.
pub async fn update_project(
    pool: &PgPool,
    id: Uuid,
    name: &str,
) -> Result<Option<Project>, sqlx::Error> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET name = $1
        WHERE id = $2
        RETURNING id, name, created_at
        "#,
    )
    .bind(name)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(project)
}

/// Delete a project and, through the cascade, its messages.
/// Returns `false` if nothing was deleted.
pub async fn delete_project(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
