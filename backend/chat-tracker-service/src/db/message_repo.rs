use crate::models::{Message, MessageWithAuthor, MessageWithContext};
use sqlx::PgPool;
use uuid::Uuid;

/// Post a message to a project.
///
/// Fails with a foreign key violation if the project or user does not exist.
pub async fn create_message(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    message: &str,
) -> Result<Message, sqlx::Error> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO messages (project_id, user_id, message)
        VALUES ($1, $2, $3)
        RETURNING id, project_id, user_id, message, created_at
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .bind(message)
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// Every message with author and project names, newest first
pub async fn list_messages(pool: &PgPool) -> Result<Vec<MessageWithContext>, sqlx::Error> {
    let messages = sqlx::query_as::<_, MessageWithContext>(
        r#"
        SELECT m.id, m.project_id, m.user_id, m.message, m.created_at,
               u.name AS user_name, p.name AS project_name
        FROM messages m
        JOIN users u ON m.user_id = u.id
        JOIN projects p ON m.project_id = p.id
        ORDER BY m.created_at DESC, m.id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

/// A project's messages with author names, newest first
pub async fn list_messages_by_project(
    pool: &PgPool,
    project_id: Uuid,
) -> Result<Vec<MessageWithAuthor>, sqlx::Error> {
    let messages = sqlx::query_as::<_, MessageWithAuthor>(
        r#"
        SELECT m.id, m.project_id, m.user_id, m.message, m.created_at,
               u.name AS user_name
        FROM messages m
        JOIN users u ON m.user_id = u.id
        WHERE m.project_id = $1
        ORDER BY m.created_at DESC, m.id DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}

pub async fn get_message_by_id(pool: &PgPool, id: i64) -> Result<Option<Message>, sqlx::Error> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, project_id, user_id, message, created_at
        FROM messages
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(message)
}

pub async fn update_message(
    pool: &PgPool,
    id: i64,
    content: &str,
) -> Result<Option<Message>, sqlx::Error> {
    let message = sqlx::query_as::<_, Message>(
        r#"
        UPDATE messages
        SET message = $1
        WHERE id = $2
        RETURNING id, project_id, user_id, message, created_at
        "#,
    )
    .bind(content)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(message)
}

pub async fn delete_message(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM messages WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
