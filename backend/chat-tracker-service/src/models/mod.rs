/// Data models for Chat Tracker Service
///
/// Row types map one-to-one onto the `projects`, `users` and `messages`
/// tables. Request payloads keep every field optional so that a missing field
/// and an empty one produce the same validation message.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Message row joined with its author's name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithAuthor {
    pub id: i64,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
}

/// Message row joined with its author's and project's names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithContext {
    pub id: i64,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
    pub project_name: String,
}

/// Payload of the `new-project` event
#[derive(Debug, Clone, Serialize)]
pub struct ProjectCreatedEvent {
    pub id: Uuid,
    pub name: String,
}

impl From<&Project> for ProjectCreatedEvent {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProjectPayload {
    #[validate(
        required(message = "Project name is required."),
        length(min = 1, message = "Project name is required.")
    )]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserPayload {
    #[validate(
        required(message = "User name is required."),
        length(min = 1, message = "User name is required.")
    )]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMessagePayload {
    #[validate(required(message = "project_id, user_id, and message are required."))]
    pub project_id: Option<Uuid>,
    #[validate(required(message = "project_id, user_id, and message are required."))]
    pub user_id: Option<Uuid>,
    #[validate(
        required(message = "project_id, user_id, and message are required."),
        length(min = 1, message = "project_id, user_id, and message are required.")
    )]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMessagePayload {
    #[validate(
        required(message = "Message content is required."),
        length(min = 1, message = "Message content is required.")
    )]
    pub message: Option<String>,
}

/// Response body for successful deletes
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn validation_message<T: Validate>(payload: &T) -> Option<String> {
        payload.validate().err().map(|e| AppError::from(e).to_string())
    }

    #[test]
    fn test_project_payload_requires_name() {
        let missing: ProjectPayload = serde_json::from_str("{}").unwrap();
        let empty: ProjectPayload = serde_json::from_str(r#"{"name":""}"#).unwrap();
        let ok: ProjectPayload = serde_json::from_str(r#"{"name":"Demo"}"#).unwrap();

        assert_eq!(
            validation_message(&missing).as_deref(),
            Some("Project name is required.")
        );
        assert_eq!(
            validation_message(&empty).as_deref(),
            Some("Project name is required.")
        );
        assert!(validation_message(&ok).is_none());
    }

    #[test]
    fn test_user_payload_requires_name() {
        let missing: UserPayload = serde_json::from_str(r#"{"name":null}"#).unwrap();
        assert_eq!(
            validation_message(&missing).as_deref(),
            Some("User name is required.")
        );
    }

    #[test]
    fn test_create_message_payload_requires_all_fields() {
        let partial: CreateMessagePayload = serde_json::from_str(
            r#"{"project_id":"6f1c7f4e-4b0e-4a57-9c43-9d0a5d7c2b11","message":"hi"}"#,
        )
        .unwrap();
        assert_eq!(
            validation_message(&partial).as_deref(),
            Some("project_id, user_id, and message are required.")
        );

        let complete: CreateMessagePayload = serde_json::from_str(
            r#"{
                "project_id":"6f1c7f4e-4b0e-4a57-9c43-9d0a5d7c2b11",
                "user_id":"0b8e2f9a-6a43-4c3e-8d8f-1f2e3d4c5b6a",
                "message":"hi"
            }"#,
        )
        .unwrap();
        assert!(validation_message(&complete).is_none());
    }

    #[test]
    fn test_update_message_payload() {
        let empty: UpdateMessagePayload = serde_json::from_str(r#"{"message":""}"#).unwrap();
        assert_eq!(
            validation_message(&empty).as_deref(),
            Some("Message content is required.")
        );
    }

    #[test]
    fn test_project_created_event_shape() {
        let project = Project {
            id: Uuid::nil(),
            name: "Demo".into(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(ProjectCreatedEvent::from(&project)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": "00000000-0000-0000-0000-000000000000", "name": "Demo"})
        );
    }
}
