//! Repository and end-to-end API tests against a live PostgreSQL.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use actix_web::body::{BoxBody, MessageBody};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use bytes::Bytes;
use chat_tracker_service::db::{message_repo, project_repo, user_repo, MIGRATOR};
use chat_tracker_service::models::{Message, Project, User};
use chat_tracker_service::{configure, Broadcaster};
use db_pool::{create_pool, DbConfig};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::pin::Pin;
use uuid::Uuid;

async fn create_test_pool() -> PgPool {
    let config = DbConfig::from_env("chat-tracker-test").expect("DATABASE_URL must be set");
    let pool = create_pool(config)
        .await
        .expect("Failed to create test pool");
    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

async fn next_chunk(body: &mut BoxBody) -> Option<Bytes> {
    futures::future::poll_fn(|cx| Pin::new(&mut *body).poll_next(cx))
        .await
        .map(|res| res.expect("body stream error"))
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_project_crud() {
    let pool = create_test_pool().await;
    let name = format!("project-{}", Uuid::new_v4());

    let project = project_repo::create_project(&pool, &name).await.unwrap();
    assert_eq!(project.name, name);

    let fetched = project_repo::get_project_by_id(&pool, project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, project);

    let renamed = project_repo::update_project(&pool, project.id, "renamed")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "renamed");
    assert_eq!(renamed.created_at, project.created_at);

    assert!(project_repo::delete_project(&pool, project.id).await.unwrap());
    assert!(!project_repo::delete_project(&pool, project.id).await.unwrap());
    assert!(project_repo::get_project_by_id(&pool, project.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_update_missing_user_returns_none() {
    let pool = create_test_pool().await;
    let updated = user_repo::update_user(&pool, Uuid::new_v4(), "ghost")
        .await
        .unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_message_listings_join_names() {
    let pool = create_test_pool().await;
    let project = project_repo::create_project(&pool, "Listing").await.unwrap();
    let user = user_repo::create_user(&pool, "Ada").await.unwrap();

    let first = message_repo::create_message(&pool, project.id, user.id, "first")
        .await
        .unwrap();
    let second = message_repo::create_message(&pool, project.id, user.id, "second")
        .await
        .unwrap();

    let by_project = message_repo::list_messages_by_project(&pool, project.id)
        .await
        .unwrap();
    assert_eq!(by_project.len(), 2);
    assert_eq!(by_project[0].id, second.id);
    assert_eq!(by_project[1].id, first.id);
    assert!(by_project.iter().all(|m| m.user_name == "Ada"));

    let all = message_repo::list_messages(&pool).await.unwrap();
    let ours = all.iter().find(|m| m.id == first.id).unwrap();
    assert_eq!(ours.project_name, "Listing");
    assert_eq!(ours.user_name, "Ada");

    // Deleting the project cascades to its messages
    project_repo::delete_project(&pool, project.id).await.unwrap();
    assert!(message_repo::get_message_by_id(&pool, first.id)
        .await
        .unwrap()
        .is_none());
    user_repo::delete_user(&pool, user.id).await.unwrap();
}

#[actix_web::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_create_project_broadcasts_event() {
    let pool = create_test_pool().await;
    let broadcaster = Broadcaster::new();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/sse/events").to_request();
    let mut stream = test::call_service(&app, req).await.into_body();
    next_chunk(&mut stream).await.unwrap();

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .set_json(json!({"name": "Broadcasted"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let project: Project = test::read_body_json(resp).await;

    let frame = next_chunk(&mut stream).await.unwrap();
    let expected = format!(
        "data: {{\"event\":\"new-project\",\"data\":{{\"id\":\"{}\",\"name\":\"Broadcasted\"}}}}\n\n",
        project.id
    );
    assert_eq!(frame, expected.as_bytes());

    project_repo::delete_project(&pool, project.id).await.unwrap();
}

#[actix_web::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_message_api_round_trip() {
    let pool = create_test_pool().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(Broadcaster::new()))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .set_json(json!({"name": "API"}))
        .to_request();
    let project: Project = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/users")
        .set_json(json!({"name": "Grace"}))
        .to_request();
    let user: User = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/messages")
        .set_json(json!({"project_id": project.id, "user_id": user.id, "message": "hello"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let message: Message = test::read_body_json(resp).await;

    let req = test::TestRequest::put()
        .uri(&format!("/api/messages/{}", message.id))
        .set_json(json!({"message": "edited"}))
        .to_request();
    let edited: Message = test::call_and_read_body_json(&app, req).await;
    assert_eq!(edited.message, "edited");

    let req = test::TestRequest::get()
        .uri(&format!("/api/messages/project/{}", project.id))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed[0]["user_name"], "Grace");

    // Unknown user violates the foreign key
    let req = test::TestRequest::post()
        .uri("/api/messages")
        .set_json(json!({"project_id": project.id, "user_id": Uuid::new_v4(), "message": "x"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/projects/{}", project.id))
        .to_request();
    let deleted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(deleted, json!({"message": "Project deleted successfully."}));

    let req = test::TestRequest::get()
        .uri(&format!("/api/messages/{}", message.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    user_repo::delete_user(&pool, user.id).await.unwrap();
}
