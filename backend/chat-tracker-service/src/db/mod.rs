use sqlx::migrate::Migrator;
use sqlx::PgPool;

pub mod message_repo;
pub mod project_repo;
pub mod user_repo;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Round-trip to the database on a freshly acquired connection; used by the
/// health endpoint so the acquire latency shows up in pool metrics.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut conn = db_pool::acquire_with_metrics(pool, crate::SERVICE_NAME).await?;
    sqlx::query("SELECT 1").execute(&mut *conn).await?;
    Ok(())
}
