use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaStatus {
    pub applied_migrations: i64,
    pub known_migrations: usize,
    pub cars_on_record: i64,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied_migrations as usize == self.known_migrations
    }
}

/// Fails when the schema has never been migrated.
pub async fn status(pool: &DbPool) -> Result<SchemaStatus, sqlx::Error> {
    let applied_migrations: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    let cars_on_record: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM car_info").fetch_one(pool).await?;
    Ok(SchemaStatus {
        applied_migrations,
        known_migrations: MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration()).count(),
        cars_on_record,
    })
}
