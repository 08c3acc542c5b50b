use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let mut options = SqlitePoolOptions::new();
    // Every connection to an in-memory database opens its own empty database.
    if is_in_memory(database_url) {
        options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
    } else {
        options = options.max_connections(max_connections.max(1));
    }

    options
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, is_in_memory};

    #[test]
    fn recognizes_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://fleet?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://carfleet.db"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_database_across_queries() {
        let pool = connect_with_settings("sqlite::memory:", 5, 5).await.expect("connect");
        sqlx::query("CREATE TABLE scratch (id INTEGER)").execute(&pool).await.expect("create");
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scratch").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 0);
        pool.close().await;
    }
}
