use std::{str::FromStr, time::Duration};

use sqlx::{
    Error, Pool, Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use utils::assets::database_path;

pub mod models;

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    /// Open (creating if needed) the SQLite database in the asset directory
    /// and apply pending migrations.
    pub async fn new() -> Result<DBService, Error> {
        let path = database_path().map_err(Error::Io)?;
        let database_url = format!("sqlite://{}", path.to_string_lossy());
        Self::new_with_url(&database_url).await
    }

    pub async fn new_with_url(database_url: &str) -> Result<DBService, Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Database ready at {}", database_url);
        Ok(DBService { pool })
    }

    /// Open a transaction holding the write lock from its first statement.
    ///
    /// Every read-then-write workflow mutation goes through here: in WAL mode
    /// a deferred transaction that upgrades from read to write fails with
    /// `SQLITE_BUSY` at once instead of waiting out the busy timeout.
    pub async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, Error> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }

    /// Wrap an already configured pool. Migrations are the caller's concern.
    pub fn from_pool(pool: SqlitePool) -> DBService {
        DBService { pool }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::test_utils::{create_test_event, setup_file_test_db};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn read_then_write_transactions_wait_for_each_other() {
        let file = setup_file_test_db().await;
        let event_id = create_test_event(&file.db.pool).await.id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = file.db.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = db.begin_write().await?;
                let name: String = sqlx::query_scalar("SELECT name FROM events WHERE id = ?1")
                    .bind(event_id)
                    .fetch_one(&mut *tx)
                    .await?;
                sqlx::query("UPDATE events SET name = ?2 WHERE id = ?1")
                    .bind(event_id)
                    .bind(format!("{name} #{i}"))
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let name: String = sqlx::query_scalar("SELECT name FROM events WHERE id = ?1")
            .bind(event_id)
            .fetch_one(&file.db.pool)
            .await
            .unwrap();
        assert_eq!(name.matches(" #").count(), 8);
    }
}
