use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, Pool, Postgres};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct DbOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Applied as `statement_timeout` on every pooled connection; zero disables it.
    pub statement_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_millis(5_000),
        }
    }
}

pub async fn connect(database_url: &str, options: &DbOptions) -> Result<Pool<Postgres>> {
    let statement_timeout_ms = options.statement_timeout.as_millis();
    let pool = PgPoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if statement_timeout_ms > 0 {
                    let statement = format!("SET statement_timeout = {statement_timeout_ms}");
                    conn.execute(statement.as_str()).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}
