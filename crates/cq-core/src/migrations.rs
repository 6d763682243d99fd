use anyhow::{Context, Result};
use sqlx::{migrate::Migrator, Pool, Postgres};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies every embedded migration not yet recorded in `_sqlx_migrations`.
pub async fn run(pool: &Pool<Postgres>) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to apply clinic queue migrations")?;
    let latest = MIGRATOR.iter().map(|migration| migration.version).max();
    tracing::info!(latest_version = ?latest, "schema up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinic_schema_is_embedded() {
        let descriptions: Vec<_> = MIGRATOR
            .iter()
            .map(|migration| migration.description.to_string())
            .collect();
        assert!(descriptions.iter().any(|description| description == "clinic queue"));
    }
}
