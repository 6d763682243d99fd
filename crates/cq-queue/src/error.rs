use thiserror::Error;

/// Postgres `query_canceled`, raised when `statement_timeout` fires.
const PG_QUERY_CANCELED: &str = "57014";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(String),
    #[error("store timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return StoreError::Timeout;
        }
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let key = db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string());
                return StoreError::Duplicate(key);
            }
            if db_err.code().as_deref() == Some(PG_QUERY_CANCELED) {
                return StoreError::Timeout;
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type QueueResult<T> = Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Timeout
        ));
    }

    #[test]
    fn other_sqlx_errors_stay_database_errors() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
