use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Config error: {0}")]
    Config(#[from] figment::Error),

    /// A DDL statement failed part-way through `create_table`/`fix_table`.
    /// Statements before it have already been committed; the table must be
    /// inspected by hand.
    #[error("Schema repair failed after {applied} applied statement(s) at `{statement}`: {source}")]
    Repair {
        applied: usize,
        statement: String,
        #[source]
        source: Box<AuthError>,
    },

    /// Another registration of the same id held the lock past the timeout.
    #[error("Timed out waiting for the registration lock on `{table}`")]
    LockTimeout { table: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl AuthError {
    pub(crate) fn repair(applied: usize, statement: String, source: AuthError) -> Self {
        AuthError::Repair {
            applied,
            statement,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_convert_into_database_error() {
        let err: AuthError = SqlxError::PoolTimedOut.into();
        assert!(matches!(err, AuthError::DatabaseError(SqlxError::PoolTimedOut)));
    }

    #[test]
    fn repair_error_keeps_the_failed_statement() {
        let err = AuthError::repair(
            2,
            "ALTER TABLE `auth` DROP `order`".to_string(),
            AuthError::Backend("boom".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Schema repair failed after 2 applied statement(s) at \
             `ALTER TABLE `auth` DROP `order``: Backend error: boom"
        );
    }
}
