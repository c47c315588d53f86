use crate::db::ddl::Ddl;
use crate::db::models::ColumnDescriptor;
use crate::error::AuthError;
use async_trait::async_trait;

/// Statement execution against the database holding the `auth` table.
///
/// Each call runs on a connection acquired for that call. Nothing spans
/// calls: no transaction, no lock.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Names of the tables in the current database.
    async fn list_tables(&self) -> Result<Vec<String>, AuthError>;

    /// Live column metadata of `table` in ordinal order. Empty when the
    /// table does not exist.
    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AuthError>;

    async fn execute_ddl(&self, table: &str, ddl: &Ddl) -> Result<(), AuthError>;

    async fn id_exists(&self, table: &str, id: &str) -> Result<bool, AuthError>;

    async fn pair_exists(&self, table: &str, id: &str, digest: &str) -> Result<bool, AuthError>;

    /// Insert `(id, digest)` unless a row with `id` exists. Atomic per id:
    /// of several concurrent calls with the same id exactly one inserts and
    /// the rest return `false`; calls with different ids do not block each
    /// other. Returns whether a row was inserted.
    async fn insert_if_absent(&self, table: &str, id: &str, digest: &str)
    -> Result<bool, AuthError>;
}
