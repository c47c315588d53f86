use crate::db::backend::AuthBackend;
use crate::db::ddl::{Ddl, quote_ident};
use crate::db::models::{ColumnDescriptor, Extra, KeyRole, Nullability};
use crate::error::AuthError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::mysql::{MySqlConnection, MySqlPoolOptions, MySqlRow};
use sqlx::{MySql, Pool, Row};
use std::borrow::Cow;
use tracing::{debug, warn};

pub type MySqlPool = Pool<MySql>;

/// Seconds a registration waits for a concurrent registration of the same id.
const REGISTRATION_LOCK_TIMEOUT_SECS: i64 = 10;

#[derive(Clone, Debug)]
pub struct MySqlBackend {
    pool: MySqlPool,
}

impl MySqlBackend {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, AuthError> {
        let pool = MySqlPoolOptions::new().connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    fn row_to_descriptor(row: MySqlRow) -> Result<ColumnDescriptor, AuthError> {
        let field: String = row.try_get("field")?;
        let column_type: String = row.try_get("column_type")?;
        let nullable: String = row.try_get("nullable")?;
        let column_key: String = row.try_get("column_key")?;
        let column_default: Option<String> = row.try_get("column_default")?;
        let extra: Option<String> = row.try_get("extra")?;

        Ok(ColumnDescriptor {
            field: Cow::Owned(field),
            column_type: Cow::Owned(column_type),
            null: Nullability::parse(&nullable),
            key: KeyRole::parse(&column_key),
            default: column_default.map(Cow::Owned),
            extra: Extra::parse(extra.as_deref().unwrap_or_default()),
        })
    }
}

#[async_trait]
impl AuthBackend for MySqlBackend {
    async fn list_tables(&self) -> Result<Vec<String>, AuthError> {
        let tables: Vec<String> = sqlx::query_scalar(
            r#"SELECT CAST(TABLE_NAME AS CHAR)
               FROM information_schema.TABLES
               WHERE TABLE_SCHEMA = DATABASE()"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AuthError> {
        // information_schema rather than SHOW COLUMNS: parameterizable, and
        // the CASTs keep every value decodable as text across server versions.
        let rows = sqlx::query(
            r#"SELECT CAST(COLUMN_NAME AS CHAR) AS field,
                      CAST(COLUMN_TYPE AS CHAR) AS column_type,
                      CAST(IS_NULLABLE AS CHAR) AS nullable,
                      CAST(COLUMN_KEY AS CHAR) AS column_key,
                      CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
                      CAST(EXTRA AS CHAR) AS extra
               FROM information_schema.COLUMNS
               WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
               ORDER BY ORDINAL_POSITION"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_descriptor).collect()
    }

    async fn execute_ddl(&self, table: &str, ddl: &Ddl) -> Result<(), AuthError> {
        let sql = ddl.to_sql(table);
        debug!(table, statement = %sql, "executing DDL");
        sqlx::raw_sql(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn id_exists(&self, table: &str, id: &str) -> Result<bool, AuthError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE `id` = ?)",
            quote_ident(table)
        );
        let found: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    async fn pair_exists(&self, table: &str, id: &str, digest: &str) -> Result<bool, AuthError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE `id` = ? AND `password` = ?)",
            quote_ident(table)
        );
        let found: i64 = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(digest)
            .fetch_one(&self.pool)
            .await?;
        Ok(found != 0)
    }

    /// Serializes registrations of one id with a named lock (`GET_LOCK`)
    /// held on a single connection around the existence check and the
    /// insert. Both are plain autocommit statements, so the check reads the
    /// latest committed rows under any isolation level and takes no row or
    /// gap locks; registrations of different ids never contend.
    async fn insert_if_absent(
        &self,
        table: &str,
        id: &str,
        digest: &str,
    ) -> Result<bool, AuthError> {
        let lock = registration_lock_name(table, id);
        let mut conn = self.pool.acquire().await?;

        let acquired: Option<i64> = sqlx::query_scalar("SELECT GET_LOCK(?, ?)")
            .bind(&lock)
            .bind(REGISTRATION_LOCK_TIMEOUT_SECS)
            .fetch_one(&mut *conn)
            .await?;
        if acquired != Some(1) {
            return Err(AuthError::LockTimeout {
                table: table.to_string(),
            });
        }

        let inserted = insert_unless_taken(&mut conn, table, id, digest).await;

        let released: Result<Option<i64>, sqlx::Error> =
            sqlx::query_scalar("SELECT RELEASE_LOCK(?)")
                .bind(&lock)
                .fetch_one(&mut *conn)
                .await;
        if let Err(e) = released {
            // Named locks die with the session; don't hand it back to the pool.
            warn!(table, error = %e, "failed to release registration lock; closing connection");
            conn.close_on_drop();
        }
        inserted
    }
}

/// `GET_LOCK` name for registrations of `id` in `table`. Lock names are
/// server-wide and capped at 64 characters, hence the digest.
fn registration_lock_name(table: &str, id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.as_bytes());
    hasher.update([0u8]);
    hasher.update(id.as_bytes());
    format!("authguard:{}", hex::encode(&hasher.finalize()[..24]))
}

async fn insert_unless_taken(
    conn: &mut MySqlConnection,
    table: &str,
    id: &str,
    digest: &str,
) -> Result<bool, AuthError> {
    let table = quote_ident(table);

    let exists_sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE `id` = ?)");
    let taken: i64 = sqlx::query_scalar(&exists_sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    if taken != 0 {
        return Ok(false);
    }

    let insert_sql = format!("INSERT INTO {table} (`id`, `password`) VALUES (?, ?)");
    sqlx::query(&insert_sql)
        .bind(id)
        .bind(digest)
        .execute(&mut *conn)
        .await?;
    Ok(true)
}
