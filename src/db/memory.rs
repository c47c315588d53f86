//! In-process backend holding tables in memory.
//!
//! Applies [`Ddl`] with the rules MySQL enforces for the statements the
//! guardian issues (one primary key per table, auto-increment only on a
//! key column, implicit defaults when adding a `NOT NULL` column to a
//! populated table). Used by the test suite and for local development
//! without a database server.

use crate::db::backend::AuthBackend;
use crate::db::ddl::Ddl;
use crate::db::models::{AuthRecord, ColumnDescriptor, KeyRole};
use crate::error::AuthError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

type Row = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    next_auto: i64,
}

impl MemoryTable {
    fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.field == field)
    }

    fn require(&self, field: &str) -> Result<usize, AuthError> {
        self.position(field)
            .ok_or_else(|| AuthError::Backend(format!("unknown column `{field}`")))
    }

    fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.key == KeyRole::Primary)
    }

    fn auto_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.extra.is_auto_increment())
    }

    /// Fill `field` in every existing row the way MySQL does when a column
    /// is added or turned into an auto-increment column.
    fn backfill(&mut self, column: &ColumnDescriptor) {
        let field = column.field.to_string();
        if column.extra.is_auto_increment() {
            for row in self.rows.iter_mut() {
                self.next_auto += 1;
                row.insert(field.clone(), self.next_auto.to_string());
            }
            return;
        }
        let implicit = column
            .default
            .as_deref()
            .map(str::to_string)
            .unwrap_or_else(|| implicit_default(&column.column_type));
        for row in self.rows.iter_mut() {
            row.entry(field.clone()).or_insert_with(|| implicit.clone());
        }
    }

    fn apply(&mut self, ddl: &Ddl) -> Result<(), AuthError> {
        match ddl {
            Ddl::CreateTable { .. } | Ddl::DropTable => Err(AuthError::Backend(
                "table-level statement applied to an existing table".to_string(),
            )),
            Ddl::AddPrimaryKey { column } => {
                if self.has_primary_key() {
                    return Err(AuthError::Backend("multiple primary key defined".to_string()));
                }
                let idx = self.require(column)?;
                self.columns[idx].key = KeyRole::Primary;
                Ok(())
            }
            Ddl::ModifyColumn(col) | Ddl::ChangeColumn(col) => {
                let idx = self.require(&col.field)?;
                let key = self.columns[idx].key;
                check_auto_increment(col, key, self.auto_column())?;
                let was_auto = self.columns[idx].extra.is_auto_increment();
                self.columns[idx] = ColumnDescriptor { key, ..col.clone() };
                if col.extra.is_auto_increment() && !was_auto {
                    self.next_auto = self
                        .rows
                        .iter()
                        .filter_map(|r| r.get(&*col.field)?.parse::<i64>().ok())
                        .max()
                        .unwrap_or(0);
                }
                Ok(())
            }
            Ddl::DropColumn { column } => {
                let idx = self.require(column)?;
                if self.columns.len() == 1 {
                    return Err(AuthError::Backend(
                        "cannot drop the last column; use DROP TABLE".to_string(),
                    ));
                }
                self.columns.remove(idx);
                for row in self.rows.iter_mut() {
                    row.remove(&**column);
                }
                Ok(())
            }
            Ddl::AddColumn(col) => {
                if self.position(&col.field).is_some() {
                    return Err(AuthError::Backend(format!(
                        "duplicate column name `{}`",
                        col.field
                    )));
                }
                if col.extra.is_auto_increment() {
                    if self.has_primary_key() {
                        return Err(AuthError::Backend("multiple primary key defined".to_string()));
                    }
                    if self.auto_column().is_some() {
                        return Err(AuthError::Backend(
                            "there can be only one auto column".to_string(),
                        ));
                    }
                    let col = ColumnDescriptor {
                        key: KeyRole::Primary,
                        ..col.clone()
                    };
                    self.next_auto = 0;
                    self.backfill(&col);
                    self.columns.insert(0, col);
                } else {
                    let col = ColumnDescriptor {
                        key: KeyRole::None,
                        ..col.clone()
                    };
                    self.backfill(&col);
                    self.columns.push(col);
                }
                Ok(())
            }
        }
    }

    fn insert(&mut self, id: &str, digest: &str) -> Result<(), AuthError> {
        self.require("id")?;
        self.require("password")?;
        let mut row = Row::new();
        for column in &self.columns {
            let value = match &*column.field {
                "id" => id.to_string(),
                "password" => digest.to_string(),
                _ if column.extra.is_auto_increment() => {
                    self.next_auto += 1;
                    self.next_auto.to_string()
                }
                _ => match &column.default {
                    Some(default) => default.to_string(),
                    None => implicit_default(&column.column_type),
                },
            };
            row.insert(column.field.to_string(), value);
        }
        self.rows.push(row);
        Ok(())
    }
}

fn check_auto_increment(
    col: &ColumnDescriptor,
    key: KeyRole,
    current_auto: Option<&ColumnDescriptor>,
) -> Result<(), AuthError> {
    if !col.extra.is_auto_increment() {
        return Ok(());
    }
    if key == KeyRole::None {
        return Err(AuthError::Backend(
            "incorrect table definition; auto column must be defined as a key".to_string(),
        ));
    }
    match current_auto {
        Some(other) if other.field != col.field => Err(AuthError::Backend(
            "there can be only one auto column".to_string(),
        )),
        _ => Ok(()),
    }
}

fn implicit_default(column_type: &str) -> String {
    let ty = column_type.to_ascii_lowercase();
    if ty.contains("int") || ty.starts_with("decimal") || ty.starts_with("float") {
        "0".to_string()
    } else {
        String::new()
    }
}

/// In-memory stand-in for a MySQL database.
///
/// Cloning shares the underlying tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    tables: Arc<Mutex<BTreeMap<String, MemoryTable>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with the given columns and no rows, replacing any
    /// existing table of that name.
    pub fn with_table(
        self,
        table: &str,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Self, AuthError> {
        self.lock()?.insert(
            table.to_string(),
            MemoryTable {
                columns,
                ..MemoryTable::default()
            },
        );
        Ok(self)
    }

    /// Rows of an `auth`-shaped table, in insertion order.
    pub fn records(&self, table: &str) -> Result<Vec<AuthRecord>, AuthError> {
        let tables = self.lock()?;
        let t = tables
            .get(table)
            .ok_or_else(|| no_such_table(table))?;
        Ok(t.rows
            .iter()
            .map(|row| AuthRecord {
                order: row
                    .get("order")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_default(),
                id: row.get("id").cloned().unwrap_or_default(),
                password: row.get("password").cloned().unwrap_or_default(),
            })
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemoryTable>>, AuthError> {
        self.tables
            .lock()
            .map_err(|e| AuthError::Backend(format!("memory backend lock poisoned: {e}")))
    }
}

fn no_such_table(table: &str) -> AuthError {
    AuthError::Backend(format!("table `{table}` doesn't exist"))
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn list_tables(&self) -> Result<Vec<String>, AuthError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>, AuthError> {
        Ok(self
            .lock()?
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn execute_ddl(&self, table: &str, ddl: &Ddl) -> Result<(), AuthError> {
        let mut tables = self.lock()?;
        match ddl {
            Ddl::CreateTable { columns } => {
                if tables.contains_key(table) {
                    return Err(AuthError::Backend(format!("table `{table}` already exists")));
                }
                if let Some(col) = columns.iter().find(|c| c.extra.is_auto_increment()) {
                    return Err(AuthError::Backend(format!(
                        "auto column `{}` must be defined as a key",
                        col.field
                    )));
                }
                tables.insert(
                    table.to_string(),
                    MemoryTable {
                        columns: columns.clone(),
                        ..MemoryTable::default()
                    },
                );
                Ok(())
            }
            Ddl::DropTable => tables
                .remove(table)
                .map(|_| ())
                .ok_or_else(|| no_such_table(table)),
            other => {
                let t = tables.get_mut(table).ok_or_else(|| no_such_table(table))?;
                // Work on a copy so a rejected statement leaves the table as
                // it was, like a failed ALTER in MySQL.
                let mut staged = t.clone();
                staged.apply(other)?;
                *t = staged;
                Ok(())
            }
        }
    }

    async fn id_exists(&self, table: &str, id: &str) -> Result<bool, AuthError> {
        let tables = self.lock()?;
        let t = tables.get(table).ok_or_else(|| no_such_table(table))?;
        t.require("id")?;
        Ok(t.rows.iter().any(|r| r.get("id").map(String::as_str) == Some(id)))
    }

    async fn pair_exists(&self, table: &str, id: &str, digest: &str) -> Result<bool, AuthError> {
        let tables = self.lock()?;
        let t = tables.get(table).ok_or_else(|| no_such_table(table))?;
        t.require("id")?;
        t.require("password")?;
        Ok(t.rows.iter().any(|r| {
            r.get("id").map(String::as_str) == Some(id)
                && r.get("password").map(String::as_str) == Some(digest)
        }))
    }

    async fn insert_if_absent(
        &self,
        table: &str,
        id: &str,
        digest: &str,
    ) -> Result<bool, AuthError> {
        let mut tables = self.lock()?;
        let t = tables.get_mut(table).ok_or_else(|| no_such_table(table))?;
        t.require("id")?;
        if t.rows.iter().any(|r| r.get("id").map(String::as_str) == Some(id)) {
            return Ok(false);
        }
        t.insert(id, digest)?;
        Ok(true)
    }
}
