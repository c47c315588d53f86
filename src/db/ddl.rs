//! DDL statement builder for the `auth` table.
//!
//! Identifiers and types come from [`ColumnDescriptor`]s of the static
//! schema and are interpolated into the SQL text; nothing here is ever fed
//! from request data.

use crate::db::models::{ColumnDescriptor, Extra, KeyRole, Nullability};
use crate::db::schema::TABLE_OPTIONS;
use std::borrow::Cow;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ddl {
    /// Bare table: columns without keys or auto-increment.
    CreateTable { columns: Vec<ColumnDescriptor> },
    AddPrimaryKey { column: Cow<'static, str> },
    /// `MODIFY` with the column's extra attribute (used to turn on
    /// auto-increment once the primary key exists).
    ModifyColumn(ColumnDescriptor),
    DropColumn { column: Cow<'static, str> },
    /// `ADD` with the full attribute string. An auto-increment column is
    /// placed first and becomes the primary key in the same statement.
    AddColumn(ColumnDescriptor),
    /// `CHANGE` keeping the name, updating type, default and nullability.
    ChangeColumn(ColumnDescriptor),
    DropTable,
}

impl Ddl {
    pub fn to_sql(&self, table: &str) -> String {
        let table = quote_ident(table);
        match self {
            Ddl::CreateTable { columns } => {
                let body = columns
                    .iter()
                    .map(|c| format!("    {}", column_definition(c)))
                    .collect::<Vec<_>>()
                    .join(",\n");
                format!("CREATE TABLE {table} (\n{body}\n) {TABLE_OPTIONS}")
            }
            Ddl::AddPrimaryKey { column } => {
                format!("ALTER TABLE {table} ADD PRIMARY KEY ({})", quote_ident(column))
            }
            Ddl::ModifyColumn(c) => {
                format!("ALTER TABLE {table} MODIFY {}", with_extra(c))
            }
            Ddl::DropColumn { column } => {
                format!("ALTER TABLE {table} DROP {}", quote_ident(column))
            }
            Ddl::AddColumn(c) => {
                format!("ALTER TABLE {table} ADD {}", full_definition(c))
            }
            Ddl::ChangeColumn(c) => {
                format!(
                    "ALTER TABLE {table} CHANGE {} {}",
                    quote_ident(&c.field),
                    with_extra(c)
                )
            }
            Ddl::DropTable => format!("DROP TABLE {table}"),
        }
    }
}

/// The fixed creation sequence for `schema`: bare table, then one primary
/// key, then auto-increment. MySQL rejects an auto-increment column that is
/// not yet a key, so the order is significant.
pub fn create_sequence(schema: &[ColumnDescriptor]) -> Vec<Ddl> {
    let mut seq = vec![Ddl::CreateTable {
        columns: schema.iter().map(ColumnDescriptor::without_constraints).collect(),
    }];
    seq.extend(
        schema
            .iter()
            .filter(|c| c.key == KeyRole::Primary)
            .map(|c| Ddl::AddPrimaryKey {
                column: c.field.clone(),
            }),
    );
    seq.extend(
        schema
            .iter()
            .filter(|c| c.extra != Extra::None)
            .map(|c| Ddl::ModifyColumn(c.clone())),
    );
    seq
}

/// `` `name` type [DEFAULT 'x'] [NOT NULL] ``
pub fn column_definition(c: &ColumnDescriptor) -> String {
    let mut def = format!("{} {}", quote_ident(&c.field), c.column_type);
    if let Some(default) = &c.default {
        let _ = write!(def, " DEFAULT {}", quote_literal(default));
    }
    if c.null == Nullability::No {
        def.push_str(" NOT NULL");
    }
    def
}

fn with_extra(c: &ColumnDescriptor) -> String {
    let mut def = column_definition(c);
    match &c.extra {
        Extra::None => {}
        Extra::AutoIncrement => def.push_str(" AUTO_INCREMENT"),
        Extra::Other(extra) => {
            let _ = write!(def, " {extra}");
        }
    }
    def
}

fn full_definition(c: &ColumnDescriptor) -> String {
    if c.extra.is_auto_increment() {
        format!(
            "{} AUTO_INCREMENT FIRST, ADD PRIMARY KEY ({})",
            column_definition(c),
            quote_ident(&c.field)
        )
    } else {
        with_extra(c)
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
