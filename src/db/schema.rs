//! Expected definition of the `auth` table.
//! MySQL/MariaDB (InnoDB) dialect.

use crate::db::models::{ColumnDescriptor, Extra, KeyRole, Nullability};
use std::borrow::Cow;

pub const AUTH_TABLE: &str = "auth";

/// Table options appended to `CREATE TABLE`.
pub const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci";

/// Columns of `auth`:
/// - `order` int(11) primary key, auto-increment
/// - `id` text, unique by convention only
/// - `password` mediumtext, hex digest
pub const AUTH_SCHEMA: [ColumnDescriptor; 3] = [
    ColumnDescriptor {
        field: Cow::Borrowed("order"),
        column_type: Cow::Borrowed("int(11)"),
        null: Nullability::No,
        key: KeyRole::Primary,
        default: None,
        extra: Extra::AutoIncrement,
    },
    ColumnDescriptor {
        field: Cow::Borrowed("id"),
        column_type: Cow::Borrowed("text"),
        null: Nullability::No,
        key: KeyRole::None,
        default: None,
        extra: Extra::None,
    },
    ColumnDescriptor {
        field: Cow::Borrowed("password"),
        column_type: Cow::Borrowed("mediumtext"),
        null: Nullability::No,
        key: KeyRole::None,
        default: None,
        extra: Extra::None,
    },
];
