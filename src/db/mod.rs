//! Database module: the `auth` table, its schema and the backends that
//! execute statements against it.
//!
//! Layout:
//! - `models.rs`: column descriptors and the `auth` row
//! - `schema.rs`: expected definition of `auth`
//! - `ddl.rs`: DDL statement builder (MySQL dialect)
//! - `backend.rs`: `AuthBackend` trait
//! - `mysql.rs` / `memory.rs`: sqlx-backed and in-process backends

pub mod backend;
pub mod ddl;
pub mod memory;
pub mod models;
pub mod mysql;
pub mod schema;

pub use backend::AuthBackend;
pub use ddl::Ddl;
pub use memory::MemoryBackend;
pub use models::{AuthRecord, ColumnDescriptor, Extra, KeyRole, Nullability};
pub use mysql::{MySqlBackend, MySqlPool};
pub use schema::{AUTH_SCHEMA, AUTH_TABLE};
