pub mod config;
pub mod db;
pub mod error;
pub mod service;

pub use config::{Config, NonconformancePolicy, SaltConfig};
pub use db::{AuthBackend, MemoryBackend, MySqlBackend};
pub use error::AuthError;
pub use service::credential_store::CredentialStore;
pub use service::guardian::{RepairReport, SchemaGuardian};
pub use service::hasher::{PasswordHasher, PasswordSalt, SaltStrategy, StaticSalt};
