use crate::error::AuthError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "authguard.toml";
pub const ENV_PREFIX: &str = "AUTHGUARD_";

/// What `check_conformance` does when the live table does not conform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonconformancePolicy {
    /// Report `false` and leave the table for `fix_table`.
    #[default]
    Repair,
    /// Drop the whole table so it is recreated from scratch. Destroys every
    /// stored credential.
    DropTable,
}

/// Salt strategy selectable from configuration. Arbitrary strategies are
/// installed in code with `PasswordHasher::with_salt_strategy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaltConfig {
    /// The password is its own salt.
    #[default]
    Password,
    /// A fixed application-wide salt.
    Static { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub loglevel: String,
    pub on_nonconformance: NonconformancePolicy,
    pub salt: SaltConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "mysql://root@localhost/app".to_string(),
            loglevel: "info".to_string(),
            on_nonconformance: NonconformancePolicy::default(),
            salt: SaltConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then `authguard.toml`, then `AUTHGUARD_*` environment
    /// variables (`__` separates nested keys, e.g. `AUTHGUARD_SALT__KIND`).
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, AuthError> {
        Ok(Self::figment().extract()?)
    }
}
