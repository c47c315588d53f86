use crate::config::SaltConfig;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha512 = Hmac<Sha512>;

/// Derives the salt mixed into a password's hash key.
///
/// Must be deterministic: a strategy that returns a different salt for the
/// same password (random, time-based) makes every stored hash unverifiable.
pub trait SaltStrategy: Send + Sync {
    fn salt(&self, password: &str) -> String;
}

impl<F> SaltStrategy for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn salt(&self, password: &str) -> String {
        self(password)
    }
}

/// Uses the password itself as salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordSalt;

impl SaltStrategy for PasswordSalt {
    fn salt(&self, password: &str) -> String {
        password.to_string()
    }
}

/// Same salt for every password.
#[derive(Debug, Clone)]
pub struct StaticSalt(pub String);

impl SaltStrategy for StaticSalt {
    fn salt(&self, _password: &str) -> String {
        self.0.clone()
    }
}

/// HMAC-SHA512 password hasher.
///
/// The key is `password ++ salt(password)`, the message is empty, and the
/// digest is lowercase hex (128 characters).
#[derive(Clone)]
pub struct PasswordHasher {
    salt: Arc<dyn SaltStrategy>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::with_salt_strategy(PasswordSalt)
    }

    pub fn with_salt_strategy(strategy: impl SaltStrategy + 'static) -> Self {
        Self {
            salt: Arc::new(strategy),
        }
    }

    /// Replace the salt strategy. Digests computed under the previous
    /// strategy no longer verify unless both strategies agree.
    pub fn set_salt_strategy(&mut self, strategy: impl SaltStrategy + 'static) {
        self.salt = Arc::new(strategy);
    }

    pub fn hash(&self, password: &str) -> String {
        let mut key = String::with_capacity(password.len() * 2);
        key.push_str(password);
        key.push_str(&self.salt.salt(password));

        let mac = HmacSha512::new_from_slice(key.as_bytes())
            .expect("HMAC accepts keys of any length");
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of `hash(password)` with a stored digest.
    ///
    /// For callers that already hold the digest (read from a row or a
    /// cache). `CredentialStore::exists_pair` matches in the database
    /// instead and does not go through here.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        bool::from(self.hash(password).as_bytes().ct_eq(digest.as_bytes()))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl From<&SaltConfig> for PasswordHasher {
    fn from(cfg: &SaltConfig) -> Self {
        match cfg {
            SaltConfig::Password => PasswordHasher::new(),
            SaltConfig::Static { value } => {
                PasswordHasher::with_salt_strategy(StaticSalt(value.clone()))
            }
        }
    }
}
