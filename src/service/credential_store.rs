use crate::db::backend::AuthBackend;
use crate::db::schema::AUTH_TABLE;
use crate::error::AuthError;
use crate::service::hasher::{PasswordHasher, SaltStrategy};
use tracing::{debug, info};

/// Id/password pairs stored in `auth`.
#[derive(Clone, Debug)]
pub struct CredentialStore<B> {
    backend: B,
    hasher: PasswordHasher,
}

impl<B: AuthBackend> CredentialStore<B> {
    pub fn new(backend: B, hasher: PasswordHasher) -> Self {
        Self { backend, hasher }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn hash(&self, password: &str) -> String {
        self.hasher.hash(password)
    }

    /// Replace the salt strategy of this store. Existing rows hashed under
    /// another strategy stop matching in `exists_pair`.
    pub fn set_salt_strategy(&mut self, strategy: impl SaltStrategy + 'static) {
        self.hasher.set_salt_strategy(strategy);
    }

    pub async fn exists_id(&self, id: &str) -> Result<bool, AuthError> {
        self.backend.id_exists(AUTH_TABLE, id).await
    }

    pub async fn exists_pair(&self, id: &str, password: &str) -> Result<bool, AuthError> {
        let digest = self.hasher.hash(password);
        let found = self.backend.pair_exists(AUTH_TABLE, id, &digest).await?;
        debug!(id, found, "checked credential pair");
        Ok(found)
    }

    /// Register `id` with `password`. Returns `false` without writing when
    /// `id` is already taken.
    pub async fn create_new_pair(&self, id: &str, password: &str) -> Result<bool, AuthError> {
        let digest = self.hasher.hash(password);
        let created = self
            .backend
            .insert_if_absent(AUTH_TABLE, id, &digest)
            .await?;
        if created {
            info!(id, "registered new credential pair");
        } else {
            debug!(id, "registration rejected; id already exists");
        }
        Ok(created)
    }
}
