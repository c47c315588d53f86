pub mod credential_store;
pub mod guardian;
pub mod hasher;
