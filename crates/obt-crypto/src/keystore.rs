//! Key store collaborator.
//!
//! The codec only reads keys. Persisting them is up to the implementation.

use std::collections::BTreeMap;

use crate::keys::{PrivateKey, PublicKey};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyStoreError {
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("no agreement keys for account: {0}")]
    NoKeys(String),
}

/// Source of agreement keys for named accounts.
pub trait KeyStore: Send + Sync {
    /// Private keys usable for agreement, in the order they should be tried.
    fn agreement_keys(&self, account: &str) -> Result<Vec<PrivateKey>, KeyStoreError>;

    /// The account's public key, the one counterparties encrypt to.
    fn public_key(&self, account: &str) -> Result<PublicKey, KeyStoreError>;
}

/// In-memory key store. The first key added to an account is its public
/// identity.
#[derive(Default)]
pub struct MemoryKeyStore {
    accounts: BTreeMap<String, Vec<PrivateKey>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: impl Into<String>, key: PrivateKey) {
        self.accounts.entry(account.into()).or_default().push(key);
    }

    pub fn with_key(mut self, account: impl Into<String>, key: PrivateKey) -> Self {
        self.insert(account, key);
        self
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }
}

impl KeyStore for MemoryKeyStore {
    fn agreement_keys(&self, account: &str) -> Result<Vec<PrivateKey>, KeyStoreError> {
        let keys = self
            .accounts
            .get(account)
            .ok_or_else(|| KeyStoreError::AccountNotFound(account.to_string()))?;
        if keys.is_empty() {
            return Err(KeyStoreError::NoKeys(account.to_string()));
        }
        Ok(keys.clone())
    }

    fn public_key(&self, account: &str) -> Result<PublicKey, KeyStoreError> {
        self.agreement_keys(account)?
            .first()
            .map(PrivateKey::public_key)
            .ok_or_else(|| KeyStoreError::NoKeys(account.to_string()))
    }
}
