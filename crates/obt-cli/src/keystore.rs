//! File-backed key store
//!
//! Keys live in a JSON file mapping account names to private keys in
//! `PVT_K1_` form. The first key of an account is the one its public key is
//! published from; the others are older keys still tried for decryption.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use obt_crypto::{KeyStore, KeyStoreError, PrivateKey, PublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported key file version {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid key for account {account}: {source}")]
    InvalidKey {
        account: String,
        source: obt_crypto::KeyError,
    },

    #[error("No key store path configured")]
    NoPath,
}

#[derive(Serialize, Deserialize)]
struct StoredKeys {
    version: u32,
    #[serde(default)]
    accounts: BTreeMap<String, Vec<String>>,
}

impl StoredKeys {
    const CURRENT_VERSION: u32 = 1;
}

/// An account and the public key counterparties encrypt to.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub account: String,
    pub public_key: PublicKey,
    pub key_count: usize,
}

pub struct FileKeyStore {
    path: PathBuf,
    accounts: BTreeMap<String, Vec<PrivateKey>>,
}

impl FileKeyStore {
    /// Open the key file at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KeyFileError> {
        let path = path.into();
        let mut accounts = BTreeMap::new();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let stored: StoredKeys = serde_json::from_str(&contents)
                .map_err(|e| KeyFileError::Serialization(e.to_string()))?;
            if stored.version != StoredKeys::CURRENT_VERSION {
                return Err(KeyFileError::UnsupportedVersion(stored.version));
            }
            for (account, texts) in stored.accounts {
                let keys = texts
                    .iter()
                    .map(|text| text.parse::<PrivateKey>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|source| KeyFileError::InvalidKey {
                        account: account.clone(),
                        source,
                    })?;
                accounts.insert(account, keys);
            }
        }

        tracing::debug!(path = %path.display(), accounts = accounts.len(), "opened key store");
        Ok(Self { path, accounts })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add `key` to `account`. Returns false if the account already holds it.
    pub fn import(&mut self, account: &str, key: PrivateKey) -> Result<bool, KeyFileError> {
        let public = key.public_key();
        let keys = self.accounts.entry(account.to_string()).or_default();
        if keys.iter().any(|k| k.public_key() == public) {
            return Ok(false);
        }
        keys.push(key);

        if let Err(e) = self.save() {
            if let Some(keys) = self.accounts.get_mut(account) {
                keys.pop();
                if keys.is_empty() {
                    self.accounts.remove(account);
                }
            }
            return Err(e);
        }
        tracing::info!(account, "imported key");
        Ok(true)
    }

    pub fn accounts(&self) -> Vec<AccountInfo> {
        self.accounts
            .iter()
            .filter_map(|(account, keys)| {
                keys.first().map(|first| AccountInfo {
                    account: account.clone(),
                    public_key: first.public_key(),
                    key_count: keys.len(),
                })
            })
            .collect()
    }

    pub fn account(&self, account: &str) -> Result<AccountInfo, KeyStoreError> {
        let keys = self
            .accounts
            .get(account)
            .ok_or_else(|| KeyStoreError::AccountNotFound(account.to_string()))?;
        let first = keys
            .first()
            .ok_or_else(|| KeyStoreError::NoKeys(account.to_string()))?;
        Ok(AccountInfo {
            account: account.to_string(),
            public_key: first.public_key(),
            key_count: keys.len(),
        })
    }

    /// Write the store atomically through a temp file.
    fn save(&self) -> Result<(), KeyFileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredKeys {
            version: StoredKeys::CURRENT_VERSION,
            accounts: self
                .accounts
                .iter()
                .map(|(account, keys)| {
                    (account.clone(), keys.iter().map(PrivateKey::to_typed_string).collect())
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| KeyFileError::Serialization(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
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
        self.account(account).map(|info| info.public_key)
    }
}
