#![forbid(unsafe_code)]

pub mod hash;
pub mod keys;
pub mod key_agreement;

pub mod envelope;
pub mod schema;
pub mod content;

pub mod error;
pub mod keystore;
pub mod utils;

pub use content::{
    decrypt_content, decrypt_content_with_store, encrypt_content, encrypt_content_with_store,
    ContentPayload, FundsRequestContent, RecordContent,
};
pub use error::ContentError;
pub use keys::{KeyError, PrivateKey, PublicKey};
pub use keystore::{KeyStore, KeyStoreError, MemoryKeyStore};
pub use schema::ContentType;

#[cfg(test)]
mod proptests;
