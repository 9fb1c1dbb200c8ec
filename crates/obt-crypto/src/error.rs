use crate::envelope::EnvelopeError;
use crate::keys::KeyError;
use crate::keystore::KeyStoreError;
use crate::schema::SchemaError;

/// Error returned by the content encrypt and decrypt paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error("invalid base64 content: {0}")]
    InvalidEncoding(String),
    #[error("payload conversion failed: {0}")]
    Payload(String),
}

impl ContentError {
    /// Tampered content or the wrong key pair.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Envelope(EnvelopeError::MacInvalid))
    }

    /// Authentic content that no schema variant could read.
    pub fn is_decoding_exhausted(&self) -> bool {
        matches!(self, Self::Schema(SchemaError::DecodingExhausted))
    }
}
