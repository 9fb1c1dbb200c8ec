//! Encrypted OBT content fields.
//!
//! Encrypt: payload → compat schema bytes → envelope → base64.
//! Decrypt: base64 → envelope → schema fallback chain → payload.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope;
use crate::error::ContentError;
use crate::key_agreement::derive_keys;
use crate::keys::{PrivateKey, PublicKey};
use crate::keystore::{KeyStore, KeyStoreError};
use crate::schema::{self, ContentType, Decoded, FieldType, Fields, SchemaVariant};

/// `new_funds_content`: the body of a funds request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsRequestContent {
    pub payee_public_address: String,
    pub amount: String,
    pub chain_code: String,
    pub token_code: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub offline_url: String,
}

/// `record_send_content`: the body of an OBT record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContent {
    pub payer_public_address: String,
    pub payee_public_address: String,
    pub amount: String,
    pub chain_code: String,
    pub token_code: String,
    pub status: String,
    pub obt_id: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub offline_url: String,
}

/// A decrypted payload tagged with its content type. Serializes as the bare
/// field object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContentPayload {
    Request(FundsRequestContent),
    Record(RecordContent),
}

impl ContentPayload {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Request(_) => ContentType::Request,
            Self::Record(_) => ContentType::Record,
        }
    }

    /// Intermediate representation for the compat schema: empty optional
    /// fields are left out.
    pub fn to_fields(&self) -> Result<Fields, ContentError> {
        let value = serde_json::to_value(self).map_err(|e| ContentError::Payload(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(ContentError::Payload("payload is not an object".into()));
        };
        let compat = schema::schema_for(self.content_type(), SchemaVariant::Compat);
        for field in compat.fields {
            let empty = matches!(fields.get(field.name), Some(Value::String(s)) if s.is_empty());
            if field.ty == FieldType::OptionalString && empty {
                fields.remove(field.name);
            }
        }
        Ok(fields)
    }

    pub fn from_fields(content_type: ContentType, fields: Fields) -> Result<Self, ContentError> {
        let value = Value::Object(fields);
        let payload = match content_type {
            ContentType::Request => serde_json::from_value(value).map(Self::Request),
            ContentType::Record => serde_json::from_value(value).map(Self::Record),
        };
        payload.map_err(|e| ContentError::Payload(e.to_string()))
    }

    /// Every field, empty ones included.
    pub fn to_json_pretty(&self) -> Result<String, ContentError> {
        serde_json::to_string_pretty(self).map_err(|e| ContentError::Payload(e.to_string()))
    }
}

impl From<FundsRequestContent> for ContentPayload {
    fn from(content: FundsRequestContent) -> Self {
        Self::Request(content)
    }
}

impl From<RecordContent> for ContentPayload {
    fn from(content: RecordContent) -> Self {
        Self::Record(content)
    }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, ContentError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| ContentError::InvalidEncoding(e.to_string()))
}

/// Encrypt raw bytes to base64 envelope text. A missing or all-zero IV is
/// replaced with a random one.
pub fn encrypt_bytes(
    sender: &PrivateKey,
    recipient_public: &str,
    plaintext: &[u8],
    iv: Option<&[u8]>,
) -> Result<String, ContentError> {
    let recipient: PublicKey = recipient_public.parse()?;
    let keys = derive_keys(sender, &recipient)?;
    let sealed = envelope::seal(plaintext, &keys, iv)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
}

/// Inverse of [`encrypt_bytes`].
pub fn decrypt_bytes(
    recipient: &PrivateKey,
    sender_public: &str,
    encoded: &str,
) -> Result<Vec<u8>, ContentError> {
    let sender: PublicKey = sender_public.parse()?;
    let bytes = decode_base64(encoded)?;
    open_with(recipient, &sender, &bytes)
}

fn open_with(recipient: &PrivateKey, sender: &PublicKey, bytes: &[u8]) -> Result<Vec<u8>, ContentError> {
    let keys = derive_keys(recipient, sender)?;
    Ok(envelope::open(bytes, &keys)?)
}

fn decode_payload(content_type: ContentType, plaintext: &[u8]) -> Result<ContentPayload, ContentError> {
    let Decoded { strategy, fields } = schema::decode_with_fallback(content_type, plaintext)?;
    tracing::debug!(schema = content_type.schema_name(), ?strategy, "decrypted content");
    ContentPayload::from_fields(content_type, fields)
}

/// Encrypt `payload` from `sender` to the holder of `recipient_public`.
pub fn encrypt_content(
    sender: &PrivateKey,
    recipient_public: &str,
    payload: &ContentPayload,
) -> Result<String, ContentError> {
    encrypt_content_with_iv(sender, recipient_public, payload, None)
}

/// [`encrypt_content`] with a caller supplied IV, for reproducible output.
pub fn encrypt_content_with_iv(
    sender: &PrivateKey,
    recipient_public: &str,
    payload: &ContentPayload,
    iv: Option<&[u8]>,
) -> Result<String, ContentError> {
    let content_type = payload.content_type();
    let fields = payload.to_fields()?;
    let plaintext = schema::encode(schema::schema_for(content_type, SchemaVariant::Compat), &fields)?;
    let encoded = encrypt_bytes(sender, recipient_public, &plaintext, iv)?;
    tracing::debug!(
        schema = content_type.schema_name(),
        plaintext_len = plaintext.len(),
        encoded_len = encoded.len(),
        "encrypted content"
    );
    Ok(encoded)
}

/// Decrypt a content field sent by the holder of `sender_public`.
///
/// `content_type` comes from the ledger action that carried the field.
pub fn decrypt_content(
    recipient: &PrivateKey,
    sender_public: &str,
    encoded: &str,
    content_type: ContentType,
) -> Result<ContentPayload, ContentError> {
    let plaintext = decrypt_bytes(recipient, sender_public, encoded)?;
    decode_payload(content_type, &plaintext)
}

/// Encrypt with the first agreement key `store` holds for `account`.
pub fn encrypt_content_with_store(
    store: &dyn KeyStore,
    account: &str,
    recipient_public: &str,
    payload: &ContentPayload,
) -> Result<String, ContentError> {
    let keys = store.agreement_keys(account)?;
    let sender = keys
        .first()
        .ok_or_else(|| KeyStoreError::NoKeys(account.to_string()))?;
    encrypt_content(sender, recipient_public, payload)
}

/// Try each agreement key of `account` in order. A MAC mismatch moves on to
/// the next key; any other failure is returned at once.
pub fn decrypt_content_with_store(
    store: &dyn KeyStore,
    account: &str,
    sender_public: &str,
    encoded: &str,
    content_type: ContentType,
) -> Result<ContentPayload, ContentError> {
    let sender: PublicKey = sender_public.parse()?;
    let bytes = decode_base64(encoded)?;
    let keys = store.agreement_keys(account)?;

    for (index, key) in keys.iter().enumerate() {
        match open_with(key, &sender, &bytes) {
            Ok(plaintext) => {
                tracing::debug!(account, key_index = index, "agreement key authenticated content");
                return decode_payload(content_type, &plaintext);
            }
            Err(err) if err.is_authentication_failure() => continue,
            Err(err) => return Err(err),
        }
    }
    tracing::debug!(account, keys = keys.len(), "no agreement key authenticated content");
    Err(envelope::EnvelopeError::MacInvalid.into())
}
