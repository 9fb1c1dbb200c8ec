//! Envelope module for content encryption.
//! Implements AES-256-CBC with PKCS#7 padding, authenticated by an
//! HMAC-SHA256 over `IV || ciphertext`.
//!
//! Wire layout: `IV(16) || ciphertext(n*16) || MAC(32)`.

use bytes::{BufMut, BytesMut};
use cbc::cipher::{
    block_padding::{NoPadding, Pkcs7},
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::key_agreement::{DerivedKeys, KEY_LEN};
use crate::utils::constant_time_compare;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const IV_LEN: usize = 16;
pub const BLOCK_LEN: usize = 16;
pub const MAC_LEN: usize = 32;
/// IV, one ciphertext block and the MAC.
pub const MIN_ENVELOPE_LEN: usize = IV_LEN + BLOCK_LEN + MAC_LEN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid IV length: expected 16, got {0}")]
    InvalidIvLength(usize),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),
    #[error("MAC verification failed")]
    MacInvalid,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("empty plaintext")]
    EmptyPlaintext,
    #[error("RNG failed")]
    RngError,
}

/// A parsed content envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    mac: [u8; MAC_LEN],
}

impl Envelope {
    /// Split wire bytes into IV, ciphertext and MAC. Only lengths are
    /// checked here; authenticity is checked by [`decrypt`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(EnvelopeError::MalformedEnvelope("shorter than IV, one block and MAC"));
        }
        let (body, mac) = bytes.split_at(bytes.len() - MAC_LEN);
        let (iv, ciphertext) = body.split_at(IV_LEN);
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(EnvelopeError::MalformedEnvelope("ciphertext is not block aligned"));
        }

        let mut iv_arr = [0u8; IV_LEN];
        iv_arr.copy_from_slice(iv);
        let mut mac_arr = [0u8; MAC_LEN];
        mac_arr.copy_from_slice(mac);

        Ok(Self {
            iv: iv_arr,
            ciphertext: ciphertext.to_vec(),
            mac: mac_arr,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(IV_LEN + self.ciphertext.len() + MAC_LEN);
        buf.put_slice(&self.iv);
        buf.put_slice(&self.ciphertext);
        buf.put_slice(&self.mac);
        buf.to_vec()
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn mac(&self) -> &[u8; MAC_LEN] {
        &self.mac
    }
}

fn check_key(key: &[u8]) -> Result<(), EnvelopeError> {
    if key.len() != KEY_LEN {
        return Err(EnvelopeError::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        });
    }
    Ok(())
}

fn compute_mac(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<[u8; MAC_LEN], EnvelopeError> {
    let mut mac = HmacSha256::new_from_slice(mac_key).map_err(|_| EnvelopeError::InvalidKeyLength {
        expected: KEY_LEN,
        got: mac_key.len(),
    })?;
    mac.update(iv);
    mac.update(ciphertext);
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Pick the IV: a caller IV is used as-is unless it is all zeros, in which
/// case (or when none is given) a random one is generated.
fn resolve_iv(iv: Option<&[u8]>) -> Result<[u8; IV_LEN], EnvelopeError> {
    let mut out = [0u8; IV_LEN];
    match iv {
        Some(iv) if iv.len() != IV_LEN => return Err(EnvelopeError::InvalidIvLength(iv.len())),
        Some(iv) if iv.iter().any(|b| *b != 0) => out.copy_from_slice(iv),
        _ => getrandom::getrandom(&mut out).map_err(|_| EnvelopeError::RngError)?,
    }
    Ok(out)
}

/// Strip PKCS#7 padding. Only the pad length byte is validated, as the
/// deployed decoders do.
fn strip_padding(mut plaintext: Vec<u8>) -> Result<Vec<u8>, EnvelopeError> {
    let pad_len = match plaintext.last() {
        Some(&b) => usize::from(b),
        None => return Err(EnvelopeError::EmptyPlaintext),
    };
    if pad_len == 0 || pad_len > BLOCK_LEN || pad_len > plaintext.len() {
        return Err(EnvelopeError::InvalidPadding);
    }
    plaintext.truncate(plaintext.len() - pad_len);
    if plaintext.is_empty() {
        return Err(EnvelopeError::EmptyPlaintext);
    }
    Ok(plaintext)
}

/// Encrypt `plaintext` into an [`Envelope`].
///
/// A plaintext that is already block aligned gains a full block of padding.
pub fn encrypt(
    plaintext: &[u8],
    cipher_key: &[u8],
    mac_key: &[u8],
    iv: Option<&[u8]>,
) -> Result<Envelope, EnvelopeError> {
    check_key(cipher_key)?;
    check_key(mac_key)?;
    if plaintext.is_empty() {
        return Err(EnvelopeError::EmptyPlaintext);
    }
    let iv = resolve_iv(iv)?;

    let cipher = Aes256CbcEnc::new_from_slices(cipher_key, &iv).map_err(|_| {
        EnvelopeError::InvalidKeyLength {
            expected: KEY_LEN,
            got: cipher_key.len(),
        }
    })?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let mac = compute_mac(mac_key, &iv, &ciphertext)?;

    tracing::trace!(
        plaintext_len = plaintext.len(),
        ciphertext_len = ciphertext.len(),
        "sealed envelope"
    );

    Ok(Envelope { iv, ciphertext, mac })
}

/// Verify the MAC, then decrypt. Nothing is decrypted unless the MAC matches.
pub fn decrypt(
    envelope: &Envelope,
    cipher_key: &[u8],
    mac_key: &[u8],
) -> Result<Vec<u8>, EnvelopeError> {
    check_key(cipher_key)?;
    check_key(mac_key)?;

    let expected = compute_mac(mac_key, &envelope.iv, &envelope.ciphertext)?;
    if !constant_time_compare(&expected, &envelope.mac) {
        tracing::debug!(ciphertext_len = envelope.ciphertext.len(), "envelope MAC mismatch");
        return Err(EnvelopeError::MacInvalid);
    }

    let cipher = Aes256CbcDec::new_from_slices(cipher_key, &envelope.iv).map_err(|_| {
        EnvelopeError::InvalidKeyLength {
            expected: KEY_LEN,
            got: cipher_key.len(),
        }
    })?;
    let padded = cipher
        .decrypt_padded_vec_mut::<NoPadding>(&envelope.ciphertext)
        .map_err(|_| EnvelopeError::InvalidPadding)?;

    strip_padding(padded)
}

/// Encrypt with derived keys and return wire bytes.
pub fn seal(plaintext: &[u8], keys: &DerivedKeys, iv: Option<&[u8]>) -> Result<Vec<u8>, EnvelopeError> {
    encrypt(plaintext, keys.cipher_key(), keys.mac_key(), iv).map(|env| env.to_bytes())
}

/// Parse wire bytes and decrypt with derived keys.
pub fn open(bytes: &[u8], keys: &DerivedKeys) -> Result<Vec<u8>, EnvelopeError> {
    let envelope = Envelope::from_bytes(bytes)?;
    decrypt(&envelope, keys.cipher_key(), keys.mac_key())
}
