//! secp256k1 account keys and their text encodings.
//!
//! Public keys are read in the legacy `FIO…` / `EOS…` form or the typed
//! `PUB_K1_…` form and always written back as `FIO…`. Private keys are read
//! as WIF or `PVT_K1_…`.

use std::fmt;
use std::str::FromStr;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroizing;

use crate::hash::{ripemd160, sha256d};

/// Prefix written on every public key this crate renders.
pub const PUBLIC_KEY_PREFIX: &str = "FIO";

const LEGACY_PUBLIC_PREFIXES: [&str; 2] = ["FIO", "EOS"];
const TYPED_PUBLIC_PREFIX: &str = "PUB_K1_";
const TYPED_PRIVATE_PREFIX: &str = "PVT_K1_";
const K1_SUFFIX: &[u8] = b"K1";
const WIF_VERSION: u8 = 0x80;

pub const PUBLIC_KEY_LEN: usize = 33;
pub const PRIVATE_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

/// Error type for key parsing and key agreement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),
    #[error("key derivation failed")]
    KeyDerivationFailed,
}

/// A secp256k1 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    /// Construct from a 33-byte compressed SEC1 point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(KeyError::InvalidKey("public key must be a 33-byte compressed point"));
        }
        if !matches!(bytes[0], 0x02 | 0x03) {
            return Err(KeyError::InvalidKey("public key must use a compressed point tag"));
        }
        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidKey("public key is not a secp256k1 point"))
    }

    /// Compressed SEC1 encoding.
    pub fn to_compressed(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.0.to_encoded_point(true);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// `PUB_K1_` text form.
    pub fn to_typed_string(&self) -> String {
        let raw = self.to_compressed();
        format!(
            "{TYPED_PUBLIC_PREFIX}{}",
            encode_checked(&raw, k1_checksum(&raw))
        )
    }

    pub(crate) fn as_k256(&self) -> &k256::PublicKey {
        &self.0
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(body) = s.strip_prefix(TYPED_PUBLIC_PREFIX) {
            let raw = decode_checked(body, PUBLIC_KEY_LEN, k1_checksum)?;
            return Self::from_sec1_bytes(&raw);
        }
        let body = LEGACY_PUBLIC_PREFIXES
            .iter()
            .find_map(|prefix| s.strip_prefix(prefix))
            .ok_or(KeyError::InvalidKey("unknown public key prefix"))?;
        let raw = decode_checked(body, PUBLIC_KEY_LEN, legacy_checksum)?;
        Self::from_sec1_bytes(&raw)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.to_compressed();
        write!(
            f,
            "{PUBLIC_KEY_PREFIX}{}",
            encode_checked(&raw, legacy_checksum(&raw))
        )
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_string()).finish()
    }
}

/// A secp256k1 private key. The scalar is zeroized on drop.
#[derive(Clone)]
pub struct PrivateKey(k256::SecretKey);

impl PrivateKey {
    /// Construct from a 32-byte big-endian scalar. Zero and out-of-range
    /// scalars are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(KeyError::InvalidKey("private key must be 32 bytes"));
        }
        k256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidKey("private key is not a valid secp256k1 scalar"))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    /// Wallet import format: base58(0x80 || scalar || sha256d[..4]).
    pub fn to_wif(&self) -> String {
        let mut payload = Zeroizing::new(Vec::with_capacity(1 + PRIVATE_KEY_LEN));
        payload.push(WIF_VERSION);
        payload.extend_from_slice(&self.0.to_bytes());
        let checksum = wif_checksum(&payload);
        encode_checked(&payload, checksum)
    }

    /// `PVT_K1_` text form.
    pub fn to_typed_string(&self) -> String {
        let mut raw = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        raw.copy_from_slice(&self.0.to_bytes());
        format!(
            "{TYPED_PRIVATE_PREFIX}{}",
            encode_checked(&raw[..], k1_checksum(&raw[..]))
        )
    }

    pub(crate) fn as_k256(&self) -> &k256::SecretKey {
        &self.0
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(body) = s.strip_prefix(TYPED_PRIVATE_PREFIX) {
            let raw = decode_checked(body, PRIVATE_KEY_LEN, k1_checksum)?;
            return Self::from_bytes(&raw);
        }
        let payload = decode_checked(s, 1 + PRIVATE_KEY_LEN, wif_checksum)?;
        if payload[0] != WIF_VERSION {
            return Err(KeyError::InvalidKey("unsupported WIF version byte"));
        }
        Self::from_bytes(&payload[1..])
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public_key().to_string())
            .finish_non_exhaustive()
    }
}

fn legacy_checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    first4(&ripemd160(&[payload]))
}

fn k1_checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    first4(&ripemd160(&[payload, K1_SUFFIX]))
}

fn wif_checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    first4(&sha256d(payload))
}

fn first4(digest: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

fn encode_checked(payload: &[u8], checksum: [u8; CHECKSUM_LEN]) -> String {
    let mut buf = Zeroizing::new(Vec::with_capacity(payload.len() + CHECKSUM_LEN));
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum);
    bs58::encode(buf.as_slice()).into_string()
}

/// Decode base58 text into `payload_len` bytes followed by a 4-byte checksum
/// and verify the checksum. Returns the payload.
fn decode_checked(
    text: &str,
    payload_len: usize,
    checksum: fn(&[u8]) -> [u8; CHECKSUM_LEN],
) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let mut decoded = Zeroizing::new(
        bs58::decode(text)
            .into_vec()
            .map_err(|_| KeyError::InvalidKey("key text is not base58"))?,
    );
    if decoded.len() != payload_len + CHECKSUM_LEN {
        return Err(KeyError::InvalidKey("decoded key has the wrong length"));
    }
    let (payload, claimed) = decoded.split_at(payload_len);
    if checksum(payload) != claimed {
        return Err(KeyError::InvalidKey("key checksum mismatch"));
    }
    decoded.truncate(payload_len);
    Ok(decoded)
}
