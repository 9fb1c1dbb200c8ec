//! ECDH key agreement and key stretching for content encryption.
//!
//! The raw secret is the x-coordinate of `d·Q` on secp256k1. It is hashed
//! with SHA-512 once (the "secret hash" other implementations expose), then
//! hashed again; the second digest is split into a 32-byte cipher key and a
//! 32-byte MAC key. The double hash matches the deployed wallet SDKs.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::hash::sha512;
use crate::keys::{KeyError, PrivateKey, PublicKey};
use crate::utils::constant_time_compare;

pub const KEY_LEN: usize = 32;

/// Raw ECDH output and its first SHA-512 digest.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    raw: [u8; 32],
    hash: [u8; 64],
}

impl SharedSecret {
    /// Diffie-Hellman between a local private key and a remote public key.
    pub fn compute(local: &PrivateKey, remote: &PublicKey) -> Result<Self, KeyError> {
        let shared = k256::ecdh::diffie_hellman(
            local.as_k256().to_nonzero_scalar(),
            remote.as_k256().as_affine(),
        );
        let raw: [u8; 32] = shared
            .raw_secret_bytes()
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::KeyDerivationFailed)?;
        let hash = sha512(&raw);
        Ok(Self { raw, hash })
    }

    /// The x-coordinate of the shared point.
    pub fn raw(&self) -> &[u8; 32] {
        &self.raw
    }

    /// SHA-512 of the raw secret.
    pub fn hash(&self) -> &[u8; 64] {
        &self.hash
    }

    pub fn derive_keys(&self) -> DerivedKeys {
        DerivedKeys::from_secret_hash(&self.hash)
    }
}

/// Cipher and MAC keys stretched from a shared secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    cipher_key: [u8; KEY_LEN],
    mac_key: [u8; KEY_LEN],
}

impl DerivedKeys {
    /// Split `sha512(secret_hash)` into `cipher_key = [0..32]` and
    /// `mac_key = [32..64]`.
    pub fn from_secret_hash(secret_hash: &[u8; 64]) -> Self {
        let digest = Zeroizing::new(sha512(secret_hash));
        let mut cipher_key = [0u8; KEY_LEN];
        let mut mac_key = [0u8; KEY_LEN];
        cipher_key.copy_from_slice(&digest[..KEY_LEN]);
        mac_key.copy_from_slice(&digest[KEY_LEN..]);
        Self { cipher_key, mac_key }
    }

    pub fn cipher_key(&self) -> &[u8; KEY_LEN] {
        &self.cipher_key
    }

    pub fn mac_key(&self) -> &[u8; KEY_LEN] {
        &self.mac_key
    }
}

impl PartialEq for DerivedKeys {
    fn eq(&self, other: &Self) -> bool {
        constant_time_compare(&self.cipher_key, &other.cipher_key)
            & constant_time_compare(&self.mac_key, &other.mac_key)
    }
}

impl Eq for DerivedKeys {}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKeys(..)")
    }
}

/// Derive content keys from a local private key and the counterparty's
/// public key text (`FIO…`, `EOS…` or `PUB_K1_…`).
pub fn derive(local: &PrivateKey, remote_public: &str) -> Result<DerivedKeys, KeyError> {
    let remote: PublicKey = remote_public.parse()?;
    derive_keys(local, &remote)
}

/// Same as [`derive`] for an already parsed public key.
pub fn derive_keys(local: &PrivateKey, remote: &PublicKey) -> Result<DerivedKeys, KeyError> {
    let secret = SharedSecret::compute(local, remote)?;
    Ok(secret.derive_keys())
}
