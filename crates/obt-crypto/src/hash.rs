use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// sha256(sha256(data)), the WIF checksum digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    let mut h = Sha512::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 64];
    arr.copy_from_slice(&out);
    arr
}

/// RIPEMD-160 over the concatenation of `parts`.
///
/// Key text checksums are the first four bytes of this digest, with the
/// typed (`PUB_K1_` / `PVT_K1_`) forms appending the `K1` suffix as a part.
pub fn ripemd160(parts: &[&[u8]]) -> [u8; 20] {
    let mut h = Ripemd160::new();
    for part in parts {
        h.update(part);
    }
    let out = h.finalize();
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&out);
    arr
}
