//! Tagged hashing and the BIP-340 challenge.
//!
//! Every hash in this crate is domain separated:
//!
//! ```text
//! H_tag(m) = SHA256(SHA256(tag) || SHA256(tag) || m)
//! ```
//!
//! and the challenge shared by single-signer and MuSig signatures is
//!
//! ```text
//! e = H_tag("BIP0340/challenge", R.x || P.x || m) mod n
//! ```

use sha2::{Digest, Sha256};

use crate::curve::{Scalar, scalar_reduce};

pub const TAG_AUX: &str = "BIP0340/aux";
pub const TAG_NONCE: &str = "BIP0340/nonce";
pub const TAG_CHALLENGE: &str = "BIP0340/challenge";
pub const TAG_KEYAGG_LIST: &str = "KeyAgg list";
pub const TAG_KEYAGG_COEFFICIENT: &str = "KeyAgg coefficient";
pub const TAG_MUSIG_NONCE: &str = "MuSig/nonce";
pub const TAG_MUSIG_NONCECOEF: &str = "MuSig/noncecoef";

/// Domain-separated SHA-256.
///
/// # Example
/// ```rust
/// # use bip340_musig::tagged_hash;
/// let a = tagged_hash("KeyAgg list", b"abc");
/// let b = tagged_hash("KeyAgg coefficient", b"abc");
/// assert_ne!(a, b);
/// ```
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// Tagged hash over several byte strings, concatenated in order.
pub(crate) fn tagged_hash_parts(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Interprets a 32-byte hash as a big-endian integer reduced mod `n`.
pub(crate) fn hash_to_scalar(hash: &[u8; 32]) -> Scalar {
    scalar_reduce(hash)
}

/// Compute the challenge `e = H_tag("BIP0340/challenge", r_x || p_x || msg) mod n`.
///
/// Both `r_x` and `p_x` are x-only encodings, so the challenge does not depend
/// on the parity of either point.
pub fn compute_challenge(r_x: &[u8; 32], p_x: &[u8; 32], msg: &[u8]) -> Scalar {
    let digest = tagged_hash_parts(TAG_CHALLENGE, &[&r_x[..], &p_x[..], msg]);
    hash_to_scalar(&digest)
}
