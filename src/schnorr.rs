//! BIP-340 Schnorr signatures.
//!
//! [`Schnorr`] is bound to one curve at construction and provides key parsing
//! and derivation, `lift_x`, deterministic-nonce signing, verification and
//! batch verification. Keys and signatures use fixed-width big-endian
//! encodings of [`Schnorr::key_size`] bytes; public keys are x-only.

use std::fmt;
use std::sync::Arc;

use k256::AffinePoint;
use k256::elliptic_curve::group::GroupEncoding;
use num_bigint::BigUint;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng, TryRngCore};
use sha2::{Digest, Sha256};

use crate::challenge::{TAG_AUX, TAG_NONCE, compute_challenge, hash_to_scalar, tagged_hash, tagged_hash_parts};
use crate::curve::{
    CurveData, CurveId, CurvePoint, CurveRegistry, Point, Scalar, scalar_from_bytes, scalar_reduce_nonzero,
    scalar_to_bytes,
};
use crate::error::{ParseError, RangeError, SchnorrError};

pub(crate) fn check_length(bytes: &[u8], expected: usize) -> Result<(), ParseError> {
    if bytes.len() != expected {
        return Err(ParseError::Length {
            expected,
            got: bytes.len(),
        });
    }
    Ok(())
}

/// A validated secret scalar `d` with `1 <= d <= N-1`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    bytes: [u8; 32],
    scalar: Scalar,
}

impl PrivateKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.scalar
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// An x-only public key together with its lifted (even-y) point.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    x: [u8; 32],
    point: Point,
}

impl PublicKey {
    /// The 32-byte x-only encoding.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.x
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.x
    }

    /// The even-y point with this x-coordinate.
    pub fn point(&self) -> &Point {
        &self.point
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.x))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

/// A 64-byte BIP-340 signature: `x(R) || s`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        check_length(bytes, 64)?;
        let mut sig = [0u8; 64];
        sig.copy_from_slice(bytes);
        Ok(Signature(sig))
    }

    pub(crate) fn from_parts(r: &[u8; 32], s: &Scalar) -> Self {
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(r);
        sig[32..].copy_from_slice(&scalar_to_bytes(s));
        Signature(sig)
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// The x-only nonce half.
    pub fn r(&self) -> &[u8] {
        &self.0[..32]
    }

    /// The scalar half.
    pub fn s(&self) -> &[u8] {
        &self.0[32..]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}

/// Schnorr signing and verification over one registered curve.
#[derive(Debug, Clone)]
pub struct Schnorr {
    curve: Arc<CurveData>,
    key_size: usize,
}

impl Schnorr {
    /// Binds to the curve registered under `id`.
    pub fn new(registry: &CurveRegistry, id: CurveId) -> Result<Self, SchnorrError> {
        let curve = registry.get_curve_data(id)?;
        let key_size = (curve.p.bits() as usize).div_ceil(8);
        Ok(Schnorr { curve, key_size })
    }

    /// `ceil(bits(P) / 8)`, 32 for secp256k1.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn curve(&self) -> &CurveData {
        &self.curve
    }

    pub fn generator(&self) -> &Point {
        &self.curve.g
    }

    pub fn order(&self) -> &BigUint {
        &self.curve.n
    }

    pub fn field_characteristic(&self) -> &BigUint {
        &self.curve.p
    }

    /// Scalar multiple of the generator, `k·G`.
    pub fn mul_g(&self, k: &Scalar) -> Point {
        self.curve.g.multiply(k)
    }

    pub fn infinity(&self) -> Point {
        Point::INFINITY
    }

    /// Parses `d` and checks `1 <= d <= N-1`.
    pub fn validate_private_key(&self, d: &[u8; 32]) -> Result<Scalar, RangeError> {
        scalar_from_bytes(d)
            .filter(|k| !bool::from(k.is_zero()))
            .ok_or(RangeError::PrivateKey)
    }

    pub fn validate_public_key_x(&self, x: &[u8]) -> Result<(), RangeError> {
        if BigUint::from_bytes_be(x) >= self.curve.p {
            return Err(RangeError::PublicKey);
        }
        Ok(())
    }

    /// Splits a signature into `(r, s)` after checking `r < P` and `s < N`.
    pub fn validate_signature(&self, signature: &Signature) -> Result<([u8; 32], Scalar), RangeError> {
        if BigUint::from_bytes_be(signature.r()) >= self.curve.p {
            return Err(RangeError::SignatureR);
        }
        let mut r = [0u8; 32];
        r.copy_from_slice(signature.r());
        let mut s = [0u8; 32];
        s.copy_from_slice(signature.s());
        let s = scalar_from_bytes(&s).ok_or(RangeError::SignatureS)?;
        Ok((r, s))
    }

    /// 32-byte x-only encoding of a point.
    pub fn x_only(&self, point: &Point) -> Result<[u8; 32], SchnorrError> {
        point.affine_x().ok_or(SchnorrError::PointAtInfinity)
    }

    /// The even-y point whose x-coordinate is `x_bytes`.
    ///
    /// Decodes `0x02 || x` as a compressed point; a square root of `x³ + 7`
    /// must exist.
    pub fn lift_x(&self, x_bytes: &[u8]) -> Result<Point, SchnorrError> {
        check_length(x_bytes, self.key_size)?;
        self.validate_public_key_x(x_bytes)?;
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        compressed[1..].copy_from_slice(x_bytes);
        let point = Option::<AffinePoint>::from(AffinePoint::from_bytes((&compressed).into()))
            .ok_or(ParseError::NotOnCurve)?;
        let point = Point::from(point);
        if point.is_infinity() {
            return Err(SchnorrError::PointAtInfinity);
        }
        Ok(point)
    }

    pub fn parse_public_key(&self, bytes: &[u8]) -> Result<PublicKey, SchnorrError> {
        let point = self.lift_x(bytes)?;
        let mut x = [0u8; 32];
        x.copy_from_slice(bytes);
        Ok(PublicKey { x, point })
    }

    pub fn try_parse_public_key(&self, bytes: &[u8]) -> Option<PublicKey> {
        self.parse_public_key(bytes).ok()
    }

    pub fn parse_private_key(&self, bytes: &[u8]) -> Result<PrivateKey, SchnorrError> {
        check_length(bytes, self.key_size)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        let scalar = self.validate_private_key(&out)?;
        Ok(PrivateKey { bytes: out, scalar })
    }

    pub fn try_parse_private_key(&self, bytes: &[u8]) -> Option<PrivateKey> {
        self.parse_private_key(bytes).ok()
    }

    /// Draws 32 bytes from a CSPRNG seeded with `SHA256(seed)` and maps them
    /// into `[1, N-1]` as `(bytes mod (N-1)) + 1`.
    pub fn generate_private_key(&self, seed: &[u8]) -> Result<PrivateKey, SchnorrError> {
        let mut rng = StdRng::from_seed(Sha256::digest(seed).into());
        let mut buf = [0u8; 32];
        rng.fill_bytes(&mut buf);
        let scalar = scalar_reduce_nonzero(&buf);
        Ok(PrivateKey {
            bytes: scalar_to_bytes(&scalar),
            scalar,
        })
    }

    /// Draws a private key from the operating system's random source.
    pub fn random_private_key(&self) -> Result<PrivateKey, SchnorrError> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| SchnorrError::Randomness)?;
        self.generate_private_key(&seed)
    }

    /// `P = d·G` as an x-only key.
    pub fn derive_public_key(&self, private_key: &PrivateKey) -> Result<PublicKey, SchnorrError> {
        let point = self.mul_g(private_key.scalar()).normalize();
        let x = self.x_only(&point)?;
        let point = if point.has_even_y() { point } else { point.negate() };
        Ok(PublicKey { x, point })
    }

    /// The BIP-340 challenge `e` for nonce `r_x`, key `p_x` and message `digest`.
    pub fn challenge(&self, r_x: &[u8; 32], p_x: &[u8; 32], digest: &[u8]) -> Scalar {
        compute_challenge(r_x, p_x, digest)
    }

    /// Signs with 32 bytes of fresh auxiliary randomness.
    pub fn sign_digest(&self, private_key: &PrivateKey, digest: &[u8]) -> Result<Signature, SchnorrError> {
        self.sign_digest_with_aux_random_data(private_key, digest, None)
    }

    /// BIP-340 signing with deterministic nonce derivation.
    ///
    /// When `aux_rand` is `None`, 32 bytes are drawn from the OS random source.
    /// The produced signature is verified before it is returned.
    #[tracing::instrument(skip_all, name = "schnorr_sign")]
    pub fn sign_digest_with_aux_random_data(
        &self,
        private_key: &PrivateKey,
        digest: &[u8],
        aux_rand: Option<&[u8; 32]>,
    ) -> Result<Signature, SchnorrError> {
        let d0 = self.validate_private_key(private_key.as_bytes())?;

        let p = self.mul_g(&d0).normalize();
        let p_x = self.x_only(&p)?;
        let d = if p.has_even_y() { d0 } else { -d0 };

        let aux = match aux_rand {
            Some(aux) => *aux,
            None => {
                let mut buf = [0u8; 32];
                OsRng
                    .try_fill_bytes(&mut buf)
                    .map_err(|_| SchnorrError::Randomness)?;
                buf
            }
        };
        let aux_hash = tagged_hash(TAG_AUX, &aux);
        let mut t = scalar_to_bytes(&d);
        for (t_byte, h_byte) in t.iter_mut().zip(aux_hash.iter()) {
            *t_byte ^= h_byte;
        }

        let nonce_hash = tagged_hash_parts(TAG_NONCE, &[&t[..], &p_x[..], digest]);
        let k0 = hash_to_scalar(&nonce_hash);
        if bool::from(k0.is_zero()) {
            return Err(SchnorrError::ZeroNonce);
        }
        let r = self.mul_g(&k0).normalize();
        let r_x = self.x_only(&r)?;
        let k = if r.has_even_y() { k0 } else { -k0 };

        let e = self.challenge(&r_x, &p_x, digest);
        let s = k + e * d;
        let signature = Signature::from_parts(&r_x, &s);

        if !self.verify_digest(&signature, digest, &p_x)? {
            tracing::error!("freshly produced signature failed verification");
            return Err(SchnorrError::InternalConsistency("signature self-check"));
        }
        Ok(signature)
    }

    /// Lifts a public key for verification. A well-formed x-coordinate with no
    /// curve point yields `None`; length and range violations are errors.
    fn lift_verification_key(&self, public_key: &[u8]) -> Result<Option<Point>, SchnorrError> {
        match self.lift_x(public_key) {
            Ok(point) => Ok(Some(point)),
            Err(SchnorrError::Parse(ParseError::NotOnCurve)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// BIP-340 verification.
    ///
    /// Wrong lengths and out-of-range values (`x(P) >= P`, `r >= P`, `s >= N`)
    /// are errors. Everything else that does not verify, including a public key
    /// with no point on the curve, returns `Ok(false)`.
    pub fn verify_digest(
        &self,
        signature: &Signature,
        digest: &[u8],
        public_key: &[u8],
    ) -> Result<bool, SchnorrError> {
        let (r_x, s) = self.validate_signature(signature)?;
        let Some(p) = self.lift_verification_key(public_key)? else {
            tracing::warn!("public key is not on the curve");
            return Ok(false);
        };
        let mut p_x = [0u8; 32];
        p_x.copy_from_slice(public_key);
        let e = self.challenge(&r_x, &p_x, digest);

        // R = s·G - e·P
        let big_r = self.mul_g(&s).add(&p.multiply(&e).negate()).normalize();
        if big_r.is_infinity() || !big_r.has_even_y() {
            return Ok(false);
        }
        Ok(big_r.affine_x() == Some(r_x))
    }

    /// Verifies many signatures at once with a random linear combination.
    ///
    /// Checks `(Σ aᵢ·sᵢ)·G = Σ aᵢ·Rᵢ + (aᵢ·eᵢ)·Pᵢ` with `a₀ = 1` and the other
    /// `aᵢ` random in `[1, N-1]`. Errors follow [`Schnorr::verify_digest`].
    #[tracing::instrument(skip_all, name = "schnorr_batch_verify", fields(count = signatures.len()))]
    pub fn batch_verify_digest(
        &self,
        signatures: &[Signature],
        digests: &[&[u8]],
        public_keys: &[&[u8]],
    ) -> Result<bool, SchnorrError> {
        if signatures.is_empty() {
            return Err(SchnorrError::EmptyInput("signatures"));
        }
        for got in [digests.len(), public_keys.len()] {
            if got != signatures.len() {
                return Err(SchnorrError::Arity {
                    expected: signatures.len(),
                    got,
                });
            }
        }

        let mut rng = rand::rng();
        let mut left = Scalar::ZERO;
        let mut right = self.infinity();
        for (i, ((signature, digest), public_key)) in signatures
            .iter()
            .zip(digests)
            .zip(public_keys)
            .enumerate()
        {
            let (r_x, s) = self.validate_signature(signature)?;
            let Some(p) = self.lift_verification_key(public_key)? else {
                tracing::warn!(index = i, "public key is not on the curve");
                return Ok(false);
            };
            let big_r = match self.lift_x(&r_x) {
                Ok(point) => point,
                Err(_) => {
                    tracing::warn!(index = i, "signature nonce is not on the curve");
                    return Ok(false);
                }
            };
            let mut p_x = [0u8; 32];
            p_x.copy_from_slice(public_key);
            let e = self.challenge(&r_x, &p_x, digest);

            let a = if i == 0 {
                Scalar::ONE
            } else {
                let mut buf = [0u8; 32];
                rng.fill_bytes(&mut buf);
                scalar_reduce_nonzero(&buf)
            };

            left += a * s;
            right = right.add(&big_r.multiply(&a)).add(&p.multiply(&(a * e)));
        }

        let valid = self.mul_g(&left) == right;
        if !valid {
            tracing::warn!("batch verification failed");
        }
        Ok(valid)
    }
}
