//! Nonce generation, encoding and aggregation for MuSig.
//!
//! Every signer holds two secret scalars `k1, k2` and publishes `R1 = k1·G`,
//! `R2 = k2·G` as two compressed points (66 bytes). After all public nonces are
//! collected they are summed component-wise and mixed with
//!
//! ```text
//! b = H_tag("MuSig/noncecoef", aggnonce || X.x || m) mod n
//! R = R1 + b·R2
//! ```

use std::fmt;

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::challenge::{TAG_MUSIG_NONCE, TAG_MUSIG_NONCECOEF, hash_to_scalar, tagged_hash_parts};
use crate::curve::{CurvePoint, Point, Scalar, scalar_from_bytes, scalar_to_bytes};
use crate::error::{ParseError, RangeError, SchnorrError};
use crate::musig::MuSig;
use crate::schnorr::{PrivateKey, Schnorr};
use crate::types::{AggregatedNonce, AggregatedPublicKey};

pub const COMPRESSED_POINT_SIZE: usize = 33;
pub const PUBLIC_NONCE_SIZE: usize = 2 * COMPRESSED_POINT_SIZE;
pub const SECRET_NONCE_SIZE: usize = 64;

const PREFIX_EVEN: u8 = 0x02;
const PREFIX_ODD: u8 = 0x03;

/// `prefix || x(point)` with prefix `0x02` for even y and `0x03` for odd y.
pub fn encode_compressed(point: &Point) -> Result<[u8; COMPRESSED_POINT_SIZE], SchnorrError> {
    point.to_compressed().ok_or(SchnorrError::PointAtInfinity)
}

pub fn decode_compressed(schnorr: &Schnorr, bytes: &[u8]) -> Result<Point, SchnorrError> {
    if bytes.len() != COMPRESSED_POINT_SIZE {
        return Err(ParseError::Length {
            expected: COMPRESSED_POINT_SIZE,
            got: bytes.len(),
        }
        .into());
    }
    let even = schnorr.lift_x(&bytes[1..])?;
    match bytes[0] {
        PREFIX_EVEN => Ok(even),
        PREFIX_ODD => Ok(even.negate()),
        other => Err(ParseError::Prefix(other).into()),
    }
}

/// The two secret nonce scalars, each in `[1, N-1]`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretNonce {
    pub(crate) k1: Scalar,
    pub(crate) k2: Scalar,
}

impl SecretNonce {
    pub fn to_bytes(&self) -> [u8; SECRET_NONCE_SIZE] {
        let mut out = [0u8; SECRET_NONCE_SIZE];
        out[..32].copy_from_slice(&scalar_to_bytes(&self.k1));
        out[32..].copy_from_slice(&scalar_to_bytes(&self.k2));
        out
    }
}

impl fmt::Debug for SecretNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretNonce(..)")
    }
}

/// The two public nonce points `(R1, R2)`.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicNonce {
    pub r1: Point,
    pub r2: Point,
}

impl fmt::Debug for PublicNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicNonce({:?}, {:?})", self.r1, self.r2)
    }
}

/// A signer's secret nonce and the matching public nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoncePair {
    pub secret: SecretNonce,
    pub public: PublicNonce,
}

/// Inputs to nonce derivation. Only `session_id` is required; every optional
/// field that is supplied is bound into both nonce scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonceGenInputs<'a> {
    /// Must be unique per call; use [`NonceGenInputs::random`] unless the caller
    /// has its own source.
    pub session_id: [u8; 32],
    pub digest: Option<&'a [u8; 32]>,
    pub private_key: Option<&'a PrivateKey>,
    pub aggregated_public_key: Option<&'a [u8; 32]>,
    pub extra_input: Option<&'a [u8; 32]>,
}

impl<'a> NonceGenInputs<'a> {
    /// Inputs with a session id drawn from the operating system's random source.
    pub fn random() -> Result<Self, SchnorrError> {
        let mut session_id = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut session_id)
            .map_err(|_| SchnorrError::Randomness)?;
        Ok(NonceGenInputs {
            session_id,
            ..Default::default()
        })
    }

    /// `session_id || (len || field)*`, where `len` is 32 for a present field
    /// and 0 for an absent one.
    fn seed_material(&self) -> Vec<u8> {
        let fields: [Option<&[u8; 32]>; 4] = [
            self.digest,
            self.private_key.map(PrivateKey::as_bytes),
            self.aggregated_public_key,
            self.extra_input,
        ];
        let mut buf = Vec::with_capacity(32 + fields.len() * 33);
        buf.extend_from_slice(&self.session_id);
        for field in fields {
            match field {
                Some(bytes) => {
                    buf.push(32);
                    buf.extend_from_slice(bytes);
                }
                None => buf.push(0),
            }
        }
        buf
    }
}

impl MuSig {
    /// Derives `k1 = H(seed || 0)`, `k2 = H(seed || 1)` with
    /// `seed = H_tag("MuSig/nonce", session_id || fields)`.
    ///
    /// # Parameters
    /// - `inputs`: the session id plus any of message, private key, aggregated
    ///   key and extra input. A session id must never repeat for one key.
    ///
    /// # Returns
    /// The secret scalars `(k1, k2)` and the public nonce `(k1·G, k2·G)`.
    /// Fails with [`RangeError::Nonce`] if either scalar reduces to zero.
    ///
    /// # Example
    /// ```rust
    /// # use bip340_musig::{CurveId, CurveRegistry, MuSig, NonceGenInputs, Schnorr};
    /// let schnorr = Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1)?;
    /// let musig = MuSig::new(schnorr.clone());
    /// let key = schnorr.generate_private_key(b"alice")?;
    /// let digest = [1u8; 32];
    /// let pair = musig.generate_nonce(&NonceGenInputs {
    ///     digest: Some(&digest),
    ///     private_key: Some(&key),
    ///     ..NonceGenInputs::random()?
    /// })?;
    /// let encoded = musig.encode_public_nonce(&pair.public)?;
    /// assert_eq!(musig.parse_public_nonce(&encoded)?, pair.public);
    /// # Ok::<(), bip340_musig::SchnorrError>(())
    /// ```
    pub fn generate_nonce(&self, inputs: &NonceGenInputs<'_>) -> Result<NoncePair, SchnorrError> {
        let schnorr = self.schnorr();
        let material = inputs.seed_material();
        let seed = tagged_hash_parts(TAG_MUSIG_NONCE, &[&material[..]]);
        let mut scalars = [Scalar::ZERO; 2];
        for (i, k) in scalars.iter_mut().enumerate() {
            let h = tagged_hash_parts(TAG_MUSIG_NONCE, &[&seed[..], &[i as u8][..]]);
            *k = hash_to_scalar(&h);
            if bool::from(k.is_zero()) {
                return Err(RangeError::Nonce.into());
            }
        }
        let [k1, k2] = scalars;
        let public = PublicNonce {
            r1: schnorr.mul_g(&k1).normalize(),
            r2: schnorr.mul_g(&k2).normalize(),
        };
        Ok(NoncePair {
            secret: SecretNonce { k1, k2 },
            public,
        })
    }

    pub fn parse_secret_nonce(&self, bytes: &[u8]) -> Result<NoncePair, SchnorrError> {
        if bytes.len() != SECRET_NONCE_SIZE {
            return Err(ParseError::Length {
                expected: SECRET_NONCE_SIZE,
                got: bytes.len(),
            }
            .into());
        }
        let schnorr = self.schnorr();
        let mut halves = [Scalar::ZERO; 2];
        for (k, chunk) in halves.iter_mut().zip(bytes.chunks_exact(32)) {
            let mut buf = [0u8; 32];
            buf.copy_from_slice(chunk);
            *k = scalar_from_bytes(&buf)
                .filter(|k| !bool::from(k.is_zero()))
                .ok_or(RangeError::Nonce)?;
        }
        let [k1, k2] = halves;
        let public = PublicNonce {
            r1: schnorr.mul_g(&k1).normalize(),
            r2: schnorr.mul_g(&k2).normalize(),
        };
        Ok(NoncePair {
            secret: SecretNonce { k1, k2 },
            public,
        })
    }

    pub fn parse_public_nonce(&self, bytes: &[u8]) -> Result<PublicNonce, SchnorrError> {
        if bytes.len() != PUBLIC_NONCE_SIZE {
            return Err(ParseError::Length {
                expected: PUBLIC_NONCE_SIZE,
                got: bytes.len(),
            }
            .into());
        }
        let schnorr = self.schnorr();
        Ok(PublicNonce {
            r1: decode_compressed(schnorr, &bytes[..COMPRESSED_POINT_SIZE])?,
            r2: decode_compressed(schnorr, &bytes[COMPRESSED_POINT_SIZE..])?,
        })
    }

    /// 66-byte encoding `compressed(R1) || compressed(R2)`.
    pub fn encode_public_nonce(&self, nonce: &PublicNonce) -> Result<[u8; PUBLIC_NONCE_SIZE], SchnorrError> {
        let mut out = [0u8; PUBLIC_NONCE_SIZE];
        out[..COMPRESSED_POINT_SIZE].copy_from_slice(&encode_compressed(&nonce.r1)?);
        out[COMPRESSED_POINT_SIZE..].copy_from_slice(&encode_compressed(&nonce.r2)?);
        Ok(out)
    }

    /// Sums the signers' `R1` and `R2` separately, derives `b` and the final
    /// nonce `R = R1 + b·R2`.
    ///
    /// # Parameters
    /// - `public_nonces`: one public nonce per signer, in any order.
    /// - `aggregated_public_key`: output of key aggregation; its x-only bytes are
    ///   bound into `b`.
    /// - `message`: the 32-byte digest being signed.
    ///
    /// # Returns
    /// The component sums (a sum at infinity is replaced by `G`), `b`, `x(R)`
    /// and the parity of `R`.
    ///
    /// # Example
    /// ```rust
    /// # use bip340_musig::{CurveId, CurveRegistry, MuSig, NonceGenInputs, Schnorr};
    /// let schnorr = Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1)?;
    /// let musig = MuSig::new(schnorr.clone());
    /// let key = schnorr.derive_public_key(&schnorr.generate_private_key(b"alice")?)?;
    /// let ctx = musig.key_aggregation(&[key])?;
    /// let pair = musig.generate_nonce(&NonceGenInputs::random()?)?;
    /// let agg = musig.aggregate_public_nonces(&[pair.public.clone()], &ctx.aggregated, &[0u8; 32])?;
    /// assert_eq!(agg.r1, pair.public.r1);
    /// # Ok::<(), bip340_musig::SchnorrError>(())
    /// ```
    pub fn aggregate_public_nonces(
        &self,
        public_nonces: &[PublicNonce],
        aggregated_public_key: &AggregatedPublicKey,
        message: &[u8; 32],
    ) -> Result<AggregatedNonce, SchnorrError> {
        if public_nonces.is_empty() {
            return Err(SchnorrError::EmptyInput("public nonces"));
        }
        let schnorr = self.schnorr();

        let mut r1 = schnorr.infinity();
        let mut r2 = schnorr.infinity();
        for nonce in public_nonces {
            r1 = r1.add(&nonce.r1);
            r2 = r2.add(&nonce.r2);
        }
        let substitute = |p: Point| {
            if p.is_infinity() {
                *schnorr.generator()
            } else {
                p.normalize()
            }
        };
        let r1 = substitute(r1);
        let r2 = substitute(r2);

        let agg_nonce = self.encode_public_nonce(&PublicNonce { r1, r2 })?;
        let pk_x = aggregated_public_key.to_bytes();
        let h = tagged_hash_parts(TAG_MUSIG_NONCECOEF, &[&agg_nonce[..], &pk_x[..], &message[..]]);
        let b = hash_to_scalar(&h);

        let r = r2.multiply(&b).add(&r1).normalize();
        let final_nonce = schnorr.x_only(&r)?;
        Ok(AggregatedNonce {
            final_nonce_parity: !r.has_even_y(),
            final_nonce,
            b,
            r1,
            r2,
        })
    }
}
