//! MuSig public key aggregation (KeyAgg).
//!
//! The aggregated key is `X = Σ cᵢ·Pᵢ` where every `Pᵢ` is the even-y lift of an
//! x-only key and the coefficients commit to the ordered key list:
//!
//! 1. `ell = H_tag("KeyAgg list", pk₁ || … || pkₙ)`.
//! 2. The "second key" is the first key that differs from `pk₁`, or 32 zero
//!    bytes if all keys are equal. No point has x = 0, so the sentinel never
//!    matches a real key.
//! 3. `cᵢ = 1` if `pkᵢ` is the second key, else `H_tag("KeyAgg coefficient", ell || pkᵢ) mod n`.
//!    This saves one scalar multiplication per signing session.
//! 4. If `X` has odd y it is negated and the parity flag is set.

use crate::challenge::{TAG_KEYAGG_COEFFICIENT, TAG_KEYAGG_LIST, hash_to_scalar, tagged_hash, tagged_hash_parts};
use crate::curve::{CurvePoint, Scalar};
use crate::error::SchnorrError;
use crate::musig::MuSig;
use crate::schnorr::PublicKey;
use crate::types::{AggregatedPublicKey, KeyAggContext};

/// Returned by [`get_second_public_key`] when every key equals the first.
pub const NO_SECOND_KEY: [u8; 32] = [0u8; 32];

/// `ell = H_tag("KeyAgg list", concat(public_keys))`.
///
/// # Parameters
/// - `public_keys`: x-only keys in aggregation order. Order matters; use
///   [`sort_public_keys`] when the parties have not agreed on one.
///
/// # Returns
/// The 32-byte key-list hash every coefficient commits to.
///
/// # Example
/// ```rust
/// # use bip340_musig::{CurveId, CurveRegistry, Schnorr, compute_ell};
/// let schnorr = Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1)?;
/// let a = schnorr.derive_public_key(&schnorr.generate_private_key(b"a")?)?;
/// let b = schnorr.derive_public_key(&schnorr.generate_private_key(b"b")?)?;
/// assert_ne!(compute_ell(&[a.clone(), b.clone()]), compute_ell(&[b, a]));
/// # Ok::<(), bip340_musig::SchnorrError>(())
/// ```
pub fn compute_ell(public_keys: &[PublicKey]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(public_keys.len() * 32);
    for pk in public_keys {
        buf.extend_from_slice(pk.as_bytes());
    }
    tagged_hash(TAG_KEYAGG_LIST, &buf)
}

/// The first key that differs from `public_keys[0]`, or [`NO_SECOND_KEY`].
pub fn get_second_public_key(public_keys: &[PublicKey]) -> [u8; 32] {
    let Some(first) = public_keys.first() else {
        return NO_SECOND_KEY;
    };
    public_keys
        .iter()
        .skip(1)
        .find(|pk| pk.as_bytes() != first.as_bytes())
        .map(PublicKey::to_bytes)
        .unwrap_or(NO_SECOND_KEY)
}

/// Lexicographic order of the x-only encodings.
pub fn sort_public_keys(public_keys: &mut [PublicKey]) {
    public_keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
}

impl MuSig {
    /// `1` for the second key, `H_tag("KeyAgg coefficient", ell || current_key) mod n` otherwise.
    pub fn compute_key_aggregation_coefficient(
        &self,
        ell: &[u8; 32],
        current_key: &[u8; 32],
        second_key: &[u8; 32],
    ) -> Scalar {
        if current_key == second_key {
            return Scalar::ONE;
        }
        let h = tagged_hash_parts(TAG_KEYAGG_COEFFICIENT, &[&ell[..], &current_key[..]]);
        hash_to_scalar(&h)
    }

    /// `X = Σ cᵢ·LiftX(pkᵢ)`, negated to even y if needed.
    ///
    /// # Parameters
    /// - `coefficients`: `coefficients[i]` multiplies `public_keys[i]`.
    /// - `public_keys`: the parsed participant keys.
    ///
    /// # Returns
    /// The even-y aggregated key and whether the raw sum was negated. Fails with
    /// [`SchnorrError::EmptyInput`] for no keys, [`SchnorrError::Arity`] when the
    /// slices differ in length and [`SchnorrError::PointAtInfinity`] when the sum
    /// cancels out.
    pub fn aggregate_public_keys(
        &self,
        coefficients: &[Scalar],
        public_keys: &[PublicKey],
    ) -> Result<AggregatedPublicKey, SchnorrError> {
        if public_keys.is_empty() {
            return Err(SchnorrError::EmptyInput("public keys"));
        }
        if coefficients.len() != public_keys.len() {
            return Err(SchnorrError::Arity {
                expected: public_keys.len(),
                got: coefficients.len(),
            });
        }

        let schnorr = self.schnorr();
        let mut x_agg = schnorr.infinity();
        for (pk, c) in public_keys.iter().zip(coefficients) {
            x_agg = x_agg.add(&pk.point().multiply(c));
        }
        let x_agg = x_agg.normalize();
        if x_agg.is_infinity() {
            return Err(SchnorrError::PointAtInfinity);
        }

        let parity = !x_agg.has_even_y();
        let point = if parity { x_agg.negate() } else { x_agg };
        let public_key = schnorr.parse_public_key(&schnorr.x_only(&point)?)?;
        Ok(AggregatedPublicKey { public_key, parity })
    }

    /// Runs the whole KeyAgg algorithm over `public_keys` in the given order.
    ///
    /// A single key is its own aggregate: its coefficient is 1.
    ///
    /// # Parameters
    /// - `public_keys`: participant keys in the agreed order. Repeated keys are
    ///   allowed and each occurrence gets its own coefficient.
    ///
    /// # Returns
    /// A [`KeyAggContext`] with `ell`, the second key, one coefficient per input
    /// key and the aggregated key.
    ///
    /// # Example
    /// ```rust
    /// # use bip340_musig::{CurveId, CurveRegistry, MuSig, Schnorr};
    /// let schnorr = Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1)?;
    /// let musig = MuSig::new(schnorr.clone());
    /// let keys = vec![
    ///     schnorr.derive_public_key(&schnorr.generate_private_key(b"alice")?)?,
    ///     schnorr.derive_public_key(&schnorr.generate_private_key(b"bob")?)?,
    /// ];
    /// let ctx = musig.key_aggregation(&keys)?;
    /// assert_eq!(ctx.coefficients.len(), 2);
    /// assert_eq!(ctx.second_key, keys[1].to_bytes());
    /// # Ok::<(), bip340_musig::SchnorrError>(())
    /// ```
    pub fn key_aggregation(&self, public_keys: &[PublicKey]) -> Result<KeyAggContext, SchnorrError> {
        let ell = compute_ell(public_keys);
        let second = get_second_public_key(public_keys);
        let coefficients: Vec<Scalar> = if public_keys.len() == 1 {
            vec![Scalar::ONE]
        } else {
            public_keys
                .iter()
                .map(|pk| self.compute_key_aggregation_coefficient(&ell, pk.as_bytes(), &second))
                .collect()
        };
        let aggregated = self.aggregate_public_keys(&coefficients, public_keys)?;
        Ok(KeyAggContext {
            ell,
            second_key: second,
            coefficients,
            aggregated,
        })
    }
}
