//! Verification of partial and aggregated MuSig signatures.

use crate::curve::{CurvePoint, Scalar};
use crate::error::SchnorrError;
use crate::musig::MuSig;
use crate::nonce::PublicNonce;
use crate::schnorr::{PublicKey, Signature};
use crate::types::{PartialSignature, SessionCache};

impl MuSig {
    /// Checks one signer's contribution against the shared session.
    ///
    /// With `Rⱼ = R1ⱼ + b·R2ⱼ` and `e' = e·cⱼ` (each negated to follow the parity
    /// of the final nonce and of the aggregated key), accepts iff
    /// `sⱼ·G = e'·Pⱼ + Rⱼ`. A [`PartialSignature`] is below `n` by construction.
    pub fn partial_sig_verify(
        &self,
        session_cache: &SessionCache,
        key_coefficient: &Scalar,
        public_key: &PublicKey,
        public_nonce: &PublicNonce,
        partial_signature: &PartialSignature,
    ) -> bool {
        let schnorr = self.schnorr();
        let s = partial_signature.scalar();

        let r_j = public_nonce
            .r2
            .multiply(&session_cache.b)
            .add(&public_nonce.r1);
        let r_j = if session_cache.final_nonce_parity {
            r_j.negate()
        } else {
            r_j
        };

        let e = session_cache.challenge * key_coefficient;
        let e = if session_cache.public_key_parity { -e } else { e };

        schnorr
            .mul_g(&-*s)
            .add(&public_key.point().multiply(&e))
            .add(&r_j)
            .is_infinity()
    }

    /// Recomputes the aggregated key of `public_keys` (in the given order) and
    /// verifies `signature` under it.
    pub fn verify_aggregated(
        &self,
        public_keys: &[PublicKey],
        digest: &[u8],
        signature: &Signature,
    ) -> Result<bool, SchnorrError> {
        let ctx = self.key_aggregation(public_keys)?;
        self.schnorr()
            .verify_digest(signature, digest, ctx.aggregated.public_key.as_bytes())
    }
}
