//! MuSig partial signing, signature aggregation and the in-process n-party flow.

use crate::curve::{CurvePoint, Scalar, scalar_from_bytes};
use crate::error::{MusigError, RangeError, SchnorrError};
use crate::musig::MuSig;
use crate::nonce::NonceGenInputs;
use crate::schnorr::{PrivateKey, PublicKey, Signature, check_length};
use crate::types::{AggregatedSignature, PartialSignature, SessionCache, SignerSession};

impl MuSig {
    /// Parses a 32-byte partial signature, requiring `s < n`.
    pub fn parse_partial_signature(&self, bytes: &[u8]) -> Result<PartialSignature, SchnorrError> {
        check_length(bytes, 32)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        let s = scalar_from_bytes(&buf).ok_or(RangeError::PartialSignature)?;
        Ok(PartialSignature(s))
    }

    /// `s = e·c·d + k1 + b·k2 mod n`.
    ///
    /// `d` is negated when the signer's own point and the aggregated key disagree
    /// on parity; both `k` are negated when the final nonce is odd. The session is
    /// consumed and the result is checked with
    /// [`partial_sig_verify`](MuSig::partial_sig_verify) before it is returned.
    ///
    /// # Parameters
    /// - `session`: this signer's key, key coefficient and nonce pair. Consumed,
    ///   so one nonce signs at most once.
    /// - `session_cache`: the values every signer of this session shares.
    ///
    /// # Returns
    /// This signer's partial signature, or
    /// [`MusigError::InternalConsistency`] if it fails its own verification.
    ///
    /// # Example
    /// ```rust
    /// # use bip340_musig::{CurveId, CurveRegistry, MuSig, NonceGenInputs, Schnorr};
    /// let schnorr = Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1)?;
    /// let musig = MuSig::new(schnorr.clone());
    /// let key = schnorr.generate_private_key(b"alice")?;
    /// let ctx = musig.key_aggregation(&[schnorr.derive_public_key(&key)?])?;
    /// let digest = [9u8; 32];
    ///
    /// let pair = musig.generate_nonce(&NonceGenInputs::random()?)?;
    /// let agg_nonce = musig.aggregate_public_nonces(&[pair.public.clone()], &ctx.aggregated, &digest)?;
    /// let e = musig.session_challenge(&agg_nonce, &ctx.aggregated, &digest);
    /// let cache = musig.initialize_session_cache(&agg_nonce, e, ctx.aggregated.parity);
    ///
    /// let session = musig.initialize_signer_session(key, ctx.coefficients[0], pair);
    /// let partial = musig.partial_sign(session, &cache)?;
    /// let signature = musig.aggregate_partial_signatures(&cache.final_nonce, &[partial])?;
    /// assert!(schnorr.verify_digest(&signature, &digest, ctx.aggregated.public_key.as_bytes())?);
    /// # Ok::<(), bip340_musig::MusigError>(())
    /// ```
    pub fn partial_sign(
        &self,
        session: SignerSession,
        session_cache: &SessionCache,
    ) -> Result<PartialSignature, MusigError> {
        let schnorr = self.schnorr();

        let d0 = *session.private_key.scalar();
        let p = schnorr.mul_g(&d0).normalize();
        let d = if p.has_even_y() == session_cache.public_key_parity {
            -d0
        } else {
            d0
        };
        let d = d * session.key_coefficient;

        let secret = &session.nonce.secret;
        let (k1, k2) = if session_cache.final_nonce_parity {
            (-secret.k1, -secret.k2)
        } else {
            (secret.k1, secret.k2)
        };

        let s = session_cache.challenge * d + k1 + session_cache.b * k2;
        let partial = PartialSignature(s);

        let public_key = schnorr.derive_public_key(&session.private_key)?;
        if !self.partial_sig_verify(
            session_cache,
            &session.key_coefficient,
            &public_key,
            &session.nonce.public,
            &partial,
        ) {
            tracing::error!(public_key = %public_key, "fresh partial signature failed verification");
            return Err(MusigError::InternalConsistency("partial signature self-check"));
        }
        Ok(partial)
    }

    /// `final_nonce || Σ sᵢ mod n`.
    ///
    /// # Parameters
    /// - `final_nonce`: `x(R)` from the session cache.
    /// - `partial_signatures`: one share per signer, in any order.
    ///
    /// # Returns
    /// The 64-byte BIP-340 signature. Fails with [`SchnorrError::EmptyInput`]
    /// when no share is given.
    pub fn aggregate_partial_signatures(
        &self,
        final_nonce: &[u8; 32],
        partial_signatures: &[PartialSignature],
    ) -> Result<Signature, SchnorrError> {
        if partial_signatures.is_empty() {
            return Err(SchnorrError::EmptyInput("partial signatures"));
        }
        let s = partial_signatures
            .iter()
            .fold(Scalar::ZERO, |acc, partial| acc + partial.scalar());
        Ok(Signature::from_parts(final_nonce, &s))
    }

    /// Runs the whole protocol for locally held keys, in the given order.
    ///
    /// Every partial signature is verified before aggregation, and the final
    /// signature is verified against the aggregated key.
    ///
    /// # Parameters
    /// - `private_keys`: every signer's key; their order fixes the key order.
    /// - `digest`: the 32-byte message.
    ///
    /// # Returns
    /// The signature and the aggregated key it verifies under.
    ///
    /// # Example
    /// ```rust
    /// # use bip340_musig::{CurveId, CurveRegistry, MuSig, Schnorr};
    /// let schnorr = Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1)?;
    /// let musig = MuSig::new(schnorr.clone());
    /// let keys = vec![schnorr.generate_private_key(b"a")?, schnorr.generate_private_key(b"b")?];
    /// let out = musig.musig_non_interactive(&keys, &[3u8; 32])?;
    /// assert!(schnorr.verify_digest(&out.signature, &[3u8; 32], out.aggregated_public_key.as_bytes())?);
    /// # Ok::<(), bip340_musig::MusigError>(())
    /// ```
    #[tracing::instrument(skip_all, name = "musig_non_interactive", fields(signers = private_keys.len()))]
    pub fn musig_non_interactive(
        &self,
        private_keys: &[PrivateKey],
        digest: &[u8; 32],
    ) -> Result<AggregatedSignature, MusigError> {
        if private_keys.is_empty() {
            return Err(SchnorrError::EmptyInput("private keys").into());
        }
        let schnorr = self.schnorr();

        let public_keys = private_keys
            .iter()
            .map(|d| schnorr.derive_public_key(d))
            .collect::<Result<Vec<PublicKey>, _>>()?;
        let ctx = self.key_aggregation(&public_keys)?;
        let agg_pk_bytes = ctx.aggregated.to_bytes();

        let mut sessions = Vec::with_capacity(private_keys.len());
        for (d, c) in private_keys.iter().zip(&ctx.coefficients) {
            let nonce = self.generate_nonce(&NonceGenInputs {
                digest: Some(digest),
                private_key: Some(d),
                aggregated_public_key: Some(&agg_pk_bytes),
                ..NonceGenInputs::random()?
            })?;
            sessions.push(self.initialize_signer_session(d.clone(), *c, nonce));
        }

        let public_nonces: Vec<_> = sessions.iter().map(|s| s.nonce.public.clone()).collect();
        let agg_nonce = self.aggregate_public_nonces(&public_nonces, &ctx.aggregated, digest)?;
        let challenge = self.session_challenge(&agg_nonce, &ctx.aggregated, digest);
        let cache = self.initialize_session_cache(&agg_nonce, challenge, ctx.aggregated.parity);
        tracing::debug!(
            aggregated_public_key = %ctx.aggregated.public_key,
            final_nonce = %hex::encode(agg_nonce.final_nonce),
            "session established"
        );

        let mut partials = Vec::with_capacity(sessions.len());
        for (i, session) in sessions.into_iter().enumerate() {
            let coefficient = session.key_coefficient;
            let public_nonce = session.nonce.public.clone();
            let partial = self.partial_sign(session, &cache)?;
            if !self.partial_sig_verify(&cache, &coefficient, &public_keys[i], &public_nonce, &partial) {
                tracing::warn!(signer = i, "partial signature failed verification");
                return Err(MusigError::InvalidPartialSignatures(vec![public_keys[i].to_string()]));
            }
            partials.push(partial);
        }

        let signature = self.aggregate_partial_signatures(&cache.final_nonce, &partials)?;
        let aggregated_public_key = ctx.aggregated.public_key;
        if !schnorr.verify_digest(&signature, digest, aggregated_public_key.as_bytes())? {
            tracing::error!("aggregated signature failed verification");
            return Err(MusigError::InternalConsistency("aggregated signature self-check"));
        }
        Ok(AggregatedSignature {
            signature,
            aggregated_public_key,
        })
    }
}
