//! Session state shared by all signers of one message, and per-signer state.

use crate::curve::Scalar;
use crate::musig::MuSig;
use crate::nonce::NoncePair;
use crate::schnorr::PrivateKey;
use crate::types::{AggregatedNonce, AggregatedPublicKey, SessionCache, SignerSession};

impl MuSig {
    /// `e = H_tag("BIP0340/challenge", x(R) || x(X) || m) mod n` for the
    /// aggregated nonce and key.
    pub fn session_challenge(
        &self,
        aggregated_nonce: &AggregatedNonce,
        aggregated_public_key: &AggregatedPublicKey,
        message: &[u8; 32],
    ) -> Scalar {
        self.schnorr().challenge(
            &aggregated_nonce.final_nonce,
            aggregated_public_key.public_key.as_bytes(),
            message,
        )
    }

    /// Bundles the aggregated nonce data with the challenge and the
    /// aggregated key's parity.
    pub fn initialize_session_cache(
        &self,
        aggregated_nonce: &AggregatedNonce,
        challenge: Scalar,
        public_key_parity: bool,
    ) -> SessionCache {
        SessionCache {
            final_nonce_parity: aggregated_nonce.final_nonce_parity,
            final_nonce: aggregated_nonce.final_nonce,
            challenge,
            b: aggregated_nonce.b,
            public_key_parity,
        }
    }

    pub fn initialize_signer_session(
        &self,
        private_key: PrivateKey,
        key_coefficient: Scalar,
        nonce: NoncePair,
    ) -> SignerSession {
        SignerSession {
            private_key,
            key_coefficient,
            nonce,
            internal_key_parity: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CurveId, CurveRegistry};
    use crate::nonce::NonceGenInputs;
    use crate::schnorr::Schnorr;

    fn musig() -> MuSig {
        MuSig::new(Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1).unwrap())
    }

    #[test]
    fn session_cache_copies_nonce_data() {
        let m = musig();
        let s = m.schnorr();
        let d = s.generate_private_key(b"session").unwrap();
        let pk = s.derive_public_key(&d).unwrap();
        let ctx = m.key_aggregation(&[pk]).unwrap();
        let pair = m
            .generate_nonce(&NonceGenInputs {
                session_id: [1u8; 32],
                ..Default::default()
            })
            .unwrap();
        let digest = [2u8; 32];
        let agg = m
            .aggregate_public_nonces(&[pair.public], &ctx.aggregated, &digest)
            .unwrap();
        let e = m.session_challenge(&agg, &ctx.aggregated, &digest);
        let cache = m.initialize_session_cache(&agg, e, true);

        assert_eq!(cache.final_nonce, agg.final_nonce);
        assert_eq!(cache.final_nonce_parity, agg.final_nonce_parity);
        assert_eq!(cache.b, agg.b);
        assert_eq!(cache.challenge, e);
        assert!(cache.public_key_parity);
    }

    #[test]
    fn signer_session_has_no_internal_parity() {
        let m = musig();
        let d = m.schnorr().generate_private_key(b"signer").unwrap();
        let pair = m
            .generate_nonce(&NonceGenInputs {
                session_id: [3u8; 32],
                private_key: Some(&d),
                ..Default::default()
            })
            .unwrap();
        let session = m.initialize_signer_session(d.clone(), Scalar::ONE, pair.clone());
        assert_eq!(session.private_key, d);
        assert_eq!(session.nonce, pair);
        assert!(!session.internal_key_parity);
        assert!(!format!("{session:?}").contains("private_key"));
    }
}
