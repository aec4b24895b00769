//! One signer's view of a single MuSig signing session.
//!
//! [`MuSigBuilder`] walks through the protocol phases in order:
//!
//! ```text
//! Collecting ──public_nonce()──▶ KeysAggregated ──▶ NoncePublished ──partial_signature()──▶ Signed
//! ```
//!
//! Participants are keyed by their x-only public key and kept sorted, so every
//! party derives the same key-list hash no matter in which order keys arrive.
//! A builder signs at most once; create a new one for every message.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::curve::Scalar;
use crate::error::{MusigError, SchnorrError};
use crate::musig::MuSig;
use crate::nonce::{NonceGenInputs, PublicNonce};
use crate::schnorr::{PrivateKey, PublicKey};
use crate::types::{AggregatedPublicKey, AggregatedSignature, KeyAggContext, PartialSignature, SessionCache, SignerSession};

/// Key-set data fixed once the participant list is closed.
#[derive(Debug, Clone)]
struct KeySet {
    /// Participants in aggregation order.
    ordered: Vec<PublicKey>,
    context: KeyAggContext,
}

impl KeySet {
    fn coefficient_of(&self, key: &[u8; 32]) -> Option<Scalar> {
        self.ordered
            .iter()
            .position(|pk| pk.as_bytes() == key)
            .map(|i| self.context.coefficients[i])
    }
}

#[derive(Debug)]
enum Phase {
    Collecting,
    KeysAggregated(KeySet),
    NoncePublished { keys: KeySet, session: SignerSession },
    Signed { keys: KeySet, cache: SessionCache },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Collecting => "collecting",
            Phase::KeysAggregated(_) => "keys-aggregated",
            Phase::NoncePublished { .. } => "nonce-published",
            Phase::Signed { .. } => "signed",
        }
    }

    fn keys(&self) -> Option<&KeySet> {
        match self {
            Phase::Collecting => None,
            Phase::KeysAggregated(keys)
            | Phase::NoncePublished { keys, .. }
            | Phase::Signed { keys, .. } => Some(keys),
        }
    }
}

#[derive(Debug)]
pub struct MuSigBuilder {
    musig: MuSig,
    private_key: PrivateKey,
    digest: [u8; 32],
    session_id: [u8; 32],
    public_key: OnceCell<PublicKey>,
    public_keys: BTreeMap<[u8; 32], PublicKey>,
    public_nonces: BTreeMap<[u8; 32], PublicNonce>,
    partial_signatures: BTreeMap<[u8; 32], PartialSignature>,
    phase: Phase,
}

impl MuSigBuilder {
    /// Starts a session for signing `digest` with `private_key`. The nonce
    /// session id is drawn from the operating system's random source.
    pub fn new(musig: MuSig, private_key: PrivateKey, digest: [u8; 32]) -> Result<Self, MusigError> {
        let mut session_id = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut session_id)
            .map_err(|_| SchnorrError::Randomness)?;
        Ok(Self::with_session_id(musig, private_key, digest, session_id))
    }

    /// Like [`MuSigBuilder::new`] with a caller-chosen session id. Reusing a
    /// session id for the same key and message reuses the nonce.
    pub fn with_session_id(
        musig: MuSig,
        private_key: PrivateKey,
        digest: [u8; 32],
        session_id: [u8; 32],
    ) -> Self {
        MuSigBuilder {
            musig,
            private_key,
            digest,
            session_id,
            public_key: OnceCell::new(),
            public_keys: BTreeMap::new(),
            public_nonces: BTreeMap::new(),
            partial_signatures: BTreeMap::new(),
            phase: Phase::Collecting,
        }
    }

    /// Current phase name.
    pub fn phase(&self) -> &'static str {
        self.phase.name()
    }

    /// This signer's public key, derived on first access.
    pub fn public_key(&self) -> Result<&PublicKey, MusigError> {
        if let Some(pk) = self.public_key.get() {
            return Ok(pk);
        }
        let pk = self.musig.schnorr().derive_public_key(&self.private_key)?;
        Ok(self.public_key.get_or_init(|| pk))
    }

    /// Registers a participant. The signer's own key must be registered too.
    pub fn add_public_key(&mut self, public_key: PublicKey) -> Result<(), MusigError> {
        if !matches!(self.phase, Phase::Collecting) {
            return Err(self.invalid_phase("add_public_key"));
        }
        let key = public_key.to_bytes();
        if self.public_keys.contains_key(&key) {
            return Err(MusigError::DuplicateRegistration(public_key.to_string()));
        }
        tracing::debug!(public_key = %public_key, "participant registered");
        self.public_keys.insert(key, public_key);
        Ok(())
    }

    /// The aggregated key of all registered participants. Closes the
    /// participant list on first call.
    pub fn aggregated_public_key(&mut self) -> Result<AggregatedPublicKey, MusigError> {
        self.aggregate_keys()?;
        match self.phase.keys() {
            Some(keys) => Ok(keys.context.aggregated.clone()),
            None => Err(MusigError::InternalConsistency("keys not aggregated")),
        }
    }

    fn aggregate_keys(&mut self) -> Result<(), MusigError> {
        if !matches!(self.phase, Phase::Collecting) {
            return Ok(());
        }
        if self.public_keys.is_empty() {
            return Err(SchnorrError::EmptyInput("public keys").into());
        }
        let own = self.public_key()?.clone();
        if !self.public_keys.contains_key(own.as_bytes()) {
            return Err(MusigError::UnknownParticipant(own.to_string()));
        }

        let ordered: Vec<PublicKey> = self.public_keys.values().cloned().collect();
        let context = self.musig.key_aggregation(&ordered)?;
        tracing::debug!(
            participants = ordered.len(),
            aggregated_public_key = %context.aggregated.public_key,
            "keys aggregated"
        );
        self.phase = Phase::KeysAggregated(KeySet { ordered, context });
        Ok(())
    }

    /// This signer's public nonce. The first call aggregates the registered
    /// keys and generates the nonce; later calls return the same nonce.
    pub fn public_nonce(&mut self) -> Result<PublicNonce, MusigError> {
        let own = self.public_key()?.to_bytes();
        if !matches!(self.phase, Phase::Collecting | Phase::KeysAggregated(_)) {
            return self
                .public_nonces
                .get(&own)
                .cloned()
                .ok_or(MusigError::InternalConsistency("own public nonce missing"));
        }
        if self.public_nonces.contains_key(&own) {
            return Err(MusigError::DuplicateRegistration(hex::encode(own)));
        }

        self.aggregate_keys()?;
        let Phase::KeysAggregated(keys) = &self.phase else {
            return Err(self.invalid_phase("public_nonce"));
        };
        let coefficient = keys
            .coefficient_of(&own)
            .ok_or_else(|| MusigError::UnknownParticipant(hex::encode(own)))?;
        let agg_pk = keys.context.aggregated.to_bytes();
        let nonce = self.musig.generate_nonce(&NonceGenInputs {
            session_id: self.session_id,
            digest: Some(&self.digest),
            private_key: Some(&self.private_key),
            aggregated_public_key: Some(&agg_pk),
            extra_input: None,
        })?;
        let public = nonce.public.clone();
        let session = self
            .musig
            .initialize_signer_session(self.private_key.clone(), coefficient, nonce);

        let Phase::KeysAggregated(keys) = std::mem::replace(&mut self.phase, Phase::Collecting) else {
            return Err(MusigError::InternalConsistency("phase changed during nonce generation"));
        };
        self.phase = Phase::NoncePublished { keys, session };
        self.public_nonces.insert(own, public.clone());
        tracing::debug!("public nonce published");
        Ok(public)
    }

    /// Records another participant's public nonce. This signer's own nonce
    /// comes only from [`MuSigBuilder::public_nonce`].
    pub fn add_public_nonce(&mut self, public_key: &PublicKey, nonce: PublicNonce) -> Result<(), MusigError> {
        if matches!(self.phase, Phase::Signed { .. }) {
            return Err(self.invalid_phase("add_public_nonce"));
        }
        let key = self.registered(public_key)?;
        if self.public_nonces.contains_key(&key) || self.is_own(&key)? {
            return Err(MusigError::DuplicateRegistration(public_key.to_string()));
        }
        self.public_nonces.insert(key, nonce);
        tracing::debug!(
            public_key = %public_key,
            received = self.public_nonces.len(),
            expected = self.public_keys.len(),
            "public nonce received"
        );
        Ok(())
    }

    /// Produces this signer's partial signature once every participant's nonce
    /// is known. A second call fails with [`MusigError::Reuse`].
    pub fn partial_signature(&mut self) -> Result<PartialSignature, MusigError> {
        let (keys, session) = match &self.phase {
            Phase::Signed { .. } => {
                tracing::warn!("second signing attempt on one session");
                return Err(MusigError::Reuse);
            }
            Phase::NoncePublished { keys, session } => (keys, session),
            _ => return Err(self.invalid_phase("partial_signature")),
        };
        if self.public_nonces.len() != self.public_keys.len() {
            return Err(MusigError::MissingNonces {
                expected: self.public_keys.len(),
                got: self.public_nonces.len(),
            });
        }
        let own = self.public_key()?.to_bytes();
        if self.partial_signatures.contains_key(&own) {
            return Err(MusigError::DuplicateRegistration(hex::encode(own)));
        }

        let public_nonces: Vec<PublicNonce> = self.public_nonces.values().cloned().collect();
        let aggregated = &keys.context.aggregated;
        let agg_nonce = self
            .musig
            .aggregate_public_nonces(&public_nonces, aggregated, &self.digest)?;
        let challenge = self.musig.session_challenge(&agg_nonce, aggregated, &self.digest);
        let cache = self
            .musig
            .initialize_session_cache(&agg_nonce, challenge, aggregated.parity);
        let partial = self.musig.partial_sign(session.clone(), &cache)?;

        let Phase::NoncePublished { keys, .. } = std::mem::replace(&mut self.phase, Phase::Collecting) else {
            return Err(MusigError::InternalConsistency("phase changed during signing"));
        };
        self.phase = Phase::Signed { keys, cache };
        self.partial_signatures.insert(own, partial.clone());
        tracing::debug!("partial signature produced");
        Ok(partial)
    }

    /// Records another participant's partial signature.
    ///
    /// Only allowed once this signer has published its nonce. This signer's own
    /// partial signature comes only from [`MuSigBuilder::partial_signature`].
    pub fn add_partial_signature(
        &mut self,
        public_key: &PublicKey,
        partial_signature: PartialSignature,
    ) -> Result<(), MusigError> {
        if !matches!(self.phase, Phase::NoncePublished { .. } | Phase::Signed { .. }) {
            return Err(self.invalid_phase("add_partial_signature"));
        }
        let key = self.registered(public_key)?;
        if self.partial_signatures.contains_key(&key) || self.is_own(&key)? {
            return Err(MusigError::DuplicateRegistration(public_key.to_string()));
        }
        self.partial_signatures.insert(key, partial_signature);
        tracing::debug!(
            public_key = %public_key,
            received = self.partial_signatures.len(),
            expected = self.public_keys.len(),
            "partial signature received"
        );
        Ok(())
    }

    /// Checks every collected partial signature against the session. Fails
    /// with the keys of all offending participants.
    pub fn verify_partial_signatures(&self) -> Result<(), MusigError> {
        let Phase::Signed { keys, cache } = &self.phase else {
            return Err(self.invalid_phase("verify_partial_signatures"));
        };
        if self.partial_signatures.len() != self.public_keys.len() {
            return Err(MusigError::MissingPartials {
                expected: self.public_keys.len(),
                got: self.partial_signatures.len(),
            });
        }

        let mut invalid = Vec::new();
        for (pk, coefficient) in keys.ordered.iter().zip(&keys.context.coefficients) {
            let key = pk.as_bytes();
            let valid = match (self.public_nonces.get(key), self.partial_signatures.get(key)) {
                (Some(nonce), Some(partial)) => {
                    self.musig
                        .partial_sig_verify(cache, coefficient, pk, nonce, partial)
                }
                _ => false,
            };
            if !valid {
                tracing::warn!(public_key = %pk, "partial signature failed verification");
                invalid.push(pk.to_string());
            }
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(MusigError::InvalidPartialSignatures(invalid))
        }
    }

    /// Verifies all partial signatures and combines them into the final
    /// signature.
    pub fn build_aggregated_signature(&self) -> Result<AggregatedSignature, MusigError> {
        self.verify_partial_signatures()?;
        let Phase::Signed { keys, cache } = &self.phase else {
            return Err(self.invalid_phase("build_aggregated_signature"));
        };
        let partials: Vec<PartialSignature> = keys
            .ordered
            .iter()
            .filter_map(|pk| self.partial_signatures.get(pk.as_bytes()).cloned())
            .collect();
        let signature = self
            .musig
            .aggregate_partial_signatures(&cache.final_nonce, &partials)?;
        let aggregated_public_key = keys.context.aggregated.public_key.clone();
        if !self
            .musig
            .schnorr()
            .verify_digest(&signature, &self.digest, aggregated_public_key.as_bytes())?
        {
            tracing::error!("aggregated signature failed verification");
            return Err(MusigError::InternalConsistency("aggregated signature self-check"));
        }
        tracing::debug!(signature = %signature, "aggregated signature built");
        Ok(AggregatedSignature {
            signature,
            aggregated_public_key,
        })
    }

    fn registered(&self, public_key: &PublicKey) -> Result<[u8; 32], MusigError> {
        let key = public_key.to_bytes();
        if !self.public_keys.contains_key(&key) {
            return Err(MusigError::UnknownParticipant(public_key.to_string()));
        }
        Ok(key)
    }

    fn is_own(&self, key: &[u8; 32]) -> Result<bool, MusigError> {
        Ok(self.public_key()?.as_bytes() == key)
    }

    fn invalid_phase(&self, operation: &'static str) -> MusigError {
        MusigError::InvalidPhase {
            operation,
            phase: self.phase.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CurveId, CurveRegistry};
    use crate::schnorr::Schnorr;

    fn musig() -> MuSig {
        MuSig::new(Schnorr::new(&CurveRegistry::init(), CurveId::Secp256k1).unwrap())
    }

    fn builders(count: usize, digest: [u8; 32]) -> Vec<MuSigBuilder> {
        let m = musig();
        let mut out: Vec<MuSigBuilder> = (0..count)
            .map(|i| {
                let d = m
                    .schnorr()
                    .generate_private_key(format!("party {i}").as_bytes())
                    .unwrap();
                MuSigBuilder::with_session_id(m.clone(), d, digest, [i as u8; 32])
            })
            .collect();
        let pks: Vec<PublicKey> = out.iter().map(|b| b.public_key().unwrap().clone()).collect();
        for b in &mut out {
            // reverse order on purpose
            for pk in pks.iter().rev() {
                b.add_public_key(pk.clone()).unwrap();
            }
        }
        out
    }

    fn exchange_nonces(parties: &mut [MuSigBuilder]) {
        let nonces: Vec<(PublicKey, PublicNonce)> = parties
            .iter_mut()
            .map(|b| (b.public_key().unwrap().clone(), b.public_nonce().unwrap()))
            .collect();
        for (i, b) in parties.iter_mut().enumerate() {
            for (j, (pk, nonce)) in nonces.iter().enumerate() {
                if i != j {
                    b.add_public_nonce(pk, nonce.clone()).unwrap();
                }
            }
        }
    }

    #[test]
    fn three_party_session() {
        let digest = [0x33u8; 32];
        let mut parties = builders(3, digest);
        exchange_nonces(&mut parties);

        let partials: Vec<(PublicKey, PartialSignature)> = parties
            .iter_mut()
            .map(|b| (b.public_key().unwrap().clone(), b.partial_signature().unwrap()))
            .collect();
        for (i, b) in parties.iter_mut().enumerate() {
            assert_eq!(b.phase(), "signed");
            for (j, (pk, partial)) in partials.iter().enumerate() {
                if i != j {
                    b.add_partial_signature(pk, partial.clone()).unwrap();
                }
            }
        }

        let results: Vec<AggregatedSignature> = parties
            .iter()
            .map(|b| b.build_aggregated_signature().unwrap())
            .collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        let m = musig();
        assert!(m
            .schnorr()
            .verify_digest(&results[0].signature, &digest, results[0].aggregated_public_key.as_bytes())
            .unwrap());
    }

    #[test]
    fn signing_twice_is_rejected() {
        let mut parties = builders(2, [1u8; 32]);
        exchange_nonces(&mut parties);
        parties[0].partial_signature().unwrap();
        assert_eq!(parties[0].partial_signature(), Err(MusigError::Reuse));
    }

    #[test]
    fn duplicate_public_key_is_rejected() {
        let mut parties = builders(2, [1u8; 32]);
        let pk = parties[1].public_key().unwrap().clone();
        assert_eq!(
            parties[0].add_public_key(pk.clone()),
            Err(MusigError::DuplicateRegistration(pk.to_string()))
        );
    }

    #[test]
    fn signing_before_all_nonces_is_rejected() {
        let mut parties = builders(3, [2u8; 32]);
        parties[0].public_nonce().unwrap();
        assert_eq!(
            parties[0].partial_signature(),
            Err(MusigError::MissingNonces { expected: 3, got: 1 })
        );
        assert_eq!(parties[0].phase(), "nonce-published");
    }

    #[test]
    fn signing_before_nonce_is_invalid_phase() {
        let mut parties = builders(2, [2u8; 32]);
        assert_eq!(
            parties[0].partial_signature(),
            Err(MusigError::InvalidPhase {
                operation: "partial_signature",
                phase: "collecting",
            })
        );
    }

    #[test]
    fn nonce_is_stable_and_closes_key_list() {
        let mut parties = builders(2, [4u8; 32]);
        let first = parties[0].public_nonce().unwrap();
        let second = parties[0].public_nonce().unwrap();
        assert_eq!(first, second);
        let m = musig();
        let late = m
            .schnorr()
            .derive_public_key(&m.schnorr().generate_private_key(b"late").unwrap())
            .unwrap();
        assert_eq!(
            parties[0].add_public_key(late),
            Err(MusigError::InvalidPhase {
                operation: "add_public_key",
                phase: "nonce-published",
            })
        );
    }

    #[test]
    fn nonce_from_unknown_participant_is_rejected() {
        let mut parties = builders(2, [5u8; 32]);
        let m = musig();
        let stranger_key = m.schnorr().generate_private_key(b"stranger").unwrap();
        let stranger = m.schnorr().derive_public_key(&stranger_key).unwrap();
        let nonce = parties[1].public_nonce().unwrap();
        assert_eq!(
            parties[0].add_public_nonce(&stranger, nonce.clone()),
            Err(MusigError::UnknownParticipant(stranger.to_string()))
        );
        let pk1 = parties[1].public_key().unwrap().clone();
        parties[0].add_public_nonce(&pk1, nonce.clone()).unwrap();
        assert_eq!(
            parties[0].add_public_nonce(&pk1, nonce),
            Err(MusigError::DuplicateRegistration(pk1.to_string()))
        );
    }

    #[test]
    fn own_key_must_be_registered() {
        let m = musig();
        let d = m.schnorr().generate_private_key(b"me").unwrap();
        let other = m
            .schnorr()
            .derive_public_key(&m.schnorr().generate_private_key(b"you").unwrap())
            .unwrap();
        let mut b = MuSigBuilder::with_session_id(m, d, [0u8; 32], [0u8; 32]);
        assert_eq!(
            b.public_nonce(),
            Err(MusigError::Schnorr(SchnorrError::EmptyInput("public keys")))
        );
        b.add_public_key(other).unwrap();
        let own = b.public_key().unwrap().to_string();
        assert_eq!(b.public_nonce(), Err(MusigError::UnknownParticipant(own)));
        assert_eq!(b.phase(), "collecting");
    }

    #[test]
    fn tampered_partial_signature_is_reported() {
        let digest = [6u8; 32];
        let mut parties = builders(2, digest);
        exchange_nonces(&mut parties);
        let p0 = parties[0].partial_signature().unwrap();
        let p1 = parties[1].partial_signature().unwrap();
        let pk1 = parties[1].public_key().unwrap().clone();

        let m = musig();
        let mut bytes = p1.to_bytes();
        bytes[31] ^= 1;
        let tampered = m.parse_partial_signature(&bytes).unwrap();
        parties[0].add_partial_signature(&pk1, tampered).unwrap();
        assert_eq!(
            parties[0].build_aggregated_signature(),
            Err(MusigError::InvalidPartialSignatures(vec![pk1.to_string()]))
        );

        let pk0 = parties[0].public_key().unwrap().clone();
        parties[1].add_partial_signature(&pk0, p0).unwrap();
        assert!(parties[1].verify_partial_signatures().is_ok());
    }

    #[test]
    fn missing_partials_are_counted() {
        let mut parties = builders(2, [7u8; 32]);
        exchange_nonces(&mut parties);
        parties[0].partial_signature().unwrap();
        assert_eq!(
            parties[0].verify_partial_signatures(),
            Err(MusigError::MissingPartials { expected: 2, got: 1 })
        );
    }

    #[test]
    fn single_party_builder_matches_plain_key() {
        let m = musig();
        let d = m.schnorr().generate_private_key(b"alone").unwrap();
        let digest = [8u8; 32];
        let mut b = MuSigBuilder::new(m.clone(), d, digest).unwrap();
        let pk = b.public_key().unwrap().clone();
        b.add_public_key(pk.clone()).unwrap();
        assert_eq!(b.aggregated_public_key().unwrap().public_key, pk);
        b.public_nonce().unwrap();
        b.partial_signature().unwrap();
        let out = b.build_aggregated_signature().unwrap();
        assert!(m
            .schnorr()
            .verify_digest(&out.signature, &digest, pk.as_bytes())
            .unwrap());
    }

    #[test]
    fn partial_signature_before_nonce_is_invalid_phase() {
        let mut parties = builders(2, [9u8; 32]);
        let pk1 = parties[1].public_key().unwrap().clone();
        let own = parties[0].public_key().unwrap().clone();
        let stray = musig().parse_partial_signature(&[1u8; 32]).unwrap();

        for key in [&own, &pk1] {
            assert_eq!(
                parties[0].add_partial_signature(key, stray.clone()),
                Err(MusigError::InvalidPhase {
                    operation: "add_partial_signature",
                    phase: "collecting",
                })
            );
        }
        parties[0].aggregated_public_key().unwrap();
        assert_eq!(
            parties[0].add_partial_signature(&pk1, stray),
            Err(MusigError::InvalidPhase {
                operation: "add_partial_signature",
                phase: "keys-aggregated",
            })
        );

        exchange_nonces(&mut parties);
        parties[0].partial_signature().unwrap();
        assert_eq!(parties[0].phase(), "signed");
    }

    #[test]
    fn own_partial_signature_cannot_be_injected() {
        let mut parties = builders(2, [10u8; 32]);
        exchange_nonces(&mut parties);
        let own = parties[0].public_key().unwrap().clone();
        let forged = musig().parse_partial_signature(&[2u8; 32]).unwrap();

        assert_eq!(
            parties[0].add_partial_signature(&own, forged.clone()),
            Err(MusigError::DuplicateRegistration(own.to_string()))
        );
        let genuine = parties[0].partial_signature().unwrap();
        assert_eq!(
            parties[0].add_partial_signature(&own, forged),
            Err(MusigError::DuplicateRegistration(own.to_string()))
        );

        let partial1 = parties[1].partial_signature().unwrap();
        let pk1 = parties[1].public_key().unwrap().clone();
        parties[0].add_partial_signature(&pk1, partial1).unwrap();
        parties[1].add_partial_signature(&own, genuine).unwrap();
        assert_eq!(
            parties[0].build_aggregated_signature().unwrap(),
            parties[1].build_aggregated_signature().unwrap()
        );
    }

    #[test]
    fn own_nonce_cannot_be_injected() {
        let mut parties = builders(2, [11u8; 32]);
        let own = parties[0].public_key().unwrap().clone();
        let other_nonce = parties[1].public_nonce().unwrap();
        assert_eq!(
            parties[0].add_public_nonce(&own, other_nonce),
            Err(MusigError::DuplicateRegistration(own.to_string()))
        );
        assert!(parties[0].public_nonce().is_ok());
    }
}
