//! Data carried between the MuSig protocol steps.

use std::fmt;

use crate::curve::{Point, Scalar, scalar_to_bytes};
use crate::nonce::NoncePair;
use crate::schnorr::{PrivateKey, PublicKey, Signature};

/// Output of key aggregation: the even-y aggregated key and whether the raw sum
/// had to be negated to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedPublicKey {
    pub public_key: PublicKey,
    pub parity: bool,
}

impl AggregatedPublicKey {
    pub fn point(&self) -> &Point {
        self.public_key.point()
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }
}

/// Everything derived from one ordered key list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAggContext {
    pub ell: [u8; 32],
    pub second_key: [u8; 32],
    /// `coefficients[i]` belongs to the i-th key of the aggregated list.
    pub coefficients: Vec<Scalar>,
    pub aggregated: AggregatedPublicKey,
}

/// Output of nonce aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedNonce {
    /// `Σ R1ᵢ`, or `G` if the sum is infinity.
    pub r1: Point,
    /// `Σ R2ᵢ`, or `G` if the sum is infinity.
    pub r2: Point,
    /// `x(R)` with `R = b·R2 + R1`.
    pub final_nonce: [u8; 32],
    /// Whether `R` has odd y.
    pub final_nonce_parity: bool,
    /// Nonce-mixing coefficient `b`.
    pub b: Scalar,
}

/// Values shared by every signer of one (message, key set, nonce set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCache {
    pub final_nonce_parity: bool,
    pub final_nonce: [u8; 32],
    pub challenge: Scalar,
    pub b: Scalar,
    pub public_key_parity: bool,
}

/// One signer's secret state for one message.
///
/// [`MuSig::partial_sign`](crate::MuSig::partial_sign) consumes it, so a session
/// yields exactly one partial signature.
#[derive(Clone)]
pub struct SignerSession {
    pub private_key: PrivateKey,
    pub key_coefficient: Scalar,
    pub nonce: NoncePair,
    /// Kept for wire compatibility with signers that tweak the internal key;
    /// always `false` here.
    pub internal_key_parity: bool,
}

impl fmt::Debug for SignerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerSession")
            .field("key_coefficient", &self.key_coefficient)
            .field("public_nonce", &self.nonce.public)
            .field("internal_key_parity", &self.internal_key_parity)
            .finish_non_exhaustive()
    }
}

/// One signer's share `sᵢ < N` of the final signature scalar.
#[derive(Clone, PartialEq, Eq)]
pub struct PartialSignature(pub(crate) Scalar);

impl PartialSignature {
    pub fn to_bytes(&self) -> [u8; 32] {
        scalar_to_bytes(&self.0)
    }

    pub fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl fmt::Debug for PartialSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartialSignature({})", hex::encode(self.to_bytes()))
    }
}

/// The final signature together with the key it verifies under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSignature {
    pub signature: Signature,
    pub aggregated_public_key: PublicKey,
}
