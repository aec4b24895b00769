use crate::curve::CurveError;
use thiserror::Error;

/// A scalar or coordinate outside the domain it must lie in.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("private key is not in [1, N-1]")]
    PrivateKey,
    #[error("public key x-coordinate is not in [0, P-1]")]
    PublicKey,
    #[error("signature r is not below the field characteristic")]
    SignatureR,
    #[error("signature s is not below the group order")]
    SignatureS,
    #[error("nonce scalar is not in [1, N-1]")]
    Nonce,
    #[error("partial signature is not below the group order")]
    PartialSignature,
}

/// Malformed fixed-length input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
    #[error("x-coordinate has no point on the curve")]
    NotOnCurve,
    #[error("invalid compressed point prefix {0:#04x}")]
    Prefix(u8),
}

/// Errors from the single-signer primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchnorrError {
    #[error(transparent)]
    Curve(#[from] CurveError),

    #[error("range error: {0}")]
    Range(#[from] RangeError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A lifted or aggregated point degenerated to the point at infinity.
    #[error("point at infinity")]
    PointAtInfinity,

    /// Parallel inputs of different lengths.
    #[error("mismatched input lengths: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("no {0} provided")]
    EmptyInput(&'static str),

    #[error("secure random source failed")]
    Randomness,

    /// The derived nonce reduced to zero.
    #[error("nonce scalar is zero")]
    ZeroNonce,

    /// A freshly produced value failed its own verification.
    #[error("internal consistency check failed: {0}")]
    InternalConsistency(&'static str),
}

/// Errors that can occur during MuSig key aggregation, signing and session handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MusigError {
    #[error(transparent)]
    Schnorr(#[from] SchnorrError),

    /// Not every registered participant has published a nonce.
    #[error("missing {expected} nonces, got {got}")]
    MissingNonces {
        /// Number of nonces expected (one per registered public key).
        expected: usize,
        /// Number of nonces actually registered.
        got: usize,
    },

    /// Not every registered participant has published a partial signature.
    #[error("missing {expected} partials, got {got}")]
    MissingPartials {
        /// Number of partials expected (one per registered public key).
        expected: usize,
        /// Number of partials actually registered.
        got: usize,
    },

    #[error("public key {0} is already registered")]
    DuplicateRegistration(String),

    #[error("public key {0} is not a registered participant")]
    UnknownParticipant(String),

    /// This session already produced its partial signature.
    #[error("session already signed; start a new session per message")]
    Reuse,

    #[error("{operation} is not allowed in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },

    /// Partial signatures that failed verification, by x-only public key.
    #[error("invalid partial signatures from {}", .0.join(", "))]
    InvalidPartialSignatures(Vec<String>),

    #[error("internal consistency check failed: {0}")]
    InternalConsistency(&'static str),
}
