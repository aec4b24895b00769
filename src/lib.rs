//! BIP-340 Schnorr signatures and n-of-n MuSig over secp256k1.
//!
//! - [`Schnorr`]: key parsing and derivation, deterministic-nonce signing,
//!   verification and batch verification.
//! - [`MuSig`]: key aggregation, two-nonce generation and aggregation, partial
//!   signing and verification, signature aggregation.
//! - [`MuSigBuilder`]: one signer's session state machine on top of [`MuSig`].
//!
//! Curve arithmetic comes from `k256` and sits behind the [`CurvePoint`] trait.
//!
//! ```no_run
//! use bip340_musig::{CurveId, CurveRegistry, MuSig, Schnorr};
//!
//! let registry = CurveRegistry::init();
//! let schnorr = Schnorr::new(&registry, CurveId::Secp256k1)?;
//! let musig = MuSig::new(schnorr.clone());
//!
//! let keys = vec![
//!     schnorr.generate_private_key(b"alice")?,
//!     schnorr.generate_private_key(b"bob")?,
//! ];
//! let digest = [7u8; 32];
//! let out = musig.musig_non_interactive(&keys, &digest)?;
//! assert!(schnorr.verify_digest(&out.signature, &digest, out.aggregated_public_key.as_bytes())?);
//! # Ok::<(), bip340_musig::MusigError>(())
//! ```
pub mod builder;
mod challenge;
pub mod curve;
pub mod error;
pub mod keyagg;
mod musig;
pub mod nonce;
pub mod schnorr;
mod session;
mod sign;
pub mod types;
mod verify;

pub use builder::MuSigBuilder;
pub use challenge::{compute_challenge, tagged_hash};
pub use curve::{CurveData, CurveError, CurveId, CurvePoint, CurveRegistry, Point, Scalar};
pub use error::{MusigError, ParseError, RangeError, SchnorrError};
pub use keyagg::{compute_ell, get_second_public_key, sort_public_keys};
pub use musig::MuSig;
pub use nonce::{NonceGenInputs, NoncePair, PublicNonce, SecretNonce};
pub use schnorr::{PrivateKey, PublicKey, Schnorr, Signature};
pub use types::{
    AggregatedNonce, AggregatedPublicKey, AggregatedSignature, KeyAggContext, PartialSignature, SessionCache,
    SignerSession,
};
