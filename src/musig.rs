//! The MuSig multi-party primitive.
//!
//! [`MuSig`] wraps a [`Schnorr`] instance and delegates all curve arithmetic and
//! hashing to it. Its operations are split by protocol step across
//! [`keyagg`](crate::keyagg), [`nonce`](crate::nonce), [`sign`](crate::sign) and
//! [`verify`](crate::verify).

use crate::schnorr::Schnorr;

#[derive(Debug, Clone)]
pub struct MuSig {
    schnorr: Schnorr,
}

impl MuSig {
    pub fn new(schnorr: Schnorr) -> Self {
        MuSig { schnorr }
    }

    pub fn schnorr(&self) -> &Schnorr {
        &self.schnorr
    }
}
