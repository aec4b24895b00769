//! Curve parameters and point arithmetic.
//!
//! The registry maps a [`CurveId`] to its [`CurveData`] (generator `G`, curve
//! object, field characteristic `P` and group order `N`). It is built once by
//! [`CurveRegistry::init`] and is read-only afterwards.
//!
//! Points and scalars come from `k256`, whose field and group arithmetic is
//! constant time. The signing code only sees them through [`CurvePoint`] and the
//! scalar helpers below.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use k256::elliptic_curve::group::{Group, GroupEncoding};
use k256::elliptic_curve::ops::{Reduce, ReduceNonZero};
use k256::elliptic_curve::point::AffineCoordinates;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, FieldBytes, ProjectivePoint, Secp256k1, U256};
use num_bigint::BigUint;
use thiserror::Error;

pub use k256::Scalar;

/// Lookup failure for an unknown curve name or identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurveError {
    #[error("unsupported curve: {0}")]
    Unsupported(String),
}

/// Identifier of a supported curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveId {
    Secp256k1,
}

impl CurveId {
    pub fn name(&self) -> &'static str {
        match self {
            CurveId::Secp256k1 => "secp256k1",
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveId {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("secp256k1") {
            Ok(CurveId::Secp256k1)
        } else {
            Err(CurveError::Unsupported(s.to_string()))
        }
    }
}

/// Canonical big-endian scalar, `None` unless `bytes < N`.
pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Option<Scalar> {
    Option::<Scalar>::from(Scalar::from_repr((*bytes).into()))
}

/// Big-endian integer reduced mod `N`.
pub fn scalar_reduce(bytes: &[u8; 32]) -> Scalar {
    let bytes = FieldBytes::from(*bytes);
    <Scalar as Reduce<U256>>::reduce_bytes(&bytes)
}

/// `(bytes mod (N-1)) + 1`, always in `[1, N-1]`.
pub fn scalar_reduce_nonzero(bytes: &[u8; 32]) -> Scalar {
    let bytes = FieldBytes::from(*bytes);
    <Scalar as ReduceNonZero<U256>>::reduce_nonzero_bytes(&bytes)
}

pub fn scalar_to_bytes(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes().into()
}

/// Minimal point interface consumed by the signing code.
pub trait CurvePoint: Copy + PartialEq {
    fn add(&self, other: &Self) -> Self;

    /// Scalar multiplication `k·self`.
    fn multiply(&self, k: &Scalar) -> Self;

    fn negate(&self) -> Self;

    /// Returns an equal point whose affine coordinates can be read directly.
    fn normalize(&self) -> Self;

    fn is_infinity(&self) -> bool;

    /// Big-endian affine x-coordinate, `None` at infinity.
    fn affine_x(&self) -> Option<[u8; 32]>;

    /// Big-endian affine y-coordinate, `None` at infinity.
    fn affine_y(&self) -> Option<[u8; 32]>;

    /// Whether the affine y-coordinate is even. The point at infinity is not.
    fn has_even_y(&self) -> bool {
        self.affine_y().is_some_and(|y| y[31] & 1 == 0)
    }
}

/// A secp256k1 point.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Point(ProjectivePoint);

impl Point {
    pub const INFINITY: Point = Point(ProjectivePoint::IDENTITY);
    pub const GENERATOR: Point = Point(ProjectivePoint::GENERATOR);

    pub fn as_projective(&self) -> &ProjectivePoint {
        &self.0
    }

    /// SEC1 compressed encoding, `None` at infinity.
    pub fn to_compressed(&self) -> Option<[u8; 33]> {
        if self.is_infinity() {
            return None;
        }
        let bytes = self.0.to_affine().to_bytes();
        let mut out = [0u8; 33];
        out.copy_from_slice(&bytes);
        Some(out)
    }
}

impl From<AffinePoint> for Point {
    fn from(point: AffinePoint) -> Self {
        Point(ProjectivePoint::from(point))
    }
}

impl From<ProjectivePoint> for Point {
    fn from(point: ProjectivePoint) -> Self {
        Point(point)
    }
}

impl CurvePoint for Point {
    fn add(&self, other: &Self) -> Self {
        Point(self.0 + other.0)
    }

    fn multiply(&self, k: &Scalar) -> Self {
        Point(self.0 * k)
    }

    fn negate(&self) -> Self {
        Point(-self.0)
    }

    fn normalize(&self) -> Self {
        Point(ProjectivePoint::from(self.0.to_affine()))
    }

    fn is_infinity(&self) -> bool {
        bool::from(self.0.is_identity())
    }

    fn affine_x(&self) -> Option<[u8; 32]> {
        if self.is_infinity() {
            return None;
        }
        Some(self.0.to_affine().x().into())
    }

    fn affine_y(&self) -> Option<[u8; 32]> {
        if self.is_infinity() {
            return None;
        }
        let encoded = self.0.to_affine().to_encoded_point(false);
        let y = encoded.y()?;
        let mut out = [0u8; 32];
        out.copy_from_slice(y);
        Some(out)
    }

    fn has_even_y(&self) -> bool {
        !self.is_infinity() && !bool::from(self.0.to_affine().y_is_odd())
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_compressed() {
            Some(bytes) => write!(f, "Point({})", hex::encode(bytes)),
            None => f.write_str("Point(infinity)"),
        }
    }
}

/// Immutable description of one curve: `(G, curve, P, N)`.
#[derive(Debug, Clone)]
pub struct CurveData {
    pub g: Point,
    pub curve: Secp256k1,
    pub p: BigUint,
    pub n: BigUint,
}

fn secp256k1() -> CurveData {
    // p = 2^256 - 2^32 - 977
    let p = (BigUint::from(1u32) << 256u32) - (BigUint::from(1u32) << 32u32) - BigUint::from(977u32);
    // N - 1 is -1 in the scalar field.
    let n = BigUint::from_bytes_be(&scalar_to_bytes(&-Scalar::ONE)) + 1u32;
    CurveData {
        g: Point::GENERATOR,
        curve: Secp256k1,
        p,
        n,
    }
}

/// Read-only registry of curve descriptors.
#[derive(Debug, Clone)]
pub struct CurveRegistry {
    curves: HashMap<CurveId, Arc<CurveData>>,
}

impl CurveRegistry {
    /// Derives the constants of every supported curve.
    pub fn init() -> Self {
        let mut curves = HashMap::new();
        curves.insert(CurveId::Secp256k1, Arc::new(secp256k1()));
        CurveRegistry { curves }
    }

    pub fn get_curve_data(&self, id: CurveId) -> Result<Arc<CurveData>, CurveError> {
        self.curves
            .get(&id)
            .cloned()
            .ok_or_else(|| CurveError::Unsupported(id.to_string()))
    }

    /// Lookup by canonical curve name.
    pub fn get_curve_data_by_name(&self, name: &str) -> Result<Arc<CurveData>, CurveError> {
        self.get_curve_data(name.parse()?)
    }
}
