//! Unit-safe quantities.
//!
//! A [`Qty<K, R>`] pairs a zero-sized *kind* tag (`Contracts`, `Lots`,
//! `QtyA` base-currency units, `QtyB` quote-currency units) with a
//! representation (`i64` whole or `f64` fractional). Kinds never mix
//! implicitly: adding lots to base-currency units is a type error, and
//! converting between kinds goes through [`convert`], which is told the
//! instrument and (for A<->B) the price.
//!
//! Books, requests and trades store quantities untyped as [`RawQty`]
//! (an 8-byte payload) together with a runtime `(QtyKind, with_frac)`
//! pair; reading a `RawQty` back through a mismatched kind or
//! representation is a programming error, checked in debug builds.

use super::instrument::Instrument;
use super::price::Price;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Runtime quantity-kind discriminant carried by books and orders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QtyKind {
    /// No kind configured; accepts reads through any tag.
    #[default]
    Undefined,
    /// Number of contracts (instruments). The usual case.
    Contracts,
    /// Number of lots (batches of contracts). Rare; e.g. spot FX feeds.
    Lots,
    /// Quantity in units of asset A (base currency).
    QtyA,
    /// Quantity in units of asset B (quote currency).
    QtyB,
}

impl fmt::Display for QtyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QtyKind::Undefined => "Undefined",
            QtyKind::Contracts => "Contracts",
            QtyKind::Lots => "Lots",
            QtyKind::QtyA => "QtyA",
            QtyKind::QtyB => "QtyB",
        };
        f.write_str(s)
    }
}

/// Compile-time kind tag. Implemented by the zero-sized marker types.
pub trait KindTag: Copy + Default {
    /// The runtime discriminant this tag corresponds to.
    const KIND: QtyKind;
}

/// Marker: quantities counted in contracts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Contracts;
/// Marker: quantities counted in lots.
#[derive(Clone, Copy, Debug, Default)]
pub struct Lots;
/// Marker: quantities in asset-A (base) units.
#[derive(Clone, Copy, Debug, Default)]
pub struct QtyA;
/// Marker: quantities in asset-B (quote) units.
#[derive(Clone, Copy, Debug, Default)]
pub struct QtyB;
/// Marker: wildcard tag, reads any kind (the `void*` of kinds).
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyKind;

impl KindTag for Contracts {
    const KIND: QtyKind = QtyKind::Contracts;
}
impl KindTag for Lots {
    const KIND: QtyKind = QtyKind::Lots;
}
impl KindTag for QtyA {
    const KIND: QtyKind = QtyKind::QtyA;
}
impl KindTag for QtyB {
    const KIND: QtyKind = QtyKind::QtyB;
}
impl KindTag for AnyKind {
    const KIND: QtyKind = QtyKind::Undefined;
}

/// Tolerance for deciding that an `f64` is "really" integral.
const FRAC_TOL: f64 = 1e-9;

/// Quantity representation: `i64` (whole) or `f64` (fractional).
///
/// Besides ordinary values each representation carries three sentinels:
/// positive/negative infinity and "invalid". Arithmetic does not check
/// for sentinels; callers keep them out of hot-path math.
pub trait QtyRepr:
    Copy
    + PartialEq
    + PartialOrd
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Neg<Output = Self>
    + fmt::Display
    + fmt::Debug
    + 'static
{
    /// True for `f64`, false for `i64`. Must match the owner's
    /// `with_frac` flag when reading a [`RawQty`] back.
    const IS_FRAC: bool;

    /// The zero value.
    fn zero() -> Self;
    /// Positive-infinity sentinel.
    fn pos_inf() -> Self;
    /// Negative-infinity sentinel.
    fn neg_inf() -> Self;
    /// Invalid-value sentinel (negative for `i64`, NaN for `f64`).
    fn invalid() -> Self;

    /// Exactly zero.
    fn is_zero(self) -> bool;
    /// Strictly negative (sentinels included for `i64`; NaN excluded).
    fn is_neg(self) -> bool;
    /// Strictly positive.
    fn is_pos(self) -> bool;
    /// Is the invalid sentinel.
    fn is_invalid(self) -> bool;
    /// Is one of the infinity sentinels.
    fn is_inf(self) -> bool;

    /// Widen to `f64` (lossless for all values this crate handles).
    fn to_f64(self) -> f64;
    /// Checked narrowing from `f64`: sentinel-preserving; whole reprs
    /// reject non-integral values.
    fn from_f64_checked(v: f64) -> Option<Self>;
    /// Scale by an `f64` factor (rounding for whole reprs).
    fn scale(self, factor: f64) -> Self;
    /// The smaller of two values.
    fn min(self, other: Self) -> Self;

    /// Raw 8-byte payload of this value.
    fn to_bits(self) -> u64;
    /// Reconstruct from a raw 8-byte payload.
    fn from_bits(bits: u64) -> Self;
}

impl QtyRepr for i64 {
    const IS_FRAC: bool = false;

    #[inline]
    fn zero() -> Self {
        0
    }
    #[inline]
    fn pos_inf() -> Self {
        i64::MAX
    }
    #[inline]
    fn neg_inf() -> Self {
        -i64::MAX
    }
    #[inline]
    fn invalid() -> Self {
        i64::MIN
    }
    #[inline]
    fn is_zero(self) -> bool {
        self == 0
    }
    #[inline]
    fn is_neg(self) -> bool {
        self < 0
    }
    #[inline]
    fn is_pos(self) -> bool {
        self > 0
    }
    #[inline]
    fn is_invalid(self) -> bool {
        self == i64::MIN
    }
    #[inline]
    fn is_inf(self) -> bool {
        self == i64::MAX || self == -i64::MAX
    }
    #[inline]
    fn to_f64(self) -> f64 {
        if self == i64::MAX {
            f64::INFINITY
        } else if self == -i64::MAX {
            f64::NEG_INFINITY
        } else if self == i64::MIN {
            f64::NAN
        } else {
            self as f64
        }
    }
    #[inline]
    fn from_f64_checked(v: f64) -> Option<Self> {
        if v == f64::INFINITY {
            return Some(i64::MAX);
        }
        if v == f64::NEG_INFINITY {
            return Some(-i64::MAX);
        }
        if v.is_nan() {
            return Some(i64::MIN);
        }
        let whole = v.round();
        if (whole - v).abs() < FRAC_TOL {
            Some(whole as i64)
        } else {
            None
        }
    }
    #[inline]
    fn scale(self, factor: f64) -> Self {
        (self as f64 * factor).round() as i64
    }
    #[inline]
    fn min(self, other: Self) -> Self {
        Ord::min(self, other)
    }
    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }
    #[inline]
    fn from_bits(bits: u64) -> Self {
        bits as i64
    }
}

impl QtyRepr for f64 {
    const IS_FRAC: bool = true;

    #[inline]
    fn zero() -> Self {
        0.0
    }
    #[inline]
    fn pos_inf() -> Self {
        f64::INFINITY
    }
    #[inline]
    fn neg_inf() -> Self {
        f64::NEG_INFINITY
    }
    #[inline]
    fn invalid() -> Self {
        f64::NAN
    }
    #[inline]
    fn is_zero(self) -> bool {
        self == 0.0
    }
    #[inline]
    fn is_neg(self) -> bool {
        self < 0.0
    }
    #[inline]
    fn is_pos(self) -> bool {
        self > 0.0
    }
    #[inline]
    fn is_invalid(self) -> bool {
        self.is_nan()
    }
    #[inline]
    fn is_inf(self) -> bool {
        self.is_infinite()
    }
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline]
    fn from_f64_checked(v: f64) -> Option<Self> {
        Some(v)
    }
    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }
    #[inline]
    fn min(self, other: Self) -> Self {
        f64::min(self, other)
    }
    #[inline]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }
    #[inline]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

/// A kind-tagged quantity. See the module docs.
#[derive(Clone, Copy, Debug)]
pub struct Qty<K: KindTag, R: QtyRepr>(R, PhantomData<K>);

impl<K: KindTag, R: QtyRepr> Default for Qty<K, R> {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl<K: KindTag, R: QtyRepr> Qty<K, R> {
    /// Wrap a raw representation value.
    #[inline]
    pub fn new(v: R) -> Self {
        Qty(v, PhantomData)
    }

    /// The zero quantity.
    #[inline]
    pub fn zero() -> Self {
        Qty(R::zero(), PhantomData)
    }

    /// Positive-infinity sentinel.
    #[inline]
    pub fn pos_inf() -> Self {
        Qty(R::pos_inf(), PhantomData)
    }

    /// Negative-infinity sentinel.
    #[inline]
    pub fn neg_inf() -> Self {
        Qty(R::neg_inf(), PhantomData)
    }

    /// Invalid sentinel.
    #[inline]
    pub fn invalid() -> Self {
        Qty(R::invalid(), PhantomData)
    }

    /// The raw representation value.
    #[inline]
    pub fn raw(self) -> R {
        self.0
    }

    /// Widen to `f64`.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0.to_f64()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_pos(self) -> bool {
        self.0.is_pos() && !self.0.is_invalid()
    }

    #[inline]
    pub fn is_neg(self) -> bool {
        self.0.is_neg() && !self.0.is_invalid()
    }

    /// Zero or any sentinel. This is what a Cancel request carries
    /// instead of a real quantity.
    #[inline]
    pub fn is_special0(self) -> bool {
        self.0.is_zero() || self.0.is_inf() || self.0.is_invalid()
    }

    /// Neither infinite nor invalid.
    #[inline]
    pub fn is_finite(self) -> bool {
        !(self.0.is_inf() || self.0.is_invalid())
    }

    /// Scale by an `f64` factor (whole reprs round to nearest).
    #[inline]
    pub fn scale(self, factor: f64) -> Self {
        Qty(self.0.scale(factor), PhantomData)
    }

    /// The smaller of two quantities.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Qty(self.0.min(other.0), PhantomData)
    }
}

impl<K: KindTag, R: QtyRepr> PartialEq for Qty<K, R> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<K: KindTag, R: QtyRepr> PartialOrd for Qty<K, R> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl<K: KindTag, R: QtyRepr> std::ops::Add for Qty<K, R> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Qty(self.0 + rhs.0, PhantomData)
    }
}

impl<K: KindTag, R: QtyRepr> std::ops::Sub for Qty<K, R> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Qty(self.0 - rhs.0, PhantomData)
    }
}

impl<K: KindTag, R: QtyRepr> std::ops::AddAssign for Qty<K, R> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0 + rhs.0;
    }
}

impl<K: KindTag, R: QtyRepr> std::ops::SubAssign for Qty<K, R> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0 - rhs.0;
    }
}

impl<K: KindTag, R: QtyRepr> std::ops::Neg for Qty<K, R> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Qty(-self.0, PhantomData)
    }
}

impl<K: KindTag, R: QtyRepr> fmt::Display for Qty<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Do the static `(K, R)` parameters agree with a dynamic
/// `(QtyKind, with_frac)` configuration?
///
/// `AnyKind` (static) accepts any dynamic kind, and `QtyKind::Undefined`
/// (dynamic) accepts any static tag; the representation must match
/// exactly in either case.
#[inline]
pub fn is_valid_qty_rep<K: KindTag, R: QtyRepr>(qt: QtyKind, with_frac: bool) -> bool {
    (K::KIND == QtyKind::Undefined || qt == QtyKind::Undefined || K::KIND == qt)
        && R::IS_FRAC == with_frac
}

/// An untyped 8-byte quantity payload.
///
/// The meaning of the bits is fixed by the owning object's
/// `(QtyKind, with_frac)` configuration. The all-zero payload is zero in
/// both representations, so `Default` is a valid zero regardless of the
/// eventual interpretation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQty(u64);

impl RawQty {
    /// Store a typed quantity.
    #[inline]
    pub fn store<K: KindTag, R: QtyRepr>(q: Qty<K, R>) -> Self {
        RawQty(q.raw().to_bits())
    }

    /// Read back as a typed quantity. The requested `(K, R)` must agree
    /// with the owner's configuration; checked in debug builds only.
    #[inline]
    pub fn load<K: KindTag, R: QtyRepr>(self, qt: QtyKind, with_frac: bool) -> Qty<K, R> {
        debug_assert!(
            is_valid_qty_rep::<K, R>(qt, with_frac),
            "qty kind mismatch: requested ({:?}, frac={}) from ({qt:?}, frac={with_frac})",
            K::KIND,
            R::IS_FRAC,
        );
        Qty::new(R::from_bits(self.0))
    }

    /// True iff the payload is the zero value (either representation;
    /// the engine never stores a negative zero).
    #[inline]
    pub fn is_zero_bits(self) -> bool {
        self.0 == 0
    }
}

/// Why an explicit quantity conversion failed.
#[derive(Debug)]
#[non_exhaustive]
pub enum QtyConvError {
    /// Target is a whole representation but the converted value is not
    /// integral within tolerance.
    NotIntegral {
        /// The offending converted value.
        value: f64,
    },
    /// An A<->B conversion was requested with a zero or empty price.
    BadPrice {
        /// The price supplied for the conversion.
        px: Price,
    },
    /// No conversion path exists between the two kinds.
    UnsupportedPair {
        /// Source kind.
        from: QtyKind,
        /// Destination kind.
        to: QtyKind,
    },
}

impl fmt::Display for QtyConvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QtyConvError::NotIntegral { value } => {
                write!(f, "qty conversion: {value} is not integral")
            }
            QtyConvError::BadPrice { px } => {
                write!(f, "qty conversion: unusable price {px}")
            }
            QtyConvError::UnsupportedPair { from, to } => {
                write!(f, "qty conversion: no path from {from} to {to}")
            }
        }
    }
}

impl std::error::Error for QtyConvError {}

/// Multiplier taking one unit of `kind` into asset-A units.
#[inline]
fn a_units_per(kind: QtyKind, instr: &Instrument, px: Price) -> Result<f64, QtyConvError> {
    match kind {
        QtyKind::Contracts => Ok(instr.contract_mult()),
        QtyKind::Lots => Ok(instr.lot_size() * instr.contract_mult()),
        QtyKind::QtyA => Ok(1.0),
        QtyKind::QtyB => {
            if !px.is_finite() || px.is_zero() {
                Err(QtyConvError::BadPrice { px })
            } else {
                // One B unit is worth 1/px A units.
                Ok(1.0 / px.value())
            }
        }
        QtyKind::Undefined => Err(QtyConvError::UnsupportedPair {
            from: kind,
            to: kind,
        }),
    }
}

/// Explicit, checked conversion between quantity kinds and/or
/// representations.
///
/// Contracts<->Lots go through the instrument's lot size,
/// Contracts/Lots<->QtyA through the contract multiplier, and anything
/// touching QtyB additionally needs the price of the level being
/// converted. Same-kind calls only change the representation.
pub fn convert<KS, RS, KD, RD>(
    src: Qty<KS, RS>,
    instr: &Instrument,
    px: Price,
) -> Result<Qty<KD, RD>, QtyConvError>
where
    KS: KindTag,
    RS: QtyRepr,
    KD: KindTag,
    RD: QtyRepr,
{
    let v = if KS::KIND == KD::KIND {
        src.to_f64()
    } else {
        let from = a_units_per(KS::KIND, instr, px)?;
        let to = a_units_per(KD::KIND, instr, px)?;
        src.to_f64() * from / to
    };
    RD::from_f64_checked(v)
        .map(Qty::new)
        .ok_or(QtyConvError::NotIntegral { value: v })
}
