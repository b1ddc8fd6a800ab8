//! Element type tags and the numeric trait bounds used by every kernel.
//!
//! The engine is monomorphized over [`Element`]: one generic loop body per
//! access pattern, compiled once per dtype. [`DType`] is the runtime tag the
//! calling array/frame layer uses to pick an entry point and to pre-validate
//! operator compatibility (see [`DType::is_floating_point`]).

use std::fmt;

/// Runtime tag for the element kinds the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 8-bit signed integer.
    I8,
    /// 32-bit signed integer.
    I32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl DType {
    /// Whether values of this dtype carry floating-point semantics.
    ///
    /// Float-only operators (sigmoid, softmax, variance, the trig family)
    /// reject every other dtype with
    /// [`KernelError::OperationNotAvailable`](crate::KernelError::OperationNotAvailable).
    pub fn is_floating_point(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Element size in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::I8 => 1,
            DType::I32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Preferred SIMD lane count for this dtype (256-bit register model).
    pub fn lanes(self) -> usize {
        match self {
            DType::I8 => 32,
            DType::I32 | DType::F32 => 8,
            DType::F64 => 4,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::I8 => "i8",
            DType::I32 => "i32",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Numeric bounds shared by every element type the kernels operate on.
///
/// Arithmetic comes through `num_traits::Num`, generic-numeric conversion
/// through `NumCast` (used by clamp/fill to precompute per-dtype
/// parameters), plus the few per-dtype primitives the loop bodies need that
/// the ecosystem traits do not provide uniformly (`abs`, total `min`/`max`,
/// the missing-value predicate).
pub trait Element:
    Copy
    + PartialOrd
    + Send
    + Sync
    + 'static
    + num_traits::Num
    + num_traits::NumCast
    + num_traits::Bounded
    + std::ops::Neg<Output = Self>
    + fmt::Debug
{
    /// Runtime tag matching `Self`.
    const DTYPE: DType;

    /// Preferred SIMD lane count (must equal `Self::DTYPE.lanes()`).
    const LANES: usize;

    /// Convert from a generic numeric value; `None` when out of range.
    #[inline]
    fn from_f64(value: f64) -> Option<Self> {
        num_traits::cast(value)
    }

    /// Widen to `f64`; lossless for every supported dtype.
    #[inline]
    fn to_f64(self) -> f64 {
        num_traits::cast(self).unwrap_or(f64::NAN)
    }

    /// Per-dtype missing-value predicate: NaN for floats, never for ints.
    #[inline]
    fn is_missing(self) -> bool {
        false
    }

    /// Absolute value.
    fn abs(self) -> Self;

    /// Arithmetic negation, wrapping at the integer extremum.
    fn wrapping_neg(self) -> Self;

    /// Minimum of two values; NaN-propagating for floats.
    fn min(self, other: Self) -> Self;

    /// Maximum of two values; NaN-propagating for floats.
    fn max(self, other: Self) -> Self;
}

impl Element for i8 {
    const DTYPE: DType = DType::I8;
    const LANES: usize = 32;

    #[inline]
    fn abs(self) -> Self {
        i8::wrapping_abs(self)
    }

    #[inline]
    fn wrapping_neg(self) -> Self {
        i8::wrapping_neg(self)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        std::cmp::min(self, other)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;
    const LANES: usize = 8;

    #[inline]
    fn abs(self) -> Self {
        i32::wrapping_abs(self)
    }

    #[inline]
    fn wrapping_neg(self) -> Self {
        i32::wrapping_neg(self)
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        std::cmp::min(self, other)
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    const LANES: usize = 8;

    #[inline]
    fn is_missing(self) -> bool {
        self.is_nan()
    }

    #[inline]
    fn abs(self) -> Self {
        f32::abs(self)
    }

    #[inline]
    fn wrapping_neg(self) -> Self {
        -self
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            f32::NAN
        } else if self < other {
            self
        } else {
            other
        }
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            f32::NAN
        } else if self > other {
            self
        } else {
            other
        }
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
    const LANES: usize = 4;

    #[inline]
    fn is_missing(self) -> bool {
        self.is_nan()
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }

    #[inline]
    fn wrapping_neg(self) -> Self {
        -self
    }

    #[inline]
    fn min(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            f64::NAN
        } else if self < other {
            self
        } else {
            other
        }
    }

    #[inline]
    fn max(self, other: Self) -> Self {
        if self.is_nan() || other.is_nan() {
            f64::NAN
        } else if self > other {
            self
        } else {
            other
        }
    }
}

/// Floating-point element types; adds the transcendental operations the
/// float-only kernels need.
pub trait FloatElement: Element + num_traits::Float {}

impl FloatElement for f32 {}
impl FloatElement for f64 {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_tags_match_trait_constants() {
        assert_eq!(<i8 as Element>::DTYPE, DType::I8);
        assert_eq!(<i32 as Element>::DTYPE, DType::I32);
        assert_eq!(<f32 as Element>::DTYPE, DType::F32);
        assert_eq!(<f64 as Element>::DTYPE, DType::F64);
        for dt in [DType::I8, DType::I32, DType::F32, DType::F64] {
            assert!(dt.lanes() * dt.size_of() == 32);
        }
        assert_eq!(<i8 as Element>::LANES, DType::I8.lanes());
        assert_eq!(<f64 as Element>::LANES, DType::F64.lanes());
    }

    #[test]
    fn float_min_max_propagate_nan() {
        assert!(Element::min(f64::NAN, 1.0).is_nan());
        assert!(Element::max(1.0f32, f32::NAN).is_nan());
        assert_eq!(Element::min(2.0f64, 1.0), 1.0);
        assert_eq!(Element::max(2.0f64, 1.0), 2.0);
    }

    #[test]
    fn integer_extrema_wrap_instead_of_overflowing() {
        assert_eq!(Element::abs(i8::MIN), i8::MIN);
        assert_eq!(Element::wrapping_neg(i8::MIN), i8::MIN);
        assert_eq!(Element::wrapping_neg(i32::MIN), i32::MIN);
        assert_eq!(Element::wrapping_neg(5i32), -5);
        assert_eq!(Element::wrapping_neg(-2.5f64), 2.5);
    }

    #[test]
    fn missing_predicate() {
        assert!(f64::NAN.is_missing());
        assert!(!1.0f32.is_missing());
        assert!(!Element::is_missing(0i32));
    }

    #[test]
    fn generic_numeric_conversion() {
        assert_eq!(<i8 as Element>::from_f64(3.0), Some(3));
        assert_eq!(<i8 as Element>::from_f64(1e9), None);
        assert_eq!(<f32 as Element>::from_f64(0.5), Some(0.5));
        assert_eq!(4i32.to_f64(), 4.0);
    }
}
