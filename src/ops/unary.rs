//! Elementwise unary kernels.
//!
//! Dtype-generic operators (`Abs`, `Neg`, `Sqr`, `Clamp`, `Fill`,
//! `FillNan`, `NanToNum`) are implemented once over [`Element`]; the float-only
//! catalog is fanned out per float dtype and rejects integer buffers with
//! a typed error from every access-pattern entry point.

use super::{
    fill_generic, fill_step, fill_unit, map_generic, map_step, map_unit, unavailable_unary,
    UnaryOp,
};
use crate::dtype::Element;
use crate::plan::StrideLoop;
use crate::storage::Storage;
use crate::{KernelError, Result};

// ============================================================================
// Dtype-generic operators
// ============================================================================

/// Absolute value, in place.
pub struct Abs;

impl<T: Element> UnaryOp<T> for Abs {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_unit(lp, storage, T::abs);
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_step(lp, storage, T::abs);
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_generic(lp, storage, T::abs);
        Ok(())
    }
}

/// Arithmetic negation, in place. Wraps at the integer extremum, like
/// [`Abs`].
pub struct Neg;

impl<T: Element> UnaryOp<T> for Neg {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_unit(lp, storage, T::wrapping_neg);
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_step(lp, storage, T::wrapping_neg);
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_generic(lp, storage, T::wrapping_neg);
        Ok(())
    }
}

/// Elementwise square.
pub struct Sqr;

impl<T: Element> UnaryOp<T> for Sqr {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_unit(lp, storage, |v| v * v);
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_step(lp, storage, |v| v * v);
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_generic(lp, storage, |v| v * v);
        Ok(())
    }
}

/// Clamp every element into `[min, max]`; either bound may be absent for a
/// one-sided clamp. Bounds are fixed per dtype at construction.
#[derive(Debug, Clone, Copy)]
pub struct Clamp<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: Element> Clamp<T> {
    /// Both bounds optional; `min > max` is rejected.
    pub fn new(min: Option<T>, max: Option<T>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(KernelError::InvalidClamp);
            }
        }
        Ok(Clamp { min, max })
    }

    /// Precompute the per-dtype bounds from generic numeric values;
    /// out-of-range conversions are rejected.
    pub fn from_f64(min: Option<f64>, max: Option<f64>) -> Result<Self> {
        let min = match min {
            Some(v) => Some(T::from_f64(v).ok_or(KernelError::InvalidClamp)?),
            None => None,
        };
        let max = match max {
            Some(v) => Some(T::from_f64(v).ok_or(KernelError::InvalidClamp)?),
            None => None,
        };
        Clamp::new(min, max)
    }

    // min before max; the bounds are non-overlapping so order is neutral
    #[inline(always)]
    fn clamp_value(&self, v: T) -> T {
        let v = match self.min {
            Some(lo) if v < lo => lo,
            _ => v,
        };
        match self.max {
            Some(hi) if v > hi => hi,
            _ => v,
        }
    }
}

impl<T: Element> UnaryOp<T> for Clamp<T> {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_unit(lp, storage, |v| self.clamp_value(v));
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_step(lp, storage, |v| self.clamp_value(v));
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_generic(lp, storage, |v| self.clamp_value(v));
        Ok(())
    }
}

/// Write a constant to every position; prior values are never read.
pub struct Fill<T> {
    value: T,
}

impl<T: Element> Fill<T> {
    pub fn new(value: T) -> Self {
        Fill { value }
    }
}

impl<T: Element> UnaryOp<T> for Fill<T> {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        fill_unit(lp, storage, self.value);
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        fill_step(lp, storage, self.value);
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        fill_generic(lp, storage, self.value);
        Ok(())
    }
}

/// Replace missing values (NaN for float dtypes) with a constant.
/// Integer buffers have no missing values and pass through unchanged.
pub struct FillNan<T> {
    value: T,
}

impl<T: Element> FillNan<T> {
    pub fn new(value: T) -> Self {
        FillNan { value }
    }

    #[inline(always)]
    fn patch(&self, v: T) -> T {
        if v.is_missing() {
            self.value
        } else {
            v
        }
    }
}

/// Replace non-finite values with finite constants: NaN, negative infinity
/// and positive infinity each get their own replacement. Integer buffers
/// have no non-finite values and pass through unchanged.
pub struct NanToNum<T> {
    nan: T,
    neg_inf: T,
    pos_inf: T,
}

impl<T: Element> NanToNum<T> {
    pub fn new(nan: T, neg_inf: T, pos_inf: T) -> Self {
        NanToNum {
            nan,
            neg_inf,
            pos_inf,
        }
    }

    // infinities compare outside the Bounded range; no integer does
    #[inline(always)]
    fn patch(&self, v: T) -> T {
        if v.is_missing() {
            self.nan
        } else if v > T::max_value() {
            self.pos_inf
        } else if v < T::min_value() {
            self.neg_inf
        } else {
            v
        }
    }
}

impl<T: Element> UnaryOp<T> for NanToNum<T> {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_unit(lp, storage, |v| self.patch(v));
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_step(lp, storage, |v| self.patch(v));
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_generic(lp, storage, |v| self.patch(v));
        Ok(())
    }
}

impl<T: Element> UnaryOp<T> for FillNan<T> {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_unit(lp, storage, |v| self.patch(v));
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_step(lp, storage, |v| self.patch(v));
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        map_generic(lp, storage, |v| self.patch(v));
        Ok(())
    }
}

// ============================================================================
// Float-only operators
// ============================================================================

macro_rules! float_unary {
    ($(#[$meta:meta])* $op:ident, $name:literal, $f:expr) => {
        $(#[$meta])*
        pub struct $op;

        impl UnaryOp<f32> for $op {
            fn float_only(&self) -> bool {
                true
            }

            fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
                map_unit(lp, storage, $f);
                Ok(())
            }

            fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
                map_step(lp, storage, $f);
                Ok(())
            }

            fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
                map_generic(lp, storage, $f);
                Ok(())
            }
        }

        impl UnaryOp<f64> for $op {
            fn float_only(&self) -> bool {
                true
            }

            fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
                map_unit(lp, storage, $f);
                Ok(())
            }

            fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
                map_step(lp, storage, $f);
                Ok(())
            }

            fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
                map_generic(lp, storage, $f);
                Ok(())
            }
        }

        unavailable_unary!($op, $name, i8, i32);
    };
}

float_unary!(
    /// Square root.
    Sqrt, "sqrt", |v| v.sqrt()
);
float_unary!(
    /// Natural exponential.
    Exp, "exp", |v| v.exp()
);
float_unary!(
    /// `e^x - 1`, accurate near zero.
    Expm1, "expm1", |v| v.exp_m1()
);
float_unary!(
    /// Natural logarithm.
    Log, "log", |v| v.ln()
);
float_unary!(
    /// `ln(1 + x)`, accurate near zero.
    Log1p, "log1p", |v| v.ln_1p()
);
float_unary!(
    /// Round toward positive infinity.
    Ceil, "ceil", |v| v.ceil()
);
float_unary!(
    /// Round toward negative infinity.
    Floor, "floor", |v| v.floor()
);
float_unary!(
    /// Round half to even.
    Rint, "rint", |v| v.round_ties_even()
);
float_unary!(Sin, "sin", |v| v.sin());
float_unary!(Asin, "asin", |v| v.asin());
float_unary!(Sinh, "sinh", |v| v.sinh());
float_unary!(Cos, "cos", |v| v.cos());
float_unary!(Acos, "acos", |v| v.acos());
float_unary!(Cosh, "cosh", |v| v.cosh());
float_unary!(Tan, "tan", |v| v.tan());
float_unary!(Atan, "atan", |v| v.atan());
float_unary!(Tanh, "tanh", |v| v.tanh());
float_unary!(
    /// Logistic function `1 / (1 + e^-x)`.
    Sigmoid, "sigmoid", |v| 1.0 / (1.0 + (-v).exp())
);

/// Raise every element to a fixed power.
pub struct Pow {
    exponent: f64,
}

impl Pow {
    pub fn new(exponent: f64) -> Self {
        Pow { exponent }
    }
}

impl UnaryOp<f32> for Pow {
    fn float_only(&self) -> bool {
        true
    }

    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
        let e = self.exponent as f32;
        map_unit(lp, storage, |v| v.powf(e));
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
        let e = self.exponent as f32;
        map_step(lp, storage, |v| v.powf(e));
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
        let e = self.exponent as f32;
        map_generic(lp, storage, |v| v.powf(e));
        Ok(())
    }
}

impl UnaryOp<f64> for Pow {
    fn float_only(&self) -> bool {
        true
    }

    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
        let e = self.exponent;
        map_unit(lp, storage, |v| v.powf(e));
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
        let e = self.exponent;
        map_step(lp, storage, |v| v.powf(e));
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
        let e = self.exponent;
        map_generic(lp, storage, |v| v.powf(e));
        Ok(())
    }
}

unavailable_unary!(Pow, "pow", i8, i32);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KernelError;
    use approx::assert_relative_eq;

    #[test]
    fn clamp_two_sided() {
        let clamp = Clamp::new(Some(2), Some(8)).unwrap();
        let lp = StrideLoop::build::<i32>(&[7], &[1], 0);
        let mut st = Storage::from_vec(vec![0, 1, 2, 5, 8, 9, 10]);
        clamp.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[2, 2, 2, 5, 8, 8, 8]);
    }

    #[test]
    fn clamp_one_sided() {
        let lp = StrideLoop::build::<i32>(&[7], &[1], 0);

        let lo = Clamp::new(Some(2), None).unwrap();
        let mut st = Storage::from_vec(vec![0, 1, 2, 5, 8, 9, 10]);
        lo.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[2, 2, 2, 5, 8, 9, 10]);

        let hi = Clamp::new(None, Some(8)).unwrap();
        let mut st = Storage::from_vec(vec![0, 1, 2, 5, 8, 9, 10]);
        hi.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[0, 1, 2, 5, 8, 8, 8]);
    }

    #[test]
    fn clamp_rejects_inverted_bounds() {
        assert!(matches!(
            Clamp::<i32>::new(Some(9), Some(1)),
            Err(KernelError::InvalidClamp)
        ));
        assert!(matches!(
            Clamp::<i8>::from_f64(Some(1e9), None),
            Err(KernelError::InvalidClamp)
        ));
    }

    #[test]
    fn abs_and_neg() {
        let lp = StrideLoop::build::<i32>(&[4], &[1], 0);
        let mut st = Storage::from_vec(vec![-3, -1, 0, 2]);
        Abs.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[3, 1, 0, 2]);
        Neg.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[-3, -1, 0, -2]);
    }

    #[test]
    fn fill_writes_every_position_of_strided_sweep() {
        // every third slot belongs to the view; neighbors must survive
        let lp = StrideLoop::build::<f64>(&[5], &[3], 0);
        let mut st = Storage::from_vec(vec![-1.0; 13]);
        Fill::new(7.0).apply(&lp, &mut st).unwrap();
        for (i, &v) in st.as_slice().iter().enumerate() {
            if i % 3 == 0 {
                assert_eq!(v, 7.0);
            } else {
                assert_eq!(v, -1.0);
            }
        }
    }

    #[test]
    fn neg_wraps_at_integer_extremum() {
        let lp = StrideLoop::build::<i32>(&[3], &[1], 0);
        let mut st = Storage::from_vec(vec![i32::MIN, -1, 7]);
        Neg.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[i32::MIN, 1, -7]);

        let lp = StrideLoop::build::<i8>(&[2], &[1], 0);
        let mut st = Storage::from_vec(vec![i8::MIN, 3]);
        Neg.apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[i8::MIN, -3]);
    }

    #[test]
    fn nan_to_num_replaces_each_class() {
        let lp = StrideLoop::build::<f64>(&[5], &[1], 0);
        let mut st = Storage::from_vec(vec![
            f64::NAN,
            f64::NEG_INFINITY,
            1.5,
            f64::INFINITY,
            -0.25,
        ]);
        NanToNum::new(0.0, -1e3, 1e3).apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[0.0, -1e3, 1.5, 1e3, -0.25]);
    }

    #[test]
    fn nan_to_num_ignores_integers() {
        let lp = StrideLoop::build::<i32>(&[4], &[1], 0);
        let mut st = Storage::from_vec(vec![i32::MIN, -1, 0, i32::MAX]);
        NanToNum::new(0, 0, 0).apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[i32::MIN, -1, 0, i32::MAX]);
    }

    #[test]
    fn fill_nan_patches_only_missing() {
        let lp = StrideLoop::build::<f64>(&[4], &[1], 0);
        let mut st = Storage::from_vec(vec![1.0, f64::NAN, 3.0, f64::NAN]);
        FillNan::new(0.5).apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[1.0, 0.5, 3.0, 0.5]);
    }

    #[test]
    fn sigmoid_matches_closed_form() {
        let lp = StrideLoop::build::<f64>(&[3], &[1], 0);
        let mut st = Storage::from_vec(vec![-1.0, 0.0, 1.0]);
        Sigmoid.apply(&lp, &mut st).unwrap();
        assert_relative_eq!(st.get(0), 1.0 / (1.0 + 1.0f64.exp()), epsilon = 1e-12);
        assert_relative_eq!(st.get(1), 0.5, epsilon = 1e-12);
        assert_relative_eq!(st.get(2), 1.0 / (1.0 + (-1.0f64).exp()), epsilon = 1e-12);
    }

    #[test]
    fn float_only_ops_reject_integers() {
        let lp = StrideLoop::build::<i32>(&[4], &[1], 0);
        let mut st = Storage::from_vec(vec![1, 2, 3, 4]);
        assert!(UnaryOp::<i32>::float_only(&Sin));
        for r in [
            Sin.apply_unit(&lp, &mut st),
            Sin.apply_step(&lp, &mut st),
            Sin.apply_generic(&lp, &mut st),
            Sigmoid.apply(&lp, &mut st),
            Pow::new(2.0).apply(&lp, &mut st),
        ] {
            assert!(matches!(
                r,
                Err(KernelError::OperationNotAvailable { .. })
            ));
        }
        // buffer untouched
        assert_eq!(st.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn pow_applies_exponent() {
        let lp = StrideLoop::build::<f64>(&[3], &[1], 0);
        let mut st = Storage::from_vec(vec![1.0, 2.0, 3.0]);
        Pow::new(2.0).apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[1.0, 4.0, 9.0]);
    }
}
