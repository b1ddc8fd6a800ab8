//! Reduction operators. Each folds an entire sweep into one scalar using the
//! shared fold drivers; the NaN-aware family and the statistical reductions
//! are float-only and reject integer dtypes.

use super::{fold_generic, fold_step, fold_unit, unavailable_reduce, ReduceOp};
use crate::dtype::{Element, FloatElement};
use crate::plan::StrideLoop;
use crate::simd::{dispatch_if_large, MAX_LANES};
use crate::storage::Storage;
use crate::Result;

// ============================================================================
// Dtype-polymorphic reductions
// ============================================================================

macro_rules! fold_reduce {
    ($(#[$doc:meta])* $op:ident, identity = $id:expr, combine = $comb:expr) => {
        $(#[$doc])*
        pub struct $op;

        impl<T: Element> ReduceOp<T> for $op {
            fn identity(&self) -> T {
                $id
            }

            fn reduce_unit(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T> {
                Ok(fold_unit(lp, storage, $id, |v| v, $comb))
            }

            fn reduce_step(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T> {
                Ok(fold_step(lp, storage, $id, |v| v, $comb))
            }

            fn reduce_generic(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T> {
                Ok(fold_generic(lp, storage, $id, |v| v, $comb))
            }
        }
    };
}

fold_reduce!(
    /// Sum of all elements. Integer overflow wraps the way `+` does in
    /// release builds; float NaN propagates.
    Sum,
    identity = num_traits::Zero::zero(),
    combine = |a, b| a + b
);
fold_reduce!(
    /// Product of all elements.
    Prod,
    identity = num_traits::One::one(),
    combine = |a, b| a * b
);
fold_reduce!(
    /// Smallest element. NaN propagates for floats.
    Min,
    identity = num_traits::Bounded::max_value(),
    combine = |a, b| Element::min(a, b)
);
fold_reduce!(
    /// Largest element. NaN propagates for floats.
    Max,
    identity = num_traits::Bounded::min_value(),
    combine = |a, b| Element::max(a, b)
);

// ============================================================================
// Float-only reductions
// ============================================================================

macro_rules! float_fold_reduce {
    ($op:ident, $name:literal, $t:ty,
     identity = $id:expr, map = $map:expr, combine = $comb:expr, finish = $fin:expr) => {
        impl ReduceOp<$t> for $op {
            fn float_only(&self) -> bool {
                true
            }

            fn identity(&self) -> $t {
                $id
            }

            fn reduce_unit(&self, lp: &StrideLoop, storage: &Storage<$t>) -> Result<$t> {
                let finish: fn(&StrideLoop, $t) -> $t = $fin;
                Ok(finish(lp, fold_unit(lp, storage, $id, $map, $comb)))
            }

            fn reduce_step(&self, lp: &StrideLoop, storage: &Storage<$t>) -> Result<$t> {
                let finish: fn(&StrideLoop, $t) -> $t = $fin;
                Ok(finish(lp, fold_step(lp, storage, $id, $map, $comb)))
            }

            fn reduce_generic(&self, lp: &StrideLoop, storage: &Storage<$t>) -> Result<$t> {
                let finish: fn(&StrideLoop, $t) -> $t = $fin;
                Ok(finish(lp, fold_generic(lp, storage, $id, $map, $comb)))
            }
        }
    };
    ($(#[$doc:meta])* $op:ident, $name:literal,
     identity = $id:expr, map = $map:expr, combine = $comb:expr, finish = $fin:expr) => {
        $(#[$doc])*
        pub struct $op;

        float_fold_reduce!($op, $name, f32,
            identity = $id, map = $map, combine = $comb, finish = $fin);
        float_fold_reduce!($op, $name, f64,
            identity = $id, map = $map, combine = $comb, finish = $fin);
        unavailable_reduce!($op, $name, i8, i32);
    };
}

float_fold_reduce!(
    /// Arithmetic mean over the whole sweep.
    Mean,
    "mean",
    identity = 0.0,
    map = |v| v,
    combine = |a, b| a + b,
    finish = |lp, sum| {
        // the array pattern pins the cast target to the element type
        let [n, _] = [lp.total_len() as _, sum];
        sum / n
    }
);
float_fold_reduce!(
    /// Sum ignoring NaN elements.
    NanSum,
    "nanSum",
    identity = 0.0,
    map = |v| if v.is_nan() { 0.0 } else { v },
    combine = |a, b| a + b,
    finish = |_, v| v
);
float_fold_reduce!(
    /// Product ignoring NaN elements.
    NanProd,
    "nanProd",
    identity = 1.0,
    map = |v| if v.is_nan() { 1.0 } else { v },
    combine = |a, b| a * b,
    finish = |_, v| v
);
float_fold_reduce!(
    /// Smallest non-NaN element. An all-NaN sweep yields positive infinity.
    NanMin,
    "nanMin",
    identity = f64::INFINITY as _,
    map = |v| if v.is_nan() { f64::INFINITY as _ } else { v },
    combine = |a, b| if b < a { b } else { a },
    finish = |_, v| v
);
float_fold_reduce!(
    /// Largest non-NaN element. An all-NaN sweep yields negative infinity.
    NanMax,
    "nanMax",
    identity = f64::NEG_INFINITY as _,
    map = |v| if v.is_nan() { f64::NEG_INFINITY as _ } else { v },
    combine = |a, b| if b > a { b } else { a },
    finish = |_, v| v
);

// ============================================================================
// Variance
// ============================================================================

/// Compensated two-pass variance with `ddof` delta degrees of freedom.
///
/// Computes `(sum((v - m)^2) - sum(v - m)^2 / (n - ddof)) / (n - ddof)`: the
/// linear-deviation term cancels the error introduced when `m` is not the
/// exact mean, so a caller-supplied approximate mean still yields the exact
/// variance. A provided mean that is not finite is ignored and the mean is
/// computed from the data. `ddof >= n` yields an IEEE infinity or NaN.
pub struct Varc {
    ddof: usize,
    mean: Option<f64>,
}

impl Varc {
    pub fn new(ddof: usize) -> Self {
        Varc { ddof, mean: None }
    }

    /// Reuse a mean the caller already computed instead of a first pass.
    pub fn with_mean(ddof: usize, mean: f64) -> Self {
        Varc {
            ddof,
            mean: Some(mean),
        }
    }
}

#[derive(Clone, Copy)]
enum Sweep {
    Unit,
    Step,
    Generic,
}

/// Squared and linear deviation sums against `mean`, with per-lane
/// accumulators collapsed once per outer offset.
fn deviation_sums_unit<T: FloatElement>(
    lp: &StrideLoop,
    storage: &Storage<T>,
    mean: T,
) -> (T, T) {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut sum2 = T::zero();
        let mut sum3 = T::zero();
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            if lp.simd_bound > 0 {
                let mut v2 = [T::zero(); MAX_LANES];
                let mut v3 = [T::zero(); MAX_LANES];
                while i < lp.simd_bound {
                    storage.load_lanes(p, &mut buf[..lanes]);
                    for ((a2, a3), &v) in
                        v2[..lanes].iter_mut().zip(v3[..lanes].iter_mut()).zip(&buf[..lanes])
                    {
                        let d = v - mean;
                        *a2 = *a2 + d * d;
                        *a3 = *a3 + d;
                    }
                    p += lanes as isize;
                    i += lanes;
                }
                for (&a2, &a3) in v2[..lanes].iter().zip(&v3[..lanes]) {
                    sum2 = sum2 + a2;
                    sum3 = sum3 + a3;
                }
            }
            while i < lp.size {
                let d = storage.get(p) - mean;
                sum2 = sum2 + d * d;
                sum3 = sum3 + d;
                p += 1;
                i += 1;
            }
        }
        (sum2, sum3)
    })
}

fn deviation_sums_step<T: FloatElement>(
    lp: &StrideLoop,
    storage: &Storage<T>,
    mean: T,
) -> (T, T) {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut sum2 = T::zero();
        let mut sum3 = T::zero();
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            if lp.simd_bound > 0 {
                let mut v2 = [T::zero(); MAX_LANES];
                let mut v3 = [T::zero(); MAX_LANES];
                while i < lp.simd_bound {
                    storage.gather(p, lp.lane_offsets(), &mut buf[..lanes]);
                    for ((a2, a3), &v) in
                        v2[..lanes].iter_mut().zip(v3[..lanes].iter_mut()).zip(&buf[..lanes])
                    {
                        let d = v - mean;
                        *a2 = *a2 + d * d;
                        *a3 = *a3 + d;
                    }
                    p += lanes as isize * lp.step;
                    i += lanes;
                }
                for (&a2, &a3) in v2[..lanes].iter().zip(&v3[..lanes]) {
                    sum2 = sum2 + a2;
                    sum3 = sum3 + a3;
                }
            }
            while i < lp.size {
                let d = storage.get(p) - mean;
                sum2 = sum2 + d * d;
                sum3 = sum3 + d;
                p += lp.step;
                i += 1;
            }
        }
        (sum2, sum3)
    })
}

fn deviation_sums_generic<T: FloatElement>(
    lp: &StrideLoop,
    storage: &Storage<T>,
    mean: T,
) -> (T, T) {
    let mut sum2 = T::zero();
    let mut sum3 = T::zero();
    for &start in &lp.offsets {
        let mut p = start;
        for _ in 0..lp.size {
            let d = storage.get(p) - mean;
            sum2 = sum2 + d * d;
            sum3 = sum3 + d;
            p += lp.step;
        }
    }
    (sum2, sum3)
}

fn variance<T: FloatElement>(
    op: &Varc,
    lp: &StrideLoop,
    storage: &Storage<T>,
    sweep: Sweep,
) -> T {
    let n = lp.total_len();
    let mean = match op.mean {
        Some(m) if m.is_finite() => m,
        _ => {
            let sum = match sweep {
                Sweep::Unit => fold_unit(lp, storage, T::zero(), |v| v, |a, b| a + b),
                Sweep::Step => fold_step(lp, storage, T::zero(), |v| v, |a, b| a + b),
                Sweep::Generic => fold_generic(lp, storage, T::zero(), |v| v, |a, b| a + b),
            };
            sum.to_f64() / n as f64
        }
    };
    let mean_t = T::from_f64(mean).unwrap_or_else(T::nan);
    let (sum2, sum3) = match sweep {
        Sweep::Unit => deviation_sums_unit(lp, storage, mean_t),
        Sweep::Step => deviation_sums_step(lp, storage, mean_t),
        Sweep::Generic => deviation_sums_generic(lp, storage, mean_t),
    };
    let den = n as f64 - op.ddof as f64;
    let result = (sum2.to_f64() - sum3.to_f64() * sum3.to_f64() / den) / den;
    T::from_f64(result).unwrap_or_else(T::nan)
}

macro_rules! impl_varc {
    ($($t:ty),+) => {
        $(impl ReduceOp<$t> for Varc {
            fn float_only(&self) -> bool {
                true
            }

            fn identity(&self) -> $t {
                0.0
            }

            fn reduce_unit(&self, lp: &StrideLoop, storage: &Storage<$t>) -> Result<$t> {
                Ok(variance(self, lp, storage, Sweep::Unit))
            }

            fn reduce_step(&self, lp: &StrideLoop, storage: &Storage<$t>) -> Result<$t> {
                Ok(variance(self, lp, storage, Sweep::Step))
            }

            fn reduce_generic(&self, lp: &StrideLoop, storage: &Storage<$t>) -> Result<$t> {
                Ok(variance(self, lp, storage, Sweep::Generic))
            }
        })+
    };
}

impl_varc!(f32, f64);
unavailable_reduce!(Varc, "varc", i8, i32);
