//! Multi-pass softmax kernels.
//!
//! Softmax is numerically stabilized with the standard max-subtraction
//! trick, which forces a fixed three-pass shape over the whole sweep:
//!
//! 1. max-reduce every element (vectorized, scalar remainder);
//! 2. rewrite each element as `exp(v - max)` while accumulating the running
//!    sum;
//! 3. divide every element by the accumulated sum.
//!
//! Computing `exp` before the max is known, or dividing before the sum is
//! fully accumulated, overflows for large inputs; the pass order is part of
//! the contract. Normalization spans the entire loop (all outer offsets);
//! per-row softmax is expressed by building one loop per row.

use super::{
    fold_generic, fold_step, fold_unit, map_generic, map_step, map_unit, unavailable_unary,
    UnaryOp,
};
use crate::dtype::FloatElement;
use crate::plan::StrideLoop;
use crate::simd::{dispatch_if_large, MAX_LANES};
use crate::storage::Storage;
use crate::Result;

#[inline(always)]
fn max_combine<T: FloatElement>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

// Pass 2: write exp(v - max) back and return the accumulated sum. Vector
// sums are collapsed into the scalar once per outer offset.

#[inline]
fn exp_writeback_unit<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>, max: T) -> T {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut sum = T::zero();
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            if lp.simd_bound > 0 {
                let mut vsum = [T::zero(); MAX_LANES];
                while i < lp.simd_bound {
                    storage.load_lanes(p, &mut buf[..lanes]);
                    for (v, a) in buf[..lanes].iter_mut().zip(vsum[..lanes].iter_mut()) {
                        *v = (*v - max).exp();
                        *a = *a + *v;
                    }
                    storage.store_lanes(p, &buf[..lanes]);
                    p += lanes as isize;
                    i += lanes;
                }
                for &a in &vsum[..lanes] {
                    sum = sum + a;
                }
            }
            while i < lp.size {
                let v = (storage.get(p) - max).exp();
                sum = sum + v;
                storage.set(p, v);
                p += 1;
                i += 1;
            }
        }
        sum
    })
}

#[inline]
fn exp_writeback_step<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>, max: T) -> T {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut sum = T::zero();
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            if lp.simd_bound > 0 {
                let mut vsum = [T::zero(); MAX_LANES];
                while i < lp.simd_bound {
                    storage.gather(p, lp.lane_offsets(), &mut buf[..lanes]);
                    for (v, a) in buf[..lanes].iter_mut().zip(vsum[..lanes].iter_mut()) {
                        *v = (*v - max).exp();
                        *a = *a + *v;
                    }
                    storage.scatter(p, lp.lane_offsets(), &buf[..lanes]);
                    p += lanes as isize * lp.step;
                    i += lanes;
                }
                for &a in &vsum[..lanes] {
                    sum = sum + a;
                }
            }
            while i < lp.size {
                let v = (storage.get(p) - max).exp();
                sum = sum + v;
                storage.set(p, v);
                p += lp.step;
                i += 1;
            }
        }
        sum
    })
}

#[inline]
fn exp_writeback_generic<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>, max: T) -> T {
    let mut sum = T::zero();
    for &start in &lp.offsets {
        let mut p = start;
        for _ in 0..lp.size {
            let v = (storage.get(p) - max).exp();
            sum = sum + v;
            storage.set(p, v);
            p += lp.step;
        }
    }
    sum
}

fn softmax_unit<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>) {
    let max = fold_unit(lp, storage, T::neg_infinity(), |v| v, max_combine);
    let sum = exp_writeback_unit(lp, storage, max);
    map_unit(lp, storage, |v| v / sum);
}

fn softmax_step<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>) {
    let max = fold_step(lp, storage, T::neg_infinity(), |v| v, max_combine);
    let sum = exp_writeback_step(lp, storage, max);
    map_step(lp, storage, |v| v / sum);
}

fn softmax_generic<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>) {
    let max = fold_generic(lp, storage, T::neg_infinity(), |v| v, max_combine);
    let sum = exp_writeback_generic(lp, storage, max);
    map_generic(lp, storage, |v| v / sum);
}

// LogSoftmax shares passes 1 and 2 (without writeback) and finishes with
// `v - max - ln(sum)`.

fn log_softmax_unit<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>) {
    let max = fold_unit(lp, storage, T::neg_infinity(), |v| v, max_combine);
    let sum = fold_unit(lp, storage, T::zero(), |v| (v - max).exp(), |a, b| a + b);
    let log_sum = sum.ln();
    map_unit(lp, storage, |v| v - max - log_sum);
}

fn log_softmax_step<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>) {
    let max = fold_step(lp, storage, T::neg_infinity(), |v| v, max_combine);
    let sum = fold_step(lp, storage, T::zero(), |v| (v - max).exp(), |a, b| a + b);
    let log_sum = sum.ln();
    map_step(lp, storage, |v| v - max - log_sum);
}

fn log_softmax_generic<T: FloatElement>(lp: &StrideLoop, storage: &mut Storage<T>) {
    let max = fold_generic(lp, storage, T::neg_infinity(), |v| v, max_combine);
    let sum = fold_generic(lp, storage, T::zero(), |v| (v - max).exp(), |a, b| a + b);
    let log_sum = sum.ln();
    map_generic(lp, storage, |v| v - max - log_sum);
}

macro_rules! impl_multipass {
    ($op:ident, $name:literal, $unit:ident, $step:ident, $generic:ident) => {
        impl UnaryOp<f32> for $op {
            fn float_only(&self) -> bool {
                true
            }

            fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
                $unit(lp, storage);
                Ok(())
            }

            fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
                $step(lp, storage);
                Ok(())
            }

            fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<f32>) -> Result<()> {
                $generic(lp, storage);
                Ok(())
            }
        }

        impl UnaryOp<f64> for $op {
            fn float_only(&self) -> bool {
                true
            }

            fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
                $unit(lp, storage);
                Ok(())
            }

            fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
                $step(lp, storage);
                Ok(())
            }

            fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<f64>) -> Result<()> {
                $generic(lp, storage);
                Ok(())
            }
        }

        unavailable_unary!($op, $name, i8, i32);
    };
}

/// Numerically-stabilized softmax over the whole sweep, in place.
pub struct Softmax;

impl_multipass!(Softmax, "softmax", softmax_unit, softmax_step, softmax_generic);

/// `log(softmax(x))` computed directly as `x - max - ln(sum(exp(x - max)))`.
pub struct LogSoftmax;

impl_multipass!(
    LogSoftmax,
    "log_softmax",
    log_softmax_unit,
    log_softmax_step,
    log_softmax_generic
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KernelError;
    use approx::assert_relative_eq;

    #[test]
    fn known_values() {
        let lp = StrideLoop::build::<f64>(&[3], &[1], 0);
        let mut st = Storage::from_vec(vec![1.0, 2.0, 3.0]);
        Softmax.apply(&lp, &mut st).unwrap();
        assert_relative_eq!(st.get(0), 0.09003057, epsilon = 1e-6);
        assert_relative_eq!(st.get(1), 0.24472847, epsilon = 1e-6);
        assert_relative_eq!(st.get(2), 0.66524096, epsilon = 1e-6);
        let total: f64 = st.as_slice().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn shift_invariance_prevents_overflow() {
        let lp = StrideLoop::build::<f64>(&[3], &[1], 0);
        let mut small = Storage::from_vec(vec![1.0f64, 2.0, 3.0]);
        let mut large = Storage::from_vec(vec![1001.0f64, 1002.0, 1003.0]);
        Softmax.apply(&lp, &mut small).unwrap();
        Softmax.apply(&lp, &mut large).unwrap();
        for i in 0..3 {
            assert!(large.get(i).is_finite());
            assert_relative_eq!(small.get(i), large.get(i), epsilon = 1e-9);
        }
    }

    #[test]
    fn outputs_in_unit_interval() {
        let lp = StrideLoop::build::<f64>(&[6], &[1], 0);
        let mut st = Storage::from_vec(vec![-4.0, -1.0, 0.0, 0.5, 2.0, 8.0]);
        Softmax.apply(&lp, &mut st).unwrap();
        for &v in st.as_slice() {
            assert!(v > 0.0 && v <= 1.0);
        }
        let total: f64 = st.as_slice().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn log_softmax_matches_log_of_softmax() {
        let values = vec![0.2f64, -1.5, 3.0, 0.0, 2.5];
        let lp = StrideLoop::build::<f64>(&[5], &[1], 0);

        let mut direct = Storage::from_vec(values.clone());
        LogSoftmax.apply(&lp, &mut direct).unwrap();

        let mut via_softmax = Storage::from_vec(values);
        Softmax.apply(&lp, &mut via_softmax).unwrap();
        for i in 0..5 {
            assert_relative_eq!(direct.get(i), via_softmax.get(i).ln(), epsilon = 1e-9);
        }
    }

    #[test]
    fn integer_dtypes_rejected_on_every_entry_point() {
        let lp = StrideLoop::build::<i8>(&[4], &[1], 0);
        let mut st = Storage::from_vec(vec![1i8, 2, 3, 4]);
        for r in [
            Softmax.apply_unit(&lp, &mut st),
            Softmax.apply_step(&lp, &mut st),
            Softmax.apply_generic(&lp, &mut st),
            LogSoftmax.apply(&lp, &mut st),
        ] {
            assert!(matches!(r, Err(KernelError::OperationNotAvailable { .. })));
        }
        assert_eq!(st.as_slice(), &[1, 2, 3, 4]);
    }
}
