//! Operator kernels: dtype-polymorphic strategy objects over [`StrideLoop`]
//! plans and [`Storage`] buffers.
//!
//! Every operator family exposes one specialized entry point per access
//! pattern (`*_unit`, `*_step`, `*_generic`) plus a dispatching `apply` /
//! `reduce` that selects the fastest applicable loop body from the plan's
//! classification. Operators undefined for integer dtypes advertise
//! [`float_only`](UnaryOp::float_only) and return
//! [`KernelError::OperationNotAvailable`] from every entry point instead of
//! truncating or silently no-opping.
//!
//! The loop bodies share a small set of generic drivers (map / fill / zip /
//! fold) that the compiler monomorphizes per dtype. Each driver walks the
//! vectorizable portion `[0, simd_bound)` in `simd_len` groups over a stack
//! lane buffer and finishes the `[simd_bound, size)` remainder with scalar
//! accesses. Fold drivers keep a per-sweep lane accumulator and reduce it
//! horizontally once per outer offset, not once per group.

use crate::dtype::Element;
use crate::plan::{AccessPattern, StrideLoop};
use crate::simd::{dispatch_if_large, MAX_LANES};
use crate::storage::Storage;
use crate::{KernelError, Result};

pub mod binary;
pub mod compare;
pub mod reduce;
pub mod softmax;
pub mod unary;

pub use compare::Compare;

// ============================================================================
// Operator traits
// ============================================================================

/// Elementwise kernel mutating one buffer in place.
pub trait UnaryOp<T: Element> {
    /// Whether the operation is undefined for integer dtypes.
    fn float_only(&self) -> bool {
        false
    }

    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()>;
    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()>;
    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()>;

    /// Dispatch on the plan's access-pattern classification.
    fn apply(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        match lp.pattern() {
            AccessPattern::Unit => self.apply_unit(lp, storage),
            AccessPattern::Step => self.apply_step(lp, storage),
            AccessPattern::Generic => self.apply_generic(lp, storage),
        }
    }
}

/// Elementwise kernel combining two buffers, writing into the left one.
pub trait BinaryOp<T: Element> {
    fn float_only(&self) -> bool {
        false
    }

    fn apply_unit(
        &self,
        lhs: &StrideLoop,
        dst: &mut Storage<T>,
        rhs: &StrideLoop,
        src: &Storage<T>,
    ) -> Result<()>;
    fn apply_step(
        &self,
        lhs: &StrideLoop,
        dst: &mut Storage<T>,
        rhs: &StrideLoop,
        src: &Storage<T>,
    ) -> Result<()>;
    fn apply_generic(
        &self,
        lhs: &StrideLoop,
        dst: &mut Storage<T>,
        rhs: &StrideLoop,
        src: &Storage<T>,
    ) -> Result<()>;

    /// Validate loop compatibility and dispatch: unit when both plans are
    /// unit, generic when either is, gathered step otherwise.
    fn apply(
        &self,
        lhs: &StrideLoop,
        dst: &mut Storage<T>,
        rhs: &StrideLoop,
        src: &Storage<T>,
    ) -> Result<()> {
        ensure_compatible(lhs, rhs)?;
        match (lhs.pattern(), rhs.pattern()) {
            (AccessPattern::Unit, AccessPattern::Unit) => self.apply_unit(lhs, dst, rhs, src),
            (AccessPattern::Generic, _) | (_, AccessPattern::Generic) => {
                self.apply_generic(lhs, dst, rhs, src)
            }
            _ => self.apply_step(lhs, dst, rhs, src),
        }
    }
}

/// Kernel folding an entire sweep into one scalar.
pub trait ReduceOp<T: Element> {
    fn float_only(&self) -> bool {
        false
    }

    /// Identity element of the fold; also seeds the lane accumulators.
    fn identity(&self) -> T;

    fn reduce_unit(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T>;
    fn reduce_step(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T>;
    fn reduce_generic(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T>;

    fn reduce(&self, lp: &StrideLoop, storage: &Storage<T>) -> Result<T> {
        match lp.pattern() {
            AccessPattern::Unit => self.reduce_unit(lp, storage),
            AccessPattern::Step => self.reduce_step(lp, storage),
            AccessPattern::Generic => self.reduce_generic(lp, storage),
        }
    }
}

pub(crate) fn ensure_compatible(lhs: &StrideLoop, rhs: &StrideLoop) -> Result<()> {
    if lhs.size != rhs.size {
        return Err(KernelError::SizeMismatch(lhs.size, rhs.size));
    }
    if lhs.offsets.len() != rhs.offsets.len() {
        return Err(KernelError::OffsetCountMismatch(
            lhs.offsets.len(),
            rhs.offsets.len(),
        ));
    }
    Ok(())
}

// ============================================================================
// Map drivers (read-modify-write)
// ============================================================================

#[inline]
pub(crate) fn map_unit<T: Element>(lp: &StrideLoop, storage: &mut Storage<T>, f: impl Fn(T) -> T) {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            while i < lp.simd_bound {
                let buf = &mut buf[..lanes];
                storage.load_lanes(p, buf);
                for v in buf.iter_mut() {
                    *v = f(*v);
                }
                storage.store_lanes(p, buf);
                p += lanes as isize;
                i += lanes;
            }
            while i < lp.size {
                let v = f(storage.get(p));
                storage.set(p, v);
                p += 1;
                i += 1;
            }
        }
    })
}

#[inline]
pub(crate) fn map_step<T: Element>(lp: &StrideLoop, storage: &mut Storage<T>, f: impl Fn(T) -> T) {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            while i < lp.simd_bound {
                let buf = &mut buf[..lanes];
                storage.gather(p, lp.lane_offsets(), buf);
                for v in buf.iter_mut() {
                    *v = f(*v);
                }
                storage.scatter(p, lp.lane_offsets(), buf);
                p += lanes as isize * lp.step;
                i += lanes;
            }
            while i < lp.size {
                let v = f(storage.get(p));
                storage.set(p, v);
                p += lp.step;
                i += 1;
            }
        }
    })
}

#[inline]
pub(crate) fn map_generic<T: Element>(
    lp: &StrideLoop,
    storage: &mut Storage<T>,
    f: impl Fn(T) -> T,
) {
    for &start in &lp.offsets {
        let mut p = start;
        for _ in 0..lp.size {
            let v = f(storage.get(p));
            storage.set(p, v);
            p += lp.step;
        }
    }
}

// ============================================================================
// Fill drivers (write-only, constant broadcast once)
// ============================================================================

#[inline]
pub(crate) fn fill_unit<T: Element>(lp: &StrideLoop, storage: &mut Storage<T>, value: T) {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let buf = [value; MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            while i < lp.simd_bound {
                storage.store_lanes(p, &buf[..lanes]);
                p += lanes as isize;
                i += lanes;
            }
            while i < lp.size {
                storage.set(p, value);
                p += 1;
                i += 1;
            }
        }
    })
}

#[inline]
pub(crate) fn fill_step<T: Element>(lp: &StrideLoop, storage: &mut Storage<T>, value: T) {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let buf = [value; MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            while i < lp.simd_bound {
                storage.scatter(p, lp.lane_offsets(), &buf[..lanes]);
                p += lanes as isize * lp.step;
                i += lanes;
            }
            while i < lp.size {
                storage.set(p, value);
                p += lp.step;
                i += 1;
            }
        }
    })
}

#[inline]
pub(crate) fn fill_generic<T: Element>(lp: &StrideLoop, storage: &mut Storage<T>, value: T) {
    for &start in &lp.offsets {
        let mut p = start;
        for _ in 0..lp.size {
            storage.set(p, value);
            p += lp.step;
        }
    }
}

// ============================================================================
// Zip drivers (binary, in place on the left buffer)
// ============================================================================

#[inline]
pub(crate) fn zip_unit<T: Element>(
    lhs: &StrideLoop,
    dst: &mut Storage<T>,
    rhs: &StrideLoop,
    src: &Storage<T>,
    f: impl Fn(T, T) -> T,
) {
    debug_assert_eq!(lhs.simd_len, rhs.simd_len);
    dispatch_if_large(lhs.total_len(), || {
        let lanes = lhs.simd_len;
        let bound = lhs.simd_bound.min(rhs.simd_bound);
        let mut a = [T::zero(); MAX_LANES];
        let mut b = [T::zero(); MAX_LANES];
        for (&lstart, &rstart) in lhs.offsets.iter().zip(&rhs.offsets) {
            let mut lp = lstart;
            let mut rp = rstart;
            let mut i = 0usize;
            while i < bound {
                let a = &mut a[..lanes];
                let b = &mut b[..lanes];
                dst.load_lanes(lp, a);
                src.load_lanes(rp, b);
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x = f(*x, *y);
                }
                dst.store_lanes(lp, a);
                lp += lanes as isize;
                rp += lanes as isize;
                i += lanes;
            }
            while i < lhs.size {
                let v = f(dst.get(lp), src.get(rp));
                dst.set(lp, v);
                lp += 1;
                rp += 1;
                i += 1;
            }
        }
    })
}

#[inline]
pub(crate) fn zip_step<T: Element>(
    lhs: &StrideLoop,
    dst: &mut Storage<T>,
    rhs: &StrideLoop,
    src: &Storage<T>,
    f: impl Fn(T, T) -> T,
) {
    debug_assert_eq!(lhs.simd_len, rhs.simd_len);
    dispatch_if_large(lhs.total_len(), || {
        let lanes = lhs.simd_len;
        let bound = lhs.simd_bound.min(rhs.simd_bound);
        let mut a = [T::zero(); MAX_LANES];
        let mut b = [T::zero(); MAX_LANES];
        for (&lstart, &rstart) in lhs.offsets.iter().zip(&rhs.offsets) {
            let mut lp = lstart;
            let mut rp = rstart;
            let mut i = 0usize;
            while i < bound {
                let a = &mut a[..lanes];
                let b = &mut b[..lanes];
                dst.gather(lp, lhs.lane_offsets(), a);
                src.gather(rp, rhs.lane_offsets(), b);
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    *x = f(*x, *y);
                }
                dst.scatter(lp, lhs.lane_offsets(), a);
                lp += lanes as isize * lhs.step;
                rp += lanes as isize * rhs.step;
                i += lanes;
            }
            while i < lhs.size {
                let v = f(dst.get(lp), src.get(rp));
                dst.set(lp, v);
                lp += lhs.step;
                rp += rhs.step;
                i += 1;
            }
        }
    })
}

#[inline]
pub(crate) fn zip_generic<T: Element>(
    lhs: &StrideLoop,
    dst: &mut Storage<T>,
    rhs: &StrideLoop,
    src: &Storage<T>,
    f: impl Fn(T, T) -> T,
) {
    for (&lstart, &rstart) in lhs.offsets.iter().zip(&rhs.offsets) {
        let mut lp = lstart;
        let mut rp = rstart;
        for _ in 0..lhs.size {
            let v = f(dst.get(lp), src.get(rp));
            dst.set(lp, v);
            lp += lhs.step;
            rp += rhs.step;
        }
    }
}

// ============================================================================
// Fold drivers (reductions)
// ============================================================================

/// Fold the whole sweep with contiguous vector loads. `map` transforms each
/// raw element, `combine` is the associative fold applied both lanewise and
/// when collapsing the lane accumulator into the scalar result.
#[inline]
pub(crate) fn fold_unit<T: Element>(
    lp: &StrideLoop,
    storage: &Storage<T>,
    identity: T,
    map: impl Fn(T) -> T,
    combine: impl Fn(T, T) -> T,
) -> T {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut acc = identity;
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            if lp.simd_bound > 0 {
                let mut vacc = [identity; MAX_LANES];
                while i < lp.simd_bound {
                    storage.load_lanes(p, &mut buf[..lanes]);
                    for (a, &v) in vacc[..lanes].iter_mut().zip(&buf[..lanes]) {
                        *a = combine(*a, map(v));
                    }
                    p += lanes as isize;
                    i += lanes;
                }
                for &v in &vacc[..lanes] {
                    acc = combine(acc, v);
                }
            }
            while i < lp.size {
                acc = combine(acc, map(storage.get(p)));
                p += 1;
                i += 1;
            }
        }
        acc
    })
}

#[inline]
pub(crate) fn fold_step<T: Element>(
    lp: &StrideLoop,
    storage: &Storage<T>,
    identity: T,
    map: impl Fn(T) -> T,
    combine: impl Fn(T, T) -> T,
) -> T {
    dispatch_if_large(lp.total_len(), || {
        let lanes = lp.simd_len;
        let mut acc = identity;
        let mut buf = [T::zero(); MAX_LANES];
        for &start in &lp.offsets {
            let mut p = start;
            let mut i = 0usize;
            if lp.simd_bound > 0 {
                let mut vacc = [identity; MAX_LANES];
                while i < lp.simd_bound {
                    storage.gather(p, lp.lane_offsets(), &mut buf[..lanes]);
                    for (a, &v) in vacc[..lanes].iter_mut().zip(&buf[..lanes]) {
                        *a = combine(*a, map(v));
                    }
                    p += lanes as isize * lp.step;
                    i += lanes;
                }
                for &v in &vacc[..lanes] {
                    acc = combine(acc, v);
                }
            }
            while i < lp.size {
                acc = combine(acc, map(storage.get(p)));
                p += lp.step;
                i += 1;
            }
        }
        acc
    })
}

#[inline]
pub(crate) fn fold_generic<T: Element>(
    lp: &StrideLoop,
    storage: &Storage<T>,
    identity: T,
    map: impl Fn(T) -> T,
    combine: impl Fn(T, T) -> T,
) -> T {
    let mut acc = identity;
    for &start in &lp.offsets {
        let mut p = start;
        for _ in 0..lp.size {
            acc = combine(acc, map(storage.get(p)));
            p += lp.step;
        }
    }
    acc
}

// ============================================================================
// Integer-dtype rejection for float-only operators
// ============================================================================

/// Implement `UnaryOp` for integer dtypes as hard failures. Every entry
/// point returns `OperationNotAvailable`; nothing is ever partially applied.
macro_rules! unavailable_unary {
    ($op:ty, $name:literal, $($t:ty),+) => {
        $(impl $crate::ops::UnaryOp<$t> for $op {
            fn float_only(&self) -> bool {
                true
            }
            fn apply_unit(
                &self,
                _lp: &$crate::StrideLoop,
                _storage: &mut $crate::Storage<$t>,
            ) -> $crate::Result<()> {
                Err($crate::KernelError::OperationNotAvailable {
                    op: $name,
                    dtype: <$t as $crate::Element>::DTYPE,
                })
            }
            fn apply_step(
                &self,
                _lp: &$crate::StrideLoop,
                _storage: &mut $crate::Storage<$t>,
            ) -> $crate::Result<()> {
                Err($crate::KernelError::OperationNotAvailable {
                    op: $name,
                    dtype: <$t as $crate::Element>::DTYPE,
                })
            }
            fn apply_generic(
                &self,
                _lp: &$crate::StrideLoop,
                _storage: &mut $crate::Storage<$t>,
            ) -> $crate::Result<()> {
                Err($crate::KernelError::OperationNotAvailable {
                    op: $name,
                    dtype: <$t as $crate::Element>::DTYPE,
                })
            }
        })+
    };
}

/// Same rejection for reduction operators.
macro_rules! unavailable_reduce {
    ($op:ty, $name:literal, $($t:ty),+) => {
        $(impl $crate::ops::ReduceOp<$t> for $op {
            fn float_only(&self) -> bool {
                true
            }
            fn identity(&self) -> $t {
                <$t as num_traits::Zero>::zero()
            }
            fn reduce_unit(
                &self,
                _lp: &$crate::StrideLoop,
                _storage: &$crate::Storage<$t>,
            ) -> $crate::Result<$t> {
                Err($crate::KernelError::OperationNotAvailable {
                    op: $name,
                    dtype: <$t as $crate::Element>::DTYPE,
                })
            }
            fn reduce_step(
                &self,
                _lp: &$crate::StrideLoop,
                _storage: &$crate::Storage<$t>,
            ) -> $crate::Result<$t> {
                Err($crate::KernelError::OperationNotAvailable {
                    op: $name,
                    dtype: <$t as $crate::Element>::DTYPE,
                })
            }
            fn reduce_generic(
                &self,
                _lp: &$crate::StrideLoop,
                _storage: &$crate::Storage<$t>,
            ) -> $crate::Result<$t> {
                Err($crate::KernelError::OperationNotAvailable {
                    op: $name,
                    dtype: <$t as $crate::Element>::DTYPE,
                })
            }
        })+
    };
}

pub(crate) use unavailable_reduce;
pub(crate) use unavailable_unary;
