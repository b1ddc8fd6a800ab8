//! Iteration plans over strided views.
//!
//! A [`StrideLoop`] is a transient execution plan derived from a view's
//! shape and strides, recomputed per operation. It fixes the axis the inner
//! loop sweeps (the one with the smallest absolute stride), precomputes the
//! starting offset of every inner sweep, and classifies the fastest axis
//! into one of three access patterns so kernels can dispatch to the fastest
//! applicable loop body:
//!
//! - [`AccessPattern::Unit`]: `step == 1`, contiguous vector loads/stores;
//! - [`AccessPattern::Step`]: constant non-unit step, vectorizable through
//!   gather/scatter;
//! - [`AccessPattern::Generic`]: scalar-only (zero/negative/large steps, or
//!   vectorization explicitly disabled).

use crate::dtype::Element;

/// Largest constant step for which gathered vector access is still
/// worthwhile; beyond this every lane lands on its own cache line and the
/// scalar loop wins.
pub const GATHER_STEP_LIMIT: isize = 16;

/// Classification of the fastest axis, controls which specialized loop body
/// an operator executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    /// Contiguous: `step == 1`.
    Unit,
    /// Constant non-unit step within the gather limit.
    Step,
    /// Irregular or unprofitable; scalar loop only.
    Generic,
}

/// Precomputed iteration plan for one sweep over a strided view.
///
/// The scalar remainder loop of every kernel covers `[simd_bound, size)`;
/// `simd_bound` is the largest multiple of `simd_len` not exceeding `size`
/// (or 0 for the generic pattern, forcing the whole sweep scalar).
#[derive(Debug, Clone, PartialEq)]
pub struct StrideLoop {
    /// Starting offset of each inner sweep, one per combination of the
    /// non-fastest axes.
    pub offsets: Vec<isize>,
    /// Inner-loop trip count (extent of the fastest axis).
    pub size: usize,
    /// Step between consecutive logical elements on the fastest axis.
    pub step: isize,
    /// SIMD lane count used for the vectorizable portion.
    pub simd_len: usize,
    /// Largest multiple of `simd_len` not exceeding `size`; 0 when the
    /// pattern is generic.
    pub simd_bound: usize,
    pattern: AccessPattern,
    lane_offsets: Vec<isize>,
}

impl StrideLoop {
    /// Build a plan from a view's shape, strides and base offset.
    ///
    /// The axis with the smallest absolute stride becomes the inner loop;
    /// ties prefer the last axis, matching row-major layouts. The offsets
    /// list enumerates the cartesian product of all other axes. A
    /// 0-dimensional (scalar) view yields one offset and `size == 1`.
    pub fn build<T: Element>(shape: &[usize], strides: &[isize], base: isize) -> StrideLoop {
        assert_eq!(
            shape.len(),
            strides.len(),
            "shape and strides must have equal rank"
        );
        let rank = shape.len();
        if rank == 0 {
            return StrideLoop::from_parts(vec![base], 1, 1, T::LANES);
        }

        let fast = (0..rank)
            .rev()
            .min_by_key(|&i| strides[i].unsigned_abs())
            .unwrap();
        let size = shape[fast];
        let step = strides[fast];

        let outer: Vec<usize> = (0..rank).filter(|&i| i != fast).collect();
        let count: usize = outer.iter().map(|&i| shape[i]).product();
        let mut offsets = Vec::with_capacity(count);
        if count > 0 {
            let mut idx = vec![0usize; outer.len()];
            'sweep: loop {
                let mut off = base;
                for (k, &ax) in outer.iter().enumerate() {
                    off += idx[k] as isize * strides[ax];
                }
                offsets.push(off);
                // odometer over the outer axes, last axis fastest
                let mut k = outer.len();
                loop {
                    if k == 0 {
                        break 'sweep;
                    }
                    k -= 1;
                    idx[k] += 1;
                    if idx[k] < shape[outer[k]] {
                        break;
                    }
                    idx[k] = 0;
                }
            }
        }

        StrideLoop::from_parts(offsets, size, step, T::LANES)
    }

    /// Assemble a plan from already-computed parts, classifying the access
    /// pattern and deriving the SIMD bound.
    pub fn from_parts(offsets: Vec<isize>, size: usize, step: isize, simd_len: usize) -> StrideLoop {
        debug_assert!(simd_len > 0);
        let pattern = if step == 1 {
            AccessPattern::Unit
        } else if step > 1 && step <= GATHER_STEP_LIMIT {
            AccessPattern::Step
        } else {
            AccessPattern::Generic
        };
        let simd_bound = match pattern {
            AccessPattern::Unit | AccessPattern::Step => size - size % simd_len,
            AccessPattern::Generic => 0,
        };
        let lane_offsets = (0..simd_len).map(|i| i as isize * step).collect();
        StrideLoop {
            offsets,
            size,
            step,
            simd_len,
            simd_bound,
            pattern,
            lane_offsets,
        }
    }

    /// Copy of this plan with vectorization disabled: generic pattern,
    /// `simd_bound == 0`, so every kernel takes its scalar path.
    pub fn without_vectorization(mut self) -> StrideLoop {
        self.simd_bound = 0;
        self.pattern = AccessPattern::Generic;
        self
    }

    pub fn pattern(&self) -> AccessPattern {
        self.pattern
    }

    /// Per-lane offsets (`0, step, 2*step, ...`) for gathered access.
    pub fn lane_offsets(&self) -> &[isize] {
        &self.lane_offsets
    }

    /// Total element count of the sweep, `size * offsets.len()`.
    pub fn total_len(&self) -> usize {
        self.size * self.offsets.len()
    }
}
