//! Owning flat typed buffer underlying one or more array views.
//!
//! `Storage` is the leaf dependency of the engine: every kernel pulls and
//! pushes data through it, either element-wise or in SIMD-lane groups. The
//! length is fixed at construction; there is no resizing.
//!
//! Offsets are `isize` because strided sweeps walk the buffer with signed
//! steps. Callers (the operator kernels) are responsible for supplying
//! offsets consistent with the [`StrideLoop`](crate::StrideLoop) that
//! produced them; a stale or foreign offset is a contract violation, caught
//! by debug assertions and by the slice bounds check.
//!
//! Mutation requires `&mut Storage<T>`. Read-only aliasing across views is
//! expressed with `Arc<Storage<T>>`; a view layer that wants zero-copy
//! mutable aliasing (reshape/transpose without copy) owns that
//! responsibility above this crate, see DESIGN.md.

use crate::dtype::Element;

/// Owning, fixed-length, contiguous buffer of one element kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Storage<T> {
    data: Box<[T]>,
}

impl<T: Element> Storage<T> {
    /// Take ownership of an existing buffer.
    pub fn from_vec(data: Vec<T>) -> Self {
        Storage {
            data: data.into_boxed_slice(),
        }
    }

    /// A buffer of `len` copies of `value`.
    pub fn filled(len: usize, value: T) -> Self {
        Storage {
            data: vec![value; len].into_boxed_slice(),
        }
    }

    /// A zero-initialized buffer of `len` elements.
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, T::zero())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Scalar read at a linear offset.
    #[inline(always)]
    pub fn get(&self, offset: isize) -> T {
        debug_assert!(offset >= 0, "negative storage offset {offset}");
        self.data[offset as usize]
    }

    /// Scalar write at a linear offset.
    #[inline(always)]
    pub fn set(&mut self, offset: isize, value: T) {
        debug_assert!(offset >= 0, "negative storage offset {offset}");
        self.data[offset as usize] = value;
    }

    /// Contiguous read of `lanes.len()` elements starting at `offset`.
    #[inline(always)]
    pub fn load_lanes(&self, offset: isize, lanes: &mut [T]) {
        debug_assert!(offset >= 0, "negative storage offset {offset}");
        let start = offset as usize;
        lanes.copy_from_slice(&self.data[start..start + lanes.len()]);
    }

    /// Contiguous write of `lanes.len()` elements starting at `offset`.
    #[inline(always)]
    pub fn store_lanes(&mut self, offset: isize, lanes: &[T]) {
        debug_assert!(offset >= 0, "negative storage offset {offset}");
        let start = offset as usize;
        self.data[start..start + lanes.len()].copy_from_slice(lanes);
    }

    /// Gathered read: lane `k` comes from `base + lane_offsets[k]`.
    #[inline(always)]
    pub fn gather(&self, base: isize, lane_offsets: &[isize], lanes: &mut [T]) {
        debug_assert_eq!(lane_offsets.len(), lanes.len());
        for (lane, &off) in lanes.iter_mut().zip(lane_offsets) {
            let p = base + off;
            debug_assert!(p >= 0, "negative storage offset {p}");
            *lane = self.data[p as usize];
        }
    }

    /// Scattered write: lane `k` lands at `base + lane_offsets[k]`.
    #[inline(always)]
    pub fn scatter(&mut self, base: isize, lane_offsets: &[isize], lanes: &[T]) {
        debug_assert_eq!(lane_offsets.len(), lanes.len());
        for (&lane, &off) in lanes.iter().zip(lane_offsets) {
            let p = base + off;
            debug_assert!(p >= 0, "negative storage offset {p}");
            self.data[p as usize] = lane;
        }
    }
}

impl<T: Element> From<Vec<T>> for Storage<T> {
    fn from(data: Vec<T>) -> Self {
        Storage::from_vec(data)
    }
}
