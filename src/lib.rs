//! Dtype-polymorphic, stride-aware operator kernels for dense n-dimensional
//! arrays.
//!
//! The crate separates *what* an operator computes from *how* the data is
//! laid out. A [`StrideLoop`] compresses an n-dimensional shape/stride pair
//! into a flat sweep (outer start offsets, an inner size and a constant inner
//! step) and classifies the sweep into one of three access patterns:
//!
//! - [`AccessPattern::Unit`]: step 1, contiguous vector loads and stores;
//! - [`AccessPattern::Step`]: constant step up to [`GATHER_STEP_LIMIT`],
//!   gathered vector traffic;
//! - [`AccessPattern::Generic`]: anything else, scalar accesses only.
//!
//! Operators come in three families, each a trait with one entry point per
//! pattern plus a dispatching driver:
//!
//! - [`UnaryOp`]: in-place elementwise kernels ([`ops::unary`],
//!   [`ops::compare`], [`ops::softmax`]);
//! - [`BinaryOp`]: two-buffer elementwise kernels writing into the left
//!   operand ([`ops::binary`]);
//! - [`ReduceOp`]: whole-sweep folds to a scalar ([`ops::reduce`]).
//!
//! All loop bodies process the vectorizable prefix `[0, simd_bound)` through
//! fixed-size lane buffers sized by the element's [`Element::LANES`], then
//! finish the remainder with scalar accesses, so every pattern yields
//! bit-identical results for integer dtypes. Operations that are undefined
//! for integer dtypes (transcendentals, NaN-aware reductions, variance)
//! return [`KernelError::OperationNotAvailable`] instead of truncating.
//!
//! # Example
//!
//! ```rust
//! use narray_kernel::{ops, Storage, StrideLoop, UnaryOp, ReduceOp};
//!
//! // a length-5 view striding every third slot of the buffer
//! let lp = StrideLoop::build::<f64>(&[5], &[3], 0);
//! let mut st = Storage::from_vec(vec![
//!     1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0, 0.0, 4.0, 0.0, 0.0, 5.0,
//! ]);
//!
//! ops::unary::Sqr.apply(&lp, &mut st)?;
//! let total = ops::reduce::Sum.reduce(&lp, &st)?;
//! assert_eq!(total, 55.0);
//! # Ok::<(), narray_kernel::KernelError>(())
//! ```

pub mod dtype;
pub mod ops;
pub mod plan;
pub(crate) mod simd;
pub mod storage;

pub use dtype::{DType, Element, FloatElement};
pub use ops::{BinaryOp, Compare, ReduceOp, UnaryOp};
pub use plan::{AccessPattern, StrideLoop, GATHER_STEP_LIMIT};
pub use storage::Storage;

/// Errors surfaced by kernel construction and dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// The operation is undefined for the buffer's dtype.
    #[error("operation `{op}` is not available for dtype {dtype}")]
    OperationNotAvailable { op: &'static str, dtype: DType },

    /// Binary operands disagree on inner sweep length.
    #[error("loop size mismatch: {0} vs {1}")]
    SizeMismatch(usize, usize),

    /// Binary operands disagree on outer offset count.
    #[error("outer offset count mismatch: {0} vs {1}")]
    OffsetCountMismatch(usize, usize),

    /// Clamp bounds are inverted or unrepresentable in the target dtype.
    #[error("invalid clamp bounds")]
    InvalidClamp,
}

pub type Result<T> = std::result::Result<T, KernelError>;
