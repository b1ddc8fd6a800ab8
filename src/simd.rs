//! Runtime CPU-feature dispatch for the vectorizable loop bodies.
//!
//! Kernels are written as fixed-lane-width inner loops over small stack
//! buffers; wrapping them in `pulp::Arch::dispatch` lets the compiler emit
//! them under the best target features available at runtime. Without the
//! `simd` feature the wrappers are transparent and the loops still
//! auto-vectorize at the baseline target.

/// Upper bound on per-dtype lane counts, sizes the stack lane buffers.
pub(crate) const MAX_LANES: usize = 32;

#[inline(always)]
pub(crate) fn dispatch<R>(f: impl FnOnce() -> R) -> R {
    #[cfg(feature = "simd")]
    {
        pulp::Arch::new().dispatch(f)
    }
    #[cfg(not(feature = "simd"))]
    {
        f()
    }
}

#[inline(always)]
pub(crate) fn dispatch_if_large<R>(len: usize, f: impl FnOnce() -> R) -> R {
    // Avoid runtime-dispatch overhead for tiny sweeps; correctness does not
    // depend on this threshold.
    if len >= 64 {
        dispatch(f)
    } else {
        f()
    }
}
