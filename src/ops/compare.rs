//! Comparison-to-mask kernel.
//!
//! `CompareMask` compares every element against a fixed reference value and
//! writes `1` where the comparator holds and `0` where it does not, in
//! place. The vector path computes a lane mask, blends `1` where the mask
//! is true, then blends `0` where it is false (a select expressed as two
//! blends). The scalar remainder uses the predicate directly.

use super::UnaryOp;
use crate::dtype::Element;
use crate::plan::StrideLoop;
use crate::simd::{dispatch_if_large, MAX_LANES};
use crate::storage::Storage;
use crate::Result;

/// Comparator strategy: a scalar predicate with a matching vector-mask
/// equivalent in the lane loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl Compare {
    /// Scalar predicate.
    #[inline(always)]
    pub fn matches<T: PartialOrd>(self, value: T, reference: T) -> bool {
        match self {
            Compare::Lt => value < reference,
            Compare::Le => value <= reference,
            Compare::Eq => value == reference,
            Compare::Ge => value >= reference,
            Compare::Gt => value > reference,
            Compare::Ne => value != reference,
        }
    }
}

/// Compare every element against a fixed reference, producing a 0/1 mask in
/// place. Available for all dtypes.
pub struct CompareMask<T> {
    compare: Compare,
    reference: T,
}

impl<T: Element> CompareMask<T> {
    pub fn new(compare: Compare, reference: T) -> Self {
        CompareMask { compare, reference }
    }

    // mask, blend 1, blend 0
    #[inline(always)]
    fn mask_lanes(&self, buf: &mut [T]) {
        let mut mask = [false; MAX_LANES];
        for (m, v) in mask.iter_mut().zip(buf.iter()) {
            *m = self.compare.matches(*v, self.reference);
        }
        for (v, m) in buf.iter_mut().zip(mask.iter()) {
            if *m {
                *v = T::one();
            }
        }
        for (v, m) in buf.iter_mut().zip(mask.iter()) {
            if !*m {
                *v = T::zero();
            }
        }
    }

    #[inline(always)]
    fn mask_scalar(&self, v: T) -> T {
        if self.compare.matches(v, self.reference) {
            T::one()
        } else {
            T::zero()
        }
    }
}

impl<T: Element> UnaryOp<T> for CompareMask<T> {
    fn apply_unit(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        dispatch_if_large(lp.total_len(), || {
            let lanes = lp.simd_len;
            let mut buf = [T::zero(); MAX_LANES];
            for &start in &lp.offsets {
                let mut p = start;
                let mut i = 0usize;
                while i < lp.simd_bound {
                    storage.load_lanes(p, &mut buf[..lanes]);
                    self.mask_lanes(&mut buf[..lanes]);
                    storage.store_lanes(p, &buf[..lanes]);
                    p += lanes as isize;
                    i += lanes;
                }
                while i < lp.size {
                    let v = self.mask_scalar(storage.get(p));
                    storage.set(p, v);
                    p += 1;
                    i += 1;
                }
            }
        });
        Ok(())
    }

    fn apply_step(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        dispatch_if_large(lp.total_len(), || {
            let lanes = lp.simd_len;
            let mut buf = [T::zero(); MAX_LANES];
            for &start in &lp.offsets {
                let mut p = start;
                let mut i = 0usize;
                while i < lp.simd_bound {
                    storage.gather(p, lp.lane_offsets(), &mut buf[..lanes]);
                    self.mask_lanes(&mut buf[..lanes]);
                    storage.scatter(p, lp.lane_offsets(), &buf[..lanes]);
                    p += lanes as isize * lp.step;
                    i += lanes;
                }
                while i < lp.size {
                    let v = self.mask_scalar(storage.get(p));
                    storage.set(p, v);
                    p += lp.step;
                    i += 1;
                }
            }
        });
        Ok(())
    }

    fn apply_generic(&self, lp: &StrideLoop, storage: &mut Storage<T>) -> Result<()> {
        for &start in &lp.offsets {
            let mut p = start;
            for _ in 0..lp.size {
                let v = self.mask_scalar(storage.get(p));
                storage.set(p, v);
                p += lp.step;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_than_mask() {
        let lp = StrideLoop::build::<i32>(&[5], &[1], 0);
        let mut st = Storage::from_vec(vec![1, 2, 3, 4, 5]);
        CompareMask::new(Compare::Gt, 3).apply(&lp, &mut st).unwrap();
        assert_eq!(st.as_slice(), &[0, 0, 0, 1, 1]);
    }

    #[test]
    fn all_comparators() {
        let cases = [
            (Compare::Lt, [1, 1, 0, 0, 0]),
            (Compare::Le, [1, 1, 1, 0, 0]),
            (Compare::Eq, [0, 0, 1, 0, 0]),
            (Compare::Ge, [0, 0, 1, 1, 1]),
            (Compare::Gt, [0, 0, 0, 1, 1]),
            (Compare::Ne, [1, 1, 0, 1, 1]),
        ];
        let lp = StrideLoop::build::<i32>(&[5], &[1], 0);
        for (cmp, expected) in cases {
            let mut st = Storage::from_vec(vec![1, 2, 3, 4, 5]);
            CompareMask::new(cmp, 3).apply(&lp, &mut st).unwrap();
            assert_eq!(st.as_slice(), &expected, "comparator {cmp:?}");
        }
    }

    #[test]
    fn float_mask_on_strided_view() {
        let mut data = vec![0.0f64; 15];
        for (i, v) in [0.5, 1.5, 2.5, 3.5, 4.5].iter().enumerate() {
            data[i * 3] = *v;
        }
        let lp = StrideLoop::build::<f64>(&[5], &[3], 0);
        let mut st = Storage::from_vec(data);
        CompareMask::new(Compare::Ge, 2.5).apply(&lp, &mut st).unwrap();
        let logical: Vec<f64> = (0..5).map(|i| st.get((i * 3) as isize)).collect();
        assert_eq!(logical, vec![0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn long_unit_sweep_covers_vector_and_remainder() {
        let n = 37usize;
        let lp = StrideLoop::build::<i8>(&[n], &[1], 0);
        assert!(lp.simd_bound > 0);
        let mut st = Storage::from_vec((0..n as i8).collect::<Vec<i8>>());
        CompareMask::new(Compare::Lt, 20).apply(&lp, &mut st).unwrap();
        for i in 0..n {
            let expected = if (i as i8) < 20 { 1 } else { 0 };
            assert_eq!(st.get(i as isize), expected, "position {i}");
        }
    }
}
