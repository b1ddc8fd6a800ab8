//! Elementwise binary operators. Each combines two sweeps lane by lane and
//! writes into the left buffer; both sweeps must agree on logical size and
//! outer offset count. All six are defined for every dtype.

use super::{zip_generic, zip_step, zip_unit, BinaryOp};
use crate::dtype::Element;
use crate::plan::StrideLoop;
use crate::storage::Storage;
use crate::Result;

macro_rules! elementwise_binary {
    ($(#[$doc:meta])* $op:ident, $f:expr) => {
        $(#[$doc])*
        pub struct $op;

        impl<T: Element> BinaryOp<T> for $op {
            fn apply_unit(
                &self,
                lhs: &StrideLoop,
                dst: &mut Storage<T>,
                rhs: &StrideLoop,
                src: &Storage<T>,
            ) -> Result<()> {
                zip_unit(lhs, dst, rhs, src, $f);
                Ok(())
            }

            fn apply_step(
                &self,
                lhs: &StrideLoop,
                dst: &mut Storage<T>,
                rhs: &StrideLoop,
                src: &Storage<T>,
            ) -> Result<()> {
                zip_step(lhs, dst, rhs, src, $f);
                Ok(())
            }

            fn apply_generic(
                &self,
                lhs: &StrideLoop,
                dst: &mut Storage<T>,
                rhs: &StrideLoop,
                src: &Storage<T>,
            ) -> Result<()> {
                zip_generic(lhs, dst, rhs, src, $f);
                Ok(())
            }
        }
    };
}

elementwise_binary!(
    /// `dst[i] += src[i]`
    Add,
    |a, b| a + b
);
elementwise_binary!(
    /// `dst[i] -= src[i]`
    Sub,
    |a, b| a - b
);
elementwise_binary!(
    /// `dst[i] *= src[i]`
    Mul,
    |a, b| a * b
);
elementwise_binary!(
    /// `dst[i] /= src[i]`. Integer division truncates; float division
    /// follows IEEE 754 (division by zero yields an infinity or NaN).
    Div,
    |a, b| a / b
);
elementwise_binary!(
    /// Elementwise minimum. NaN on either side propagates for floats.
    Min,
    |a, b| Element::min(a, b)
);
elementwise_binary!(
    /// Elementwise maximum. NaN on either side propagates for floats.
    Max,
    |a, b| Element::max(a, b)
);
