//! End-to-end operator scenarios over realistic layouts.

use approx::assert_relative_eq;
use narray_kernel::ops::{binary, reduce, unary, Compare};
use narray_kernel::ops::compare::CompareMask;
use narray_kernel::ops::softmax::Softmax;
use narray_kernel::{BinaryOp, KernelError, ReduceOp, Storage, StrideLoop, UnaryOp};

#[test]
fn row_wise_softmax_of_matrix() {
    // 3x4 row-major matrix; one loop per row keeps normalization per row
    let rows = 3usize;
    let cols = 4usize;
    let mut st = Storage::from_vec(
        (0..rows * cols)
            .map(|i| (i as f64 * 0.7).sin() * 3.0)
            .collect::<Vec<f64>>(),
    );
    for r in 0..rows {
        let lp = StrideLoop::build::<f64>(&[cols], &[1], (r * cols) as isize);
        Softmax.apply(&lp, &mut st).unwrap();
    }
    for r in 0..rows {
        let row_sum: f64 = (0..cols).map(|c| st.get((r * cols + c) as isize)).sum();
        assert_relative_eq!(row_sum, 1.0, epsilon = 1e-9);
    }
}

#[test]
fn column_wise_reduction_of_matrix() {
    // 4x3 row-major; each column is a step-3 sweep
    let data: Vec<f64> = (1..=12).map(|v| v as f64).collect();
    let st = Storage::from_vec(data);
    let mut col_sums = Vec::new();
    for c in 0..3usize {
        let lp = StrideLoop::build::<f64>(&[4], &[3], c as isize);
        col_sums.push(reduce::Sum.reduce(&lp, &st).unwrap());
    }
    assert_eq!(col_sums, vec![22.0, 26.0, 30.0]);
}

#[test]
fn mask_then_count_matches_predicate() {
    let n = 50usize;
    let values: Vec<f64> = (0..n).map(|i| (i as f64 * 1.3).cos()).collect();
    let expected = values.iter().filter(|&&v| v > 0.0).count() as f64;

    let lp = StrideLoop::build::<f64>(&[n], &[1], 0);
    let mut st = Storage::from_vec(values);
    CompareMask::new(Compare::Gt, 0.0).apply(&lp, &mut st).unwrap();
    let count = reduce::Sum.reduce(&lp, &st).unwrap();
    assert_relative_eq!(count, expected, max_relative = 1e-12);
}

#[test]
fn standardize_pipeline() {
    // (x - mean) / std over a strided column, composed from the kernel set
    let values = vec![2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    let n = values.len();
    let lp = StrideLoop::build::<f64>(&[n], &[2], 0);
    let mut spread = vec![0.0f64; n * 2 - 1];
    for (i, &v) in values.iter().enumerate() {
        spread[i * 2] = v;
    }
    let mut st = Storage::from_vec(spread);

    let mean = reduce::Mean.reduce(&lp, &st).unwrap();
    let var = reduce::Varc::with_mean(0, mean).reduce(&lp, &st).unwrap();
    assert_relative_eq!(mean, 5.0, max_relative = 1e-12);
    assert_relative_eq!(var, 4.0, max_relative = 1e-12);

    let mut shift = Storage::filled(n, mean);
    let unit_lp = StrideLoop::build::<f64>(&[n], &[1], 0);
    // dst is strided, src contiguous
    binary::Sub.apply(&lp, &mut st, &unit_lp, &shift).unwrap();
    shift = Storage::filled(n, var.sqrt());
    binary::Div.apply(&lp, &mut st, &unit_lp, &shift).unwrap();

    let standardized: Vec<f64> = (0..n).map(|i| st.get((i * 2) as isize)).collect();
    let back_mean: f64 = standardized.iter().sum::<f64>() / n as f64;
    let back_var: f64 =
        standardized.iter().map(|v| (v - back_mean) * (v - back_mean)).sum::<f64>() / n as f64;
    assert_relative_eq!(back_mean, 0.0, epsilon = 1e-12);
    assert_relative_eq!(back_var, 1.0, max_relative = 1e-12);
}

#[test]
fn fill_nan_then_nan_reductions_coincide() {
    let lp = StrideLoop::build::<f64>(&[6], &[1], 0);
    let raw = vec![1.0, f64::NAN, 2.0, f64::NAN, 3.0, 4.0];

    let nan_sum = reduce::NanSum
        .reduce(&lp, &Storage::from_vec(raw.clone()))
        .unwrap();

    let mut patched = Storage::from_vec(raw);
    unary::FillNan::new(0.0).apply(&lp, &mut patched).unwrap();
    let plain_sum = reduce::Sum.reduce(&lp, &patched).unwrap();

    assert_relative_eq!(nan_sum, plain_sum, max_relative = 1e-12);
    assert_relative_eq!(nan_sum, 10.0, max_relative = 1e-12);
}

#[test]
fn integer_rejection_is_typed_and_total() {
    let lp = StrideLoop::build::<i8>(&[3], &[1], 0);
    let mut st = Storage::from_vec(vec![1i8, 2, 3]);
    let err = unary::Exp.apply(&lp, &mut st).unwrap_err();
    match err {
        KernelError::OperationNotAvailable { op, dtype } => {
            assert_eq!(op, "exp");
            assert_eq!(dtype.to_string(), "i8");
        }
        other => panic!("unexpected error {other:?}"),
    }
    // buffer untouched after rejection
    assert_eq!(st.as_slice(), &[1, 2, 3]);
}

#[test]
fn error_messages_are_descriptive() {
    let a = StrideLoop::build::<f32>(&[4], &[1], 0);
    let b = StrideLoop::build::<f32>(&[5], &[1], 0);
    let mut dst = Storage::from_vec(vec![0.0f32; 4]);
    let src = Storage::from_vec(vec![0.0f32; 5]);
    let err = binary::Mul.apply(&a, &mut dst, &b, &src).unwrap_err();
    assert_eq!(err.to_string(), "loop size mismatch: 4 vs 5");

    let err = unary::Clamp::<i32>::new(Some(5), Some(1)).unwrap_err();
    assert_eq!(err.to_string(), "invalid clamp bounds");
}
