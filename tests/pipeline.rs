//! End-to-end pipeline tests: descriptor in, native kernel out.
//!
//! These build real shared objects with the system C toolchain and are
//! skipped when no toolchain responds.

use kiln::{
    BufferView, DataShape, Error, InvokeError, Runtime, RuntimeConfig, Scalar, ScalarType,
};
use std::sync::Arc;

mod common;

#[test]
fn test_sum_reduction() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("3, int32").unwrap();
    let data = [1i32, 2, 3];
    let out = runtime
        .apply("sum", &shape, &[BufferView::new(&data, &[3])])
        .unwrap();
    assert_eq!(out.as_scalar(), Some(Scalar::I32(6)));
}

#[test]
fn test_elementwise_add_matrix() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("2, 2, float64").unwrap();
    let a = [1.0f64, 2.0, 3.0, 4.0];
    let b = [5.0f64, 6.0, 7.0, 8.0];
    let views = [BufferView::new(&a, &[2, 2]), BufferView::new(&b, &[2, 2])];
    let out = runtime.apply("add", &shape, &views).unwrap();
    let result = out.as_array().unwrap().as_slice::<f64>().unwrap();
    assert_eq!(result, &[6.0, 8.0, 10.0, 12.0]);
}

#[test]
fn test_unary_neg() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("4, int64").unwrap();
    let data = [1i64, -2, 3, -4];
    let out = runtime
        .apply("neg", &shape, &[BufferView::new(&data, &[4])])
        .unwrap();
    let result = out.as_array().unwrap().as_slice::<i64>().unwrap();
    assert_eq!(result, &[-1, 2, -3, 4]);
}

#[test]
fn test_max_over_negatives() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("4, float64").unwrap();
    let data = [-3.5f64, -1.25, -7.0, -2.0];
    let out = runtime
        .apply("max", &shape, &[BufferView::new(&data, &[4])])
        .unwrap();
    assert_eq!(out.as_scalar(), Some(Scalar::F64(-1.25)));
}

#[test]
fn test_rank_zero_reduction() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    // A bare scalar descriptor compiles a loop-free kernel.
    let shape = DataShape::parse("int32").unwrap();
    let data = [42i32];
    let out = runtime
        .apply("sum", &shape, &[BufferView::new(&data, &[])])
        .unwrap();
    assert_eq!(out.as_scalar(), Some(Scalar::I32(42)));
}

#[test]
fn test_var_dim_bound_from_input() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("var, float64").unwrap();
    let data = [1.5f64, 2.5, 3.0];
    let out = runtime
        .apply("sum", &shape, &[BufferView::new(&data, &[3])])
        .unwrap();
    assert_eq!(out.as_scalar(), Some(Scalar::F64(7.0)));
}

#[test]
fn test_strided_column_view() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    // Second column of a row-major 3x4 matrix, viewed as a rank-1 array
    // with stride 4.
    let matrix: Vec<i32> = (0..12).collect();
    let column = &matrix[1..];
    let view = BufferView::with_strides(column, &[3], &[4]);
    let shape = DataShape::parse("3, int32").unwrap();
    let out = runtime.apply("sum", &shape, &[view]).unwrap();
    // 1 + 5 + 9
    assert_eq!(out.as_scalar(), Some(Scalar::I32(15)));
}

#[test]
fn test_cache_returns_shared_kernel() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("8, float32").unwrap();
    let first = runtime.compile("mul", &shape).unwrap();
    let second = runtime.compile("mul", &shape).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let stats = runtime.cache_stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn test_extents_share_a_kernel() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    // Kernels are specialized on rank and element type, not extents.
    let small = DataShape::parse("4, float64").unwrap();
    let large = DataShape::parse("4096, float64").unwrap();
    let a = runtime.compile("add", &small).unwrap();
    let b = runtime.compile("add", &large).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(runtime.cache_stats().builds, 1);
}

#[test]
fn test_concurrent_apply_builds_once() {
    common::setup();
    let runtime = Arc::new(Runtime::new());
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("16, int64").unwrap();
    std::thread::scope(|scope| {
        for _ in 0..8 {
            let runtime = Arc::clone(&runtime);
            let shape = shape.clone();
            scope.spawn(move || {
                let data = [3i64; 16];
                let out = runtime
                    .apply("sum", &shape, &[BufferView::new(&data, &[16])])
                    .unwrap();
                assert_eq!(out.as_scalar(), Some(Scalar::I64(48)));
            });
        }
    });
    assert_eq!(runtime.cache_stats().builds, 1);
}

#[test]
fn test_buffer_too_small_rejected() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("2, 3, float64").unwrap();
    let data = [0.0f64; 5];
    let err = runtime
        .apply("sum", &shape, &[BufferView::with_strides(&data, &[2, 3], &[3, 1])])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Invoke(InvokeError::BufferTooSmall {
            index: 0,
            required: 6,
            actual: 5
        })
    ));
}

#[test]
fn test_element_type_mismatch_rejected() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("4, float64").unwrap();
    let data = [0.0f32; 4];
    let err = runtime
        .apply("sum", &shape, &[BufferView::new(&data, &[4])])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Invoke(InvokeError::TypeMismatch {
            index: 0,
            expected: ScalarType::F64,
            actual: ScalarType::F32
        })
    ));
}

#[test]
fn test_arity_mismatch_rejected() {
    common::setup();
    let runtime = Runtime::new();
    if !common::toolchain_available(&runtime) {
        return;
    }

    let shape = DataShape::parse("4, float64").unwrap();
    let data = [0.0f64; 4];
    let err = runtime
        .apply("add", &shape, &[BufferView::new(&data, &[4])])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Invoke(InvokeError::ArityMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_unsupported_instantiation_is_cached_until_invalidated() {
    common::setup();
    let runtime = Runtime::new();

    // No toolchain needed: instantiation fails before any build.
    let shape = DataShape::parse("4, float64").unwrap();
    for _ in 0..2 {
        assert!(matches!(
            runtime.compile("bit_and", &shape),
            Err(Error::Compile(_))
        ));
    }
    let stats = runtime.cache_stats();
    assert_eq!(stats.builds, 1);

    assert!(runtime.invalidate("bit_and", &shape).unwrap());
    assert!(runtime.compile("bit_and", &shape).is_err());
    assert_eq!(runtime.cache_stats().builds, 2);
}

#[test]
fn test_unknown_operation() {
    common::setup();
    let runtime = Runtime::new();
    let shape = DataShape::parse("4, float64").unwrap();
    assert!(matches!(
        runtime.apply("frobnicate", &shape, &[]),
        Err(Error::Registry(_))
    ));
}

#[test]
fn test_lru_eviction_under_pressure() {
    common::setup();
    let runtime = Runtime::with_config(RuntimeConfig {
        max_resident_kernels: 2,
        ..RuntimeConfig::default()
    });
    if !common::toolchain_available(&runtime) {
        return;
    }

    for op in ["add", "sub", "mul"] {
        let shape = DataShape::parse("4, float64").unwrap();
        runtime.compile(op, &shape).unwrap();
    }
    assert_eq!(runtime.resident_kernels(), 2);
    assert_eq!(runtime.cache_stats().evictions, 1);
}
