//! Invocation bridge between safe Rust buffers and compiled kernels.
//!
//! Every native call goes through [`invoke`], which validates arity,
//! element type, rank, and buffer lengths before the entry point is
//! transmuted to its concrete signature. A rejected call leaves all
//! buffers untouched.

use crate::error::InvokeError;
use crate::kernel::CompiledKernel;
use crate::prelude::KernelKind;
use crate::scalar::{Scalar, ScalarType};
use crate::shape::resolved::row_major_strides;
use std::ffi::c_void;
use std::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Rust element types that map onto a [`ScalarType`]. Implemented for the
/// ten fixed-width numeric primitives and nothing else.
pub trait Element: sealed::Sealed + Copy + Default + 'static {
    const TYPE: ScalarType;

    fn into_scalar(self) -> Scalar;
}

macro_rules! impl_element {
    ($($rust:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $rust {}

            impl Element for $rust {
                const TYPE: ScalarType = ScalarType::$variant;

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }
            }
        )*
    };
}

impl_element!(
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
);

/// A borrowed, typed view of caller memory: base pointer, extents, and
/// per-dimension strides in elements.
pub struct BufferView<'a> {
    ptr: *const c_void,
    len: usize,
    elem: ScalarType,
    extents: Vec<i64>,
    strides: Vec<i64>,
    _data: PhantomData<&'a ()>,
}

impl<'a> BufferView<'a> {
    /// View `data` as a dense row-major array with the given extents.
    pub fn new<T: Element>(data: &'a [T], extents: &[u64]) -> Self {
        let strides = row_major_strides(extents);
        Self::with_strides(data, extents, &strides)
    }

    /// View `data` with explicit strides (in elements, innermost last).
    pub fn with_strides<T: Element>(data: &'a [T], extents: &[u64], strides: &[u64]) -> Self {
        Self {
            ptr: data.as_ptr() as *const c_void,
            len: data.len(),
            elem: T::TYPE,
            extents: extents.iter().map(|&e| e as i64).collect(),
            strides: strides.iter().map(|&s| s as i64).collect(),
            _data: PhantomData,
        }
    }

    pub fn elem(&self) -> ScalarType {
        self.elem
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[i64] {
        &self.extents
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    /// Number of elements the underlying slice holds.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Highest element index a kernel iterating `extents` with `strides`
/// will touch, plus one. Zero when any extent is zero.
fn required_elements(extents: &[i64], strides: &[i64]) -> usize {
    if extents.iter().any(|&e| e == 0) {
        return 0;
    }
    let span: i64 = extents
        .iter()
        .zip(strides)
        .map(|(&e, &s)| (e - 1) * s)
        .sum();
    span as usize + 1
}

/// Owned output storage, one variant per element type so allocation is
/// always correctly aligned.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_variant {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            ArrayData::I8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U8($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

impl ArrayData {
    /// Zero-initialized storage for `count` elements of `elem`.
    pub fn allocate(elem: ScalarType, count: usize) -> Self {
        match elem {
            ScalarType::I8 => ArrayData::I8(vec![0; count]),
            ScalarType::I16 => ArrayData::I16(vec![0; count]),
            ScalarType::I32 => ArrayData::I32(vec![0; count]),
            ScalarType::I64 => ArrayData::I64(vec![0; count]),
            ScalarType::U8 => ArrayData::U8(vec![0; count]),
            ScalarType::U16 => ArrayData::U16(vec![0; count]),
            ScalarType::U32 => ArrayData::U32(vec![0; count]),
            ScalarType::U64 => ArrayData::U64(vec![0; count]),
            ScalarType::F32 => ArrayData::F32(vec![0.0; count]),
            ScalarType::F64 => ArrayData::F64(vec![0.0; count]),
        }
    }

    pub fn elem(&self) -> ScalarType {
        match self {
            ArrayData::I8(_) => ScalarType::I8,
            ArrayData::I16(_) => ScalarType::I16,
            ArrayData::I32(_) => ScalarType::I32,
            ArrayData::I64(_) => ScalarType::I64,
            ArrayData::U8(_) => ScalarType::U8,
            ArrayData::U16(_) => ScalarType::U16,
            ArrayData::U32(_) => ScalarType::U32,
            ArrayData::U64(_) => ScalarType::U64,
            ArrayData::F32(_) => ScalarType::F32,
            ArrayData::F64(_) => ScalarType::F64,
        }
    }

    pub fn len(&self) -> usize {
        for_each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Typed access; `None` when `T` does not match the stored variant.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        if self.elem() != T::TYPE {
            return None;
        }
        let (ptr, len) = for_each_variant!(self, v => (v.as_ptr() as *const T, v.len()));
        // Variant matches T::TYPE, so the cast preserves type and layout.
        Some(unsafe { std::slice::from_raw_parts(ptr, len) })
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        for_each_variant!(self, v => v.as_mut_ptr() as *mut c_void)
    }
}

/// Result of a kernel invocation: an owned array for elementwise kernels,
/// a scalar for reductions.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelOutput {
    Array(ArrayData),
    Scalar(Scalar),
}

impl KernelOutput {
    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            KernelOutput::Array(data) => Some(data),
            KernelOutput::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            KernelOutput::Array(_) => None,
            KernelOutput::Scalar(s) => Some(*s),
        }
    }
}

// Kernels take typed pointers (e.g. `const double*`); calling through
// `c_void` pointers of the same shape is ABI-compatible on every target
// the toolchain module supports.
type Map1Fn = unsafe extern "C" fn(
    *const c_void,
    *const i64,
    *const i64,
    *mut c_void,
    *const i64,
    *const i64,
);
type Map2Fn = unsafe extern "C" fn(
    *const c_void,
    *const i64,
    *const i64,
    *const c_void,
    *const i64,
    *const i64,
    *mut c_void,
    *const i64,
    *const i64,
);
type FoldFn<T> = unsafe extern "C" fn(*const c_void, *const i64, *const i64) -> T;

/// Reject anything that would make the native call unsound.
///
/// The kernel iterates the first input's extents, so each buffer's
/// length requirement is computed from those extents and the buffer's
/// own strides.
pub(crate) fn validate(
    arity: usize,
    elem: ScalarType,
    rank: usize,
    inputs: &[BufferView],
) -> Result<(), InvokeError> {
    if inputs.len() != arity {
        return Err(InvokeError::ArityMismatch {
            expected: arity,
            actual: inputs.len(),
        });
    }
    for (index, input) in inputs.iter().enumerate() {
        if input.elem() != elem {
            return Err(InvokeError::TypeMismatch {
                index,
                expected: elem,
                actual: input.elem(),
            });
        }
        if input.rank() != rank {
            return Err(InvokeError::RankMismatch {
                index,
                expected: rank,
                actual: input.rank(),
            });
        }
    }
    let loop_extents = inputs[0].extents();
    for (index, input) in inputs.iter().enumerate() {
        let required = required_elements(loop_extents, input.strides());
        if input.len() < required {
            return Err(InvokeError::BufferTooSmall {
                index,
                required,
                actual: input.len(),
            });
        }
    }
    Ok(())
}

fn call_fold(
    kernel: &CompiledKernel,
    ptr: *const c_void,
    strides: *const i64,
    extents: *const i64,
) -> Scalar {
    macro_rules! fold {
        ($t:ty, $variant:ident) => {{
            let f: FoldFn<$t> = unsafe { std::mem::transmute(kernel.entry()) };
            Scalar::$variant(unsafe { f(ptr, strides, extents) })
        }};
    }
    match kernel.elem() {
        ScalarType::I8 => fold!(i8, I8),
        ScalarType::I16 => fold!(i16, I16),
        ScalarType::I32 => fold!(i32, I32),
        ScalarType::I64 => fold!(i64, I64),
        ScalarType::U8 => fold!(u8, U8),
        ScalarType::U16 => fold!(u16, U16),
        ScalarType::U32 => fold!(u32, U32),
        ScalarType::U64 => fold!(u64, U64),
        ScalarType::F32 => fold!(f32, F32),
        ScalarType::F64 => fold!(f64, F64),
    }
}

fn dense_strides(extents: &[i64]) -> Vec<i64> {
    let extents_u: Vec<u64> = extents.iter().map(|&e| e as u64).collect();
    row_major_strides(&extents_u).iter().map(|&s| s as i64).collect()
}

/// Run a compiled kernel over validated input views.
///
/// Elementwise kernels allocate a dense row-major output with the first
/// input's extents; reductions return the scalar the kernel computed.
pub fn invoke(
    kernel: &CompiledKernel,
    inputs: &[BufferView],
) -> Result<KernelOutput, InvokeError> {
    validate(kernel.arity(), kernel.elem(), kernel.rank(), inputs)?;

    match kernel.kind() {
        KernelKind::Reduction => {
            let input = &inputs[0];
            let scalar = call_fold(
                kernel,
                input.ptr,
                input.strides.as_ptr(),
                input.extents.as_ptr(),
            );
            Ok(KernelOutput::Scalar(scalar))
        }
        KernelKind::ElementwiseUnary => {
            let input = &inputs[0];
            let count: i64 = input.extents.iter().product();
            let mut out = ArrayData::allocate(kernel.elem(), count as usize);
            let out_extents = input.extents.clone();
            let out_strides = dense_strides(&out_extents);
            let f: Map1Fn = unsafe { std::mem::transmute(kernel.entry()) };
            unsafe {
                f(
                    input.ptr,
                    input.strides.as_ptr(),
                    input.extents.as_ptr(),
                    out.as_mut_ptr(),
                    out_strides.as_ptr(),
                    out_extents.as_ptr(),
                );
            }
            Ok(KernelOutput::Array(out))
        }
        KernelKind::ElementwiseBinary => {
            let (a, b) = (&inputs[0], &inputs[1]);
            let count: i64 = a.extents.iter().product();
            let mut out = ArrayData::allocate(kernel.elem(), count as usize);
            let out_extents = a.extents.clone();
            let out_strides = dense_strides(&out_extents);
            let f: Map2Fn = unsafe { std::mem::transmute(kernel.entry()) };
            unsafe {
                f(
                    a.ptr,
                    a.strides.as_ptr(),
                    a.extents.as_ptr(),
                    b.ptr,
                    b.strides.as_ptr(),
                    b.extents.as_ptr(),
                    out.as_mut_ptr(),
                    out_strides.as_ptr(),
                    out_extents.as_ptr(),
                );
            }
            Ok(KernelOutput::Array(out))
        }
    }
}
