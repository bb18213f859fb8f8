//! Error types for the whole pipeline.
//!
//! Each stage has its own error family: `ShapeError` for descriptor and
//! unification problems, `RegistryError` for operation lookup, `CompileError`
//! for codegen and the native toolchain, and `InvokeError` for the
//! validation performed before a native call. `Error` is the top-level sum
//! returned by [`crate::context::Runtime`].

use crate::scalar::ScalarType;
use std::sync::Arc;
use thiserror::Error;

/// Errors from parsing, unifying, or resolving datashapes.
///
/// These are input errors: they are surfaced to the caller and never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The descriptor string is syntactically invalid.
    #[error("malformed shape descriptor at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    /// Two shapes cannot be unified (rank, extent, or element type disagree).
    #[error("shape mismatch: {0}")]
    Mismatch(String),

    /// A `var` dimension had no concrete extent available at resolve time.
    #[error("unresolved variable extent in dimension {dim}")]
    UnresolvedVariableExtent { dim: usize },
}

/// Errors from the operation registry. These indicate misconfiguration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation `{0}` is already registered")]
    DuplicateOperation(String),

    #[error("unknown operation `{0}`")]
    UnknownOperation(String),
}

/// Errors from instantiating, building, or loading a kernel.
///
/// Build failures are cached per [`crate::kernel::KernelKey`] as negative
/// results and never retried automatically; see
/// [`crate::cache::KernelCache::invalidate`].
#[derive(Debug, Error)]
pub enum CompileError {
    /// The operation's template does not support the requested element type
    /// (e.g. a bitwise operation on floating point).
    #[error("operation `{op}` does not support element type {elem}")]
    TemplateInstantiation { op: String, elem: ScalarType },

    /// The native toolchain exited with a failure; its diagnostics are
    /// attached verbatim.
    #[error("native toolchain failed:\n{diagnostics}")]
    BuildFailure { diagnostics: String },

    /// The artifact built but the canonical symbol was absent. This is an
    /// internal naming-scheme bug and is never retried.
    #[error("symbol `{symbol}` missing from built artifact")]
    SymbolResolution {
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    /// Filesystem error while materializing the build unit.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from invocation-bridge validation.
///
/// All of these are raised before any native code runs, so a rejected call
/// leaves every buffer untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("kernel expects {expected} input buffers, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("buffer {index}: expected element type {expected}, got {actual}")]
    TypeMismatch {
        index: usize,
        expected: ScalarType,
        actual: ScalarType,
    },

    #[error("buffer {index} has rank {actual} but the kernel was compiled for rank {expected}")]
    RankMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("buffer {index} holds {actual} elements but the kernel addresses {required}")]
    BufferTooSmall {
        index: usize,
        required: usize,
        actual: usize,
    },
}

/// Top-level error returned by [`crate::context::Runtime`] operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Compilation results are shared between all callers waiting on the
    /// same cache slot, hence the `Arc`.
    #[error("compilation failed: {0}")]
    Compile(Arc<CompileError>),

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl From<Arc<CompileError>> for Error {
    fn from(e: Arc<CompileError>) -> Self {
        Error::Compile(e)
    }
}
