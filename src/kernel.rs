//! Compiled kernels and their cache keys.

use crate::prelude::KernelKind;
use crate::scalar::ScalarType;
use crate::shape::ShapeSig;
use libloading::Library;
use tempfile::TempDir;

/// Identifies a unique (operation, shape signature, element type)
/// compilation target. Hashes and compares by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub op: String,
    pub sig: ShapeSig,
    pub elem: ScalarType,
}

impl KernelKey {
    pub fn new(op: &str, sig: ShapeSig, elem: ScalarType) -> Self {
        Self {
            op: op.to_string(),
            sig,
            elem,
        }
    }
}

/// A loaded, type- and rank-specialized native entry point plus the
/// metadata the invocation bridge validates against.
///
/// The kernel owns the loaded library and the temporary directory holding
/// the built artifact, so the entry point stays valid for the kernel's
/// whole lifetime. Kernels are shared read-only across callers via `Arc`
/// and live until evicted from the cache and every outstanding reference
/// is dropped.
#[derive(Debug)]
pub struct CompiledKernel {
    entry: *const (),
    symbol: String,
    kind: KernelKind,
    elem: ScalarType,
    rank: usize,
    arity: usize,
    /// Keeps the shared object mapped; `entry` points into it.
    _library: Library,
    /// Keeps the artifact on disk while the library is loaded.
    _artifact_dir: TempDir,
}

// `entry` targets immutable code inside `_library`, which lives exactly as
// long as the kernel, and the struct has no interior mutability.
unsafe impl Send for CompiledKernel {}
unsafe impl Sync for CompiledKernel {}

impl CompiledKernel {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: *const (),
        symbol: String,
        kind: KernelKind,
        elem: ScalarType,
        rank: usize,
        arity: usize,
        library: Library,
        artifact_dir: TempDir,
    ) -> Self {
        Self {
            entry,
            symbol,
            kind,
            elem,
            rank,
            arity,
            _library: library,
            _artifact_dir: artifact_dir,
        }
    }

    /// The raw native entry point. Only the invocation bridge dereferences
    /// this, after validating buffers against the kernel metadata.
    pub(crate) fn entry(&self) -> *const () {
        self.entry
    }

    /// The canonical exported symbol name.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// The element type every buffer must carry.
    pub fn elem(&self) -> ScalarType {
        self.elem
    }

    /// The rank the loops were specialized for.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The number of input buffers the kernel expects.
    pub fn arity(&self) -> usize {
        self.arity
    }
}
