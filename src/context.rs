//! The runtime context that ties the pipeline together.
//!
//! A [`Runtime`] owns an operation registry, a compiler, and a kernel
//! cache. It has no global state: independent runtimes have independent
//! caches, and a `Runtime` is `Send + Sync`, so one instance can be
//! shared behind an `Arc` across threads.

use crate::bridge::{self, BufferView, KernelOutput};
use crate::cache::{CacheStats, KernelCache};
use crate::compiler::KernelCompiler;
use crate::error::{Error, ShapeError};
use crate::kernel::{CompiledKernel, KernelKey};
use crate::prelude::Prelude;
use crate::shape::{DataShape, LayoutPolicy, ResolvedShape};
use log::debug;
use std::sync::Arc;

/// Construction-time knobs for a [`Runtime`].
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Upper bound on resident compiled kernels before LRU eviction.
    pub max_resident_kernels: usize,
    /// Pass `-ffast-math` to the toolchain.
    pub fast_math: bool,
    /// Toolchain command, overriding the `CC` variable and the platform
    /// default.
    pub cc_override: Option<String>,
    pub layout: LayoutPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_resident_kernels: 256,
            fast_math: false,
            cc_override: None,
            layout: LayoutPolicy::RowMajor,
        }
    }
}

pub struct Runtime {
    prelude: Prelude,
    compiler: KernelCompiler,
    cache: KernelCache,
    layout: LayoutPolicy,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime over the builtin operation set with default config.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_prelude(Prelude::builtin(), config)
    }

    /// A runtime over a caller-supplied operation registry.
    pub fn with_prelude(prelude: Prelude, config: RuntimeConfig) -> Self {
        Self {
            prelude,
            compiler: KernelCompiler::with_options(config.cc_override, config.fast_math),
            cache: KernelCache::new(config.max_resident_kernels),
            layout: config.layout,
        }
    }

    pub fn prelude(&self) -> &Prelude {
        &self.prelude
    }

    /// Whether the configured C toolchain responds; useful as a guard in
    /// environments without a compiler.
    pub fn is_toolchain_available(&self) -> bool {
        self.compiler.is_available()
    }

    fn resolve(&self, shape: &DataShape) -> Result<ResolvedShape, ShapeError> {
        ResolvedShape::resolve(shape, self.layout)
    }

    /// Compile (or fetch from cache) the kernel for `op` over `shape`.
    ///
    /// This is the warm-up path: it returns the shared kernel handle
    /// without invoking it. `shape` must be fully fixed.
    pub fn compile(&self, op: &str, shape: &DataShape) -> Result<Arc<CompiledKernel>, Error> {
        let spec = self.prelude.lookup(op)?;
        let resolved = self.resolve(shape)?;
        let key = KernelKey::new(op, resolved.sig(), resolved.elem());
        let kernel = self
            .cache
            .get_or_compile(&key, || self.compiler.compile(spec, &resolved, resolved.elem()))?;
        Ok(kernel)
    }

    /// Resolve, compile, validate, and run `op` over `inputs`.
    ///
    /// `var` dimensions in `shape` are bound from the first input's
    /// extents before resolution.
    pub fn apply(
        &self,
        op: &str,
        shape: &DataShape,
        inputs: &[BufferView],
    ) -> Result<KernelOutput, Error> {
        let bound;
        let shape = if shape.has_var_dims() {
            let extents: Vec<u64> = inputs
                .first()
                .map(|v| v.extents().iter().map(|&e| e as u64).collect())
                .unwrap_or_default();
            bound = shape.bind(&extents)?;
            &bound
        } else {
            shape
        };
        let kernel = self.compile(op, shape)?;
        debug!("invoking kernel `{}`", kernel.symbol());
        Ok(bridge::invoke(&kernel, inputs)?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn resident_kernels(&self) -> usize {
        self.cache.len()
    }

    /// Drop the cached kernel (or cached build failure) for `op` over
    /// `shape`. Returns whether an entry was removed.
    pub fn invalidate(&self, op: &str, shape: &DataShape) -> Result<bool, Error> {
        let resolved = self.resolve(shape)?;
        let key = KernelKey::new(op, resolved.sig(), resolved.elem());
        Ok(self.cache.invalidate(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::scalar::ScalarType;

    #[test]
    fn test_unknown_operation() {
        let runtime = Runtime::new();
        let shape = DataShape::of(&[4], ScalarType::F64);
        assert!(matches!(
            runtime.compile("frobnicate", &shape),
            Err(Error::Registry(RegistryError::UnknownOperation(_)))
        ));
    }

    #[test]
    fn test_unresolved_var_rejected_in_compile() {
        let runtime = Runtime::new();
        let shape = DataShape::parse("var, float64").unwrap();
        assert!(matches!(
            runtime.compile("add", &shape),
            Err(Error::Shape(ShapeError::UnresolvedVariableExtent { dim: 0 }))
        ));
    }

    #[test]
    fn test_record_shape_rejected() {
        let runtime = Runtime::new();
        let shape = DataShape::parse("3, {x: float64; y: float64}").unwrap();
        assert!(matches!(
            runtime.compile("add", &shape),
            Err(Error::Shape(ShapeError::Mismatch(_)))
        ));
    }

    #[test]
    fn test_invalidate_without_entry() {
        let runtime = Runtime::new();
        let shape = DataShape::of(&[4], ScalarType::F64);
        assert!(!runtime.invalidate("add", &shape).unwrap());
    }

    #[test]
    fn test_runtime_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Runtime>();
    }
}
