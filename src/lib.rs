//! Kiln: a datashape-driven native kernel compiler
//!
//! Kiln turns array shape/type descriptors ("datashapes", e.g.
//! `3, 4, float64`) into specialized native numeric kernels: it renders
//! C99 source for an operation instantiated at a concrete element type
//! and rank, builds it with the system C toolchain into a shared object,
//! loads it, and dispatches validated calls into it.
//!
//! # Architecture
//!
//! - **shape**: datashape model, descriptor parser, unification, and
//!   resolution to concrete extents and strides
//! - **scalar**: the fixed-width numeric element types and promotion
//! - **prelude**: the operation registry of kernel specifications
//! - **codegen**: C source rendering for an instantiated kernel
//! - **compiler**: toolchain driver that builds and loads an artifact
//! - **cache**: signature-keyed kernel cache with single-flight builds
//! - **bridge**: buffer views and the validated FFI call
//! - **context**: the [`Runtime`] tying the pipeline together
//!
//! # Example
//!
//! ```no_run
//! use kiln::{BufferView, DataShape, Runtime};
//!
//! let runtime = Runtime::new();
//! let shape = DataShape::parse("3, float64")?;
//! let data = [1.0f64, 2.0, 3.0];
//! let out = runtime.apply("sum", &shape, &[BufferView::new(&data, &[3])])?;
//! assert_eq!(out.as_scalar(), Some(kiln::Scalar::F64(6.0)));
//! # Ok::<(), kiln::Error>(())
//! ```

pub mod bridge;
pub mod cache;
pub mod codegen;
pub mod compiler;
pub mod context;
pub mod error;
pub mod kernel;
pub mod prelude;
pub mod scalar;
pub mod shape;

pub use bridge::{ArrayData, BufferView, Element, KernelOutput, invoke};
pub use cache::{CacheStats, KernelCache};
pub use compiler::KernelCompiler;
pub use context::{Runtime, RuntimeConfig};
pub use error::{CompileError, Error, InvokeError, RegistryError, ShapeError};
pub use kernel::{CompiledKernel, KernelKey};
pub use prelude::{KernelKind, KernelSpecification, Prelude};
pub use scalar::{Scalar, ScalarType};
pub use shape::{DataShape, Dim, ElementType, LayoutPolicy, ResolvedShape, ShapeSig, unify};
