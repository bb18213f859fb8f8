//! The kernel compiler: materializes instantiated C source into a build
//! unit, invokes the system C toolchain, and loads the resulting shared
//! artifact.

use crate::codegen;
use crate::error::CompileError;
use crate::kernel::CompiledKernel;
use crate::prelude::KernelSpecification;
use crate::scalar::ScalarType;
use crate::shape::ResolvedShape;
use libloading::Library;
use log::debug;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn default_compiler() -> &'static str {
    if cfg!(target_os = "macos") {
        "clang"
    } else if cfg!(target_os = "windows") {
        "cl"
    } else {
        "gcc"
    }
}

fn lib_extension() -> &'static str {
    if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    }
}

/// Compiles instantiated kernel source with the system C compiler.
#[derive(Clone, Debug, Default)]
pub struct KernelCompiler {
    cc_override: Option<String>,
    fast_math: bool,
}

impl KernelCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(cc_override: Option<String>, fast_math: bool) -> Self {
        Self {
            cc_override,
            fast_math,
        }
    }

    /// The toolchain command: an explicit override, then the `CC`
    /// environment variable, then the platform default.
    fn toolchain(&self) -> String {
        if let Some(cc) = &self.cc_override {
            return cc.clone();
        }
        if let Ok(cc) = std::env::var("CC") {
            if !cc.is_empty() {
                return cc;
            }
        }
        default_compiler().to_string()
    }

    pub fn is_available(&self) -> bool {
        Command::new(self.toolchain())
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn build_args(&self, source: &Path, out: &Path) -> Vec<String> {
        if cfg!(target_os = "windows") {
            vec![
                "/O2".to_string(),
                "/LD".to_string(),
                format!("/Fe:{}", out.display()),
                source.display().to_string(),
            ]
        } else {
            let mut args = vec![
                "-O3".to_string(),
                "-shared".to_string(),
                "-fPIC".to_string(),
            ];
            if self.fast_math {
                args.push("-ffast-math".to_string());
            }
            args.push("-o".to_string());
            args.push(out.display().to_string());
            args.push(source.display().to_string());
            if cfg!(target_os = "linux") {
                args.push("-lm".to_string());
            }
            args
        }
    }

    /// Instantiate, build, load, and resolve a kernel.
    ///
    /// The build is never retried: a failure is terminal for this
    /// (operation, shape signature, element type) until the caller
    /// invalidates the corresponding cache entry.
    pub fn compile(
        &self,
        spec: &KernelSpecification,
        resolved: &ResolvedShape,
        elem: ScalarType,
    ) -> Result<CompiledKernel, CompileError> {
        let rank = resolved.rank();
        let source = codegen::render_source(spec, elem, rank)?;
        let symbol = codegen::symbol_name(spec.name(), elem, rank);

        let artifact_dir = TempDir::new()?;
        let source_path = artifact_dir.path().join("kernel.c");
        fs::write(&source_path, &source)?;
        let lib_path = artifact_dir
            .path()
            .join(format!("lib{}.{}", symbol, lib_extension()));

        let cc = self.toolchain();
        debug!("building kernel `{symbol}` with `{cc}`");
        let output = Command::new(&cc)
            .args(self.build_args(&source_path, &lib_path))
            .output()
            .map_err(|e| CompileError::BuildFailure {
                diagnostics: format!("failed to run `{cc}`: {e}"),
            })?;

        if !output.status.success() {
            return Err(CompileError::BuildFailure {
                diagnostics: format!(
                    "stderr: {}\nstdout: {}",
                    String::from_utf8_lossy(&output.stderr),
                    String::from_utf8_lossy(&output.stdout)
                ),
            });
        }

        let library = unsafe { Library::new(&lib_path) }.map_err(|e| {
            CompileError::BuildFailure {
                diagnostics: format!("failed to load built artifact: {e}"),
            }
        })?;

        let entry = unsafe {
            let sym: libloading::Symbol<unsafe extern "C" fn()> = library
                .get(symbol.as_bytes())
                .map_err(|e| CompileError::SymbolResolution {
                    symbol: symbol.clone(),
                    source: e,
                })?;
            *sym as *const ()
        };

        Ok(CompiledKernel::new(
            entry,
            symbol,
            spec.kind(),
            elem,
            rank,
            spec.arity(),
            library,
            artifact_dir,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Prelude;
    use crate::shape::{DataShape, LayoutPolicy};
    use std::path::PathBuf;

    #[test]
    fn test_toolchain_override() {
        let compiler = KernelCompiler::with_options(Some("my-cc".to_string()), false);
        assert_eq!(compiler.toolchain(), "my-cc");
    }

    #[test]
    fn test_build_args_request_shared_object() {
        let compiler = KernelCompiler::new();
        let args = compiler.build_args(Path::new("kernel.c"), &PathBuf::from("libk.so"));
        if cfg!(target_os = "windows") {
            assert!(args.contains(&"/LD".to_string()));
        } else {
            assert!(args.contains(&"-shared".to_string()));
            assert!(args.contains(&"-fPIC".to_string()));
            assert!(!args.contains(&"-ffast-math".to_string()));
        }
    }

    #[test]
    fn test_fast_math_flag() {
        if cfg!(target_os = "windows") {
            return;
        }
        let compiler = KernelCompiler::with_options(None, true);
        let args = compiler.build_args(Path::new("kernel.c"), &PathBuf::from("libk.so"));
        assert!(args.contains(&"-ffast-math".to_string()));
    }

    #[test]
    fn test_compile_and_resolve_symbol() {
        let compiler = KernelCompiler::new();
        if !compiler.is_available() {
            eprintln!("C compiler not available, skipping test");
            return;
        }
        let prelude = Prelude::builtin();
        let spec = prelude.lookup("add").unwrap();
        let shape = DataShape::parse("4, float64").unwrap();
        let resolved = ResolvedShape::resolve(&shape, LayoutPolicy::RowMajor).unwrap();

        let kernel = compiler
            .compile(spec, &resolved, resolved.elem())
            .expect("compile failed");
        assert_eq!(kernel.symbol(), "kiln_add_f64_r1");
        assert_eq!(kernel.arity(), 2);
        assert_eq!(kernel.rank(), 1);
        assert!(!kernel.entry().is_null());
    }

    #[test]
    fn test_unsupported_type_fails_before_build() {
        let compiler = KernelCompiler::with_options(Some("nonexistent-cc".to_string()), false);
        let prelude = Prelude::builtin();
        let spec = prelude.lookup("bit_xor").unwrap();
        let shape = DataShape::parse("4, float32").unwrap();
        let resolved = ResolvedShape::resolve(&shape, LayoutPolicy::RowMajor).unwrap();

        // Template instantiation is checked first; the (broken) toolchain
        // is never invoked.
        assert!(matches!(
            compiler.compile(spec, &resolved, resolved.elem()),
            Err(CompileError::TemplateInstantiation { .. })
        ));
    }
}
