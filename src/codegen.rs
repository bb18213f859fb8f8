//! C source instantiation for kernel templates.
//!
//! Given an operation specification, a concrete element type, and a rank,
//! this module emits a single C99 function walking the buffers through
//! per-buffer stride arrays, nested row-major with the innermost dimension
//! last. The generated code is pure C99 with no dependencies beyond
//! `<stdint.h>` and `<math.h>`.

use crate::error::CompileError;
use crate::prelude::{BinaryOp, FoldOp, KernelSpecification, OpSemantics, UnaryOp};
use crate::scalar::ScalarType;

const HEADER: &str = "/* Generated C kernel by kiln */\n\n#include <stdint.h>\n#include <math.h>\n\n";

/// The canonical symbol name for a kernel: deterministic in its inputs, so
/// identical requests reuse the cache and distinct kernels never collide
/// within one artifact.
pub fn symbol_name(op: &str, elem: ScalarType, rank: usize) -> String {
    format!("kiln_{}_{}_r{}", op, elem.symbol_tag(), rank)
}

/// Instantiate the generic template into concrete C source.
///
/// Fails with [`CompileError::TemplateInstantiation`] when the operation
/// does not support the element type.
pub fn render_source(
    spec: &KernelSpecification,
    elem: ScalarType,
    rank: usize,
) -> Result<String, CompileError> {
    if !spec.supports(elem) {
        return Err(CompileError::TemplateInstantiation {
            op: spec.name().to_string(),
            elem,
        });
    }
    let symbol = symbol_name(spec.name(), elem, rank);
    let mut code = String::from(HEADER);
    match spec.semantics() {
        OpSemantics::Map1(op) => render_map(&mut code, &symbol, elem, rank, MapExpr::Unary(*op)),
        OpSemantics::Map2(op) => render_map(&mut code, &symbol, elem, rank, MapExpr::Binary(*op)),
        OpSemantics::Fold(op) => render_fold(&mut code, &symbol, elem, rank, *op),
    }
    Ok(code)
}

enum MapExpr {
    Unary(UnaryOp),
    Binary(BinaryOp),
}

impl MapExpr {
    fn arity(&self) -> usize {
        match self {
            MapExpr::Unary(_) => 1,
            MapExpr::Binary(_) => 2,
        }
    }

    fn render(&self, args: &[String]) -> String {
        match self {
            MapExpr::Unary(UnaryOp::Neg) => format!("-{}", args[0]),
            MapExpr::Binary(op) => {
                let sym = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::BitAnd => "&",
                    BinaryOp::BitOr => "|",
                    BinaryOp::BitXor => "^",
                };
                format!("{} {} {}", args[0], sym, args[1])
            }
        }
    }
}

fn input_params(params: &mut Vec<String>, c_ty: &str, arity: usize) {
    for i in 0..arity {
        params.push(format!("const {c_ty}* in{i}"));
        params.push(format!("const int64_t* in{i}_strides"));
        params.push(format!("const int64_t* in{i}_extents"));
    }
}

/// The flat index `i0 * strides[0] + ...` for a given stride array, or `0`
/// at rank zero.
fn index_expr(strides: &str, rank: usize) -> String {
    if rank == 0 {
        return "0".to_string();
    }
    (0..rank)
        .map(|d| format!("i{d} * {strides}[{d}]"))
        .collect::<Vec<_>>()
        .join(" + ")
}

fn open_loops(code: &mut String, rank: usize) {
    for d in 0..rank {
        let indent = "    ".repeat(d + 1);
        code.push_str(&format!(
            "{indent}for (int64_t i{d} = 0; i{d} < in0_extents[{d}]; ++i{d}) {{\n"
        ));
    }
}

fn close_loops(code: &mut String, rank: usize) {
    for d in (0..rank).rev() {
        let indent = "    ".repeat(d + 1);
        code.push_str(&format!("{indent}}}\n"));
    }
}

fn render_map(code: &mut String, symbol: &str, elem: ScalarType, rank: usize, expr: MapExpr) {
    let c_ty = elem.c_type();
    let arity = expr.arity();
    let mut params = Vec::new();
    input_params(&mut params, c_ty, arity);
    params.push(format!("{c_ty}* out"));
    params.push("const int64_t* out_strides".to_string());
    params.push("const int64_t* out_extents".to_string());

    code.push_str(&format!(
        "void {}(\n    {})\n{{\n",
        symbol,
        params.join(",\n    ")
    ));
    // The loop bounds come from in0_extents; the other extent arrays are
    // part of the fixed calling convention.
    for i in 1..arity {
        code.push_str(&format!("    (void)in{i}_extents;\n"));
    }
    code.push_str("    (void)out_extents;\n");
    open_loops(code, rank);

    let indent = "    ".repeat(rank + 1);
    let args: Vec<String> = (0..arity)
        .map(|i| {
            format!(
                "in{i}[{}]",
                index_expr(&format!("in{i}_strides"), rank)
            )
        })
        .collect();
    code.push_str(&format!(
        "{indent}out[{}] = {};\n",
        index_expr("out_strides", rank),
        expr.render(&args)
    ));

    close_loops(code, rank);
    code.push_str("}\n");
}

fn render_fold(code: &mut String, symbol: &str, elem: ScalarType, rank: usize, op: FoldOp) {
    let c_ty = elem.c_type();
    let mut params = Vec::new();
    input_params(&mut params, c_ty, 1);

    code.push_str(&format!(
        "{} {}(\n    {})\n{{\n",
        c_ty,
        symbol,
        params.join(",\n    ")
    ));
    code.push_str(&format!(
        "    {c_ty} acc = {};\n",
        identity_literal(op, elem)
    ));
    open_loops(code, rank);

    let indent = "    ".repeat(rank + 1);
    let x = format!("in0[{}]", index_expr("in0_strides", rank));
    code.push_str(&format!(
        "{indent}acc = {};\n",
        fold_expr(op, elem, "acc", &x)
    ));

    close_loops(code, rank);
    code.push_str("    return acc;\n}\n");
}

/// The fold's identity value, spelled as a C literal for the element type.
fn identity_literal(op: FoldOp, elem: ScalarType) -> String {
    match op {
        FoldOp::Sum => "0".to_string(),
        FoldOp::Prod => "1".to_string(),
        FoldOp::Max => {
            if elem.is_float() {
                "-INFINITY".to_string()
            } else if elem.is_signed() {
                format!("INT{}_MIN", elem.bit_width())
            } else {
                "0".to_string()
            }
        }
        FoldOp::Min => {
            if elem.is_float() {
                "INFINITY".to_string()
            } else if elem.is_signed() {
                format!("INT{}_MAX", elem.bit_width())
            } else {
                format!("UINT{}_MAX", elem.bit_width())
            }
        }
    }
}

fn fold_expr(op: FoldOp, elem: ScalarType, acc: &str, x: &str) -> String {
    match op {
        FoldOp::Sum => format!("{acc} + {x}"),
        FoldOp::Prod => format!("{acc} * {x}"),
        FoldOp::Max => match elem {
            ScalarType::F32 => format!("fmaxf({acc}, {x})"),
            ScalarType::F64 => format!("fmax({acc}, {x})"),
            _ => format!("(({acc} > {x}) ? {acc} : {x})"),
        },
        FoldOp::Min => match elem {
            ScalarType::F32 => format!("fminf({acc}, {x})"),
            ScalarType::F64 => format!("fmin({acc}, {x})"),
            _ => format!("(({acc} < {x}) ? {acc} : {x})"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::Prelude;

    fn builtin_source(op: &str, elem: ScalarType, rank: usize) -> String {
        let prelude = Prelude::builtin();
        let spec = prelude.lookup(op).unwrap();
        render_source(spec, elem, rank).unwrap()
    }

    #[test]
    fn test_symbol_name_is_deterministic() {
        assert_eq!(symbol_name("add", ScalarType::F64, 2), "kiln_add_f64_r2");
        assert_eq!(
            symbol_name("add", ScalarType::F64, 2),
            symbol_name("add", ScalarType::F64, 2)
        );
        assert_ne!(
            symbol_name("add", ScalarType::F64, 1),
            symbol_name("add", ScalarType::F32, 1)
        );
    }

    #[test]
    fn test_render_elementwise_add() {
        let code = builtin_source("add", ScalarType::F64, 2);
        assert!(code.contains("#include <stdint.h>"));
        assert!(code.contains("void kiln_add_f64_r2("));
        assert!(code.contains("const double* in0"));
        assert!(code.contains("for (int64_t i0 = 0; i0 < in0_extents[0]; ++i0)"));
        assert!(code.contains("for (int64_t i1 = 0; i1 < in0_extents[1]; ++i1)"));
        assert!(code.contains(
            "out[i0 * out_strides[0] + i1 * out_strides[1]] = \
             in0[i0 * in0_strides[0] + i1 * in0_strides[1]] + \
             in1[i0 * in1_strides[0] + i1 * in1_strides[1]];"
        ));
    }

    #[test]
    fn test_render_unary_neg() {
        let code = builtin_source("neg", ScalarType::I32, 1);
        assert!(code.contains("void kiln_neg_i32_r1("));
        assert!(code.contains("out[i0 * out_strides[0]] = -in0[i0 * in0_strides[0]];"));
    }

    #[test]
    fn test_render_sum_reduction() {
        let code = builtin_source("sum", ScalarType::I32, 1);
        assert!(code.contains("int32_t kiln_sum_i32_r1("));
        assert!(code.contains("int32_t acc = 0;"));
        assert!(code.contains("acc = acc + in0[i0 * in0_strides[0]];"));
        assert!(code.contains("return acc;"));
    }

    #[test]
    fn test_render_max_identities() {
        assert!(builtin_source("max", ScalarType::I32, 1).contains("acc = INT32_MIN;"));
        assert!(builtin_source("max", ScalarType::F64, 1).contains("acc = -INFINITY;"));
        assert!(builtin_source("max", ScalarType::U16, 1).contains("acc = 0;"));
        assert!(builtin_source("min", ScalarType::U16, 1).contains("acc = UINT16_MAX;"));
    }

    #[test]
    fn test_render_float_max_uses_fmax() {
        assert!(builtin_source("max", ScalarType::F32, 1).contains("fmaxf(acc,"));
        assert!(builtin_source("max", ScalarType::F64, 1).contains("fmax(acc,"));
    }

    #[test]
    fn test_render_rank_zero() {
        let code = builtin_source("add", ScalarType::F32, 0);
        assert!(code.contains("out[0] = in0[0] + in1[0];"));
        assert!(!code.contains("for ("));
    }

    #[test]
    fn test_bitwise_rejects_floats() {
        let prelude = Prelude::builtin();
        let spec = prelude.lookup("bit_and").unwrap();
        assert!(matches!(
            render_source(spec, ScalarType::F64, 1),
            Err(CompileError::TemplateInstantiation { .. })
        ));
    }
}
