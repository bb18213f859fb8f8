//! Structural unification of datashapes.

use super::{DataShape, Dim, ElementType};
use crate::error::ShapeError;

/// Unify two shapes into the most concrete shape compatible with both.
///
/// Dimension counts must agree. A fixed dimension unifies with an equal
/// fixed dimension or with `var` (taking the fixed extent); two `var`
/// dimensions stay variable and must be bound against an actual buffer
/// before compilation. Differing scalar element types go through the
/// promotion table ([`crate::scalar::ScalarType::promote`]); records unify
/// field by field.
pub fn unify(a: &DataShape, b: &DataShape) -> Result<DataShape, ShapeError> {
    if a.rank() != b.rank() {
        return Err(ShapeError::Mismatch(format!(
            "rank {} vs rank {}",
            a.rank(),
            b.rank()
        )));
    }
    let dims = a
        .dims()
        .iter()
        .zip(b.dims())
        .enumerate()
        .map(|(i, (x, y))| match (x, y) {
            (Dim::Fixed(n), Dim::Fixed(m)) if n == m => Ok(Dim::Fixed(*n)),
            (Dim::Fixed(n), Dim::Fixed(m)) => Err(ShapeError::Mismatch(format!(
                "dimension {i}: extent {n} vs {m}"
            ))),
            (Dim::Fixed(n), Dim::Var) | (Dim::Var, Dim::Fixed(n)) => Ok(Dim::Fixed(*n)),
            (Dim::Var, Dim::Var) => Ok(Dim::Var),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let element = unify_element(a.element(), b.element())?;
    Ok(DataShape::new(dims, element))
}

fn unify_element(a: &ElementType, b: &ElementType) -> Result<ElementType, ShapeError> {
    match (a, b) {
        (ElementType::Scalar(x), ElementType::Scalar(y)) => x
            .promote(*y)
            .map(ElementType::Scalar)
            .ok_or_else(|| ShapeError::Mismatch(format!("no promotion from {x} to {y}"))),
        (ElementType::Record(xs), ElementType::Record(ys)) => {
            if xs.len() != ys.len() {
                return Err(ShapeError::Mismatch(format!(
                    "record with {} fields vs {}",
                    xs.len(),
                    ys.len()
                )));
            }
            let fields = xs
                .iter()
                .zip(ys)
                .map(|((xn, xs), (yn, ys))| {
                    if xn != yn {
                        return Err(ShapeError::Mismatch(format!(
                            "record field `{xn}` vs `{yn}`"
                        )));
                    }
                    Ok((xn.clone(), unify(xs, ys)?))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ElementType::Record(fields))
        }
        _ => Err(ShapeError::Mismatch(
            "scalar vs record element type".to_string(),
        )),
    }
}
