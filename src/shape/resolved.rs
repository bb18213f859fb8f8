//! Concrete memory layouts derived from datashapes.

use super::{DataShape, Dim, ElementType};
use crate::error::ShapeError;
use crate::scalar::ScalarType;

/// How strides are laid out relative to dimension order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LayoutPolicy {
    #[default]
    RowMajor,
}

/// The part of a layout a compiled kernel is specialized on. Extents and
/// strides are runtime kernel arguments, not specialization inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeSig {
    pub rank: usize,
    pub contiguous: bool,
}

/// A datashape paired with a concrete memory layout: strides in elements,
/// a contiguity flag, and the total element count.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedShape {
    extents: Vec<u64>,
    strides: Vec<u64>,
    elem: ScalarType,
    contiguous: bool,
    element_count: u64,
}

pub(crate) fn row_major_strides(extents: &[u64]) -> Vec<u64> {
    let mut strides = vec![1u64; extents.len()];
    for i in (0..extents.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * extents[i + 1];
    }
    strides
}

impl ResolvedShape {
    /// Derive a concrete layout from a shape.
    ///
    /// Fails with [`ShapeError::UnresolvedVariableExtent`] if any `var`
    /// dimension remains unbound, and with [`ShapeError::Mismatch`] for
    /// record element types, which are outside kernel generation.
    pub fn resolve(shape: &DataShape, policy: LayoutPolicy) -> Result<Self, ShapeError> {
        let elem = match shape.element() {
            ElementType::Scalar(s) => *s,
            ElementType::Record(_) => {
                return Err(ShapeError::Mismatch(
                    "record element types cannot be resolved for kernel compilation".to_string(),
                ))
            }
        };
        let extents = shape
            .dims()
            .iter()
            .enumerate()
            .map(|(dim, d)| match d {
                Dim::Fixed(n) if *n > 0 => Ok(*n),
                Dim::Fixed(_) => Err(ShapeError::Mismatch(format!(
                    "dimension {dim}: extent must be positive"
                ))),
                Dim::Var => Err(ShapeError::UnresolvedVariableExtent { dim }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let LayoutPolicy::RowMajor = policy;
        let strides = row_major_strides(&extents);
        let element_count = extents.iter().product();
        Ok(Self {
            extents,
            strides,
            elem,
            contiguous: true,
            element_count,
        })
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[u64] {
        &self.extents
    }

    /// Strides in elements, innermost dimension last.
    pub fn strides(&self) -> &[u64] {
        &self.strides
    }

    pub fn elem(&self) -> ScalarType {
        self.elem
    }

    pub fn contiguous(&self) -> bool {
        self.contiguous
    }

    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    pub fn byte_len(&self) -> usize {
        self.element_count as usize * self.elem.size_in_bytes()
    }

    pub fn sig(&self) -> ShapeSig {
        ShapeSig {
            rank: self.rank(),
            contiguous: self.contiguous,
        }
    }

    /// The minimum number of addressable elements a buffer must provide for
    /// this layout: one past the largest reachable flat index.
    pub fn min_elements(&self) -> u64 {
        1 + self
            .extents
            .iter()
            .zip(&self.strides)
            .map(|(&e, &s)| (e - 1) * s)
            .sum::<u64>()
    }
}
