//! The datashape model.
//!
//! A [`DataShape`] is an ordered sequence of dimension descriptors followed
//! by a terminal element type, parsed from descriptor text such as
//! `3, 4, float64` or `var, int32`. Shapes are immutable; every
//! transformation (binding extents, unification) produces a new instance.

pub mod parser;
pub mod resolved;
pub mod unify;

pub use resolved::{LayoutPolicy, ResolvedShape, ShapeSig};
pub use unify::unify;

use crate::error::ShapeError;
use crate::scalar::ScalarType;
use std::fmt;

/// A single dimension descriptor: a fixed positive extent or a
/// variable-extent marker (`var` in descriptor text).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    Fixed(u64),
    Var,
}

/// The terminal element type of a shape.
///
/// Records round-trip through parse/unparse and unification but are
/// rejected by [`ResolvedShape::resolve`]: kernel generation only covers
/// scalar elements.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Scalar(ScalarType),
    Record(Vec<(String, DataShape)>),
}

/// An immutable array-shape/type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataShape {
    dims: Vec<Dim>,
    element: ElementType,
}

impl DataShape {
    /// Construct a shape programmatically. Fixed extents must be positive;
    /// the parser and [`DataShape::bind`] enforce this, and
    /// [`ResolvedShape::resolve`] rejects zero extents.
    pub fn new(dims: Vec<Dim>, element: ElementType) -> Self {
        Self { dims, element }
    }

    /// A fully fixed shape over a scalar element.
    pub fn of(extents: &[u64], elem: ScalarType) -> Self {
        Self {
            dims: extents.iter().map(|&e| Dim::Fixed(e)).collect(),
            element: ElementType::Scalar(elem),
        }
    }

    /// Parse a descriptor string, e.g. `3, 4, float64`.
    pub fn parse(text: &str) -> Result<Self, ShapeError> {
        parser::parse(text)
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.dims
    }

    pub fn element(&self) -> &ElementType {
        &self.element
    }

    /// The scalar element kind, if the element is not a record.
    pub fn scalar_element(&self) -> Option<ScalarType> {
        match &self.element {
            ElementType::Scalar(s) => Some(*s),
            ElementType::Record(_) => None,
        }
    }

    pub fn has_var_dims(&self) -> bool {
        self.dims.iter().any(|d| matches!(d, Dim::Var))
    }

    /// Substitute concrete extents into `var` dimensions, checking fixed
    /// dimensions against the provided extents. Used to resolve a shape
    /// against an actual buffer before compilation.
    pub fn bind(&self, extents: &[u64]) -> Result<DataShape, ShapeError> {
        if extents.len() != self.dims.len() {
            return Err(ShapeError::Mismatch(format!(
                "cannot bind {} extents to a rank-{} shape",
                extents.len(),
                self.dims.len()
            )));
        }
        let dims = self
            .dims
            .iter()
            .zip(extents)
            .enumerate()
            .map(|(i, (dim, &extent))| match dim {
                Dim::Var if extent > 0 => Ok(Dim::Fixed(extent)),
                Dim::Var => Err(ShapeError::Mismatch(format!(
                    "dimension {i}: bound extent must be positive"
                ))),
                Dim::Fixed(n) if *n == extent => Ok(Dim::Fixed(*n)),
                Dim::Fixed(n) => Err(ShapeError::Mismatch(format!(
                    "dimension {i}: declared extent {n} but buffer has {extent}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DataShape::new(dims, self.element.clone()))
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Var => write!(f, "var"),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ElementType::Scalar(s) => write!(f, "{s}"),
            ElementType::Record(fields) => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, (name, shape)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ; ")?;
                    }
                    write!(f, "{name} : {shape}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl fmt::Display for DataShape {
    /// The canonical descriptor form; `parse(shape.to_string())` returns an
    /// equal shape.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for dim in &self.dims {
            write!(f, "{dim}, ")?;
        }
        write!(f, "{}", self.element)
    }
}
