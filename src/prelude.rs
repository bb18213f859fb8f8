//! The prelude: the registry of built-in operation templates available for
//! kernel compilation.
//!
//! A [`KernelSpecification`] describes an operation abstractly (arity,
//! elementwise or reducing, combine semantics, supported element types)
//! without reference to any concrete type or shape. Specifications are
//! registered once, before a [`crate::context::Runtime`] is constructed;
//! the runtime holds the prelude immutably thereafter, so lookups need no
//! locking.

use crate::error::RegistryError;
use crate::scalar::ScalarType;
use rustc_hash::FxHashMap;

/// Elementwise unary operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

/// Elementwise binary operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    BitAnd,
    BitOr,
    BitXor,
}

/// Reduction operations, folding every element into one accumulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldOp {
    Sum,
    Prod,
    Max,
    Min,
}

/// The abstract semantics of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpSemantics {
    Map1(UnaryOp),
    Map2(BinaryOp),
    Fold(FoldOp),
}

/// The shape of a compiled kernel's entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelKind {
    /// One input buffer group, one trailing output buffer group.
    ElementwiseUnary,
    /// Two input buffer groups, one trailing output buffer group.
    ElementwiseBinary,
    /// One input buffer group; the accumulated scalar is returned.
    Reduction,
}

/// Which element types an operation's template accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeClass {
    Any,
    Integer,
    SignedOrFloat,
}

impl TypeClass {
    pub fn contains(self, elem: ScalarType) -> bool {
        match self {
            TypeClass::Any => true,
            TypeClass::Integer => elem.is_integer(),
            TypeClass::SignedOrFloat => elem.is_signed() || elem.is_float(),
        }
    }
}

/// A named, type-generic kernel template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelSpecification {
    name: String,
    semantics: OpSemantics,
    types: TypeClass,
}

impl KernelSpecification {
    pub fn new(name: impl Into<String>, semantics: OpSemantics, types: TypeClass) -> Self {
        Self {
            name: name.into(),
            semantics,
            types,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn semantics(&self) -> &OpSemantics {
        &self.semantics
    }

    pub fn kind(&self) -> KernelKind {
        match self.semantics {
            OpSemantics::Map1(_) => KernelKind::ElementwiseUnary,
            OpSemantics::Map2(_) => KernelKind::ElementwiseBinary,
            OpSemantics::Fold(_) => KernelKind::Reduction,
        }
    }

    /// Number of input buffers the operation consumes.
    pub fn arity(&self) -> usize {
        match self.semantics {
            OpSemantics::Map1(_) | OpSemantics::Fold(_) => 1,
            OpSemantics::Map2(_) => 2,
        }
    }

    pub fn supports(&self, elem: ScalarType) -> bool {
        self.types.contains(elem)
    }
}

/// The operation registry.
pub struct Prelude {
    specs: FxHashMap<String, KernelSpecification>,
}

impl Prelude {
    /// An empty registry, for callers that register their own operations
    /// before constructing a runtime.
    pub fn empty() -> Self {
        Self {
            specs: FxHashMap::default(),
        }
    }

    /// The built-in operation set.
    pub fn builtin() -> Self {
        use BinaryOp::*;
        use FoldOp::*;
        use OpSemantics::*;

        let specs = [
            KernelSpecification::new("add", Map2(Add), TypeClass::Any),
            KernelSpecification::new("sub", Map2(Sub), TypeClass::Any),
            KernelSpecification::new("mul", Map2(Mul), TypeClass::Any),
            KernelSpecification::new("div", Map2(Div), TypeClass::Any),
            KernelSpecification::new("neg", Map1(UnaryOp::Neg), TypeClass::SignedOrFloat),
            KernelSpecification::new("bit_and", Map2(BitAnd), TypeClass::Integer),
            KernelSpecification::new("bit_or", Map2(BitOr), TypeClass::Integer),
            KernelSpecification::new("bit_xor", Map2(BitXor), TypeClass::Integer),
            KernelSpecification::new("sum", Fold(Sum), TypeClass::Any),
            KernelSpecification::new("prod", Fold(Prod), TypeClass::Any),
            KernelSpecification::new("max", Fold(Max), TypeClass::Any),
            KernelSpecification::new("min", Fold(Min), TypeClass::Any),
        ];

        let mut prelude = Self::empty();
        for spec in specs {
            prelude
                .register(spec)
                .expect("builtin operation names are unique");
        }
        prelude
    }

    pub fn register(&mut self, spec: KernelSpecification) -> Result<(), RegistryError> {
        if self.specs.contains_key(spec.name()) {
            return Err(RegistryError::DuplicateOperation(spec.name().to_string()));
        }
        self.specs.insert(spec.name().to_string(), spec);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&KernelSpecification, RegistryError> {
        self.specs
            .get(name)
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
