//! Primitive element kinds and runtime scalar values.

use std::fmt;

/// A primitive numeric element kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Class {
    Signed,
    Unsigned,
    Float,
}

impl ScalarType {
    pub const ALL: [ScalarType; 10] = [
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::I32,
        ScalarType::I64,
        ScalarType::U8,
        ScalarType::U16,
        ScalarType::U32,
        ScalarType::U64,
        ScalarType::F32,
        ScalarType::F64,
    ];

    pub fn size_in_bytes(self) -> usize {
        (self.bit_width() / 8) as usize
    }

    pub fn bit_width(self) -> u32 {
        match self {
            ScalarType::I8 | ScalarType::U8 => 8,
            ScalarType::I16 | ScalarType::U16 => 16,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 32,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 64,
        }
    }

    fn class(self) -> Class {
        match self {
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64 => Class::Signed,
            ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64 => Class::Unsigned,
            ScalarType::F32 | ScalarType::F64 => Class::Float,
        }
    }

    pub fn is_signed(self) -> bool {
        self.class() == Class::Signed
    }

    pub fn is_unsigned(self) -> bool {
        self.class() == Class::Unsigned
    }

    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    pub fn is_float(self) -> bool {
        self.class() == Class::Float
    }

    /// The descriptor token, e.g. `float64`.
    pub fn token(self) -> &'static str {
        match self {
            ScalarType::I8 => "int8",
            ScalarType::I16 => "int16",
            ScalarType::I32 => "int32",
            ScalarType::I64 => "int64",
            ScalarType::U8 => "uint8",
            ScalarType::U16 => "uint16",
            ScalarType::U32 => "uint32",
            ScalarType::U64 => "uint64",
            ScalarType::F32 => "float32",
            ScalarType::F64 => "float64",
        }
    }

    pub fn from_token(token: &str) -> Option<ScalarType> {
        Self::ALL.iter().copied().find(|t| t.token() == token)
    }

    /// The C type the codegen emits for this kind.
    pub fn c_type(self) -> &'static str {
        match self {
            ScalarType::I8 => "int8_t",
            ScalarType::I16 => "int16_t",
            ScalarType::I32 => "int32_t",
            ScalarType::I64 => "int64_t",
            ScalarType::U8 => "uint8_t",
            ScalarType::U16 => "uint16_t",
            ScalarType::U32 => "uint32_t",
            ScalarType::U64 => "uint64_t",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
        }
    }

    /// Short tag used in canonical kernel symbol names.
    pub fn symbol_tag(self) -> &'static str {
        match self {
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    fn signed_with_width(bits: u32) -> Option<ScalarType> {
        match bits {
            8 => Some(ScalarType::I8),
            16 => Some(ScalarType::I16),
            32 => Some(ScalarType::I32),
            64 => Some(ScalarType::I64),
            _ => None,
        }
    }

    fn unsigned_with_width(bits: u32) -> Option<ScalarType> {
        match bits {
            8 => Some(ScalarType::U8),
            16 => Some(ScalarType::U16),
            32 => Some(ScalarType::U32),
            64 => Some(ScalarType::U64),
            _ => None,
        }
    }

    /// The promotion table for mixed-element-type unification.
    ///
    /// Rules, applied symmetrically:
    /// 1. identical types promote to themselves;
    /// 2. integers of the same signedness promote to the wider width;
    /// 3. signed vs unsigned promotes to the signed type one width step
    ///    above the unsigned operand (`u8` vs `i8` gives `i16`); `u64` has
    ///    no signed container and does not promote;
    /// 4. floats promote to the wider float;
    /// 5. integer vs float promotes to `f32` only when the integer fits in
    ///    16 bits and the float side is `f32`, otherwise to `f64`.
    pub fn promote(self, other: ScalarType) -> Option<ScalarType> {
        if self == other {
            return Some(self);
        }
        match (self.class(), other.class()) {
            (Class::Signed, Class::Signed) => {
                Self::signed_with_width(self.bit_width().max(other.bit_width()))
            }
            (Class::Unsigned, Class::Unsigned) => {
                Self::unsigned_with_width(self.bit_width().max(other.bit_width()))
            }
            (Class::Signed, Class::Unsigned) => promote_mixed_sign(self, other),
            (Class::Unsigned, Class::Signed) => promote_mixed_sign(other, self),
            (Class::Float, Class::Float) => {
                if self.bit_width() >= other.bit_width() {
                    Some(self)
                } else {
                    Some(other)
                }
            }
            (Class::Float, _) => promote_int_float(other, self),
            (_, Class::Float) => promote_int_float(self, other),
        }
    }
}

fn promote_mixed_sign(signed: ScalarType, unsigned: ScalarType) -> Option<ScalarType> {
    if unsigned.bit_width() >= 64 {
        return None;
    }
    ScalarType::signed_with_width(signed.bit_width().max(unsigned.bit_width() * 2))
}

fn promote_int_float(int: ScalarType, float: ScalarType) -> Option<ScalarType> {
    if float == ScalarType::F32 && int.bit_width() <= 16 {
        Some(ScalarType::F32)
    } else {
        Some(ScalarType::F64)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A runtime scalar value, e.g. the result of a reduction kernel.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Scalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scalar::I8(n) => write!(f, "{n}"),
            Scalar::I16(n) => write!(f, "{n}"),
            Scalar::I32(n) => write!(f, "{n}"),
            Scalar::I64(n) => write!(f, "{n}"),
            Scalar::U8(n) => write!(f, "{n}"),
            Scalar::U16(n) => write!(f, "{n}"),
            Scalar::U32(n) => write!(f, "{n}"),
            Scalar::U64(n) => write!(f, "{n}"),
            Scalar::F32(n) => write!(f, "{n}f"),
            Scalar::F64(n) => write!(f, "{n}"),
        }
    }
}

macro_rules! impl_scalar_type {
    ($($variant:ident),*) => {
        impl Scalar {
            pub fn scalar_type(&self) -> ScalarType {
                match self {
                    $(
                        Scalar::$variant(_) => ScalarType::$variant,
                    )*
                }
            }
        }
    };
}

impl_scalar_type!(I8, I16, I32, I64, U8, U16, U32, U64, F32, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        for t in ScalarType::ALL {
            assert_eq!(ScalarType::from_token(t.token()), Some(t));
        }
        assert_eq!(ScalarType::from_token("float65"), None);
    }

    #[test]
    fn test_promote_identical() {
        for t in ScalarType::ALL {
            assert_eq!(t.promote(t), Some(t));
        }
    }

    #[test]
    fn test_promote_same_signedness_widens() {
        assert_eq!(
            ScalarType::I8.promote(ScalarType::I32),
            Some(ScalarType::I32)
        );
        assert_eq!(
            ScalarType::U16.promote(ScalarType::U64),
            Some(ScalarType::U64)
        );
    }

    #[test]
    fn test_promote_mixed_signedness() {
        assert_eq!(
            ScalarType::I8.promote(ScalarType::U8),
            Some(ScalarType::I16)
        );
        assert_eq!(
            ScalarType::I64.promote(ScalarType::U8),
            Some(ScalarType::I64)
        );
        assert_eq!(
            ScalarType::I32.promote(ScalarType::U32),
            Some(ScalarType::I64)
        );
        assert_eq!(ScalarType::I32.promote(ScalarType::U64), None);
    }

    #[test]
    fn test_promote_floats() {
        assert_eq!(
            ScalarType::F32.promote(ScalarType::F64),
            Some(ScalarType::F64)
        );
        assert_eq!(
            ScalarType::I16.promote(ScalarType::F32),
            Some(ScalarType::F32)
        );
        assert_eq!(
            ScalarType::I32.promote(ScalarType::F32),
            Some(ScalarType::F64)
        );
        assert_eq!(
            ScalarType::I32.promote(ScalarType::F64),
            Some(ScalarType::F64)
        );
    }

    #[test]
    fn test_promote_is_symmetric() {
        for a in ScalarType::ALL {
            for b in ScalarType::ALL {
                assert_eq!(a.promote(b), b.promote(a), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_scalar_type_of_value() {
        assert_eq!(Scalar::F64(1.5).scalar_type(), ScalarType::F64);
        assert_eq!(Scalar::I32(-1).scalar_type(), ScalarType::I32);
    }
}
