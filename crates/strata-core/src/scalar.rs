//! Scalar element types and the name → type catalog.
//!
//! Schemas refer to scalar fields by catalog name (`"integer"`, `"real"`,
//! ...). The [`TypeCatalog`] is supplied by the caller and resolves those
//! names to a [`ScalarType`], which knows its byte size, its alignment,
//! its little-endian encoding and the C spelling used by the declaration
//! emitter.

use std::fmt;

use indexmap::IndexMap;

use crate::value::{Value, ValueError};

/// A fixed-width scalar stored little-endian inside an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// IEEE-754 single precision.
    F32,
    /// IEEE-754 double precision.
    F64,
}

impl ScalarType {
    /// Every scalar type, in catalog order.
    pub const ALL: [ScalarType; 10] = [
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::F32,
        Self::F64,
    ];

    /// Size of one element in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Natural alignment in bytes (equal to the size for every scalar).
    pub fn align(self) -> u64 {
        self.size()
    }

    /// Short lowercase name (`i32`, `f64`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// C type name from `<stdint.h>`.
    pub fn native_name(self) -> &'static str {
        match self {
            Self::I8 => "int8_t",
            Self::I16 => "int16_t",
            Self::I32 => "int32_t",
            Self::I64 => "int64_t",
            Self::U8 => "uint8_t",
            Self::U16 => "uint16_t",
            Self::U32 => "uint32_t",
            Self::U64 => "uint64_t",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }

    /// `printf` format fragment, as C source (string literal plus
    /// `<inttypes.h>` macro where needed).
    pub fn format_spec(self) -> &'static str {
        match self {
            Self::I8 => "\"%\" PRId8",
            Self::I16 => "\"%\" PRId16",
            Self::I32 => "\"%\" PRId32",
            Self::I64 => "\"%\" PRId64",
            Self::U8 => "\"%\" PRIu8",
            Self::U16 => "\"%\" PRIu16",
            Self::U32 => "\"%\" PRIu32",
            Self::U64 => "\"%\" PRIu64",
            Self::F32 | Self::F64 => "\"%g\"",
        }
    }

    /// Whether this is a floating-point type.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    fn int_range(self) -> (i128, i128) {
        match self {
            Self::I8 => (i8::MIN as i128, i8::MAX as i128),
            Self::I16 => (i16::MIN as i128, i16::MAX as i128),
            Self::I32 => (i32::MIN as i128, i32::MAX as i128),
            Self::I64 => (i64::MIN as i128, i64::MAX as i128),
            Self::U8 => (0, u8::MAX as i128),
            Self::U16 => (0, u16::MAX as i128),
            Self::U32 => (0, u32::MAX as i128),
            Self::U64 => (0, u64::MAX as i128),
            Self::F32 | Self::F64 => (0, 0),
        }
    }

    /// Encode `value` into `out` (exactly [`size`](Self::size) bytes).
    ///
    /// Integer targets accept any integral value that fits; floats with a
    /// fractional part are rejected. Float targets accept any number.
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != self.size()`.
    pub fn encode(self, value: &Value, out: &mut [u8]) -> Result<(), ValueError> {
        assert_eq!(out.len() as u64, self.size(), "encode buffer size mismatch");
        match self {
            Self::F32 => {
                let v = value.as_f64().ok_or(ValueError::NotScalar)?;
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(ValueError::OutOfRange {
                        ty: self,
                        value: value.clone(),
                    });
                }
                out.copy_from_slice(&(v as f32).to_le_bytes());
            }
            Self::F64 => {
                let v = value.as_f64().ok_or(ValueError::NotScalar)?;
                out.copy_from_slice(&v.to_le_bytes());
            }
            _ => {
                let v = value.as_i128().ok_or_else(|| match value {
                    Value::List(_) => ValueError::NotScalar,
                    other => ValueError::OutOfRange {
                        ty: self,
                        value: other.clone(),
                    },
                })?;
                let (min, max) = self.int_range();
                if v < min || v > max {
                    return Err(ValueError::OutOfRange {
                        ty: self,
                        value: value.clone(),
                    });
                }
                // Two's complement truncation is exact once the range check passed.
                let bytes = (v as u128).to_le_bytes();
                out.copy_from_slice(&bytes[..out.len()]);
            }
        }
        Ok(())
    }

    /// Decode a value from exactly [`size`](Self::size) bytes.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() != self.size()`.
    pub fn decode(self, bytes: &[u8]) -> Value {
        assert_eq!(bytes.len() as u64, self.size(), "decode buffer size mismatch");
        let mut wide = [0u8; 8];
        wide[..bytes.len()].copy_from_slice(bytes);
        let raw = u64::from_le_bytes(wide);
        match self {
            Self::I8 => Value::Int(raw as u8 as i8 as i64),
            Self::I16 => Value::Int(raw as u16 as i16 as i64),
            Self::I32 => Value::Int(raw as u32 as i32 as i64),
            Self::I64 => Value::Int(raw as i64),
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => Value::UInt(raw),
            Self::F32 => Value::Float(f32::from_bits(raw as u32) as f64),
            Self::F64 => Value::Float(f64::from_bits(raw)),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mapping from schema type names to scalar types.
///
/// The catalog is an input to layout compilation, not global state: each
/// arena owns one, and tests can build bespoke catalogs freely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeCatalog {
    types: IndexMap<String, ScalarType>,
}

impl TypeCatalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// The default catalog.
    ///
    /// Registers every [`ScalarType::name`] plus the aliases `integer`
    /// (i64), `real` (f64), `float` (f32), `byte` (u8), `index` (u64),
    /// `int32` (i32) and `uint32` (u32).
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        for ty in ScalarType::ALL {
            catalog.register(ty.name(), ty);
        }
        catalog.register("integer", ScalarType::I64);
        catalog.register("real", ScalarType::F64);
        catalog.register("float", ScalarType::F32);
        catalog.register("byte", ScalarType::U8);
        catalog.register("index", ScalarType::U64);
        catalog.register("int32", ScalarType::I32);
        catalog.register("uint32", ScalarType::U32);
        catalog
    }

    /// Add or replace a name binding.
    pub fn register(&mut self, name: impl Into<String>, ty: ScalarType) {
        self.types.insert(name.into(), ty);
    }

    /// Resolve a name.
    pub fn get(&self, name: &str) -> Option<ScalarType> {
        self.types.get(name).copied()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no names are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ScalarType)> {
        self.types.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
