//! Dynamic field values and constructor arguments.

use std::error::Error;
use std::fmt;

use indexmap::IndexMap;

use crate::scalar::ScalarType;

/// A field value read from or written to an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Signed integer (decoded from `i8`..`i64`).
    Int(i64),
    /// Unsigned integer (decoded from `u8`..`u64`).
    UInt(u64),
    /// Floating point (decoded from `f32`/`f64`).
    Float(f64),
    /// A sequence, used to initialise array fields.
    List(Vec<Value>),
}

impl Value {
    /// Interpret as a non-negative integer, if exactly representable.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_i128().and_then(|v| u64::try_from(v).ok())
    }

    /// Interpret as a signed integer, if exactly representable.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    /// Interpret as a float. Integers are converted; lists are not.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(v as f64),
            Self::UInt(v) => Some(v as f64),
            Self::Float(v) => Some(v),
            Self::List(_) => None,
        }
    }

    /// Integral view used by scalar encoding. Floats qualify only when
    /// finite and without a fractional part.
    pub(crate) fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Int(v) => Some(v as i128),
            Self::UInt(v) => Some(v as i128),
            Self::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1.7e38 {
                    Some(v as i128)
                } else {
                    None
                }
            }
            Self::List(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Int(v as i64)
            }
        }
    )*};
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::UInt(v as u64)
            }
        }
    )*};
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Errors converting a [`Value`] to a scalar encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueError {
    /// The value does not fit the target scalar type.
    OutOfRange {
        /// Target type.
        ty: ScalarType,
        /// The rejected value.
        value: Value,
    },
    /// A list was supplied where a single scalar is required.
    NotScalar,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { ty, value } => {
                write!(f, "value {value} does not fit in {ty}")
            }
            Self::NotScalar => write!(f, "expected a scalar value, found a list"),
        }
    }
}

impl Error for ValueError {}

/// Constructor arguments, keyed by field name.
///
/// Arguments do double duty: a repetition length such as
/// `Length::Arg("n")` reads argument `n`, and at construction every
/// argument is written into the top-level field of the same name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    values: IndexMap<String, Value>,
}

impl Args {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an argument.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up an argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Iterate arguments in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
