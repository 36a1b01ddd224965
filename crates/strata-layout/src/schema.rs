//! Explicit, ordered record schemas.
//!
//! A [`Schema`] is plain data: an ordered list of [`FieldDecl`]s built with
//! [`SchemaBuilder`]. Modifier methods (`indirect`, `constant`, `align`)
//! apply to the most recently declared field:
//!
//! ```
//! use strata_layout::{Length, Schema};
//!
//! let particle = Schema::builder("particle")
//!     .scalar("n", "index").constant()
//!     .scalar("mass", "real")
//!     .array("history", "real", Length::arg("n")).indirect()
//!     .build()
//!     .unwrap();
//! assert_eq!(particle.fields().len(), 3);
//! ```

use std::fmt;
use std::ops;
use std::sync::Arc;

use strata_core::Args;

use crate::error::LayoutError;

/// Default alignment applied to every field unless overridden.
pub const DEFAULT_ALIGN: u64 = 8;

/// Element type of a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A scalar, named through the type catalog.
    Scalar(String),
    /// A nested record.
    Record(Arc<Schema>),
}

/// Where a field's data lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageMode {
    /// Stored in place within the direct field area.
    Inline,
    /// Stored after all direct fields, reached through a pointer cell.
    Indirect,
}

/// Repetition length of an array field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Length {
    /// A literal element count.
    Fixed(u64),
    /// The integer value of the named constructor argument.
    Arg(String),
    /// Product of two lengths.
    Mul(Box<Length>, Box<Length>),
    /// Sum of two lengths.
    Add(Box<Length>, Box<Length>),
}

impl Length {
    /// Shorthand for [`Length::Fixed`].
    pub fn fixed(n: u64) -> Self {
        Self::Fixed(n)
    }

    /// Shorthand for [`Length::Arg`].
    pub fn arg(name: impl Into<String>) -> Self {
        Self::Arg(name.into())
    }

    /// Evaluate against constructor arguments.
    pub fn resolve(&self, args: &Args) -> Result<u64, String> {
        match self {
            Self::Fixed(n) => Ok(*n),
            Self::Arg(name) => {
                let value = args
                    .get(name)
                    .ok_or_else(|| format!("argument '{name}' not supplied"))?;
                value
                    .as_u64()
                    .ok_or_else(|| format!("argument '{name}' = {value} is not a non-negative integer"))
            }
            Self::Mul(a, b) => a
                .resolve(args)?
                .checked_mul(b.resolve(args)?)
                .ok_or_else(|| format!("{self} overflows")),
            Self::Add(a, b) => a
                .resolve(args)?
                .checked_add(b.resolve(args)?)
                .ok_or_else(|| format!("{self} overflows")),
        }
    }

    /// Whether the expression reads the named argument.
    pub fn references(&self, name: &str) -> bool {
        match self {
            Self::Fixed(_) => false,
            Self::Arg(arg) => arg == name,
            Self::Mul(a, b) | Self::Add(a, b) => a.references(name) || b.references(name),
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Arg(name) => write!(f, "{name}"),
            Self::Mul(a, b) => write!(f, "({a} * {b})"),
            Self::Add(a, b) => write!(f, "({a} + {b})"),
        }
    }
}

impl From<u64> for Length {
    fn from(n: u64) -> Self {
        Self::Fixed(n)
    }
}

impl ops::Mul for Length {
    type Output = Length;

    fn mul(self, rhs: Length) -> Length {
        Length::Mul(Box::new(self), Box::new(rhs))
    }
}

impl ops::Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        Length::Add(Box::new(self), Box::new(rhs))
    }
}

/// One declared field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    /// Field name, unique within its schema.
    pub name: String,
    /// Element type.
    pub kind: FieldKind,
    /// `None` for a single element, `Some` for an array.
    pub length: Option<Length>,
    /// Inline or pointer-indirect storage.
    pub storage: StorageMode,
    /// Immutable after construction.
    pub constant: bool,
    /// Required alignment of the field's offset.
    pub align: u64,
}

/// An ordered record description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDecl>,
}

impl Schema {
    /// Start building a schema.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Record name (used by the declaration emitter).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields in order.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether any length in this schema or a nested one reads `arg`.
    pub fn references_arg(&self, arg: &str) -> bool {
        self.fields.iter().any(|f| {
            f.length.as_ref().is_some_and(|len| len.references(arg))
                || matches!(&f.kind, FieldKind::Record(child) if child.references_arg(arg))
        })
    }
}

/// Builder for [`Schema`].
#[must_use]
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDecl>,
}

impl SchemaBuilder {
    fn push(mut self, name: impl Into<String>, kind: FieldKind, length: Option<Length>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            kind,
            length,
            storage: StorageMode::Inline,
            constant: false,
            align: DEFAULT_ALIGN,
        });
        self
    }

    /// A single scalar.
    pub fn scalar(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.push(name, FieldKind::Scalar(type_name.into()), None)
    }

    /// A scalar array.
    pub fn array(
        self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        length: impl Into<Length>,
    ) -> Self {
        self.push(name, FieldKind::Scalar(type_name.into()), Some(length.into()))
    }

    /// A single nested record.
    pub fn record(self, name: impl Into<String>, schema: Arc<Schema>) -> Self {
        self.push(name, FieldKind::Record(schema), None)
    }

    /// An array of nested records.
    pub fn record_array(
        self,
        name: impl Into<String>,
        schema: Arc<Schema>,
        length: impl Into<Length>,
    ) -> Self {
        self.push(name, FieldKind::Record(schema), Some(length.into()))
    }

    /// Store the last field behind a pointer.
    pub fn indirect(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.storage = StorageMode::Indirect;
        }
        self
    }

    /// Make the last field immutable after construction.
    pub fn constant(mut self) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.constant = true;
        }
        self
    }

    /// Override the last field's alignment.
    pub fn align(mut self, align: u64) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.align = align;
        }
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<Arc<Schema>, LayoutError> {
        for (i, field) in self.fields.iter().enumerate() {
            if !field.align.is_power_of_two() {
                return Err(LayoutError::InvalidAlignment {
                    field: field.name.clone(),
                    align: field.align,
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(LayoutError::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }
        Ok(Arc::new(Schema {
            name: self.name,
            fields: self.fields,
        }))
    }
}
