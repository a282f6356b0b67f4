//! Typed views over the raw field buffers delivered with each cell.
//!
//! The query engine hands every cell a set of named, untyped byte buffers.
//! [`GenomicFieldType`] describes the shape of one named field and is looked
//! up from a [`FieldRegistry`] populated once before the scan begins;
//! [`GenomicField`] pairs one of those descriptors with a borrowed buffer and
//! provides bounds-checked typed accessors. The buffer is only borrowed for
//! the duration of one callback invocation, which the lifetime enforces.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{FieldError, Result};

/// Value kind of one genomic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Signed 32-bit integers
    Int,
    /// 32-bit floating point
    Float,
    /// Single characters
    Char,
    /// An opaque byte string viewed whole
    String,
}
impl FieldKind {
    /// Bytes per element for fixed-width kinds; 1 for strings (byte-counted)
    pub fn element_width(self) -> usize {
        match self {
            Self::Int | Self::Float => 4,
            Self::Char | Self::String => 1,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Char => "char",
            Self::String => "string",
        }
    }
}

/// Arity of one genomic field: a fixed element count or variable length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldArity {
    Fixed(usize),
    Variable,
}

/// Shape descriptor for one named field.
///
/// Immutable; resolved by name from the [`FieldRegistry`] once per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenomicFieldType {
    pub kind: FieldKind,
    pub arity: FieldArity,
    /// Dimensionality of the value (1 for flat vectors)
    pub dimensions: u8,
    /// Whether the field encodes phase information (e.g. a genotype field)
    pub phase_bearing: bool,
}
impl GenomicFieldType {
    pub fn new(kind: FieldKind, arity: FieldArity) -> Self {
        Self {
            kind,
            arity,
            dimensions: 1,
            phase_bearing: false,
        }
    }

    pub fn phase_bearing(mut self) -> Self {
        self.phase_bearing = true;
        self
    }
}

/// Field-type lookup keyed by field name, populated once per query.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    types: HashMap<String, GenomicFieldType>,
}
impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering the canonical genotype field set: a phase-bearing
    /// `GT` integer vector and `REF`/`ALT` allele strings.
    pub fn genotype_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert(
            "GT",
            GenomicFieldType::new(FieldKind::Int, FieldArity::Variable).phase_bearing(),
        );
        registry.insert(
            "REF",
            GenomicFieldType::new(FieldKind::String, FieldArity::Variable),
        );
        registry.insert(
            "ALT",
            GenomicFieldType::new(FieldKind::String, FieldArity::Variable),
        );
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: GenomicFieldType) {
        self.types.insert(name.into(), ty);
    }

    /// Looks up a field type by name.
    ///
    /// An unknown name is a value-range error surfaced to the caller.
    pub fn get(&self, name: &str) -> Result<&GenomicFieldType> {
        self.types
            .get(name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

/// A named, typed, borrowed value buffer with a declared element count.
///
/// Accessors are bounds-checked against the declared count, not the buffer
/// length alone; an offset at or past the count is a value-range error.
#[derive(Debug, Clone, Copy)]
pub struct GenomicField<'a> {
    name: &'a str,
    ty: GenomicFieldType,
    buffer: &'a [u8],
    elements: usize,
}
impl<'a> GenomicField<'a> {
    pub fn new(name: &'a str, ty: GenomicFieldType, buffer: &'a [u8], elements: usize) -> Self {
        Self {
            name,
            ty,
            buffer,
            elements,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn field_type(&self) -> &GenomicFieldType {
        &self.ty
    }

    /// Declared element count (bytes for string fields)
    pub fn elements(&self) -> usize {
        self.elements
    }

    fn check_offset(&self, offset: usize, expected: FieldKind) -> Result<usize> {
        if self.ty.kind != expected {
            return Err(FieldError::KindMismatch {
                name: self.name.to_string(),
                expected: expected.name(),
                found: self.ty.kind.name(),
            }
            .into());
        }
        if offset >= self.elements {
            return Err(FieldError::OffsetOutOfRange(offset, self.elements).into());
        }
        let width = self.ty.kind.element_width();
        let end = (offset + 1) * width;
        if end > self.buffer.len() {
            return Err(
                FieldError::TruncatedBuffer(self.name.to_string(), self.buffer.len(), end).into(),
            );
        }
        Ok(offset * width)
    }

    /// Signed integer element at `offset`
    pub fn int_at(&self, offset: usize) -> Result<i32> {
        let byte = self.check_offset(offset, FieldKind::Int)?;
        Ok(LittleEndian::read_i32(&self.buffer[byte..byte + 4]))
    }

    /// Floating point element at `offset`
    pub fn float_at(&self, offset: usize) -> Result<f32> {
        let byte = self.check_offset(offset, FieldKind::Float)?;
        Ok(LittleEndian::read_f32(&self.buffer[byte..byte + 4]))
    }

    /// Character element at `offset`
    pub fn char_at(&self, offset: usize) -> Result<char> {
        let byte = self.check_offset(offset, FieldKind::Char)?;
        Ok(self.buffer[byte] as char)
    }

    /// Whole-buffer view of a string field
    pub fn str_view(&self) -> Result<&'a str> {
        if self.ty.kind != FieldKind::String {
            return Err(FieldError::KindMismatch {
                name: self.name.to_string(),
                expected: FieldKind::String.name(),
                found: self.ty.kind.name(),
            }
            .into());
        }
        let end = self.elements.min(self.buffer.len());
        Ok(std::str::from_utf8(&self.buffer[..end])?)
    }
}
