//! Column variants.
//!
//! A column is a typed sequence of values, one of:
//! - [`ValueColumn`]: plain values plus optional null flags, appendable
//!   until its chunk is sealed
//! - [`DictionaryColumn`]: sorted unique dictionary + compressed attribute
//!   vector, immutable
//! - [`RunLengthColumn`]: run values + inclusive end positions, immutable
//! - [`ReferenceColumn`]: a view into another table through a shared
//!   position list
//!
//! Code that is generic over the element type fans out through the closed
//! [`TypedValues`] variant.

mod dictionary;
mod reference;
mod run_length;
mod value;

pub use dictionary::DictionaryColumn;
pub use reference::{PosList, ReferenceColumn};
pub use run_length::RunLengthColumn;
pub use value::ValueColumn;

use strata_common::prelude::*;

/// Typed value storage over the closed element-type set.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValues {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
}

impl TypedValues {
    pub fn new(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Int32 => TypedValues::Int32(Vec::new()),
            ElementType::Int64 => TypedValues::Int64(Vec::new()),
            ElementType::Float => TypedValues::Float(Vec::new()),
            ElementType::Double => TypedValues::Double(Vec::new()),
            ElementType::String => TypedValues::String(Vec::new()),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TypedValues::Int32(_) => ElementType::Int32,
            TypedValues::Int64(_) => ElementType::Int64,
            TypedValues::Float(_) => ElementType::Float,
            TypedValues::Double(_) => ElementType::Double,
            TypedValues::String(_) => ElementType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedValues::Int32(v) => v.len(),
            TypedValues::Int64(v) => v.len(),
            TypedValues::Float(v) => v.len(),
            TypedValues::Double(v) => v.len(),
            TypedValues::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value_at(&self, index: usize) -> Value {
        match self {
            TypedValues::Int32(v) => Value::Int32(v[index]),
            TypedValues::Int64(v) => Value::Int64(v[index]),
            TypedValues::Float(v) => Value::Float(v[index]),
            TypedValues::Double(v) => Value::Double(v[index]),
            TypedValues::String(v) => Value::String(v[index].clone()),
        }
    }

    /// Append `value`, which must match the element type. NULL appends the
    /// type's default; the caller tracks the null flag separately.
    pub fn push(&mut self, value: &Value) -> Result<()> {
        match (self, value) {
            (TypedValues::Int32(v), Value::Int32(x)) => v.push(*x),
            (TypedValues::Int64(v), Value::Int64(x)) => v.push(*x),
            (TypedValues::Int64(v), Value::Int32(x)) => v.push(*x as i64),
            (TypedValues::Float(v), Value::Float(x)) => v.push(*x),
            (TypedValues::Double(v), Value::Double(x)) => v.push(*x),
            (TypedValues::String(v), Value::String(x)) => v.push(x.clone()),
            (TypedValues::Int32(v), Value::Null) => v.push(0),
            (TypedValues::Int64(v), Value::Null) => v.push(0),
            (TypedValues::Float(v), Value::Null) => v.push(0.0),
            (TypedValues::Double(v), Value::Null) => v.push(0.0),
            (TypedValues::String(v), Value::Null) => v.push(String::new()),
            (this, value) => {
                return Err(Error::Sql(SqlError::TypeMismatch {
                    expected: this.element_type().to_string(),
                    actual: value.to_string(),
                }))
            }
        }
        Ok(())
    }

    /// First index whose value is not less than `value`.
    pub fn lower_bound(&self, value: &Value) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.value_at(mid).compare(value) == std::cmp::Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// First index whose value is greater than `value`.
    pub fn upper_bound(&self, value: &Value) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.value_at(mid).compare(value) != std::cmp::Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

/// A column of one chunk: a typed sequence aligned with its sibling columns.
#[derive(Debug, Clone)]
pub enum Column {
    Value(ValueColumn),
    Dictionary(DictionaryColumn),
    RunLength(RunLengthColumn),
    Reference(ReferenceColumn),
}

/// Handler for encoding-polymorphic column traversal, carrying a caller
/// context through the dispatch.
pub trait ColumnVisitor<C> {
    fn visit_value_column(&mut self, column: &ValueColumn, context: &mut C) -> Result<()>;
    fn visit_dictionary_column(&mut self, column: &DictionaryColumn, context: &mut C)
        -> Result<()>;
    fn visit_run_length_column(&mut self, column: &RunLengthColumn, context: &mut C)
        -> Result<()>;
    fn visit_reference_column(&mut self, column: &ReferenceColumn, context: &mut C)
        -> Result<()>;
}

impl Column {
    pub fn element_type(&self) -> ElementType {
        match self {
            Column::Value(c) => c.element_type(),
            Column::Dictionary(c) => c.element_type(),
            Column::RunLength(c) => c.element_type(),
            Column::Reference(c) => c.element_type(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Value(c) => c.len(),
            Column::Dictionary(c) => c.len(),
            Column::RunLength(c) => c.len(),
            Column::Reference(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row`, which may be NULL.
    pub fn value_at(&self, row: usize) -> Value {
        match self {
            Column::Value(c) => c.value_at(row),
            Column::Dictionary(c) => c.value_at(row),
            Column::RunLength(c) => c.value_at(row),
            Column::Reference(c) => c.value_at(row),
        }
    }

    /// Append to an open value column; every other variant is immutable.
    pub fn append(&mut self, value: &Value) -> Result<()> {
        match self {
            Column::Value(c) => c.append(value),
            other => Err(Error::Storage(StorageError::ImmutableColumn {
                column: format!("{:?}", other.element_type()),
            })),
        }
    }

    /// Dispatch to the matching visitor method.
    pub fn accept<C>(&self, visitor: &mut impl ColumnVisitor<C>, context: &mut C) -> Result<()> {
        match self {
            Column::Value(c) => visitor.visit_value_column(c, context),
            Column::Dictionary(c) => visitor.visit_dictionary_column(c, context),
            Column::RunLength(c) => visitor.visit_run_length_column(c, context),
            Column::Reference(c) => visitor.visit_reference_column(c, context),
        }
    }

    /// Append an unambiguous representation of the value at `row` to a key
    /// buffer. Used where rows are compared or hashed as opaque strings
    /// (group-by keys, sort tie-breaks, set operations).
    pub fn write_key(&self, row: usize, out: &mut String) {
        self.value_at(row).write_key(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_values_push_and_read() {
        let mut values = TypedValues::new(ElementType::Int32);
        values.push(&Value::Int32(7)).unwrap();
        values.push(&Value::Null).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.value_at(0), Value::Int32(7));
        assert_eq!(values.value_at(1), Value::Int32(0));
    }

    #[test]
    fn test_typed_values_type_mismatch() {
        let mut values = TypedValues::new(ElementType::Int32);
        assert!(values.push(&Value::String("x".into())).is_err());
    }

    #[test]
    fn test_typed_values_bounds() {
        let values = TypedValues::Int64(vec![1, 3, 3, 7]);
        assert_eq!(values.lower_bound(&Value::Int64(3)), 1);
        assert_eq!(values.upper_bound(&Value::Int64(3)), 3);
        assert_eq!(values.lower_bound(&Value::Int64(0)), 0);
        assert_eq!(values.lower_bound(&Value::Int64(8)), 4);
    }

    #[test]
    fn test_append_rejected_on_encoded_column() {
        let mut column = Column::RunLength(RunLengthColumn::new(
            TypedValues::Int32(vec![1]),
            vec![4],
            Value::Int32(i32::MIN),
        ));
        assert!(column.append(&Value::Int32(2)).is_err());
    }

    #[test]
    fn test_write_key() {
        let mut column = Column::Value(ValueColumn::new(ElementType::String, true));
        column.append(&Value::String("ab".into())).unwrap();
        column.append(&Value::Null).unwrap();

        let mut key = String::new();
        column.write_key(0, &mut key);
        column.write_key(1, &mut key);
        assert_eq!(key, "2:ab;n;");
    }
}
