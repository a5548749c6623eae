//! Core types for StrataDB

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Index of a chunk within a table
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ChunkId(pub u32);

/// Offset of a row within a chunk
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ChunkOffset(pub u32);

/// Position of a column within a table or chunk
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Col #{}", self.0)
    }
}

/// Index into the dictionary of a dictionary column
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ValueId(pub u32);

/// The stable address of a row within a table.
///
/// Ordered lexicographically by `(chunk_id, chunk_offset)`, which is the
/// order row ids are compared in wherever positions are merged or sorted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RowId {
    pub chunk_id: ChunkId,
    pub chunk_offset: ChunkOffset,
}

impl RowId {
    pub fn new(chunk_id: u32, chunk_offset: u32) -> Self {
        Self {
            chunk_id: ChunkId(chunk_id),
            chunk_offset: ChunkOffset(chunk_offset),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowID({},{})", self.chunk_id.0, self.chunk_offset.0)
    }
}

// ============================================================================
// Element types
// ============================================================================

/// The closed set of column element types supported by StrataDB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Variable-length string
    String,
}

impl ElementType {
    /// Returns true if this type is numeric
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ElementType::String)
    }

    /// Returns true if this type is a floating-point type
    pub fn is_floating_point(&self) -> bool {
        matches!(self, ElementType::Float | ElementType::Double)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int32 => write!(f, "INTEGER"),
            ElementType::Int64 => write!(f, "BIGINT"),
            ElementType::Float => write!(f, "REAL"),
            ElementType::Double => write!(f, "DOUBLE"),
            ElementType::String => write!(f, "TEXT"),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// A typed value: a concrete instance of an element type, or NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl Value {
    /// Returns the element type of this value, or None for NULL
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            Value::Null => None,
            Value::Int32(_) => Some(ElementType::Int32),
            Value::Int64(_) => Some(ElementType::Int64),
            Value::Float(_) => Some(ElementType::Float),
            Value::Double(_) => Some(ElementType::Double),
            Value::String(_) => Some(ElementType::String),
        }
    }

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Total ordering over values.
    ///
    /// NULL sorts before everything; numeric values compare across widths;
    /// floats use `total_cmp`. Values of unrelated kinds fall back to the
    /// type-tag order so sort keys stay deterministic.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.total_cmp(&y),
                    _ => a.type_order().cmp(&b.type_order()),
                },
            },
        }
    }

    /// Append an unambiguous, length-prefixed representation to a key
    /// buffer. Used where rows are compared or hashed as opaque strings:
    /// group-by keys, sort tie-breaks, set operations.
    pub fn write_key(&self, out: &mut String) {
        if self.is_null() {
            out.push_str("n;");
            return;
        }
        let rendered = self.to_string();
        out.push_str(&rendered.len().to_string());
        out.push(':');
        out.push_str(&rendered);
        out.push(';');
    }

    /// Convert to `target`, allowing numeric widening and in-range
    /// narrowing. NULL coerces to any type; strings only to strings.
    pub fn coerce_to(&self, target: ElementType) -> Option<Value> {
        if self.element_type() == Some(target) {
            return Some(self.clone());
        }
        match (self, target) {
            (Value::Null, _) => Some(Value::Null),
            (Value::Int32(v), ElementType::Int64) => Some(Value::Int64(*v as i64)),
            (Value::Int64(v), ElementType::Int32) => {
                i32::try_from(*v).ok().map(Value::Int32)
            }
            (_, ElementType::Float) => self.as_f64().map(|v| Value::Float(v as f32)),
            (_, ElementType::Double) => self.as_f64().map(Value::Double),
            _ => None,
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int32(_) => 1,
            Value::Int64(_) => 2,
            Value::Float(_) => 3,
            Value::Double(_) => 4,
            Value::String(_) => 5,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// Column definitions
// ============================================================================

/// Declared name and type of a single table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub element_type: ElementType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            element_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

// ============================================================================
// Plan-level enums
// ============================================================================

/// Comparison carried by predicate nodes and table scans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScanType {
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    Like,
    NotLike,
    Between,
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanType::Equals => "=",
            ScanType::NotEquals => "!=",
            ScanType::LessThan => "<",
            ScanType::LessThanEquals => "<=",
            ScanType::GreaterThan => ">",
            ScanType::GreaterThanEquals => ">=",
            ScanType::Like => "LIKE",
            ScanType::NotLike => "NOT LIKE",
            ScanType::Between => "BETWEEN",
        };
        write!(f, "{}", s)
    }
}

/// Rewrite table applied when the operands of a comparison are swapped.
///
/// `SELECT * FROM t WHERE 5 > a` becomes a scan for `a < 5`; equality and
/// inequality are commutative and map to themselves.
pub fn reverse_scan_type(scan_type: ScanType) -> ScanType {
    match scan_type {
        ScanType::GreaterThan => ScanType::LessThan,
        ScanType::LessThan => ScanType::GreaterThan,
        ScanType::GreaterThanEquals => ScanType::LessThanEquals,
        ScanType::LessThanEquals => ScanType::GreaterThanEquals,
        other => other,
    }
}

/// Join modes supported by the LQP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinMode {
    Inner,
    Outer,
    Left,
    Right,
    Natural,
    Cross,
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinMode::Inner => "Inner",
            JoinMode::Outer => "Outer",
            JoinMode::Left => "Left",
            JoinMode::Right => "Right",
            JoinMode::Natural => "Natural",
            JoinMode::Cross => "Cross",
        };
        write!(f, "{}", s)
    }
}

/// Union modes; `Positions` unions row-id sets rather than values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnionMode {
    Positions,
}

/// Sort direction for a single sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderByMode {
    Ascending,
    Descending,
}

/// Built-in aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Count => "COUNT",
        };
        write!(f, "{}", s)
    }
}

/// Whether a table owns its rows or references rows of another table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    Data,
    References,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id_ordering() {
        let a = RowId::new(0, 5);
        let b = RowId::new(1, 0);
        let c = RowId::new(1, 3);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, RowId::new(0, 5));
    }

    #[test]
    fn test_element_type_display() {
        assert_eq!(ElementType::Int32.to_string(), "INTEGER");
        assert_eq!(ElementType::Double.to_string(), "DOUBLE");
        assert_eq!(ElementType::String.to_string(), "TEXT");
    }

    #[test]
    fn test_value_accessors() {
        let v = Value::Int32(42);
        assert_eq!(v.as_i64(), Some(42));
        assert_eq!(v.as_f64(), Some(42.0));
        assert_eq!(v.element_type(), Some(ElementType::Int32));
        assert!(!v.is_null());

        assert!(Value::Null.is_null());
        assert_eq!(Value::Null.element_type(), None);
        assert_eq!(Value::String("x".into()).as_str(), Some("x"));
    }

    #[test]
    fn test_value_compare() {
        assert_eq!(
            Value::Int32(1).compare(&Value::Int64(2)),
            Ordering::Less
        );
        assert_eq!(
            Value::Double(2.5).compare(&Value::Int32(2)),
            Ordering::Greater
        );
        assert_eq!(Value::Null.compare(&Value::Int32(0)), Ordering::Less);
        assert_eq!(Value::Null.compare(&Value::Null), Ordering::Equal);
        assert_eq!(
            Value::String("a".into()).compare(&Value::String("b".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_reverse_scan_type() {
        assert_eq!(reverse_scan_type(ScanType::GreaterThan), ScanType::LessThan);
        assert_eq!(
            reverse_scan_type(ScanType::LessThanEquals),
            ScanType::GreaterThanEquals
        );
        assert_eq!(reverse_scan_type(ScanType::Equals), ScanType::Equals);
        assert_eq!(reverse_scan_type(ScanType::NotEquals), ScanType::NotEquals);
    }
}
