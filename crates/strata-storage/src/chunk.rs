//! Row groups.

use strata_common::prelude::*;

use crate::column::{Column, ValueColumn};

/// A bounded, column-aligned row group within a table.
///
/// Value chunks are filled through [`Chunk::append_row`] and sealed by the
/// owning table; operator-assembled chunks (reference chunks in particular)
/// are built column by column with [`Chunk::add_column`].
///
/// Each row carries a tombstone flag set by DELETE and honored by the
/// Validate operator.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    columns: Vec<Column>,
    deleted: Vec<bool>,
}

impl Chunk {
    /// An empty chunk to be assembled by an operator.
    pub fn new() -> Self {
        Self::default()
    }

    /// An open chunk of empty value columns matching `definitions`.
    pub fn new_value_chunk(definitions: &[ColumnDefinition]) -> Self {
        Self {
            columns: definitions
                .iter()
                .map(|def| Column::Value(ValueColumn::new(def.element_type, def.nullable)))
                .collect(),
            deleted: Vec::new(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn column(&self, column_id: ColumnId) -> &Column {
        &self.columns[column_id.0 as usize]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn add_column(&mut self, column: Column) {
        debug_assert!(
            self.columns.is_empty() || self.columns[0].len() == column.len(),
            "columns of a chunk must be aligned by row index"
        );
        self.columns.push(column);
    }

    /// Replace a column with a re-encoded version of the same length.
    pub fn replace_column(&mut self, column_id: ColumnId, column: Column) {
        debug_assert_eq!(self.columns[column_id.0 as usize].len(), column.len());
        self.columns[column_id.0 as usize] = column;
    }

    pub fn append_row(&mut self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::Storage(StorageError::RowWidthMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            }));
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.append(value)?;
        }
        self.deleted.push(false);
        Ok(())
    }

    pub fn is_deleted(&self, offset: ChunkOffset) -> bool {
        self.deleted.get(offset.0 as usize).copied().unwrap_or(false)
    }

    pub fn mark_deleted(&mut self, offset: ChunkOffset) {
        if self.deleted.len() < self.row_count() {
            self.deleted.resize(self.row_count(), false);
        }
        self.deleted[offset.0 as usize] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definitions() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("a", ElementType::Int32),
            ColumnDefinition::new("b", ElementType::String),
        ]
    }

    #[test]
    fn test_append_row() {
        let mut chunk = Chunk::new_value_chunk(&definitions());
        chunk
            .append_row(&[Value::Int32(1), Value::String("x".into())])
            .unwrap();
        chunk
            .append_row(&[Value::Null, Value::String("y".into())])
            .unwrap();

        assert_eq!(chunk.row_count(), 2);
        assert_eq!(chunk.column(ColumnId(0)).value_at(1), Value::Null);
        assert_eq!(
            chunk.column(ColumnId(1)).value_at(0),
            Value::String("x".into())
        );
    }

    #[test]
    fn test_append_row_width_mismatch() {
        let mut chunk = Chunk::new_value_chunk(&definitions());
        assert!(chunk.append_row(&[Value::Int32(1)]).is_err());
    }

    #[test]
    fn test_tombstones() {
        let mut chunk = Chunk::new_value_chunk(&definitions());
        chunk
            .append_row(&[Value::Int32(1), Value::String("x".into())])
            .unwrap();
        assert!(!chunk.is_deleted(ChunkOffset(0)));
        chunk.mark_deleted(ChunkOffset(0));
        assert!(chunk.is_deleted(ChunkOffset(0)));
    }
}
