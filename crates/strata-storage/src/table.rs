//! Tables.

use std::sync::Arc;

use parking_lot::RwLock;
use strata_common::prelude::*;

use crate::chunk::Chunk;

/// Shared handle through which tables are registered, scanned, and mutated.
/// Reference columns hold this handle too, so a referenced table cannot be
/// dropped while views into it are alive.
pub type SharedTable = Arc<RwLock<Table>>;

/// An ordered list of named, typed columns split into chunks of at most
/// `chunk_size` rows (0 = unbounded).
///
/// `Data` tables own their rows and are filled through [`Table::append`];
/// `References` tables are assembled chunk by chunk from reference columns
/// by the operators.
#[derive(Debug)]
pub struct Table {
    column_definitions: Vec<ColumnDefinition>,
    chunk_size: u32,
    chunks: Vec<Chunk>,
    table_type: TableType,
}

impl Table {
    /// A new `Data` table with one open, empty chunk.
    pub fn new(column_definitions: Vec<ColumnDefinition>, chunk_size: u32) -> Self {
        let open_chunk = Chunk::new_value_chunk(&column_definitions);
        Self {
            column_definitions,
            chunk_size,
            chunks: vec![open_chunk],
            table_type: TableType::Data,
        }
    }

    /// A `References` table with no chunks; operators fill it via
    /// [`Table::emplace_chunk`].
    pub fn new_references(column_definitions: Vec<ColumnDefinition>, chunk_size: u32) -> Self {
        Self {
            column_definitions,
            chunk_size,
            chunks: Vec::new(),
            table_type: TableType::References,
        }
    }

    /// A `References` table with the schema of `prototype` and no chunks.
    pub fn create_with_layout_from(prototype: &Table, chunk_size: u32) -> Self {
        Self::new_references(prototype.column_definitions.clone(), chunk_size)
    }

    pub fn into_shared(self) -> SharedTable {
        Arc::new(RwLock::new(self))
    }

    pub fn table_type(&self) -> TableType {
        self.table_type
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn column_count(&self) -> usize {
        self.column_definitions.len()
    }

    pub fn column_definitions(&self) -> &[ColumnDefinition] {
        &self.column_definitions
    }

    pub fn column_name(&self, column_id: ColumnId) -> &str {
        &self.column_definitions[column_id.0 as usize].name
    }

    pub fn column_type(&self, column_id: ColumnId) -> ElementType {
        self.column_definitions[column_id.0 as usize].element_type
    }

    pub fn column_names(&self) -> Vec<String> {
        self.column_definitions
            .iter()
            .map(|def| def.name.clone())
            .collect()
    }

    pub fn column_id_by_name(&self, name: &str) -> Option<ColumnId> {
        self.column_definitions
            .iter()
            .position(|def| def.name == name)
            .map(|index| ColumnId(index as u32))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn get_chunk(&self, chunk_id: ChunkId) -> &Chunk {
        &self.chunks[chunk_id.0 as usize]
    }

    pub fn get_chunk_mut(&mut self, chunk_id: ChunkId) -> &mut Chunk {
        &mut self.chunks[chunk_id.0 as usize]
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(Chunk::row_count).sum()
    }

    /// Append a row, coercing values to the declared column types. Seals the
    /// open chunk and opens a new one when the row limit is reached.
    pub fn append(&mut self, values: Vec<Value>) -> Result<()> {
        debug_assert_eq!(self.table_type, TableType::Data);

        if values.len() != self.column_count() {
            return Err(Error::Storage(StorageError::RowWidthMismatch {
                expected: self.column_count(),
                actual: values.len(),
            }));
        }

        let mut coerced = Vec::with_capacity(values.len());
        for (value, def) in values.iter().zip(&self.column_definitions) {
            let value = value.coerce_to(def.element_type).ok_or_else(|| {
                Error::Sql(SqlError::TypeMismatch {
                    expected: def.element_type.to_string(),
                    actual: value.to_string(),
                })
            })?;
            coerced.push(value);
        }

        if self.open_chunk_full() {
            self.chunks
                .push(Chunk::new_value_chunk(&self.column_definitions));
        }
        self.chunks.last_mut().unwrap().append_row(&coerced)
    }

    fn open_chunk_full(&self) -> bool {
        self.chunk_size != 0
            && self.chunks.last().map_or(true, |chunk| {
                chunk.row_count() >= self.chunk_size as usize
            })
    }

    /// Add an operator-assembled chunk. A single empty open chunk is
    /// replaced rather than kept around.
    pub fn emplace_chunk(&mut self, chunk: Chunk) {
        if self.chunks.len() == 1 && self.chunks[0].row_count() == 0 {
            self.chunks[0] = chunk;
        } else {
            self.chunks.push(chunk);
        }
    }

    /// Swap in a re-encoded chunk; row ids are unaffected.
    pub fn replace_chunk(&mut self, chunk_id: ChunkId, chunk: Chunk) {
        debug_assert_eq!(
            self.chunks[chunk_id.0 as usize].row_count(),
            chunk.row_count()
        );
        self.chunks[chunk_id.0 as usize] = chunk;
    }

    /// The value at `row_id` in column `column_id`.
    pub fn value_at(&self, column_id: ColumnId, row_id: RowId) -> Value {
        self.get_chunk(row_id.chunk_id)
            .column(column_id)
            .value_at(row_id.chunk_offset.0 as usize)
    }

    /// Row ids of all rows in chunk order.
    pub fn row_ids(&self) -> Vec<RowId> {
        let mut ids = Vec::with_capacity(self.row_count());
        for (chunk_index, chunk) in self.chunks.iter().enumerate() {
            for offset in 0..chunk.row_count() {
                ids.push(RowId::new(chunk_index as u32, offset as u32));
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_table(chunk_size: u32) -> Table {
        Table::new(
            vec![
                ColumnDefinition::new("id", ElementType::Int32),
                ColumnDefinition::new("name", ElementType::String),
            ],
            chunk_size,
        )
    }

    #[test]
    fn test_append_seals_chunks() {
        let mut table = test_table(2);
        for i in 0..5 {
            table
                .append(vec![Value::Int32(i), Value::String(format!("r{}", i))])
                .unwrap();
        }

        assert_eq!(table.row_count(), 5);
        assert_eq!(table.chunk_count(), 3);
        assert_eq!(table.get_chunk(ChunkId(0)).row_count(), 2);
        assert_eq!(table.get_chunk(ChunkId(2)).row_count(), 1);
        assert_eq!(table.value_at(ColumnId(0), RowId::new(2, 0)), Value::Int32(4));
    }

    #[test]
    fn test_chunk_size_zero_is_unbounded() {
        let mut table = test_table(0);
        for i in 0..100 {
            table
                .append(vec![Value::Int32(i), Value::String("x".into())])
                .unwrap();
        }
        assert_eq!(table.chunk_count(), 1);
    }

    #[test]
    fn test_append_coerces_literal_types() {
        let mut table = test_table(4);
        // SQL literals arrive as Int64
        table
            .append(vec![Value::Int64(7), Value::String("x".into())])
            .unwrap();
        assert_eq!(table.value_at(ColumnId(0), RowId::new(0, 0)), Value::Int32(7));

        let err = table.append(vec![Value::Int64(i64::MAX), Value::String("x".into())]);
        assert!(err.is_err());
    }

    #[test]
    fn test_column_lookup() {
        let table = test_table(2);
        assert_eq!(table.column_id_by_name("name"), Some(ColumnId(1)));
        assert_eq!(table.column_id_by_name("Name"), None);
        assert_eq!(table.column_type(ColumnId(0)), ElementType::Int32);
    }

    #[test]
    fn test_references_layout() {
        let table = test_table(2);
        let view = Table::create_with_layout_from(&table, 0);
        assert_eq!(view.table_type(), TableType::References);
        assert_eq!(view.column_names(), table.column_names());
        assert_eq!(view.chunk_count(), 0);
    }
}
