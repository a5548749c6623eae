//! Physical operators.

mod aggregate;
mod dml;
mod get_table;
mod joins;
mod limit;
mod projection;
mod set_union;
mod show;
mod sort;
mod table_scan;
mod validate;

pub use aggregate::{Aggregate, AggregateDefinition};
pub use dml::{Delete, Insert, Update};
pub use get_table::{DummyTable, GetTable};
pub use joins::{HashJoin, NestedLoopJoin, Product};
pub use limit::Limit;
pub use projection::Projection;
pub use set_union::SetUnion;
pub use show::{ShowColumns, ShowTables};
pub use sort::Sort;
pub use table_scan::TableScan;
pub use validate::Validate;

use std::sync::Arc;

use strata_common::prelude::*;
use strata_storage::chunk::Chunk;
use strata_storage::column::{Column, PosList, ReferenceColumn};
use strata_storage::table::{SharedTable, Table};

/// One segment of a flattened input: the base table plus the base row id of
/// every input row, concatenated across chunks.
pub struct FlattenedSegment {
    pub base_table: SharedTable,
    pub row_ids: Vec<RowId>,
}

/// An input table resolved down to its base rows, so operators can address
/// rows uniformly whether the input owns them or references them.
///
/// Data inputs become a single identity segment over themselves; References
/// inputs keep their segment structure (columns sharing one position list).
pub struct FlattenedInput {
    pub rows: usize,
    /// Per input column: index into `segments`.
    pub column_segments: Vec<usize>,
    /// Per input column: the column id within its segment's base table.
    pub base_column_ids: Vec<ColumnId>,
    pub segments: Vec<FlattenedSegment>,
}

pub fn flatten_input(input: &SharedTable) -> Result<FlattenedInput> {
    let table = input.read();
    let column_count = table.column_count();

    match table.table_type() {
        TableType::Data => Ok(FlattenedInput {
            rows: table.row_count(),
            column_segments: vec![0; column_count],
            base_column_ids: (0..column_count).map(|i| ColumnId(i as u32)).collect(),
            segments: vec![FlattenedSegment {
                base_table: input.clone(),
                row_ids: table.row_ids(),
            }],
        }),
        TableType::References => {
            if table.chunk_count() == 0 {
                return Ok(FlattenedInput {
                    rows: 0,
                    column_segments: vec![0; column_count],
                    base_column_ids: (0..column_count)
                        .map(|i| ColumnId(i as u32))
                        .collect(),
                    segments: Vec::new(),
                });
            }

            let first_chunk = table.get_chunk(ChunkId(0));
            let mut column_segments = Vec::with_capacity(column_count);
            let mut base_column_ids = Vec::with_capacity(column_count);
            let mut segment_begin_columns: Vec<u32> = Vec::new();
            let mut current_pos_list_id = None;

            for column_index in 0..column_count {
                let Column::Reference(reference) =
                    first_chunk.column(ColumnId(column_index as u32))
                else {
                    return Err(Error::internal(
                        "References table holds a non-reference column",
                    ));
                };
                if current_pos_list_id != Some(reference.pos_list().id()) {
                    current_pos_list_id = Some(reference.pos_list().id());
                    segment_begin_columns.push(column_index as u32);
                }
                column_segments.push(segment_begin_columns.len() - 1);
                base_column_ids.push(reference.referenced_column_id());
            }

            let mut segments = Vec::with_capacity(segment_begin_columns.len());
            for &begin_column in &segment_begin_columns {
                let Column::Reference(first) = first_chunk.column(ColumnId(begin_column)) else {
                    unreachable!("checked above");
                };
                let base_table = first.referenced_table().clone();

                let mut row_ids = Vec::with_capacity(table.row_count());
                for chunk in table.chunks() {
                    let Column::Reference(reference) = chunk.column(ColumnId(begin_column))
                    else {
                        return Err(Error::internal(
                            "References table holds a non-reference column",
                        ));
                    };
                    row_ids.extend_from_slice(reference.pos_list().positions());
                }
                segments.push(FlattenedSegment {
                    base_table,
                    row_ids,
                });
            }

            Ok(FlattenedInput {
                rows: table.row_count(),
                column_segments,
                base_column_ids,
                segments,
            })
        }
    }
}

impl FlattenedInput {
    pub fn column_count(&self) -> usize {
        self.column_segments.len()
    }

    /// The value of input column `column` at flattened row `row`.
    pub fn value_at(&self, column: ColumnId, row: usize) -> Value {
        let segment = &self.segments[self.column_segments[column.0 as usize]];
        let row_id = segment.row_ids[row];
        segment
            .base_table
            .read()
            .value_at(self.base_column_ids[column.0 as usize], row_id)
    }

    /// All column values of flattened row `row`.
    pub fn row_values(&self, row: usize) -> Vec<Value> {
        (0..self.column_count())
            .map(|column| self.value_at(ColumnId(column as u32), row))
            .collect()
    }
}

/// Assemble a References table over `flattened`'s base tables holding
/// `selection` (indices into the flattened input), split into chunks of
/// `chunk_size` rows (0 = one chunk). Columns of one input segment share
/// one result position list per chunk.
pub fn build_reference_table(
    column_definitions: Vec<ColumnDefinition>,
    chunk_size: u32,
    flattened: &FlattenedInput,
    selection: &[usize],
) -> Table {
    let mut out = Table::new_references(column_definitions, chunk_size);

    let window = if chunk_size == 0 {
        selection.len().max(1)
    } else {
        chunk_size as usize
    };

    for rows in selection.chunks(window) {
        if rows.is_empty() {
            continue;
        }
        let pos_lists: Vec<Arc<PosList>> = flattened
            .segments
            .iter()
            .map(|segment| {
                Arc::new(PosList::new(
                    rows.iter().map(|&row| segment.row_ids[row]).collect(),
                ))
            })
            .collect();

        let mut chunk = Chunk::new();
        for column in 0..flattened.column_count() {
            let segment_index = flattened.column_segments[column];
            chunk.add_column(Column::Reference(ReferenceColumn::new(
                flattened.segments[segment_index].base_table.clone(),
                flattened.base_column_ids[column],
                pos_lists[segment_index].clone(),
            )));
        }
        out.emplace_chunk(chunk);
    }

    out
}
