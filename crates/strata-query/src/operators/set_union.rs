//! Position-set union.
//!
//! Turns each input table into a reference matrix of `segments x rows` row
//! ids, sorts a virtual position list over each matrix (swapping indices,
//! never row ids), and merges the two sorted sequences, emitting each
//! distinct row-id tuple once. The result is the union of the inputs as
//! row-id sets, not a value union.

use std::cmp::Ordering;
use std::sync::Arc;

use strata_common::prelude::*;
use strata_storage::chunk::Chunk;
use strata_storage::column::{Column, PosList, ReferenceColumn};
use strata_storage::table::{SharedTable, Table};

use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// One column per segment, each holding every input row's id for that
/// segment, concatenated across chunks.
type ReferenceMatrix = Vec<Vec<RowId>>;

/// Indices into a reference matrix; sorting swaps these instead of rows.
type VirtualPosList = Vec<usize>;

/// Lexicographic comparison of two reference-matrix rows.
fn compare_rows(
    matrix_a: &ReferenceMatrix,
    index_a: usize,
    matrix_b: &ReferenceMatrix,
    index_b: usize,
) -> Ordering {
    for (column_a, column_b) in matrix_a.iter().zip(matrix_b) {
        match column_a[index_a].cmp(&column_b[index_b]) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Set-union over two References tables of identical schema and layout.
#[derive(Debug, Clone, Default)]
pub struct SetUnion;

impl SetUnion {
    pub fn new() -> Self {
        Self
    }
}

/// Everything `analyze_inputs` learns about the shared layout.
struct InputAnalysis {
    /// Column ids at which a new segment (a fresh position list) begins,
    /// merged over both inputs, sorted and deduplicated.
    column_segment_begins: Vec<u32>,
    /// Base table of each segment.
    referenced_tables: Vec<SharedTable>,
    /// Base column id of every column.
    referenced_column_ids: Vec<ColumnId>,
}

impl PhysicalOperator for SetUnion {
    fn name(&self) -> &'static str {
        "SetUnion"
    }

    fn num_in_tables(&self) -> u8 {
        2
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let left_ref = &inputs[0];
        let right_ref = &inputs[1];
        let left = left_ref.read();
        let right = right_ref.read();

        // Schema validation and empty-side early outs.
        if left.column_count() != right.column_count() {
            return Err(Error::Sql(SqlError::ColumnCountMismatch {
                expected: left.column_count(),
                actual: right.column_count(),
            }));
        }
        if left.column_count() == 0 {
            return Ok(left_ref.clone());
        }
        for column in 0..left.column_count() {
            let column_id = ColumnId(column as u32);
            if left.column_name(column_id) != right.column_name(column_id)
                || left.column_type(column_id) != right.column_type(column_id)
            {
                return Err(Error::invalid_argument(
                    "input tables of a set union must have the same layout",
                ));
            }
        }
        if left.row_count() == 0 {
            return Ok(right_ref.clone());
        }
        if right.row_count() == 0 {
            return Ok(left_ref.clone());
        }
        if left.table_type() != TableType::References
            || right.table_type() != TableType::References
        {
            return Err(Error::invalid_argument(
                "set union is only defined over reference tables",
            ));
        }

        let analysis = analyze_inputs(&left, &right)?;

        let matrix_left = build_reference_matrix(&left, &analysis.column_segment_begins)?;
        let matrix_right = build_reference_matrix(&right, &analysis.column_segment_begins)?;
        context.cancellation.check()?;

        // Sort virtual position lists over both matrices.
        let mut virtual_left: VirtualPosList = (0..left.row_count()).collect();
        virtual_left
            .sort_by(|&a, &b| compare_rows(&matrix_left, a, &matrix_left, b));
        let mut virtual_right: VirtualPosList = (0..right.row_count()).collect();
        virtual_right
            .sort_by(|&a, &b| compare_rows(&matrix_right, a, &matrix_right, b));
        context.cancellation.check()?;

        let out_chunk_size = left.chunk_size().max(right.chunk_size());
        let mut out = Table::create_with_layout_from(&left, out_chunk_size);

        let segment_count = analysis.column_segment_begins.len();
        let mut pos_lists: Vec<Vec<RowId>> = vec![Vec::new(); segment_count];

        let emit_row =
            |pos_lists: &mut Vec<Vec<RowId>>, matrix: &ReferenceMatrix, row: usize| {
                for (pos_list, column) in pos_lists.iter_mut().zip(matrix) {
                    pos_list.push(column[row]);
                }
            };

        let emit_chunk = |out: &mut Table, pos_lists: Vec<Vec<RowId>>| {
            let shared: Vec<Arc<PosList>> = pos_lists
                .into_iter()
                .map(|positions| Arc::new(PosList::new(positions)))
                .collect();

            let mut chunk = Chunk::new();
            for (segment, &segment_begin) in
                analysis.column_segment_begins.iter().enumerate()
            {
                let segment_end = analysis
                    .column_segment_begins
                    .get(segment + 1)
                    .copied()
                    .unwrap_or(analysis.referenced_column_ids.len() as u32);
                for column in segment_begin..segment_end {
                    chunk.add_column(Column::Reference(ReferenceColumn::new(
                        analysis.referenced_tables[segment].clone(),
                        analysis.referenced_column_ids[column as usize],
                        shared[segment].clone(),
                    )));
                }
            }
            out.emplace_chunk(chunk);
        };

        // Merge the two sorted sequences; a tuple present on both sides is
        // emitted exactly once.
        let (num_left, num_right) = (virtual_left.len(), virtual_right.len());
        let (mut left_index, mut right_index) = (0usize, 0usize);
        let mut chunk_row_count = 0usize;

        while left_index < num_left || right_index < num_right {
            if left_index == num_left {
                emit_row(&mut pos_lists, &matrix_right, virtual_right[right_index]);
                right_index += 1;
            } else if right_index == num_right {
                emit_row(&mut pos_lists, &matrix_left, virtual_left[left_index]);
                left_index += 1;
            } else {
                match compare_rows(
                    &matrix_left,
                    virtual_left[left_index],
                    &matrix_right,
                    virtual_right[right_index],
                ) {
                    Ordering::Greater => {
                        emit_row(&mut pos_lists, &matrix_right, virtual_right[right_index]);
                        right_index += 1;
                    }
                    Ordering::Less => {
                        emit_row(&mut pos_lists, &matrix_left, virtual_left[left_index]);
                        left_index += 1;
                    }
                    Ordering::Equal => {
                        emit_row(&mut pos_lists, &matrix_left, virtual_left[left_index]);
                        left_index += 1;
                        right_index += 1;
                    }
                }
            }
            chunk_row_count += 1;

            if chunk_row_count == out_chunk_size as usize && out_chunk_size != 0 {
                emit_chunk(&mut out, std::mem::take(&mut pos_lists));
                pos_lists = vec![Vec::new(); segment_count];
                chunk_row_count = 0;
                context.cancellation.check()?;
            }
        }

        if chunk_row_count != 0 {
            emit_chunk(&mut out, pos_lists);
        }

        Ok(out.into_shared())
    }
}

/// Identify the shared segmentation of both inputs from their first chunks,
/// plus the base table of each segment and the base column id of each
/// column. In debug builds, verify that every chunk of both inputs agrees.
fn analyze_inputs(left: &Table, right: &Table) -> Result<InputAnalysis> {
    let mut column_segment_begins = Vec::new();
    for table in [left, right] {
        let first_chunk = table.get_chunk(ChunkId(0));
        let mut current_pos_list_id = None;
        for column in 0..table.column_count() {
            let reference = reference_column(first_chunk, ColumnId(column as u32))?;
            if current_pos_list_id != Some(reference.pos_list().id()) {
                current_pos_list_id = Some(reference.pos_list().id());
                column_segment_begins.push(column as u32);
            }
        }
    }
    column_segment_begins.sort_unstable();
    column_segment_begins.dedup();

    let first_chunk_left = left.get_chunk(ChunkId(0));
    let referenced_tables = column_segment_begins
        .iter()
        .map(|&begin| {
            reference_column(first_chunk_left, ColumnId(begin))
                .map(|reference| reference.referenced_table().clone())
        })
        .collect::<Result<Vec<_>>>()?;
    let referenced_column_ids = (0..left.column_count())
        .map(|column| {
            reference_column(first_chunk_left, ColumnId(column as u32))
                .map(|reference| reference.referenced_column_id())
        })
        .collect::<Result<Vec<_>>>()?;

    let analysis = InputAnalysis {
        column_segment_begins,
        referenced_tables,
        referenced_column_ids,
    };

    #[cfg(debug_assertions)]
    for table in [left, right] {
        verify_column_segments(table, &analysis);
    }

    Ok(analysis)
}

/// Every chunk must repeat the segmentation of the first chunk of the left
/// input and reference the same tables and column ids.
#[cfg(debug_assertions)]
fn verify_column_segments(table: &Table, analysis: &InputAnalysis) {
    for chunk_index in 0..table.chunk_count() {
        let chunk = table.get_chunk(ChunkId(chunk_index as u32));
        let mut current_pos_list_id: Option<u64> = None;
        let mut next_segment = 0usize;

        for column in 0..table.column_count() {
            if analysis
                .column_segment_begins
                .get(next_segment)
                .is_some_and(|&begin| begin == column as u32)
            {
                next_segment += 1;
                current_pos_list_id = None;
            }

            let reference = reference_column(chunk, ColumnId(column as u32))
                .expect("references table holds a non-reference column");

            match current_pos_list_id {
                None => current_pos_list_id = Some(reference.pos_list().id()),
                Some(id) => debug_assert_eq!(
                    id,
                    reference.pos_list().id(),
                    "different position lists in column segment (chunk {}, column {})",
                    chunk_index,
                    column
                ),
            }

            debug_assert!(
                Arc::ptr_eq(
                    reference.referenced_table(),
                    &analysis.referenced_tables[next_segment - 1]
                ),
                "chunk {} column {} references a different table than the first chunk",
                chunk_index,
                column
            );
            debug_assert_eq!(
                reference.referenced_column_id(),
                analysis.referenced_column_ids[column],
                "chunk {} column {} references a different column than the first chunk",
                chunk_index,
                column
            );
        }
    }
}

/// One position list per segment, concatenated over all chunks.
fn build_reference_matrix(table: &Table, segment_begins: &[u32]) -> Result<ReferenceMatrix> {
    let mut matrix: ReferenceMatrix = segment_begins
        .iter()
        .map(|_| Vec::with_capacity(table.row_count()))
        .collect();

    for chunk_index in 0..table.chunk_count() {
        let chunk = table.get_chunk(ChunkId(chunk_index as u32));
        for (segment, &begin) in segment_begins.iter().enumerate() {
            let reference = reference_column(chunk, ColumnId(begin))?;
            matrix[segment].extend_from_slice(reference.pos_list().positions());
        }
    }
    Ok(matrix)
}

fn reference_column(chunk: &Chunk, column_id: ColumnId) -> Result<&ReferenceColumn> {
    match chunk.column(column_id) {
        Column::Reference(reference) => Ok(reference),
        _ => Err(Error::invalid_argument(
            "set union is only defined over reference tables",
        )),
    }
}
