//! Table scans.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use strata_common::prelude::*;
use strata_storage::chunk::Chunk;
use strata_storage::column::{
    Column, ColumnVisitor, DictionaryColumn, PosList, ReferenceColumn, RunLengthColumn,
    ValueColumn,
};
use strata_storage::table::{SharedTable, Table};

use crate::evaluator::matches_scan_type;
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Scans one column, emitting a References table over the matching rows.
///
/// Dispatch is per column encoding: dictionary columns resolve the search
/// term to dictionary index bounds and scan the compressed attribute vector;
/// run-length columns are evaluated once per run; reference columns recurse
/// to the base column through their position list.
#[derive(Debug, Clone)]
pub struct TableScan {
    column_id: ColumnId,
    scan_type: ScanType,
    value: OperatorParameterValue,
    value2: Option<Value>,
}

impl TableScan {
    pub fn new(
        column_id: ColumnId,
        scan_type: ScanType,
        value: OperatorParameterValue,
        value2: Option<Value>,
    ) -> Self {
        Self {
            column_id,
            scan_type,
            value,
            value2,
        }
    }
}

impl PhysicalOperator for TableScan {
    fn name(&self) -> &'static str {
        "TableScan"
    }

    fn description(&self) -> String {
        match &self.value2 {
            Some(value2) => format!(
                "TableScan {} BETWEEN {} AND {}",
                self.column_id, self.value, value2
            ),
            None => format!("TableScan {} {} {}", self.column_id, self.scan_type, self.value),
        }
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        let value = match &self.value {
            OperatorParameterValue::Placeholder(index) => parameters
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| self.value.clone()),
            other => other.clone(),
        };
        Box::new(Self {
            column_id: self.column_id,
            scan_type: self.scan_type,
            value,
            value2: self.value2.clone(),
        })
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let input = &inputs[0];
        let table = input.read();
        let mut out = Table::create_with_layout_from(&table, table.chunk_size());

        for chunk_index in 0..table.chunk_count() {
            context.cancellation.check()?;
            let chunk_id = ChunkId(chunk_index as u32);
            let chunk = table.get_chunk(chunk_id);
            if chunk.row_count() == 0 {
                continue;
            }

            let offsets = self.matching_offsets(chunk)?;
            if offsets.is_empty() {
                continue;
            }

            out.emplace_chunk(match table.table_type() {
                TableType::Data => {
                    let pos_list = Arc::new(PosList::new(
                        offsets
                            .iter()
                            .map(|&offset| RowId::new(chunk_id.0, offset))
                            .collect(),
                    ));
                    let mut out_chunk = Chunk::new();
                    for column in 0..table.column_count() {
                        out_chunk.add_column(Column::Reference(ReferenceColumn::new(
                            input.clone(),
                            ColumnId(column as u32),
                            pos_list.clone(),
                        )));
                    }
                    out_chunk
                }
                TableType::References => filter_reference_chunk(chunk, &offsets)?,
            });
        }

        Ok(out.into_shared())
    }
}

impl TableScan {
    fn matching_offsets(&self, chunk: &Chunk) -> Result<Vec<u32>> {
        let column = chunk.column(self.column_id);

        match &self.value {
            OperatorParameterValue::Placeholder(index) => Err(Error::execution(format!(
                "unbound placeholder #{}",
                index
            ))),
            // Column-vs-column comparison, e.g. from a natural join.
            OperatorParameterValue::Column(other_column_id) => {
                let other = chunk.column(*other_column_id);
                let mut offsets = Vec::new();
                for row in 0..column.len() {
                    if matches_scan_type(
                        self.scan_type,
                        &column.value_at(row),
                        &other.value_at(row),
                        self.value2.as_ref(),
                    ) {
                        offsets.push(row as u32);
                    }
                }
                Ok(offsets)
            }
            OperatorParameterValue::Value(search) => {
                let mut scan = ScanContext::default();
                let mut dispatcher = ScanDispatcher {
                    scan_type: self.scan_type,
                    search,
                    search2: self.value2.as_ref(),
                };
                column.accept(&mut dispatcher, &mut scan)?;
                Ok(scan.offsets)
            }
        }
    }
}

/// Replicate the segment structure of a reference chunk, keeping only the
/// given offsets of each shared position list.
fn filter_reference_chunk(chunk: &Chunk, offsets: &[u32]) -> Result<Chunk> {
    let mut filtered_pos_lists: HashMap<u64, Arc<PosList>> = HashMap::new();
    let mut out_chunk = Chunk::new();

    for column in chunk.columns() {
        let Column::Reference(reference) = column else {
            return Err(Error::internal(
                "References table holds a non-reference column",
            ));
        };
        let filtered = filtered_pos_lists
            .entry(reference.pos_list().id())
            .or_insert_with(|| {
                let positions = reference.pos_list().positions();
                Arc::new(PosList::new(
                    offsets
                        .iter()
                        .map(|&offset| positions[offset as usize])
                        .collect(),
                ))
            })
            .clone();
        out_chunk.add_column(Column::Reference(ReferenceColumn::new(
            reference.referenced_table().clone(),
            reference.referenced_column_id(),
            filtered,
        )));
    }
    Ok(out_chunk)
}

#[derive(Default)]
struct ScanContext {
    offsets: Vec<u32>,
}

struct ScanDispatcher<'a> {
    scan_type: ScanType,
    search: &'a Value,
    search2: Option<&'a Value>,
}

impl ScanDispatcher<'_> {
    fn matches(&self, value: &Value) -> bool {
        matches_scan_type(self.scan_type, value, self.search, self.search2)
    }
}

impl ColumnVisitor<ScanContext> for ScanDispatcher<'_> {
    fn visit_value_column(&mut self, column: &ValueColumn, scan: &mut ScanContext) -> Result<()> {
        for row in 0..column.len() {
            if self.matches(&column.value_at(row)) {
                scan.offsets.push(row as u32);
            }
        }
        Ok(())
    }

    fn visit_dictionary_column(
        &mut self,
        column: &DictionaryColumn,
        scan: &mut ScanContext,
    ) -> Result<()> {
        let null_value_id = column.null_value_id().0;

        // Resolve the search term to one or two dictionary index bounds and
        // scan the attribute vector against them.
        let accepts: Box<dyn Fn(u32) -> bool> = match self.scan_type {
            ScanType::Like | ScanType::NotLike => {
                // Pattern scans have no index bound; fall back to values.
                for row in 0..column.len() {
                    if self.matches(&column.value_at(row)) {
                        scan.offsets.push(row as u32);
                    }
                }
                return Ok(());
            }
            ScanType::Equals | ScanType::NotEquals => {
                if self.search.is_null() {
                    return Ok(());
                }
                let bound = column.lower_bound(self.search).0;
                let present = (bound as usize) < column.unique_values_count()
                    && column.dictionary().value_at(bound as usize).compare(self.search)
                        == Ordering::Equal;
                match (self.scan_type, present) {
                    (ScanType::Equals, true) => Box::new(move |id| id == bound),
                    (ScanType::Equals, false) => return Ok(()),
                    (ScanType::NotEquals, true) => {
                        Box::new(move |id| id != bound && id != null_value_id)
                    }
                    (ScanType::NotEquals, false) => {
                        Box::new(move |id| id != null_value_id)
                    }
                    _ => unreachable!(),
                }
            }
            ScanType::LessThan => {
                if self.search.is_null() {
                    return Ok(());
                }
                let bound = column.lower_bound(self.search).0;
                Box::new(move |id| id < bound)
            }
            ScanType::LessThanEquals => {
                if self.search.is_null() {
                    return Ok(());
                }
                let bound = column.upper_bound(self.search).0;
                Box::new(move |id| id < bound)
            }
            ScanType::GreaterThan => {
                if self.search.is_null() {
                    return Ok(());
                }
                let bound = column.upper_bound(self.search).0;
                Box::new(move |id| id >= bound && id != null_value_id)
            }
            ScanType::GreaterThanEquals => {
                if self.search.is_null() {
                    return Ok(());
                }
                let bound = column.lower_bound(self.search).0;
                Box::new(move |id| id >= bound && id != null_value_id)
            }
            ScanType::Between => {
                let Some(upper) = self.search2 else {
                    return Ok(());
                };
                if self.search.is_null() || upper.is_null() {
                    return Ok(());
                }
                let low = column.lower_bound(self.search).0;
                let high = column.upper_bound(upper).0;
                Box::new(move |id| id >= low && id < high && id != null_value_id)
            }
        };

        let mut decoder = column.attribute_vector().create_decoder();
        for row in 0..column.len() {
            if accepts(decoder.get(row)) {
                scan.offsets.push(row as u32);
            }
        }
        Ok(())
    }

    fn visit_run_length_column(
        &mut self,
        column: &RunLengthColumn,
        scan: &mut ScanContext,
    ) -> Result<()> {
        // One predicate evaluation per run.
        let mut run_start = 0u32;
        for (run, &run_end) in column.end_positions().iter().enumerate() {
            let value = column.values().value_at(run);
            let value = if value == *column.null_value() {
                Value::Null
            } else {
                value
            };
            if self.matches(&value) {
                scan.offsets.extend(run_start..=run_end);
            }
            run_start = run_end + 1;
        }
        Ok(())
    }

    fn visit_reference_column(
        &mut self,
        column: &ReferenceColumn,
        scan: &mut ScanContext,
    ) -> Result<()> {
        // Recurse to the referenced base column through the position list.
        for row in 0..column.len() {
            if self.matches(&column.value_at(row)) {
                scan.offsets.push(row as u32);
            }
        }
        Ok(())
    }
}
