//! Join operators.

use std::collections::HashMap;

use strata_common::prelude::*;
use strata_storage::table::{SharedTable, Table};

use crate::evaluator::matches_scan_type;
use crate::operators::{build_reference_table, flatten_input, FlattenedInput};
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// The output schema of a join: left columns then right columns.
fn joined_definitions(left: &SharedTable, right: &SharedTable) -> Vec<ColumnDefinition> {
    let mut definitions = left.read().column_definitions().to_vec();
    definitions.extend(right.read().column_definitions().iter().cloned());
    definitions
}

/// Merge two flattened inputs into one over the matched row pairs, so the
/// reference-table builder can emit left and right segments side by side.
fn joined_flattened(left: FlattenedInput, right: FlattenedInput) -> FlattenedInput {
    let left_segments = left.segments.len();

    let mut column_segments = left.column_segments;
    column_segments.extend(right.column_segments.iter().map(|s| s + left_segments));
    let mut base_column_ids = left.base_column_ids;
    base_column_ids.extend(right.base_column_ids);
    let mut segments = left.segments;
    segments.extend(right.segments);

    FlattenedInput {
        rows: 0, // rewritten by select_pairs
        column_segments,
        base_column_ids,
        segments,
    }
}

/// Rewrite the merged segments so each holds the row ids of the matched
/// pairs: left segments indexed by pair.0, right segments by pair.1.
fn select_pairs(
    merged: &mut FlattenedInput,
    left_segment_count: usize,
    pairs: &[(usize, usize)],
) {
    for (index, segment) in merged.segments.iter_mut().enumerate() {
        let row_ids = if index < left_segment_count {
            pairs.iter().map(|&(l, _)| segment.row_ids[l]).collect()
        } else {
            pairs.iter().map(|&(_, r)| segment.row_ids[r]).collect()
        };
        segment.row_ids = row_ids;
    }
    merged.rows = pairs.len();
}

/// Join keys are compared semantically across integer widths; NULL never
/// matches.
fn join_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Int32(_) | Value::Int64(_) => Some(format!("i{}", value.as_i64().unwrap())),
        Value::Float(_) | Value::Double(_) => {
            Some(format!("f{}", value.as_f64().unwrap().to_bits()))
        }
        Value::String(s) => Some(format!("s{}", s)),
    }
}

/// Equality join, probe-build on the smaller side. Emits a References table
/// with one segment of reference columns per input side.
#[derive(Debug, Clone)]
pub struct HashJoin {
    left_column: ColumnId,
    right_column: ColumnId,
}

impl HashJoin {
    pub fn new(left_column: ColumnId, right_column: ColumnId) -> Self {
        Self {
            left_column,
            right_column,
        }
    }
}

impl PhysicalOperator for HashJoin {
    fn name(&self) -> &'static str {
        "HashJoin"
    }

    fn description(&self) -> String {
        format!("HashJoin {} = {}", self.left_column, self.right_column)
    }

    fn num_in_tables(&self) -> u8 {
        2
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let left = flatten_input(&inputs[0])?;
        let right = flatten_input(&inputs[1])?;

        // Build on the smaller side.
        let build_left = left.rows <= right.rows;
        let (build, build_column, probe, probe_column) = if build_left {
            (&left, self.left_column, &right, self.right_column)
        } else {
            (&right, self.right_column, &left, self.left_column)
        };

        context
            .memory
            .allocate(build.rows * std::mem::size_of::<(String, usize)>())?;

        let mut hash_table: HashMap<String, Vec<usize>> = HashMap::new();
        for row in 0..build.rows {
            if let Some(key) = join_key(&build.value_at(build_column, row)) {
                hash_table.entry(key).or_default().push(row);
            }
        }

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for probe_row in 0..probe.rows {
            if probe_row % 1024 == 0 {
                context.cancellation.check()?;
            }
            let Some(key) = join_key(&probe.value_at(probe_column, probe_row)) else {
                continue;
            };
            if let Some(build_rows) = hash_table.get(&key) {
                for &build_row in build_rows {
                    if build_left {
                        pairs.push((build_row, probe_row));
                    } else {
                        pairs.push((probe_row, build_row));
                    }
                }
            }
        }
        context
            .memory
            .deallocate(build.rows * std::mem::size_of::<(String, usize)>());

        // Keep left-major output order.
        pairs.sort();

        let definitions = joined_definitions(&inputs[0], &inputs[1]);
        let left_segment_count = left.segments.len();
        let mut merged = joined_flattened(left, right);
        select_pairs(&mut merged, left_segment_count, &pairs);

        let selection: Vec<usize> = (0..pairs.len()).collect();
        let chunk_size = inputs[0]
            .read()
            .chunk_size()
            .max(inputs[1].read().chunk_size());
        Ok(build_reference_table(definitions, chunk_size, &merged, &selection).into_shared())
    }
}

/// Comparison join over all row pairs. Inner joins preserve references;
/// outer joins materialize a Data table with NULL padding, since reference
/// columns cannot express padded rows.
#[derive(Debug, Clone)]
pub struct NestedLoopJoin {
    mode: JoinMode,
    left_column: ColumnId,
    right_column: ColumnId,
    scan_type: ScanType,
}

impl NestedLoopJoin {
    pub fn new(
        mode: JoinMode,
        left_column: ColumnId,
        right_column: ColumnId,
        scan_type: ScanType,
    ) -> Self {
        Self {
            mode,
            left_column,
            right_column,
            scan_type,
        }
    }
}

impl PhysicalOperator for NestedLoopJoin {
    fn name(&self) -> &'static str {
        "NestedLoopJoin"
    }

    fn description(&self) -> String {
        format!(
            "NestedLoopJoin {} {} {} {}",
            self.mode, self.left_column, self.scan_type, self.right_column
        )
    }

    fn num_in_tables(&self) -> u8 {
        2
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let left = flatten_input(&inputs[0])?;
        let right = flatten_input(&inputs[1])?;

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut left_matched = vec![false; left.rows];
        let mut right_matched = vec![false; right.rows];

        for left_row in 0..left.rows {
            context.cancellation.check()?;
            let left_value = left.value_at(self.left_column, left_row);
            for right_row in 0..right.rows {
                let right_value = right.value_at(self.right_column, right_row);
                if matches_scan_type(self.scan_type, &left_value, &right_value, None) {
                    pairs.push((left_row, right_row));
                    left_matched[left_row] = true;
                    right_matched[right_row] = true;
                }
            }
        }

        let definitions = joined_definitions(&inputs[0], &inputs[1]);

        if self.mode == JoinMode::Inner {
            let left_segment_count = left.segments.len();
            let chunk_size = inputs[0]
                .read()
                .chunk_size()
                .max(inputs[1].read().chunk_size());
            let mut merged = joined_flattened(left, right);
            select_pairs(&mut merged, left_segment_count, &pairs);
            let selection: Vec<usize> = (0..pairs.len()).collect();
            return Ok(
                build_reference_table(definitions, chunk_size, &merged, &selection).into_shared()
            );
        }

        // Outer modes: pad the non-matching side with NULLs.
        let definitions: Vec<ColumnDefinition> = definitions
            .into_iter()
            .map(|def| ColumnDefinition::new(def.name, def.element_type))
            .collect();
        let left_width = left.column_count();
        let right_width = right.column_count();
        let mut out = Table::new(definitions, 0);

        for &(left_row, right_row) in &pairs {
            let mut values = left.row_values(left_row);
            values.extend(right.row_values(right_row));
            out.append(values)?;
        }
        if matches!(self.mode, JoinMode::Left | JoinMode::Outer) {
            for left_row in 0..left.rows {
                if !left_matched[left_row] {
                    let mut values = left.row_values(left_row);
                    values.extend(std::iter::repeat(Value::Null).take(right_width));
                    out.append(values)?;
                }
            }
        }
        if matches!(self.mode, JoinMode::Right | JoinMode::Outer) {
            for right_row in 0..right.rows {
                if !right_matched[right_row] {
                    let mut values: Vec<Value> =
                        std::iter::repeat(Value::Null).take(left_width).collect();
                    values.extend(right.row_values(right_row));
                    out.append(values)?;
                }
            }
        }

        Ok(out.into_shared())
    }
}

/// Cross join: every left row paired with every right row, as references.
#[derive(Debug, Clone, Default)]
pub struct Product;

impl Product {
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalOperator for Product {
    fn name(&self) -> &'static str {
        "Product"
    }

    fn num_in_tables(&self) -> u8 {
        2
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let left = flatten_input(&inputs[0])?;
        let right = flatten_input(&inputs[1])?;

        let mut pairs = Vec::with_capacity(left.rows * right.rows);
        for left_row in 0..left.rows {
            context.cancellation.check()?;
            for right_row in 0..right.rows {
                pairs.push((left_row, right_row));
            }
        }

        let definitions = joined_definitions(&inputs[0], &inputs[1]);
        let chunk_size = inputs[0]
            .read()
            .chunk_size()
            .max(inputs[1].read().chunk_size());
        let left_segment_count = left.segments.len();
        let mut merged = joined_flattened(left, right);
        select_pairs(&mut merged, left_segment_count, &pairs);
        let selection: Vec<usize> = (0..pairs.len()).collect();
        Ok(build_reference_table(definitions, chunk_size, &merged, &selection).into_shared())
    }
}
