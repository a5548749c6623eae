//! Visibility filtering.

use strata_common::prelude::*;
use strata_storage::table::SharedTable;

use crate::operators::{build_reference_table, flatten_input};
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Passes through the rows visible to the active transaction, i.e. those
/// not tombstoned by a delete. Preserves input order.
#[derive(Debug, Clone, Default)]
pub struct Validate;

impl Validate {
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalOperator for Validate {
    fn name(&self) -> &'static str {
        "Validate"
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let input = &inputs[0];
        let flattened = flatten_input(input)?;

        // A row is visible when its base row is not tombstoned. All
        // segments address the same logical row, so checking the first
        // segment suffices.
        let mut selection = Vec::with_capacity(flattened.rows);
        if let Some(segment) = flattened.segments.first() {
            let base = segment.base_table.read();
            for (row, row_id) in segment.row_ids.iter().enumerate() {
                if row % 4096 == 0 {
                    context.cancellation.check()?;
                }
                if !base.get_chunk(row_id.chunk_id).is_deleted(row_id.chunk_offset) {
                    selection.push(row);
                }
            }
        }

        let definitions = input.read().column_definitions().to_vec();
        let chunk_size = input.read().chunk_size();
        Ok(build_reference_table(definitions, chunk_size, &flattened, &selection).into_shared())
    }
}
