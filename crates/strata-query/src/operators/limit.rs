//! Row limiting.

use strata_common::prelude::*;
use strata_storage::table::SharedTable;

use crate::operators::{build_reference_table, flatten_input};
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Keeps the first `num_rows` rows in input chunk order.
#[derive(Debug, Clone)]
pub struct Limit {
    num_rows: u64,
}

impl Limit {
    pub fn new(num_rows: u64) -> Self {
        Self { num_rows }
    }
}

impl PhysicalOperator for Limit {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn description(&self) -> String {
        format!("Limit {}", self.num_rows)
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], _context: &ExecutionContext) -> Result<SharedTable> {
        let input = &inputs[0];
        let flattened = flatten_input(input)?;

        let keep = (self.num_rows as usize).min(flattened.rows);
        let selection: Vec<usize> = (0..keep).collect();

        let definitions = input.read().column_definitions().to_vec();
        let chunk_size = input.read().chunk_size();
        Ok(build_reference_table(definitions, chunk_size, &flattened, &selection).into_shared())
    }
}
