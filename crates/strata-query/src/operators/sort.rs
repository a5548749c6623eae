//! Sorting.

use std::cmp::Ordering;

use strata_common::prelude::*;
use strata_storage::table::SharedTable;

use crate::operators::{build_reference_table, flatten_input};
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Stable multi-key sort; keys apply in declared order and NULLs sort
/// first under either direction. Materializes a fully-ordered References
/// result.
#[derive(Debug, Clone)]
pub struct Sort {
    definitions: Vec<(ColumnId, OrderByMode)>,
}

impl Sort {
    pub fn new(definitions: Vec<(ColumnId, OrderByMode)>) -> Self {
        Self { definitions }
    }
}

impl PhysicalOperator for Sort {
    fn name(&self) -> &'static str {
        "Sort"
    }

    fn description(&self) -> String {
        let keys: Vec<String> = self
            .definitions
            .iter()
            .map(|(column, mode)| {
                let direction = match mode {
                    OrderByMode::Ascending => "ASC",
                    OrderByMode::Descending => "DESC",
                };
                format!("{} {}", column, direction)
            })
            .collect();
        format!("Sort {}", keys.join(", "))
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

        // Materialize the key columns once; the sort then only moves
        // indices.
        context
            .memory
            .allocate(flattened.rows * self.definitions.len() * std::mem::size_of::<Value>())?;
        let keys: Vec<Vec<Value>> = (0..flattened.rows)
            .map(|row| {
                self.definitions
                    .iter()
                    .map(|(column, _)| flattened.value_at(*column, row))
                    .collect()
            })
            .collect();
        context.cancellation.check()?;

        let mut selection: Vec<usize> = (0..flattened.rows).collect();
        selection.sort_by(|&a, &b| {
            for (key_index, (_, mode)) in self.definitions.iter().enumerate() {
                let ordering = keys[a][key_index].compare(&keys[b][key_index]);
                let ordering = match mode {
                    OrderByMode::Ascending => ordering,
                    OrderByMode::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        context
            .memory
            .deallocate(flattened.rows * self.definitions.len() * std::mem::size_of::<Value>());

        let definitions = input.read().column_definitions().to_vec();
        let out = build_reference_table(definitions, 0, &flattened, &selection);
        Ok(out.into_shared())
    }
}
