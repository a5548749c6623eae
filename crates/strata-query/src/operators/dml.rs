//! Data modification operators.
//!
//! All three run behind a Validate in the translated pipeline and mutate
//! the target table under its exclusive write lock.

use std::sync::Arc;

use strata_common::prelude::*;
use strata_sql::OperatorExpression;
use strata_storage::table::SharedTable;

use crate::evaluator::evaluate;
use crate::operators::flatten_input;
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Appends the rows of its input to the target table.
#[derive(Debug, Clone)]
pub struct Insert {
    table_name: String,
}

impl Insert {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

impl PhysicalOperator for Insert {
    fn name(&self) -> &'static str {
        "Insert"
    }

    fn description(&self) -> String {
        format!("Insert into '{}'", self.table_name)
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let target = context.storage.get_table(&self.table_name)?;
        let flattened = flatten_input(&inputs[0])?;

        if flattened.column_count() != target.read().column_count() {
            return Err(Error::Sql(SqlError::ColumnCountMismatch {
                expected: target.read().column_count(),
                actual: flattened.column_count(),
            }));
        }

        let rows: Vec<Vec<Value>> = (0..flattened.rows)
            .map(|row| flattened.row_values(row))
            .collect();

        let mut table = target.write();
        for row in rows {
            table.append(row)?;
        }
        drop(table);

        debug!(table = %self.table_name, rows = flattened.rows, "inserted rows");
        Ok(inputs[0].clone())
    }
}

/// Tombstones the rows its input references within the target table.
#[derive(Debug, Clone)]
pub struct Delete {
    table_name: String,
}

impl Delete {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

impl PhysicalOperator for Delete {
    fn name(&self) -> &'static str {
        "Delete"
    }

    fn description(&self) -> String {
        format!("Delete from '{}'", self.table_name)
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let target = context.storage.get_table(&self.table_name)?;

        if inputs[0].read().table_type() != TableType::References {
            return Err(Error::invalid_argument(
                "delete expects a reference input over its target table",
            ));
        }
        let flattened = flatten_input(&inputs[0])?;

        if let Some(segment) = flattened.segments.first() {
            if !Arc::ptr_eq(&segment.base_table, &target) {
                return Err(Error::invalid_argument(
                    "delete input does not reference the target table",
                ));
            }
            let mut table = target.write();
            for row_id in &segment.row_ids {
                table
                    .get_chunk_mut(row_id.chunk_id)
                    .mark_deleted(row_id.chunk_offset);
            }
        }

        debug!(table = %self.table_name, rows = flattened.rows, "deleted rows");
        Ok(inputs[0].clone())
    }
}

/// Update as delete-plus-insert on the same pipeline: the referenced input
/// rows are tombstoned and replaced by the evaluated update expressions.
#[derive(Debug, Clone)]
pub struct Update {
    table_name: String,
    expressions: Vec<OperatorExpression>,
}

impl Update {
    pub fn new(table_name: impl Into<String>, expressions: Vec<OperatorExpression>) -> Self {
        Self {
            table_name: table_name.into(),
            expressions,
        }
    }
}

impl PhysicalOperator for Update {
    fn name(&self) -> &'static str {
        "Update"
    }

    fn description(&self) -> String {
        format!("Update '{}'", self.table_name)
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let target = context.storage.get_table(&self.table_name)?;
        let flattened = flatten_input(&inputs[0])?;

        if self.expressions.len() != target.read().column_count() {
            return Err(Error::Sql(SqlError::ColumnCountMismatch {
                expected: target.read().column_count(),
                actual: self.expressions.len(),
            }));
        }

        // Evaluate the replacement rows before touching the table, so a
        // failing expression leaves the target unmodified.
        let mut replacements = Vec::with_capacity(flattened.rows);
        for row in 0..flattened.rows {
            context.cancellation.check()?;
            let input_row = flattened.row_values(row);
            let values = self
                .expressions
                .iter()
                .map(|expression| evaluate(expression, &input_row))
                .collect::<Result<Vec<_>>>()?;
            replacements.push(values);
        }

        let Some(segment) = flattened.segments.first() else {
            return Ok(inputs[0].clone());
        };
        if !Arc::ptr_eq(&segment.base_table, &target) {
            return Err(Error::invalid_argument(
                "update input does not reference the target table",
            ));
        }

        let mut table = target.write();
        for row_id in &segment.row_ids {
            table
                .get_chunk_mut(row_id.chunk_id)
                .mark_deleted(row_id.chunk_offset);
        }
        for values in replacements {
            table.append(values)?;
        }
        drop(table);

        debug!(table = %self.table_name, rows = flattened.rows, "updated rows");
        Ok(inputs[0].clone())
    }
}
