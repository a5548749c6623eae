//! Plan leaves.

use strata_common::prelude::*;
use strata_storage::table::{SharedTable, Table};

use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Fetches a stored table from the storage manager.
#[derive(Debug, Clone)]
pub struct GetTable {
    table_name: String,
}

impl GetTable {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

impl PhysicalOperator for GetTable {
    fn name(&self) -> &'static str {
        "GetTable"
    }

    fn description(&self) -> String {
        format!("GetTable '{}'", self.table_name)
    }

    fn num_in_tables(&self) -> u8 {
        0
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, _inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        context.storage.get_table(&self.table_name)
    }
}

/// A zero-column leaf; projections over it evaluate their expressions once,
/// which is how `INSERT ... VALUES` rows come into being.
#[derive(Debug, Clone, Default)]
pub struct DummyTable;

impl DummyTable {
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalOperator for DummyTable {
    fn name(&self) -> &'static str {
        "DummyTable"
    }

    fn num_in_tables(&self) -> u8 {
        0
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, _inputs: &[SharedTable], _context: &ExecutionContext) -> Result<SharedTable> {
        Ok(Table::new(Vec::new(), 0).into_shared())
    }
}
