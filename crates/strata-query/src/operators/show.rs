//! Introspection operators.

use strata_common::prelude::*;
use strata_storage::table::{SharedTable, Table};

use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Lists the registered table names.
#[derive(Debug, Clone, Default)]
pub struct ShowTables;

impl ShowTables {
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalOperator for ShowTables {
    fn name(&self) -> &'static str {
        "ShowTables"
    }

    fn num_in_tables(&self) -> u8 {
        0
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, _inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let mut out = Table::new(
            vec![ColumnDefinition::new("table_name", ElementType::String)],
            0,
        );
        for name in context.storage.table_names() {
            out.append(vec![Value::String(name)])?;
        }
        Ok(out.into_shared())
    }
}

/// Lists name, type, and nullability of a table's columns.
#[derive(Debug, Clone)]
pub struct ShowColumns {
    table_name: String,
}

impl ShowColumns {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

impl PhysicalOperator for ShowColumns {
    fn name(&self) -> &'static str {
        "ShowColumns"
    }

    fn description(&self) -> String {
        format!("ShowColumns of '{}'", self.table_name)
    }

    fn num_in_tables(&self) -> u8 {
        0
    }

    fn recreate(&self, _parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        Box::new(self.clone())
    }

    fn execute(&self, _inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let table = context.storage.get_table(&self.table_name)?;
        let mut out = Table::new(
            vec![
                ColumnDefinition::new("column_name", ElementType::String),
                ColumnDefinition::new("column_type", ElementType::String),
                ColumnDefinition::new("is_nullable", ElementType::String),
            ],
            0,
        );
        for definition in table.read().column_definitions() {
            out.append(vec![
                Value::String(definition.name.clone()),
                Value::String(definition.element_type.to_string()),
                Value::String(if definition.nullable { "Yes" } else { "No" }.to_string()),
            ])?;
        }
        Ok(out.into_shared())
    }
}
