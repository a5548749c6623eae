//! Table statistics.
//!
//! Per-table summaries consumed by the optimizer layer for cost estimation.
//! The engine only produces these and hands them out through plan leaves;
//! it never reaches inside.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strata_common::prelude::*;

use crate::table::Table;

/// Per-column summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub column_name: String,
    pub distinct_count: u64,
    pub null_count: u64,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

/// Cardinality and per-column summaries of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStatistics {
    pub row_count: u64,
    pub column_statistics: Vec<ColumnStatistics>,
}

/// Compute statistics with a full pass over the table.
pub fn generate_table_statistics(table: &Table) -> TableStatistics {
    let mut column_statistics = Vec::with_capacity(table.column_count());

    for column_index in 0..table.column_count() {
        let column_id = ColumnId(column_index as u32);
        let mut distinct: HashSet<String> = HashSet::new();
        let mut null_count = 0u64;
        let mut min: Option<Value> = None;
        let mut max: Option<Value> = None;

        for chunk in table.chunks() {
            let column = chunk.column(column_id);
            for row in 0..column.len() {
                let value = column.value_at(row);
                if value.is_null() {
                    null_count += 1;
                    continue;
                }
                // Distinct values are counted through their rendered form;
                // exact within one element type.
                distinct.insert(value.to_string());
                if min
                    .as_ref()
                    .is_none_or(|m| value.compare(m) == std::cmp::Ordering::Less)
                {
                    min = Some(value.clone());
                }
                if max
                    .as_ref()
                    .is_none_or(|m| value.compare(m) == std::cmp::Ordering::Greater)
                {
                    max = Some(value);
                }
            }
        }

        column_statistics.push(ColumnStatistics {
            column_name: table.column_name(column_id).to_string(),
            distinct_count: distinct.len() as u64,
            null_count,
            min,
            max,
        });
    }

    TableStatistics {
        row_count: table.row_count() as u64,
        column_statistics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_statistics() {
        let mut table = Table::new(
            vec![
                ColumnDefinition::new("a", ElementType::Int32),
                ColumnDefinition::new("b", ElementType::String),
            ],
            2,
        );
        for (a, b) in [(3, "x"), (1, "y"), (3, "z")] {
            table
                .append(vec![Value::Int32(a), Value::String(b.into())])
                .unwrap();
        }
        table.append(vec![Value::Null, Value::String("x".into())]).unwrap();

        let stats = generate_table_statistics(&table);
        assert_eq!(stats.row_count, 4);

        let a = &stats.column_statistics[0];
        assert_eq!(a.distinct_count, 2);
        assert_eq!(a.null_count, 1);
        assert_eq!(a.min, Some(Value::Int32(1)));
        assert_eq!(a.max, Some(Value::Int32(3)));

        let b = &stats.column_statistics[1];
        assert_eq!(b.distinct_count, 3);
        assert_eq!(b.null_count, 0);
    }
}
