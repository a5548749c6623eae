//! Hash aggregation.

use std::collections::HashMap;

use strata_common::prelude::*;
use strata_storage::table::{SharedTable, Table};

use crate::operators::flatten_input;
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// One aggregate to compute; `column: None` is `COUNT(*)`.
#[derive(Debug, Clone)]
pub struct AggregateDefinition {
    pub function: AggregateFunction,
    pub column: Option<ColumnId>,
}

/// Groups rows by the group-by tuple and folds each aggregate over the
/// group. Output columns are the group-by columns first, then the
/// aggregates; groups appear in first-encounter order, which keeps the
/// output deterministic.
#[derive(Debug, Clone)]
pub struct Aggregate {
    aggregates: Vec<AggregateDefinition>,
    group_by: Vec<ColumnId>,
    output_names: Vec<String>,
}

impl Aggregate {
    pub fn new(
        aggregates: Vec<AggregateDefinition>,
        group_by: Vec<ColumnId>,
        output_names: Vec<String>,
    ) -> Self {
        debug_assert_eq!(output_names.len(), group_by.len() + aggregates.len());
        Self {
            aggregates,
            group_by,
            output_names,
        }
    }
}

impl PhysicalOperator for Aggregate {
    fn name(&self) -> &'static str {
        "Aggregate"
    }

    fn description(&self) -> String {
        format!("Aggregate {}", self.output_names.join(", "))
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
        let input_definitions = input.read().column_definitions().to_vec();

        context.memory.allocate(flattened.rows.max(1) * 64)?;

        // Group key -> index into `groups`, preserving encounter order.
        let mut group_index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();

        for row in 0..flattened.rows {
            if row % 1024 == 0 {
                context.cancellation.check()?;
            }

            let group_values: Vec<Value> = self
                .group_by
                .iter()
                .map(|&column| flattened.value_at(column, row))
                .collect();
            let mut key = String::new();
            for value in &group_values {
                value.write_key(&mut key);
            }

            let index = *group_index.entry(key).or_insert_with(|| {
                groups.push((
                    group_values.clone(),
                    self.aggregates
                        .iter()
                        .map(|definition| Accumulator::new(definition.function))
                        .collect(),
                ));
                groups.len() - 1
            });

            for (definition, accumulator) in
                self.aggregates.iter().zip(groups[index].1.iter_mut())
            {
                let argument = definition
                    .column
                    .map(|column| flattened.value_at(column, row));
                accumulator.update(argument.as_ref())?;
            }
        }
        context.memory.deallocate(flattened.rows.max(1) * 64);

        // An empty ungrouped input still yields one result row: the count
        // identity for COUNT, NULL otherwise.
        if groups.is_empty() && self.group_by.is_empty() {
            groups.push((
                Vec::new(),
                self.aggregates
                    .iter()
                    .map(|definition| Accumulator::new(definition.function))
                    .collect(),
            ));
        }

        let definitions = self.output_definitions(&input_definitions);
        let mut out = Table::new(definitions, input.read().chunk_size());
        for (group_values, accumulators) in groups {
            let mut row = group_values;
            for accumulator in accumulators {
                row.push(accumulator.finish());
            }
            out.append(row)?;
        }

        Ok(out.into_shared())
    }
}

impl Aggregate {
    fn output_definitions(&self, input: &[ColumnDefinition]) -> Vec<ColumnDefinition> {
        let mut definitions: Vec<ColumnDefinition> = self
            .group_by
            .iter()
            .zip(&self.output_names)
            .map(|(&column, name)| {
                ColumnDefinition::new(name.clone(), input[column.0 as usize].element_type)
            })
            .collect();

        for (definition, name) in self
            .aggregates
            .iter()
            .zip(self.output_names.iter().skip(self.group_by.len()))
        {
            let element_type = match definition.function {
                AggregateFunction::Count => ElementType::Int64,
                AggregateFunction::Avg => ElementType::Double,
                AggregateFunction::Sum => match definition
                    .column
                    .map(|column| input[column.0 as usize].element_type)
                {
                    Some(t) if t.is_floating_point() => ElementType::Double,
                    _ => ElementType::Int64,
                },
                AggregateFunction::Min | AggregateFunction::Max => definition
                    .column
                    .map(|column| input[column.0 as usize].element_type)
                    .unwrap_or(ElementType::Int64),
            };
            definitions.push(ColumnDefinition::new(name.clone(), element_type));
        }
        definitions
    }
}

/// Folding state of one aggregate within one group.
#[derive(Debug)]
enum Accumulator {
    Count(i64),
    /// Integer and float sums are kept apart so integer SUM stays exact.
    Sum { int: i64, float: f64, is_float: bool, seen: bool },
    Min(Option<Value>),
    Max(Option<Value>),
    Avg { sum: f64, count: i64 },
}

impl Accumulator {
    fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
                seen: false,
            },
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
        }
    }

    /// Fold one row in. `argument` is `None` for `COUNT(*)`; NULL inputs are
    /// ignored by every function.
    fn update(&mut self, argument: Option<&Value>) -> Result<()> {
        match self {
            Accumulator::Count(count) => {
                if argument.is_none_or(|value| !value.is_null()) {
                    *count += 1;
                }
            }
            Accumulator::Sum {
                int,
                float,
                is_float,
                seen,
            } => {
                let Some(value) = argument.filter(|value| !value.is_null()) else {
                    return Ok(());
                };
                *seen = true;
                match value {
                    Value::Float(_) | Value::Double(_) => {
                        *is_float = true;
                        *float += value.as_f64().unwrap();
                    }
                    _ => {
                        let operand = value.as_i64().ok_or_else(|| {
                            Error::execution(format!("SUM over non-numeric value {}", value))
                        })?;
                        *int = int
                            .checked_add(operand)
                            .ok_or(Error::Query(QueryError::Overflow))?;
                    }
                }
            }
            Accumulator::Min(minimum) => {
                let Some(value) = argument.filter(|value| !value.is_null()) else {
                    return Ok(());
                };
                if minimum
                    .as_ref()
                    .is_none_or(|m| value.compare(m) == std::cmp::Ordering::Less)
                {
                    *minimum = Some(value.clone());
                }
            }
            Accumulator::Max(maximum) => {
                let Some(value) = argument.filter(|value| !value.is_null()) else {
                    return Ok(());
                };
                if maximum
                    .as_ref()
                    .is_none_or(|m| value.compare(m) == std::cmp::Ordering::Greater)
                {
                    *maximum = Some(value.clone());
                }
            }
            Accumulator::Avg { sum, count } => {
                let Some(value) = argument.filter(|value| !value.is_null()) else {
                    return Ok(());
                };
                let operand = value.as_f64().ok_or_else(|| {
                    Error::execution(format!("AVG over non-numeric value {}", value))
                })?;
                *sum += operand;
                *count += 1;
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(count) => Value::Int64(count),
            Accumulator::Sum {
                int,
                float,
                is_float,
                seen,
            } => {
                if !seen {
                    Value::Null
                } else if is_float {
                    Value::Double(float + int as f64)
                } else {
                    Value::Int64(int)
                }
            }
            Accumulator::Min(minimum) => minimum.unwrap_or(Value::Null),
            Accumulator::Max(maximum) => maximum.unwrap_or(Value::Null),
            Accumulator::Avg { sum, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Double(sum / count as f64)
                }
            }
        }
    }
}
