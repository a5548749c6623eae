//! Projections.

use strata_common::prelude::*;
use strata_sql::{Expression, ExpressionKind, OperatorExpression};
use strata_storage::chunk::Chunk;
use strata_storage::table::{SharedTable, Table};

use crate::evaluator::evaluate;
use crate::operators::flatten_input;
use crate::{ExecutionContext, OperatorParameterValue, PhysicalOperator};

/// Evaluates one expression per output column, row by row.
///
/// A projection that only forwards columns of a References input re-emits
/// reference columns sharing the input's position lists; everything else is
/// materialized into a Data table. Expressions without column references are
/// folded once and reused for every row.
#[derive(Debug, Clone)]
pub struct Projection {
    expressions: Vec<OperatorExpression>,
    output_names: Vec<String>,
}

impl Projection {
    pub fn new(expressions: Vec<OperatorExpression>, output_names: Vec<String>) -> Self {
        debug_assert_eq!(expressions.len(), output_names.len());
        Self {
            expressions,
            output_names,
        }
    }
}

impl PhysicalOperator for Projection {
    fn name(&self) -> &'static str {
        "Projection"
    }

    fn description(&self) -> String {
        format!("Projection {}", self.output_names.join(", "))
    }

    fn num_in_tables(&self) -> u8 {
        1
    }

    fn recreate(&self, parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator> {
        let expressions = self
            .expressions
            .iter()
            .map(|expression| substitute_placeholders(expression, parameters))
            .collect();
        Box::new(Self {
            expressions,
            output_names: self.output_names.clone(),
        })
    }

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable> {
        let input = &inputs[0];
        let table = input.read();

        // A zero-column input (the dummy leaf) carries one conceptual row;
        // this is how INSERT ... VALUES produces its values.
        if table.column_count() == 0 {
            let row: Vec<Value> = Vec::new();
            let values: Vec<Value> = self
                .expressions
                .iter()
                .map(|expression| evaluate(expression, &row))
                .collect::<Result<_>>()?;

            let definitions = self
                .output_names
                .iter()
                .zip(&values)
                .map(|(name, value)| {
                    ColumnDefinition::new(
                        name.clone(),
                        value.element_type().unwrap_or(ElementType::Int32),
                    )
                })
                .collect();
            let mut out = Table::new(definitions, 0);
            out.append(values)?;
            return Ok(out.into_shared());
        }

        let pass_through_columns: Option<Vec<ColumnId>> = self
            .expressions
            .iter()
            .map(|expression| expression.column_reference().copied())
            .collect();

        // Pass-through over a References input: share the position lists.
        if let (Some(columns), TableType::References) =
            (&pass_through_columns, table.table_type())
        {
            let definitions = self.output_definitions(table.column_definitions());
            let mut out = Table::new_references(definitions, table.chunk_size());
            for chunk in table.chunks() {
                let mut out_chunk = Chunk::new();
                for &column_id in columns {
                    out_chunk.add_column(chunk.column(column_id).clone());
                }
                out.emplace_chunk(out_chunk);
            }
            return Ok(out.into_shared());
        }

        drop(table);
        let flattened = flatten_input(input)?;
        let input_definitions: Vec<ColumnDefinition> =
            input.read().column_definitions().to_vec();

        // Fold expressions free of column references once.
        let folded: Vec<Option<Value>> = self
            .expressions
            .iter()
            .map(|expression| {
                if has_column_references(expression) {
                    Ok(None)
                } else {
                    evaluate(expression, &[]).map(Some)
                }
            })
            .collect::<Result<_>>()?;

        let definitions = self.output_definitions(&input_definitions);
        let mut out = Table::new(definitions, input.read().chunk_size());

        for row in 0..flattened.rows {
            if row % 1024 == 0 {
                context.cancellation.check()?;
            }
            let input_row = flattened.row_values(row);
            let values = self
                .expressions
                .iter()
                .zip(&folded)
                .map(|(expression, folded_value)| match folded_value {
                    Some(value) => Ok(value.clone()),
                    None => evaluate(expression, &input_row),
                })
                .collect::<Result<Vec<_>>>()?;
            out.append(values)?;
        }

        Ok(out.into_shared())
    }
}

impl Projection {
    fn output_definitions(&self, input: &[ColumnDefinition]) -> Vec<ColumnDefinition> {
        self.expressions
            .iter()
            .zip(&self.output_names)
            .map(|(expression, name)| {
                ColumnDefinition::new(name.clone(), infer_type(expression, input))
            })
            .collect()
    }
}

fn has_column_references(expression: &OperatorExpression) -> bool {
    if expression.column_reference().is_some() {
        return true;
    }
    expression
        .left_child()
        .is_some_and(has_column_references)
        || expression
            .right_child()
            .is_some_and(has_column_references)
        || expression.arguments().iter().any(has_column_references)
}

/// Output element type of an expression over `input` columns.
fn infer_type(expression: &OperatorExpression, input: &[ColumnDefinition]) -> ElementType {
    match expression.kind() {
        ExpressionKind::Column(column_id) => input
            .get(column_id.0 as usize)
            .map(|def| def.element_type)
            .unwrap_or(ElementType::Int32),
        ExpressionKind::Literal(value) => value.element_type().unwrap_or(ElementType::Int32),
        _ if expression.is_arithmetic_operator() => {
            let left = expression
                .left_child()
                .map(|child| infer_type(child, input))
                .unwrap_or(ElementType::Int64);
            let right = expression
                .right_child()
                .map(|child| infer_type(child, input))
                .unwrap_or(ElementType::Int64);
            if left.is_floating_point() || right.is_floating_point() {
                ElementType::Double
            } else {
                ElementType::Int64
            }
        }
        _ => ElementType::Int32,
    }
}

/// Bind positional placeholders to the given parameters, rebuilding the
/// affected subtrees.
fn substitute_placeholders(
    expression: &OperatorExpression,
    parameters: &[OperatorParameterValue],
) -> OperatorExpression {
    match expression.kind() {
        ExpressionKind::Placeholder(index) => match parameters.get(*index as usize) {
            Some(OperatorParameterValue::Value(value)) => Expression::literal(value.clone()),
            Some(OperatorParameterValue::Column(column_id)) => Expression::column(*column_id),
            _ => expression.clone(),
        },
        ExpressionKind::Function(function) => {
            let arguments = expression
                .arguments()
                .iter()
                .map(|argument| substitute_placeholders(argument, parameters))
                .collect();
            Expression::aggregate(
                *function,
                arguments,
                expression.alias().map(str::to_string),
            )
        }
        _ => match (expression.left_child(), expression.right_child()) {
            (Some(left), Some(right)) => {
                let mut rebuilt = Expression::binary_operator(
                    expression.kind().clone(),
                    substitute_placeholders(left, parameters),
                    substitute_placeholders(right, parameters),
                );
                if let Some(alias) = expression.alias() {
                    rebuilt.set_alias(alias);
                }
                rebuilt
            }
            (Some(left), None) => {
                let mut rebuilt = Expression::unary_operator(
                    expression.kind().clone(),
                    substitute_placeholders(left, parameters),
                );
                if let Some(alias) = expression.alias() {
                    rebuilt.set_alias(alias);
                }
                rebuilt
            }
            _ => expression.clone(),
        },
    }
}
