//! LQP lowering.
//!
//! Translates a logical query plan into an [`OperatorPlan`], resolving
//! every `ColumnOrigin` to an output column id of the node's input. Shared
//! LQP sub-plans map to shared operator nodes, so they execute once.

use std::collections::HashMap;

use strata_common::prelude::*;
use strata_sql::{
    ExpressionKind, LqpExpression, LqpNodeKind, LqpParameterValue, LqpPlan, NodeId,
    OperatorExpression, ParameterValue,
};

use crate::operators::{
    Aggregate, AggregateDefinition, Delete, DummyTable, GetTable, HashJoin, Insert, Limit,
    NestedLoopJoin, Product, Projection, SetUnion, ShowColumns, ShowTables, Sort, TableScan,
    Update, Validate,
};
use crate::{OpIndex, OperatorPlan, PhysicalOperator};

/// Lower `plan` onto physical operators.
pub fn build_operator_plan(plan: &LqpPlan) -> Result<OperatorPlan> {
    let mut builder = PlanBuilder {
        lqp: plan,
        operators: OperatorPlan::new(),
        built: HashMap::new(),
    };
    let root = builder.build(plan.root)?;
    let mut operators = builder.operators;
    operators.root = root;
    Ok(operators)
}

struct PlanBuilder<'a> {
    lqp: &'a LqpPlan,
    operators: OperatorPlan,
    built: HashMap<NodeId, OpIndex>,
}

impl PlanBuilder<'_> {
    fn build(&mut self, node_id: NodeId) -> Result<OpIndex> {
        if let Some(&index) = self.built.get(&node_id) {
            return Ok(index);
        }

        let node = self.lqp.node(node_id);
        let left = node.left.map(|child| self.build(child)).transpose()?;
        let right = node.right.map(|child| self.build(child)).transpose()?;

        let operator: Box<dyn PhysicalOperator> = match &node.kind {
            LqpNodeKind::StoredTable { table_name, .. } => {
                Box::new(GetTable::new(table_name.clone()))
            }
            LqpNodeKind::DummyTable => Box::new(DummyTable::new()),
            LqpNodeKind::Validate => Box::new(Validate::new()),
            LqpNodeKind::Predicate {
                column,
                scan_type,
                value,
                value2,
            } => {
                let input = self.left_input(node_id)?;
                let column_id = self
                    .lqp
                    .get_output_column_id_by_column_origin(input, *column)?;
                let value = self.resolve_parameter(input, value)?;
                Box::new(TableScan::new(column_id, *scan_type, value, value2.clone()))
            }
            LqpNodeKind::Projection { expressions } => {
                let input = self.left_input(node_id)?;
                let operator_expressions = expressions
                    .iter()
                    .map(|expression| self.resolve_expression(input, expression))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(Projection::new(
                    operator_expressions,
                    self.lqp.output_column_names(node_id),
                ))
            }
            LqpNodeKind::Aggregate {
                aggregates,
                group_by,
            } => {
                let input = self.left_input(node_id)?;
                let group_by_columns = group_by
                    .iter()
                    .map(|origin| {
                        self.lqp.get_output_column_id_by_column_origin(input, *origin)
                    })
                    .collect::<Result<Vec<_>>>()?;
                let definitions = aggregates
                    .iter()
                    .map(|aggregate| self.resolve_aggregate(input, aggregate))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(Aggregate::new(
                    definitions,
                    group_by_columns,
                    self.lqp.output_column_names(node_id),
                ))
            }
            LqpNodeKind::Join { mode, predicate } => match (mode, predicate) {
                (JoinMode::Cross, _) => Box::new(Product::new()),
                (JoinMode::Natural, _) => {
                    // The translator decomposes natural joins.
                    return Err(Error::internal("natural join reached the plan builder"));
                }
                (_, None) => {
                    return Err(Error::internal(format!(
                        "{} join without a predicate",
                        mode
                    )))
                }
                (mode, Some(predicate)) => {
                    let left_node = node
                        .left
                        .ok_or_else(|| Error::internal("join without a left input"))?;
                    let right_node = node
                        .right
                        .ok_or_else(|| Error::internal("join without a right input"))?;
                    let left_column = self
                        .lqp
                        .get_output_column_id_by_column_origin(left_node, predicate.left)?;
                    let right_column = self
                        .lqp
                        .get_output_column_id_by_column_origin(right_node, predicate.right)?;

                    if *mode == JoinMode::Inner && predicate.scan_type == ScanType::Equals {
                        Box::new(HashJoin::new(left_column, right_column))
                    } else {
                        Box::new(NestedLoopJoin::new(
                            *mode,
                            left_column,
                            right_column,
                            predicate.scan_type,
                        ))
                    }
                }
            },
            LqpNodeKind::Sort { definitions } => {
                let input = self.left_input(node_id)?;
                let keys = definitions
                    .iter()
                    .map(|definition| {
                        Ok((
                            self.lqp.get_output_column_id_by_column_origin(
                                input,
                                definition.column,
                            )?,
                            definition.mode,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Box::new(Sort::new(keys))
            }
            LqpNodeKind::Limit { num_rows } => Box::new(Limit::new(*num_rows)),
            LqpNodeKind::Union {
                mode: UnionMode::Positions,
            } => Box::new(SetUnion::new()),
            LqpNodeKind::Insert { table_name } => Box::new(Insert::new(table_name.clone())),
            LqpNodeKind::Update {
                table_name,
                expressions,
            } => {
                let input = self.left_input(node_id)?;
                let operator_expressions = expressions
                    .iter()
                    .map(|expression| self.resolve_expression(input, expression))
                    .collect::<Result<Vec<_>>>()?;
                Box::new(Update::new(table_name.clone(), operator_expressions))
            }
            LqpNodeKind::Delete { table_name } => Box::new(Delete::new(table_name.clone())),
            LqpNodeKind::ShowTables => Box::new(ShowTables::new()),
            LqpNodeKind::ShowColumns { table_name } => {
                Box::new(ShowColumns::new(table_name.clone()))
            }
        };

        let index = self.operators.add(operator, left, right);
        self.built.insert(node_id, index);
        Ok(index)
    }

    fn left_input(&self, node_id: NodeId) -> Result<NodeId> {
        self.lqp
            .node(node_id)
            .left
            .ok_or_else(|| Error::internal("plan node is missing its input"))
    }

    /// Rewrite an LQP expression over origins into an operator expression
    /// over the input's output column ids.
    fn resolve_expression(
        &self,
        input: NodeId,
        expression: &LqpExpression,
    ) -> Result<OperatorExpression> {
        expression.map_references(&mut |origin| {
            self.lqp.get_output_column_id_by_column_origin(input, *origin)
        })
    }

    fn resolve_parameter(
        &self,
        input: NodeId,
        value: &LqpParameterValue,
    ) -> Result<ParameterValue<ColumnId>> {
        Ok(match value {
            LqpParameterValue::Value(v) => ParameterValue::Value(v.clone()),
            LqpParameterValue::Column(origin) => ParameterValue::Column(
                self.lqp.get_output_column_id_by_column_origin(input, *origin)?,
            ),
            LqpParameterValue::Placeholder(index) => ParameterValue::Placeholder(*index),
        })
    }

    /// Aggregates fold over a bare column or `*`; anything else would need
    /// a projection underneath, which the translator does not emit.
    fn resolve_aggregate(
        &self,
        input: NodeId,
        aggregate: &LqpExpression,
    ) -> Result<AggregateDefinition> {
        let function = aggregate
            .aggregate_function()
            .ok_or_else(|| Error::internal("aggregate list holds a non-aggregate"))?;

        let column = match aggregate.arguments() {
            [] => None,
            [argument] => match argument.kind() {
                ExpressionKind::Star(_) => None,
                ExpressionKind::Column(origin) => Some(
                    self.lqp
                        .get_output_column_id_by_column_origin(input, *origin)?,
                ),
                _ => {
                    return Err(Error::unsupported(
                        "aggregates over computed expressions",
                    ))
                }
            },
            _ => {
                return Err(Error::unsupported(
                    "aggregates with more than one argument",
                ))
            }
        };

        Ok(AggregateDefinition { function, column })
    }
}
