//! SQL to LQP translation.
//!
//! Maps the `sqlparser` AST onto the logical query plan. Schema and
//! translation errors are raised here, synchronously, before any operator
//! runs. The only state is the `validate` flag, which wraps stored-table
//! reads in a Validate node.

use std::sync::Arc;

use sqlparser::ast::{self as sql_ast};
use strata_common::prelude::*;
use strata_storage::statistics::generate_table_statistics;
use strata_storage::storage_manager::StorageManager;

use crate::expression::{Expression, ExpressionKind, LqpExpression};
use crate::lqp::{
    ColumnOrigin, JoinPredicate, LqpNodeKind, LqpParameterValue, LqpPlan, NodeId, SortDefinition,
};

/// Translate sqlparser comparison operators to scan types.
fn scan_type_for_operator(op: &sql_ast::BinaryOperator) -> Option<ScanType> {
    match op {
        sql_ast::BinaryOperator::Eq => Some(ScanType::Equals),
        sql_ast::BinaryOperator::NotEq => Some(ScanType::NotEquals),
        sql_ast::BinaryOperator::Lt => Some(ScanType::LessThan),
        sql_ast::BinaryOperator::LtEq => Some(ScanType::LessThanEquals),
        sql_ast::BinaryOperator::Gt => Some(ScanType::GreaterThan),
        sql_ast::BinaryOperator::GtEq => Some(ScanType::GreaterThanEquals),
        _ => None,
    }
}

/// Aggregate function by (case-insensitive) SQL name.
fn aggregate_function_by_name(name: &str) -> Option<AggregateFunction> {
    match name.to_uppercase().as_str() {
        "MIN" => Some(AggregateFunction::Min),
        "MAX" => Some(AggregateFunction::Max),
        "SUM" => Some(AggregateFunction::Sum),
        "AVG" => Some(AggregateFunction::Avg),
        "COUNT" => Some(AggregateFunction::Count),
        _ => None,
    }
}

/// `(column_name, table_prefix)` of a plain column reference.
fn named_column_reference(expr: &sql_ast::Expr) -> Option<(String, Option<String>)> {
    match expr {
        sql_ast::Expr::Identifier(ident) => Some((ident.value.clone(), None)),
        sql_ast::Expr::CompoundIdentifier(idents) => {
            let name = idents.last()?.value.clone();
            let prefix = (idents.len() > 1).then(|| idents[idents.len() - 2].value.clone());
            Some((name, prefix))
        }
        sql_ast::Expr::Nested(inner) => named_column_reference(inner),
        _ => None,
    }
}

fn literal_value(expr: &sql_ast::Expr) -> Result<Value> {
    match expr {
        sql_ast::Expr::Value(value) => match value {
            sql_ast::Value::Number(text, _) => {
                if let Ok(int) = text.parse::<i64>() {
                    Ok(Value::Int64(int))
                } else {
                    text.parse::<f64>()
                        .map(Value::Double)
                        .map_err(|_| Error::Sql(SqlError::ParseError(text.clone())))
                }
            }
            sql_ast::Value::SingleQuotedString(text)
            | sql_ast::Value::DoubleQuotedString(text) => Ok(Value::String(text.clone())),
            sql_ast::Value::Null => Ok(Value::Null),
            other => Err(Error::unsupported(format!("literal {:?}", other))),
        },
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match literal_value(expr)? {
            Value::Int64(v) => Ok(Value::Int64(-v)),
            Value::Double(v) => Ok(Value::Double(-v)),
            other => Err(Error::unsupported(format!("negation of {}", other))),
        },
        sql_ast::Expr::Nested(inner) => literal_value(inner),
        other => Err(Error::Sql(SqlError::InvalidExpression(format!(
            "expected a literal, got {:?}",
            other
        )))),
    }
}

fn placeholder_index(text: &str) -> u16 {
    text.chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Translates parsed SQL statements into logical query plans.
pub struct SqlTranslator {
    storage: Arc<StorageManager>,
    validate: bool,
}

impl SqlTranslator {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self {
            storage,
            validate: true,
        }
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// One plan per statement.
    pub fn translate_parse_result(
        &self,
        statements: &[sql_ast::Statement],
    ) -> Result<Vec<LqpPlan>> {
        statements
            .iter()
            .map(|statement| self.translate_statement(statement))
            .collect()
    }

    pub fn translate_statement(&self, statement: &sql_ast::Statement) -> Result<LqpPlan> {
        let mut plan = LqpPlan::new();
        let root = match statement {
            sql_ast::Statement::Query(query) => self.translate_query(query, &mut plan)?,
            sql_ast::Statement::Insert {
                table_name,
                columns,
                source,
                ..
            } => self.translate_insert(table_name, columns, source.as_deref(), &mut plan)?,
            sql_ast::Statement::Update {
                table,
                assignments,
                selection,
                from,
                ..
            } => {
                if from.is_some() {
                    return Err(Error::unsupported("UPDATE ... FROM"));
                }
                self.translate_update(table, assignments, selection.as_ref(), &mut plan)?
            }
            sql_ast::Statement::Delete {
                tables,
                from,
                using,
                selection,
                ..
            } => {
                if !tables.is_empty() || using.is_some() {
                    return Err(Error::unsupported("multi-table DELETE"));
                }
                self.translate_delete(from, selection.as_ref(), &mut plan)?
            }
            sql_ast::Statement::ShowTables { .. } => plan.add_node(LqpNodeKind::ShowTables),
            sql_ast::Statement::ShowColumns { table_name, .. } => {
                plan.add_node(LqpNodeKind::ShowColumns {
                    table_name: object_name(table_name),
                })
            }
            other => {
                return Err(Error::unsupported(format!(
                    "SQL statement {}",
                    statement_kind(other)
                )))
            }
        };
        plan.root = root;
        Ok(plan)
    }

    // ------------------------------------------------------------------
    // SELECT
    // ------------------------------------------------------------------

    fn translate_query(&self, query: &sql_ast::Query, plan: &mut LqpPlan) -> Result<NodeId> {
        if query.with.is_some() {
            return Err(Error::unsupported("WITH (common table expressions)"));
        }

        let mut node = match query.body.as_ref() {
            sql_ast::SetExpr::Select(select) => self.translate_select(select, plan)?,
            sql_ast::SetExpr::Query(inner) => self.translate_query(inner, plan)?,
            sql_ast::SetExpr::SetOperation { .. } => {
                return Err(Error::unsupported(
                    "set operations (UNION/INTERSECT/EXCEPT)",
                ))
            }
            other => return Err(Error::unsupported(format!("query body {:?}", other))),
        };

        if !query.order_by.is_empty() {
            node = self.translate_order_by(&query.order_by, node, plan)?;
        }
        if let Some(limit) = &query.limit {
            node = self.translate_limit(limit, node, plan)?;
        }
        Ok(node)
    }

    fn translate_select(&self, select: &sql_ast::Select, plan: &mut LqpPlan) -> Result<NodeId> {
        if select.from.is_empty() {
            return Err(Error::unsupported("SELECT without a FROM clause"));
        }
        if select.distinct.is_some() {
            // Accepted and ignored, as the scan pipeline has no dedup step.
            debug!("ignoring DISTINCT");
        }

        let mut node = self.translate_cross_product(&select.from, plan)?;

        if let Some(selection) = &select.selection {
            node = self.translate_where(selection, node, plan)?;
        }

        let group_by_exprs: &[sql_ast::Expr] = match &select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs) => exprs,
            sql_ast::GroupByExpr::All => {
                return Err(Error::unsupported("GROUP BY ALL"));
            }
        };

        // Aggregation is in play iff there is a GROUP BY clause or any
        // aggregate function in the select list.
        let is_aggregate = !group_by_exprs.is_empty()
            || select.projection.iter().any(|item| {
                matches!(
                    item,
                    sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Function(_))
                        | sql_ast::SelectItem::ExprWithAlias {
                            expr: sql_ast::Expr::Function(_),
                            ..
                        }
                )
            });

        if is_aggregate {
            self.translate_aggregate(select, group_by_exprs, node, plan)
        } else {
            self.translate_projection(&select.projection, node, plan)
        }
    }

    fn translate_cross_product(
        &self,
        tables: &[sql_ast::TableWithJoins],
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let mut product = self.translate_table_with_joins(&tables[0], plan)?;

        for table in &tables[1..] {
            let next = self.translate_table_with_joins(table, plan)?;
            let cross = plan.add_node(LqpNodeKind::Join {
                mode: JoinMode::Cross,
                predicate: None,
            });
            plan.set_left_child(cross, product);
            plan.set_right_child(cross, next);
            product = cross;
        }
        Ok(product)
    }

    fn translate_table_with_joins(
        &self,
        table: &sql_ast::TableWithJoins,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let mut node = self.translate_table_factor(&table.relation, plan)?;
        for join in &table.joins {
            node = self.translate_join(node, join, plan)?;
        }
        Ok(node)
    }

    fn translate_table_factor(
        &self,
        factor: &sql_ast::TableFactor,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        match factor {
            sql_ast::TableFactor::Table { name, alias, .. } => {
                let table_name = object_name(name);
                let node = self.stored_table_node(&table_name, plan)?;
                let node = self.validate_if_active(node, plan);
                plan.set_alias(node, alias.as_ref().map(|a| a.name.value.clone()));
                Ok(node)
            }
            sql_ast::TableFactor::Derived {
                subquery, alias, ..
            } => {
                let node = self.translate_query(subquery, plan)?;
                let alias = alias
                    .as_ref()
                    .ok_or_else(|| {
                        Error::unsupported("derived tables without an alias")
                    })?
                    .name
                    .value
                    .clone();
                plan.set_alias(node, Some(alias));
                Ok(node)
            }
            sql_ast::TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.translate_table_with_joins(table_with_joins, plan),
            other => Err(Error::unsupported(format!("table factor {:?}", other))),
        }
    }

    fn stored_table_node(&self, table_name: &str, plan: &mut LqpPlan) -> Result<NodeId> {
        let table = self.storage.get_table(table_name)?;
        let table = table.read();
        let node = plan.add_node(LqpNodeKind::StoredTable {
            table_name: table_name.to_string(),
            column_names: table.column_names(),
            column_types: table
                .column_definitions()
                .iter()
                .map(|def| def.element_type)
                .collect(),
        });
        plan.set_statistics(node, Arc::new(generate_table_statistics(&table)));
        Ok(node)
    }

    fn validate_if_active(&self, node: NodeId, plan: &mut LqpPlan) -> NodeId {
        if !self.validate {
            return node;
        }
        let validate = plan.add_node(LqpNodeKind::Validate);
        plan.set_left_child(validate, node);
        validate
    }

    // ------------------------------------------------------------------
    // Joins
    // ------------------------------------------------------------------

    fn translate_join(
        &self,
        left_node: NodeId,
        join: &sql_ast::Join,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let (mode, constraint) = match &join.join_operator {
            sql_ast::JoinOperator::Inner(constraint) => (JoinMode::Inner, Some(constraint)),
            sql_ast::JoinOperator::LeftOuter(constraint) => (JoinMode::Left, Some(constraint)),
            sql_ast::JoinOperator::RightOuter(constraint) => (JoinMode::Right, Some(constraint)),
            sql_ast::JoinOperator::FullOuter(constraint) => (JoinMode::Outer, Some(constraint)),
            sql_ast::JoinOperator::CrossJoin => (JoinMode::Cross, None),
            other => return Err(Error::unsupported(format!("join operator {:?}", other))),
        };

        match constraint {
            None => {
                let right_node = self.translate_table_factor(&join.relation, plan)?;
                let cross = plan.add_node(LqpNodeKind::Join {
                    mode: JoinMode::Cross,
                    predicate: None,
                });
                plan.set_left_child(cross, left_node);
                plan.set_right_child(cross, right_node);
                Ok(cross)
            }
            Some(sql_ast::JoinConstraint::Natural) => {
                if mode != JoinMode::Inner {
                    return Err(Error::unsupported("NATURAL outer joins"));
                }
                let right_node = self.translate_table_factor(&join.relation, plan)?;
                self.translate_natural_join(left_node, right_node, None, plan)
            }
            Some(sql_ast::JoinConstraint::Using(columns)) => {
                let right_node = self.translate_table_factor(&join.relation, plan)?;
                let names: Vec<String> =
                    columns.iter().map(|ident| ident.value.clone()).collect();
                self.translate_natural_join(left_node, right_node, Some(names), plan)
            }
            Some(sql_ast::JoinConstraint::On(condition)) => {
                let right_node = self.translate_table_factor(&join.relation, plan)?;
                self.translate_join_condition(mode, left_node, right_node, condition, plan)
            }
            Some(sql_ast::JoinConstraint::None) => {
                Err(Error::unsupported("joins without a condition"))
            }
        }
    }

    /// The join condition must be a simple comparison of two column
    /// references, one per input (checked by XOR).
    fn translate_join_condition(
        &self,
        mode: JoinMode,
        left_node: NodeId,
        right_node: NodeId,
        condition: &sql_ast::Expr,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let sql_ast::Expr::BinaryOp { left, op, right } = condition else {
            return Err(Error::unsupported(
                "join conditions other than simple comparisons",
            ));
        };
        let scan_type = scan_type_for_operator(op).ok_or_else(|| {
            Error::unsupported("join conditions other than simple comparisons")
        })?;

        let (left_name, left_prefix) = named_column_reference(left).ok_or_else(|| {
            Error::Sql(SqlError::InvalidExpression(
                "left side of a join condition must be a column reference".into(),
            ))
        })?;
        let (right_name, right_prefix) = named_column_reference(right).ok_or_else(|| {
            Error::Sql(SqlError::InvalidExpression(
                "right side of a join condition must be a column reference".into(),
            ))
        })?;

        let left_in_left = plan.find_column_origin_by_named_column_reference(
            left_node,
            &left_name,
            left_prefix.as_deref(),
        )?;
        let left_in_right = plan.find_column_origin_by_named_column_reference(
            right_node,
            &left_name,
            left_prefix.as_deref(),
        )?;
        let right_in_left = plan.find_column_origin_by_named_column_reference(
            left_node,
            &right_name,
            right_prefix.as_deref(),
        )?;
        let right_in_right = plan.find_column_origin_by_named_column_reference(
            right_node,
            &right_name,
            right_prefix.as_deref(),
        )?;

        if left_in_left.is_some() == left_in_right.is_some() {
            return Err(Error::Sql(SqlError::InvalidExpression(format!(
                "join operand {} must be in exactly one of the input nodes",
                left_name
            ))));
        }
        if right_in_left.is_some() == right_in_right.is_some() {
            return Err(Error::Sql(SqlError::InvalidExpression(format!(
                "join operand {} must be in exactly one of the input nodes",
                right_name
            ))));
        }

        let (left_origin, right_origin) = match left_in_left {
            Some(origin) => (origin, right_in_right.unwrap()),
            None => (left_in_right.unwrap(), right_in_left.unwrap()),
        };

        let join = plan.add_node(LqpNodeKind::Join {
            mode,
            predicate: Some(JoinPredicate {
                left: left_origin,
                right: right_origin,
                scan_type,
            }),
        });
        plan.set_left_child(join, left_node);
        plan.set_right_child(join, right_node);
        Ok(join)
    }

    /// NATURAL JOIN (and USING) decompose into a cross join, one equality
    /// predicate per shared column name, and a projection that drops the
    /// duplicated join columns.
    fn translate_natural_join(
        &self,
        left_node: NodeId,
        right_node: NodeId,
        using_columns: Option<Vec<String>>,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let join_column_names = match using_columns {
            Some(names) => names,
            None => {
                let mut left_names = plan.output_column_names(left_node);
                let mut right_names = plan.output_column_names(right_node);
                left_names.sort();
                right_names.sort();
                left_names
                    .into_iter()
                    .filter(|name| right_names.binary_search(name).is_ok())
                    .collect()
            }
        };
        if join_column_names.is_empty() {
            return Err(Error::Sql(SqlError::InvalidExpression(
                "no matching columns for natural join found".into(),
            )));
        }

        let mut node = plan.add_node(LqpNodeKind::Join {
            mode: JoinMode::Cross,
            predicate: None,
        });
        plan.set_left_child(node, left_node);
        plan.set_right_child(node, right_node);

        for join_column_name in &join_column_names {
            let left_origin =
                plan.get_column_origin_by_named_column_reference(left_node, join_column_name, None)?;
            let right_origin = plan.get_column_origin_by_named_column_reference(
                right_node,
                join_column_name,
                None,
            )?;
            let predicate = plan.add_node(LqpNodeKind::Predicate {
                column: left_origin,
                scan_type: ScanType::Equals,
                value: LqpParameterValue::Column(right_origin),
                value2: None,
            });
            plan.set_left_child(predicate, node);
            node = predicate;
        }

        // Keep the first occurrence of each origin so the duplicated join
        // columns appear once.
        let mut kept: Vec<ColumnOrigin> = Vec::new();
        let mut expressions = Vec::new();
        let names = plan.output_column_names(node);
        let origins = plan.output_column_origins(node);
        for (index, origin) in origins.iter().enumerate() {
            if join_column_names.contains(&names[index]) {
                let first_with_name = names.iter().position(|n| *n == names[index]).unwrap();
                if first_with_name != index {
                    continue;
                }
            }
            kept.push(*origin);
            expressions.push(Expression::column(*origin));
        }
        debug_assert_eq!(kept.len(), expressions.len());

        let projection = plan.add_node(LqpNodeKind::Projection { expressions });
        plan.set_left_child(projection, node);
        Ok(projection)
    }

    // ------------------------------------------------------------------
    // WHERE / HAVING
    // ------------------------------------------------------------------

    /// `OR` becomes a position-union of both sides applied to the same
    /// input; `AND` chains predicates; leaves become predicate nodes.
    fn translate_where(
        &self,
        expr: &sql_ast::Expr,
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        match expr {
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::Or,
                right,
            } => {
                let union = plan.add_node(LqpNodeKind::Union {
                    mode: UnionMode::Positions,
                });
                let left_node = self.translate_where(left, input, plan)?;
                let right_node = self.translate_where(right, input, plan)?;
                plan.set_left_child(union, left_node);
                plan.set_right_child(union, right_node);
                Ok(union)
            }
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::And,
                right,
            } => {
                let filtered = self.translate_where(left, input, plan)?;
                self.translate_where(right, filtered, plan)
            }
            sql_ast::Expr::Nested(inner) => self.translate_where(inner, input, plan),
            _ => self.translate_predicate(
                expr,
                false,
                &|plan: &LqpPlan, e: &sql_ast::Expr| {
                    let (name, prefix) = named_column_reference(e).ok_or_else(|| {
                        Error::Sql(SqlError::InvalidExpression(format!(
                            "expected a column reference, got {:?}",
                            e
                        )))
                    })?;
                    plan.get_column_origin_by_named_column_reference(
                        input,
                        &name,
                        prefix.as_deref(),
                    )
                },
                input,
                plan,
            ),
        }
    }

    fn translate_having(
        &self,
        expr: &sql_ast::Expr,
        aggregate_node: NodeId,
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        match expr {
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::Or,
                right,
            } => {
                let union = plan.add_node(LqpNodeKind::Union {
                    mode: UnionMode::Positions,
                });
                let left_node = self.translate_having(left, aggregate_node, input, plan)?;
                let right_node = self.translate_having(right, aggregate_node, input, plan)?;
                plan.set_left_child(union, left_node);
                plan.set_right_child(union, right_node);
                Ok(union)
            }
            sql_ast::Expr::BinaryOp {
                left,
                op: sql_ast::BinaryOperator::And,
                right,
            } => {
                let filtered = self.translate_having(left, aggregate_node, input, plan)?;
                self.translate_having(right, aggregate_node, filtered, plan)
            }
            sql_ast::Expr::Nested(inner) => {
                self.translate_having(inner, aggregate_node, input, plan)
            }
            _ => {
                let aggregate_input = plan
                    .node(aggregate_node)
                    .left
                    .ok_or_else(|| Error::internal("aggregate node has no input"))?;
                self.translate_predicate(
                    expr,
                    true,
                    &|plan: &LqpPlan, e: &sql_ast::Expr| {
                        let expression =
                            self.translate_lqp_expression(e, aggregate_input, plan)?;
                        plan.get_column_origin_for_expression(aggregate_node, &expression)
                    },
                    input,
                    plan,
                )
            }
        }
    }

    /// Build a predicate node from a leaf comparison. `resolve_column` makes
    /// this usable for both WHERE (named columns) and HAVING (aggregate
    /// expressions).
    fn translate_predicate(
        &self,
        expr: &sql_ast::Expr,
        allow_function_refs: bool,
        resolve_column: &dyn Fn(&LqpPlan, &sql_ast::Expr) -> Result<ColumnOrigin>,
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let refers_to_column = |e: &sql_ast::Expr| {
            named_column_reference(e).is_some()
                || (allow_function_refs && matches!(e, sql_ast::Expr::Function(_)))
        };

        let (column_expr, scan_type, value_expr, value2) = match expr {
            sql_ast::Expr::Between {
                expr: column,
                negated,
                low,
                high,
            } => {
                if *negated {
                    return Err(Error::unsupported("NOT BETWEEN"));
                }
                if !refers_to_column(column) {
                    return Err(Error::Sql(SqlError::InvalidExpression(
                        "BETWEEN needs a column on its left side".into(),
                    )));
                }
                // The upper bound must be a plain typed value.
                let value2 = literal_value(high)?;
                (column.as_ref(), ScanType::Between, low.as_ref(), Some(value2))
            }
            sql_ast::Expr::Like {
                negated,
                expr: column,
                pattern,
                ..
            } => {
                let scan_type = if *negated {
                    ScanType::NotLike
                } else {
                    ScanType::Like
                };
                (column.as_ref(), scan_type, pattern.as_ref(), None)
            }
            sql_ast::Expr::BinaryOp { left, op, right } => {
                let mut scan_type = scan_type_for_operator(op).ok_or_else(|| {
                    Error::unsupported(format!("predicate operator {:?}", op))
                })?;

                // Exactly one side refers to a column; if it is the right
                // side, swap the operands and remap the comparison.
                let mut operands_switched = false;
                if !refers_to_column(left) {
                    if !refers_to_column(right) {
                        return Err(Error::Sql(SqlError::InvalidExpression(
                            "one side of the expression has to refer to a column".into(),
                        )));
                    }
                    operands_switched = true;
                    scan_type = reverse_scan_type(scan_type);
                }

                let (column_expr, value_expr) = if operands_switched {
                    (right.as_ref(), left.as_ref())
                } else {
                    (left.as_ref(), right.as_ref())
                };
                (column_expr, scan_type, value_expr, None)
            }
            other => {
                return Err(Error::unsupported(format!(
                    "predicate expression {:?}",
                    other
                )))
            }
        };

        let value = if refers_to_column(value_expr) {
            LqpParameterValue::Column(resolve_column(plan, value_expr)?)
        } else {
            match value_expr {
                sql_ast::Expr::Value(sql_ast::Value::Placeholder(text)) => {
                    LqpParameterValue::Placeholder(placeholder_index(text))
                }
                other => LqpParameterValue::Value(literal_value(other)?),
            }
        };

        let column = resolve_column(plan, column_expr)?;
        let predicate = plan.add_node(LqpNodeKind::Predicate {
            column,
            scan_type,
            value,
            value2,
        });
        plan.set_left_child(predicate, input);
        Ok(predicate)
    }

    // ------------------------------------------------------------------
    // Projection and aggregation
    // ------------------------------------------------------------------

    fn translate_projection(
        &self,
        items: &[sql_ast::SelectItem],
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let mut expressions = Vec::with_capacity(items.len());

        for item in items {
            match item {
                sql_ast::SelectItem::Wildcard(_) => {
                    for origin in plan.output_column_origins(input) {
                        expressions.push(Expression::column(origin));
                    }
                }
                sql_ast::SelectItem::QualifiedWildcard(prefix, _) => {
                    let prefix = object_name(prefix);
                    let origin_node =
                        plan.find_table_name_origin(input, &prefix).ok_or_else(|| {
                            Error::Sql(SqlError::TableNotFound(prefix.clone()))
                        })?;
                    // Keep only the origin columns that still reach the
                    // input; a projection or aggregate in between may have
                    // discarded some.
                    for origin in plan.output_column_origins(origin_node) {
                        if plan
                            .find_output_column_id_by_column_origin(input, origin)
                            .is_some()
                        {
                            expressions.push(Expression::column(origin));
                        }
                    }
                }
                sql_ast::SelectItem::UnnamedExpr(expr) => {
                    expressions.push(self.translate_lqp_expression(expr, input, plan)?);
                }
                sql_ast::SelectItem::ExprWithAlias { expr, alias } => {
                    let mut expression = self.translate_lqp_expression(expr, input, plan)?;
                    expression.set_alias(alias.value.clone());
                    expressions.push(expression);
                }
            }
        }

        for expression in &expressions {
            let supported = matches!(
                expression.kind(),
                ExpressionKind::Column(_) | ExpressionKind::Literal(_)
            ) || expression.is_arithmetic_operator();
            if !supported {
                return Err(Error::unsupported(format!(
                    "projection expression {}",
                    expression
                )));
            }
        }

        let projection = plan.add_node(LqpNodeKind::Projection { expressions });
        plan.set_left_child(projection, input);
        Ok(projection)
    }

    /// Builds `input -> [groupby aliasing projection] -> aggregate ->
    /// {having predicates}* -> reordering projection`.
    ///
    /// The aliasing projection only exists so that SELECT-list aliases are
    /// visible while the group-by columns are resolved; the aggregate is
    /// wired to the original input. The final projection restores the
    /// select-list order (the aggregate emits group-by columns first) and
    /// applies aliases. HAVING may reference aggregates missing from the
    /// select list; they are appended to the aggregate but hidden from the
    /// projection.
    fn translate_aggregate(
        &self,
        select: &sql_ast::Select,
        group_by_exprs: &[sql_ast::Expr],
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        // Groupby aliasing projection: identity over the input, with
        // SELECT-list aliases attached.
        let mut aliasing_expressions: Vec<LqpExpression> = plan
            .output_column_origins(input)
            .into_iter()
            .map(Expression::column)
            .collect();
        for item in &select.projection {
            let sql_ast::SelectItem::ExprWithAlias { expr, alias } = item else {
                continue;
            };
            let Some((name, prefix)) = named_column_reference(expr) else {
                continue;
            };
            let origin = plan.get_column_origin_by_named_column_reference(
                input,
                &name,
                prefix.as_deref(),
            )?;
            let column_id = plan.get_output_column_id_by_column_origin(input, origin)?;
            aliasing_expressions[column_id.0 as usize].set_alias(alias.value.clone());
        }
        let aliasing_node = plan.add_node(LqpNodeKind::Projection {
            expressions: aliasing_expressions,
        });
        plan.set_left_child(aliasing_node, input);

        // Group-by column origins, resolved through the aliasing node.
        let mut group_by = Vec::with_capacity(group_by_exprs.len());
        for group_expr in group_by_exprs {
            let (name, prefix) = named_column_reference(group_expr).ok_or_else(|| {
                Error::unsupported("grouping on complex expressions")
            })?;
            group_by.push(plan.get_column_origin_by_named_column_reference(
                aliasing_node,
                &name,
                prefix.as_deref(),
            )?);
        }

        // Walk the select list: aggregates join the aggregate list, plain
        // columns must be group-by columns. Record the output order.
        let mut aggregates: Vec<LqpExpression> = Vec::new();
        let mut output_columns: Vec<(ColumnId, Option<String>)> = Vec::new();
        let mut next_aggregate_column_id = group_by.len() as u32;

        for item in &select.projection {
            let (expr, alias) = match item {
                sql_ast::SelectItem::UnnamedExpr(expr) => (expr, None),
                sql_ast::SelectItem::ExprWithAlias { expr, alias } => {
                    (expr, Some(alias.value.clone()))
                }
                sql_ast::SelectItem::Wildcard(_) => {
                    // `*` under aggregation covers exactly the group-by
                    // columns, which are output first.
                    for index in 0..group_by.len() {
                        output_columns.push((ColumnId(index as u32), None));
                    }
                    continue;
                }
                sql_ast::SelectItem::QualifiedWildcard(..) => {
                    return Err(Error::unsupported(
                        "qualified star in an aggregate select list",
                    ));
                }
            };

            if let sql_ast::Expr::Function(_) = expr {
                let mut aggregate = self.translate_lqp_expression(expr, input, plan)?;
                if let Some(alias) = &alias {
                    aggregate.set_alias(alias.clone());
                }
                aggregates.push(aggregate);
                output_columns.push((ColumnId(next_aggregate_column_id), alias));
                next_aggregate_column_id += 1;
            } else if let Some((name, prefix)) = named_column_reference(expr) {
                if group_by_exprs.is_empty() {
                    return Err(Error::Sql(SqlError::InvalidExpression(
                        "SELECT list of aggregate contains a column, but the query does not \
                         have a GROUP BY clause"
                            .into(),
                    )));
                }
                let origin = plan.get_column_origin_by_named_column_reference(
                    aliasing_node,
                    &name,
                    prefix.as_deref(),
                )?;
                let position = group_by.iter().position(|g| *g == origin).ok_or_else(|| {
                    Error::Sql(SqlError::InvalidExpression(format!(
                        "Column '{}' is specified in SELECT list, but not in GROUP BY clause.",
                        name
                    )))
                })?;
                output_columns.push((ColumnId(position as u32), alias));
            } else {
                return Err(Error::unsupported(
                    "projection list items of an aggregate must be aggregate functions or \
                     group-by columns",
                ));
            }
        }

        // HAVING may use aggregates that the select list does not; add them
        // to the aggregate node but not to `output_columns`.
        if let Some(having) = &select.having {
            for aggregate in self.collect_having_aggregates(having, input, plan)? {
                if !aggregates.contains(&aggregate) {
                    aggregates.push(aggregate);
                }
            }
        }

        // The aliasing node was only needed for resolution.
        plan.clear_left_child(aliasing_node);

        let aggregate_node = plan.add_node(LqpNodeKind::Aggregate {
            aggregates,
            group_by,
        });
        plan.set_left_child(aggregate_node, input);

        let mut below_projection = aggregate_node;
        if let Some(having) = &select.having {
            below_projection =
                self.translate_having(having, aggregate_node, aggregate_node, plan)?;
        }

        let mut projection_expressions = Vec::with_capacity(output_columns.len());
        for (column_id, alias) in output_columns {
            let origin = plan
                .find_column_origin_by_output_column_id(aggregate_node, column_id)
                .ok_or_else(|| Error::internal("aggregate output column out of range"))?;
            projection_expressions.push(Expression::column_with_alias(origin, alias));
        }
        let projection = plan.add_node(LqpNodeKind::Projection {
            expressions: projection_expressions,
        });
        plan.set_left_child(projection, below_projection);
        Ok(projection)
    }

    /// All aggregate functions appearing in a HAVING expression.
    fn collect_having_aggregates(
        &self,
        expr: &sql_ast::Expr,
        input: NodeId,
        plan: &LqpPlan,
    ) -> Result<Vec<LqpExpression>> {
        let mut aggregates = Vec::new();
        self.collect_having_aggregates_into(expr, input, plan, &mut aggregates)?;
        Ok(aggregates)
    }

    fn collect_having_aggregates_into(
        &self,
        expr: &sql_ast::Expr,
        input: NodeId,
        plan: &LqpPlan,
        aggregates: &mut Vec<LqpExpression>,
    ) -> Result<()> {
        match expr {
            sql_ast::Expr::Function(_) => {
                let translated = self.translate_lqp_expression(expr, input, plan)?;
                if translated.aggregate_function().is_some() {
                    aggregates.push(translated);
                }
            }
            sql_ast::Expr::BinaryOp { left, right, .. } => {
                self.collect_having_aggregates_into(left, input, plan, aggregates)?;
                self.collect_having_aggregates_into(right, input, plan, aggregates)?;
            }
            sql_ast::Expr::UnaryOp { expr, .. } | sql_ast::Expr::Nested(expr) => {
                self.collect_having_aggregates_into(expr, input, plan, aggregates)?;
            }
            sql_ast::Expr::Between {
                expr, low, high, ..
            } => {
                self.collect_having_aggregates_into(expr, input, plan, aggregates)?;
                self.collect_having_aggregates_into(low, input, plan, aggregates)?;
                self.collect_having_aggregates_into(high, input, plan, aggregates)?;
            }
            _ => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // ORDER BY / LIMIT
    // ------------------------------------------------------------------

    fn translate_order_by(
        &self,
        order_by: &[sql_ast::OrderByExpr],
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let mut definitions = Vec::with_capacity(order_by.len());
        for order in order_by {
            let (name, prefix) = named_column_reference(&order.expr)
                .ok_or_else(|| Error::unsupported("ordering by non-column expressions"))?;
            let column = plan.get_column_origin_by_named_column_reference(
                input,
                &name,
                prefix.as_deref(),
            )?;
            let mode = match order.asc {
                Some(false) => OrderByMode::Descending,
                _ => OrderByMode::Ascending,
            };
            definitions.push(SortDefinition { column, mode });
        }

        let sort = plan.add_node(LqpNodeKind::Sort { definitions });
        plan.set_left_child(sort, input);
        Ok(sort)
    }

    fn translate_limit(
        &self,
        limit: &sql_ast::Expr,
        input: NodeId,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let num_rows = match literal_value(limit)? {
            Value::Int64(n) if n >= 0 => n as u64,
            other => {
                return Err(Error::Sql(SqlError::InvalidExpression(format!(
                    "LIMIT must be a non-negative integer, got {}",
                    other
                ))))
            }
        };
        let node = plan.add_node(LqpNodeKind::Limit { num_rows });
        plan.set_left_child(node, input);
        Ok(node)
    }

    // ------------------------------------------------------------------
    // DML
    // ------------------------------------------------------------------

    fn translate_insert(
        &self,
        table_name: &sql_ast::ObjectName,
        columns: &[sql_ast::Ident],
        source: Option<&sql_ast::Query>,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let table_name = object_name(table_name);
        let target = self.storage.get_table(&table_name)?;
        let target_column_count = target.read().column_count();

        // INSERT ... VALUES goes through a projection over a dummy leaf;
        // INSERT ... SELECT uses the select plan as the source.
        let values_row: Option<&Vec<sql_ast::Expr>> = match source.map(|q| q.body.as_ref()) {
            Some(sql_ast::SetExpr::Values(values)) => {
                if values.rows.len() != 1 {
                    return Err(Error::unsupported("multi-row INSERT"));
                }
                Some(&values.rows[0])
            }
            _ => None,
        };

        let mut node = match (&values_row, source) {
            (Some(_), _) | (None, None) => plan.add_node(LqpNodeKind::DummyTable),
            (None, Some(query)) => self.translate_query(query, plan)?,
        };

        if columns.is_empty() {
            if let Some(row) = values_row {
                let expressions = row
                    .iter()
                    .map(|expr| self.translate_lqp_expression(expr, node, plan))
                    .collect::<Result<Vec<_>>>()?;
                let projection = plan.add_node(LqpNodeKind::Projection { expressions });
                plan.set_left_child(projection, node);
                node = projection;
            }
            let width = plan.output_column_count(node);
            if width != target_column_count {
                return Err(Error::Sql(SqlError::ColumnCountMismatch {
                    expected: target_column_count,
                    actual: width,
                }));
            }
        } else {
            // A column list: prefill a width-matching projection with NULL
            // literals, then overwrite the named positions.
            let mut expressions: Vec<LqpExpression> =
                vec![Expression::literal(Value::Null); target_column_count];

            for (insert_index, column) in columns.iter().enumerate() {
                let column_id = target
                    .read()
                    .column_id_by_name(&column.value)
                    .ok_or_else(|| {
                        Error::Sql(SqlError::ColumnNotFound(column.value.clone()))
                    })?;

                expressions[column_id.0 as usize] = match values_row {
                    Some(row) => {
                        let expr = row.get(insert_index).ok_or_else(|| {
                            Error::Sql(SqlError::ColumnCountMismatch {
                                expected: columns.len(),
                                actual: row.len(),
                            })
                        })?;
                        self.translate_lqp_expression(expr, node, plan)?
                    }
                    None => {
                        let origin = plan
                            .find_column_origin_by_output_column_id(
                                node,
                                ColumnId(insert_index as u32),
                            )
                            .ok_or_else(|| {
                                Error::Sql(SqlError::ColumnCountMismatch {
                                    expected: columns.len(),
                                    actual: plan.output_column_count(node),
                                })
                            })?;
                        Expression::column(origin)
                    }
                };
            }

            let projection = plan.add_node(LqpNodeKind::Projection { expressions });
            plan.set_left_child(projection, node);
            node = projection;
        }

        let insert = plan.add_node(LqpNodeKind::Insert { table_name });
        plan.set_left_child(insert, node);
        Ok(insert)
    }

    fn translate_update(
        &self,
        table: &sql_ast::TableWithJoins,
        assignments: &[sql_ast::Assignment],
        selection: Option<&sql_ast::Expr>,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        let mut values_node = self.translate_table_with_joins(table, plan)?;
        if let Some(selection) = selection {
            values_node = self.translate_where(selection, values_node, plan)?;
        }

        // The update pipeline wants reference columns on its input side.
        if matches!(
            plan.node(values_node).kind,
            LqpNodeKind::StoredTable { .. }
        ) {
            return Err(Error::unsupported(
                "unconditional updates are currently not supported",
            ));
        }

        // Prefill with identity column references, then overwrite the
        // assigned columns.
        let mut expressions: Vec<LqpExpression> = plan
            .output_column_origins(values_node)
            .into_iter()
            .map(Expression::column)
            .collect();

        for assignment in assignments {
            let column_name = assignment
                .id
                .last()
                .ok_or_else(|| Error::internal("assignment without a column name"))?
                .value
                .clone();
            let origin = plan.get_column_origin_by_named_column_reference(
                values_node,
                &column_name,
                None,
            )?;
            let column_id = plan.get_output_column_id_by_column_origin(values_node, origin)?;

            let mut expression =
                self.translate_lqp_expression(&assignment.value, values_node, plan)?;
            expression.set_alias(column_name);
            expressions[column_id.0 as usize] = expression;
        }

        let table_name = match &table.relation {
            sql_ast::TableFactor::Table { name, .. } => object_name(name),
            other => {
                return Err(Error::unsupported(format!(
                    "UPDATE target {:?}",
                    other
                )));
            }
        };
        let update = plan.add_node(LqpNodeKind::Update {
            table_name,
            expressions,
        });
        plan.set_left_child(update, values_node);
        Ok(update)
    }

    fn translate_delete(
        &self,
        tables: &[sql_ast::TableWithJoins],
        selection: Option<&sql_ast::Expr>,
        plan: &mut LqpPlan,
    ) -> Result<NodeId> {
        if tables.len() != 1 || !tables[0].joins.is_empty() {
            return Err(Error::unsupported("DELETE over joined tables"));
        }
        let table_name = match &tables[0].relation {
            sql_ast::TableFactor::Table { name, .. } => object_name(name),
            other => return Err(Error::unsupported(format!("DELETE target {:?}", other))),
        };

        let mut node = self.stored_table_node(&table_name, plan)?;
        node = self.validate_if_active(node, plan);
        if let Some(selection) = selection {
            node = self.translate_where(selection, node, plan)?;
        }

        let delete = plan.add_node(LqpNodeKind::Delete { table_name });
        plan.set_left_child(delete, node);
        Ok(delete)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Translate a scalar/aggregate AST expression against `input`'s output.
    fn translate_lqp_expression(
        &self,
        expr: &sql_ast::Expr,
        input: NodeId,
        plan: &LqpPlan,
    ) -> Result<LqpExpression> {
        match expr {
            sql_ast::Expr::Identifier(_) | sql_ast::Expr::CompoundIdentifier(_) => {
                let (name, prefix) = named_column_reference(expr).unwrap();
                let origin = plan.get_column_origin_by_named_column_reference(
                    input,
                    &name,
                    prefix.as_deref(),
                )?;
                Ok(Expression::column(origin))
            }
            sql_ast::Expr::Value(sql_ast::Value::Placeholder(text)) => {
                Ok(Expression::placeholder(placeholder_index(text)))
            }
            sql_ast::Expr::Value(_) => Ok(Expression::literal(literal_value(expr)?)),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Minus,
                ..
            } => Ok(Expression::literal(literal_value(expr)?)),
            sql_ast::Expr::UnaryOp {
                op: sql_ast::UnaryOperator::Not,
                expr: inner,
            } => Ok(Expression::unary_operator(
                ExpressionKind::Not,
                self.translate_lqp_expression(inner, input, plan)?,
            )),
            sql_ast::Expr::Nested(inner) => self.translate_lqp_expression(inner, input, plan),
            sql_ast::Expr::BinaryOp { left, op, right } => {
                let kind = match op {
                    sql_ast::BinaryOperator::Plus => ExpressionKind::Addition,
                    sql_ast::BinaryOperator::Minus => ExpressionKind::Subtraction,
                    sql_ast::BinaryOperator::Multiply => ExpressionKind::Multiplication,
                    sql_ast::BinaryOperator::Divide => ExpressionKind::Division,
                    sql_ast::BinaryOperator::Modulo => ExpressionKind::Modulo,
                    sql_ast::BinaryOperator::Eq => ExpressionKind::Equals,
                    sql_ast::BinaryOperator::NotEq => ExpressionKind::NotEquals,
                    sql_ast::BinaryOperator::Lt => ExpressionKind::LessThan,
                    sql_ast::BinaryOperator::LtEq => ExpressionKind::LessThanEquals,
                    sql_ast::BinaryOperator::Gt => ExpressionKind::GreaterThan,
                    sql_ast::BinaryOperator::GtEq => ExpressionKind::GreaterThanEquals,
                    sql_ast::BinaryOperator::And => ExpressionKind::And,
                    sql_ast::BinaryOperator::Or => ExpressionKind::Or,
                    other => {
                        return Err(Error::unsupported(format!("operator {:?}", other)))
                    }
                };
                Ok(Expression::binary_operator(
                    kind,
                    self.translate_lqp_expression(left, input, plan)?,
                    self.translate_lqp_expression(right, input, plan)?,
                ))
            }
            sql_ast::Expr::Function(function) => {
                let name = object_name(&function.name);
                let aggregate = aggregate_function_by_name(&name).ok_or_else(|| {
                    Error::unsupported(format!("function {}", name))
                })?;

                let mut arguments = Vec::with_capacity(function.args.len());
                for arg in &function.args {
                    let arg_expr = match arg {
                        sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e)) => {
                            self.translate_lqp_expression(e, input, plan)?
                        }
                        sql_ast::FunctionArg::Unnamed(
                            sql_ast::FunctionArgExpr::Wildcard,
                        ) => Expression::star(None),
                        sql_ast::FunctionArg::Unnamed(
                            sql_ast::FunctionArgExpr::QualifiedWildcard(prefix),
                        ) => Expression::star(Some(object_name(prefix))),
                        sql_ast::FunctionArg::Named { .. } => {
                            return Err(Error::unsupported("named function arguments"))
                        }
                    };
                    arguments.push(arg_expr);
                }
                Ok(Expression::aggregate(aggregate, arguments, None))
            }
            other => Err(Error::unsupported(format!("expression {:?}", other))),
        }
    }
}

fn object_name(name: &sql_ast::ObjectName) -> String {
    name.0
        .iter()
        .map(|ident| ident.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

fn statement_kind(statement: &sql_ast::Statement) -> &'static str {
    match statement {
        sql_ast::Statement::CreateTable { .. } => "CREATE TABLE",
        sql_ast::Statement::Drop { .. } => "DROP",
        sql_ast::Statement::StartTransaction { .. } => "START TRANSACTION",
        _ => "statement",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_sql;
    use strata_storage::table::Table;

    fn storage_with_tables() -> Arc<StorageManager> {
        let storage = Arc::new(StorageManager::new());
        let t = Table::new(
            vec![
                ColumnDefinition::new("a", ElementType::Int32),
                ColumnDefinition::new("b", ElementType::Int32),
            ],
            4,
        );
        storage.add_table("t", t.into_shared()).unwrap();

        let t1 = Table::new(
            vec![
                ColumnDefinition::new("a", ElementType::Int32),
                ColumnDefinition::new("b", ElementType::Int32),
            ],
            4,
        );
        storage.add_table("t1", t1.into_shared()).unwrap();

        let t2 = Table::new(
            vec![
                ColumnDefinition::new("b", ElementType::Int32),
                ColumnDefinition::new("c", ElementType::Int32),
            ],
            4,
        );
        storage.add_table("t2", t2.into_shared()).unwrap();
        storage
    }

    fn translate(sql: &str) -> LqpPlan {
        try_translate(sql).unwrap()
    }

    fn try_translate(sql: &str) -> Result<LqpPlan> {
        let statements = parse_sql(sql)?;
        SqlTranslator::new(storage_with_tables())
            .with_validate(false)
            .translate_statement(&statements[0])
    }

    fn kind(plan: &LqpPlan, node: NodeId) -> &LqpNodeKind {
        &plan.node(node).kind
    }

    #[test]
    fn test_select_with_reversed_comparison() {
        // `5 > a` must become a scan for `a < 5`
        let plan = translate("SELECT a FROM t WHERE 5 > a");

        let projection = plan.root;
        assert!(matches!(kind(&plan, projection), LqpNodeKind::Projection { .. }));

        let predicate = plan.node(projection).left.unwrap();
        let LqpNodeKind::Predicate {
            column,
            scan_type,
            value,
            value2,
        } = kind(&plan, predicate)
        else {
            panic!("expected a predicate node");
        };

        let stored = plan.node(predicate).left.unwrap();
        assert_eq!(*column, ColumnOrigin::new(stored, ColumnId(0)));
        assert_eq!(*scan_type, ScanType::LessThan);
        assert_eq!(*value, LqpParameterValue::Value(Value::Int64(5)));
        assert!(value2.is_none());
    }

    #[test]
    fn test_where_or_becomes_position_union() {
        let plan = translate("SELECT a FROM t WHERE a = 1 OR b = 2");

        let union = plan.node(plan.root).left.unwrap();
        assert!(matches!(
            kind(&plan, union),
            LqpNodeKind::Union { mode: UnionMode::Positions }
        ));

        // both branches filter the same input node
        let left_predicate = plan.node(union).left.unwrap();
        let right_predicate = plan.node(union).right.unwrap();
        assert_eq!(
            plan.node(left_predicate).left,
            plan.node(right_predicate).left
        );
    }

    #[test]
    fn test_where_and_chains_predicates() {
        let plan = translate("SELECT a FROM t WHERE a = 1 AND b = 2");

        let second = plan.node(plan.root).left.unwrap();
        assert!(matches!(kind(&plan, second), LqpNodeKind::Predicate { .. }));
        let first = plan.node(second).left.unwrap();
        assert!(matches!(kind(&plan, first), LqpNodeKind::Predicate { .. }));
    }

    #[test]
    fn test_between_predicate() {
        let plan = translate("SELECT a FROM t WHERE a BETWEEN 2 AND 8");

        let predicate = plan.node(plan.root).left.unwrap();
        let LqpNodeKind::Predicate {
            scan_type,
            value,
            value2,
            ..
        } = kind(&plan, predicate)
        else {
            panic!("expected a predicate node");
        };
        assert_eq!(*scan_type, ScanType::Between);
        assert_eq!(*value, LqpParameterValue::Value(Value::Int64(2)));
        assert_eq!(*value2, Some(Value::Int64(8)));
    }

    #[test]
    fn test_natural_join_decomposition() {
        // Cross -> Predicate(T1.b = T2.b) -> Projection(a, b, c)
        let plan = translate("SELECT * FROM t1 NATURAL JOIN t2");

        let outer_projection = plan.root;
        let dedup_projection = plan.node(outer_projection).left.unwrap();
        assert!(matches!(
            kind(&plan, dedup_projection),
            LqpNodeKind::Projection { .. }
        ));
        assert_eq!(
            plan.output_column_names(dedup_projection),
            vec!["a", "b", "c"]
        );

        let predicate = plan.node(dedup_projection).left.unwrap();
        let LqpNodeKind::Predicate {
            scan_type, value, ..
        } = kind(&plan, predicate)
        else {
            panic!("expected an equality predicate under the projection");
        };
        assert_eq!(*scan_type, ScanType::Equals);
        assert!(matches!(value, LqpParameterValue::Column(_)));

        let cross = plan.node(predicate).left.unwrap();
        assert!(matches!(
            kind(&plan, cross),
            LqpNodeKind::Join { mode: JoinMode::Cross, predicate: None }
        ));
    }

    #[test]
    fn test_join_condition_operand_resolution() {
        let plan = translate("SELECT t1.a FROM t1 JOIN t2 ON t1.b = t2.b");

        let projection = plan.root;
        let join = plan.node(projection).left.unwrap();
        let LqpNodeKind::Join {
            mode,
            predicate: Some(predicate),
        } = kind(&plan, join)
        else {
            panic!("expected a join with a predicate");
        };
        assert_eq!(*mode, JoinMode::Inner);
        assert_eq!(predicate.scan_type, ScanType::Equals);

        let left_node = plan.node(join).left.unwrap();
        let right_node = plan.node(join).right.unwrap();
        assert!(plan
            .find_output_column_id_by_column_origin(left_node, predicate.left)
            .is_some());
        assert!(plan
            .find_output_column_id_by_column_origin(right_node, predicate.right)
            .is_some());
    }

    #[test]
    fn test_join_condition_must_resolve_in_exactly_one_side() {
        // "b" exists in both t1 and t2 unqualified
        assert!(try_translate("SELECT t1.a FROM t1 JOIN t2 ON b = t2.b").is_err());
    }

    #[test]
    fn test_having_with_new_aggregate_is_hidden() {
        // AVG(b) joins the aggregate list but not the final projection
        let plan = translate("SELECT a, SUM(b) FROM t GROUP BY a HAVING AVG(b) > 0");

        let projection = plan.root;
        let LqpNodeKind::Projection { expressions } = kind(&plan, projection) else {
            panic!("expected the reordering projection");
        };
        assert_eq!(expressions.len(), 2);
        assert_eq!(plan.output_column_names(projection), vec!["a", "SUM(Col #1@0)"]);

        let having = plan.node(projection).left.unwrap();
        assert!(matches!(kind(&plan, having), LqpNodeKind::Predicate { .. }));

        let aggregate = plan.node(having).left.unwrap();
        let LqpNodeKind::Aggregate {
            aggregates,
            group_by,
        } = kind(&plan, aggregate)
        else {
            panic!("expected the aggregate node");
        };
        assert_eq!(group_by.len(), 1);
        assert_eq!(aggregates.len(), 2);
        assert_eq!(
            aggregates[0].aggregate_function(),
            Some(AggregateFunction::Sum)
        );
        assert_eq!(
            aggregates[1].aggregate_function(),
            Some(AggregateFunction::Avg)
        );
    }

    #[test]
    fn test_aggregate_select_column_must_be_grouped() {
        let err = try_translate("SELECT b, SUM(a) FROM t GROUP BY a").unwrap_err();
        assert!(err
            .to_string()
            .contains("specified in SELECT list, but not in GROUP BY clause"));
    }

    #[test]
    fn test_order_by_and_limit() {
        let plan = translate("SELECT a FROM t ORDER BY a DESC LIMIT 3");

        let limit = plan.root;
        assert!(matches!(
            kind(&plan, limit),
            LqpNodeKind::Limit { num_rows: 3 }
        ));

        let sort = plan.node(limit).left.unwrap();
        let LqpNodeKind::Sort { definitions } = kind(&plan, sort) else {
            panic!("expected a sort node");
        };
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].mode, OrderByMode::Descending);
    }

    #[test]
    fn test_insert_values_with_column_list_prefills_nulls() {
        let plan = translate("INSERT INTO t (b) VALUES (9)");

        let insert = plan.root;
        assert!(matches!(kind(&plan, insert), LqpNodeKind::Insert { .. }));

        let projection = plan.node(insert).left.unwrap();
        let LqpNodeKind::Projection { expressions } = kind(&plan, projection) else {
            panic!("expected the prefilled projection");
        };
        assert_eq!(expressions.len(), 2);
        assert!(expressions[0].is_null_literal());
        assert_eq!(expressions[1].value(), Some(&Value::Int64(9)));

        let dummy = plan.node(projection).left.unwrap();
        assert!(matches!(kind(&plan, dummy), LqpNodeKind::DummyTable));
    }

    #[test]
    fn test_insert_column_count_mismatch() {
        assert!(try_translate("INSERT INTO t VALUES (1)").is_err());
    }

    #[test]
    fn test_update_prefills_identity_references() {
        let plan = translate("UPDATE t SET b = 5 WHERE a = 1");

        let update = plan.root;
        let LqpNodeKind::Update {
            table_name,
            expressions,
        } = kind(&plan, update)
        else {
            panic!("expected an update node");
        };
        assert_eq!(table_name, "t");
        assert_eq!(expressions.len(), 2);
        // column "a" keeps its identity reference, "b" gets the new value
        assert!(matches!(
            expressions[0].kind(),
            ExpressionKind::Column(_)
        ));
        assert_eq!(expressions[1].value(), Some(&Value::Int64(5)));
        assert_eq!(expressions[1].alias(), Some("b"));
    }

    #[test]
    fn test_unconditional_update_is_rejected() {
        let err = try_translate("UPDATE t SET b = 5").unwrap_err();
        assert!(err.to_string().contains("unconditional updates"));
    }

    #[test]
    fn test_delete_builds_filtered_pipeline() {
        let statements = parse_sql("DELETE FROM t WHERE a = 1").unwrap();
        let plan = SqlTranslator::new(storage_with_tables())
            .translate_statement(&statements[0])
            .unwrap();

        let delete = plan.root;
        assert!(matches!(kind(&plan, delete), LqpNodeKind::Delete { .. }));
        let predicate = plan.node(delete).left.unwrap();
        assert!(matches!(kind(&plan, predicate), LqpNodeKind::Predicate { .. }));
        let validate = plan.node(predicate).left.unwrap();
        assert!(matches!(kind(&plan, validate), LqpNodeKind::Validate));
        let stored = plan.node(validate).left.unwrap();
        assert!(matches!(kind(&plan, stored), LqpNodeKind::StoredTable { .. }));
    }

    #[test]
    fn test_set_operations_are_rejected() {
        assert!(try_translate("SELECT a FROM t UNION SELECT a FROM t1").is_err());
    }

    #[test]
    fn test_show_statements() {
        let plan = translate("SHOW TABLES");
        assert!(matches!(kind(&plan, plan.root), LqpNodeKind::ShowTables));

        let plan = translate("SHOW COLUMNS FROM t");
        let LqpNodeKind::ShowColumns { table_name } = kind(&plan, plan.root) else {
            panic!("expected a show-columns node");
        };
        assert_eq!(table_name, "t");
    }

    #[test]
    fn test_unknown_table_is_a_translation_error() {
        assert!(try_translate("SELECT a FROM missing").is_err());
    }
}
