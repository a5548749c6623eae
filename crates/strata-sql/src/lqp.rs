//! Logical query plans.
//!
//! The LQP is a mutable DAG of typed plan nodes held in an arena: nodes live
//! in a `Vec`, edges are `NodeId` indices, and a shared sub-plan is simply
//! the same `NodeId` appearing under two parents. Parent back-edges are kept
//! as stored ids and maintained by `set_left_child`/`set_right_child`.
//!
//! Every output column of a node has a provenance, its [`ColumnOrigin`]: the
//! node that defines it plus the column id there. Origins survive
//! projections, joins, and aggregations, and are the stable identity of a
//! column across plan rewrites.

use std::fmt;
use std::sync::Arc;

use strata_common::prelude::*;
use strata_storage::statistics::TableStatistics;

use crate::expression::{ExpressionKind, LqpExpression, ParameterValue};

/// Parameter of a predicate node.
pub type LqpParameterValue = ParameterValue<ColumnOrigin>;

/// Index of a node within its [`LqpPlan`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// `(defining_node, output_column_id)`: the stable identity of a logical
/// column across plan rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnOrigin {
    pub node: NodeId,
    pub column_id: ColumnId,
}

impl ColumnOrigin {
    pub fn new(node: NodeId, column_id: ColumnId) -> Self {
        Self { node, column_id }
    }
}

impl fmt::Display for ColumnOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Col #{}@{}", self.column_id.0, self.node.0)
    }
}

/// Join condition of a non-natural, non-cross join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPredicate {
    pub left: ColumnOrigin,
    pub right: ColumnOrigin,
    pub scan_type: ScanType,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortDefinition {
    pub column: ColumnOrigin,
    pub mode: OrderByMode,
}

/// The concrete kinds of LQP nodes.
#[derive(Debug, Clone)]
pub enum LqpNodeKind {
    /// Leaf over a table registered in the storage manager; the schema is
    /// resolved at build time.
    StoredTable {
        table_name: String,
        column_names: Vec<String>,
        column_types: Vec<ElementType>,
    },
    /// Leaf with zero columns; the input of `INSERT ... VALUES` projections.
    DummyTable,
    Predicate {
        column: ColumnOrigin,
        scan_type: ScanType,
        value: LqpParameterValue,
        /// Engaged only for Between.
        value2: Option<Value>,
    },
    Projection {
        expressions: Vec<LqpExpression>,
    },
    /// Outputs all group-by columns first, then the aggregates.
    Aggregate {
        aggregates: Vec<LqpExpression>,
        group_by: Vec<ColumnOrigin>,
    },
    Join {
        mode: JoinMode,
        predicate: Option<JoinPredicate>,
    },
    Sort {
        definitions: Vec<SortDefinition>,
    },
    Limit {
        num_rows: u64,
    },
    Union {
        mode: UnionMode,
    },
    /// Filters out rows that are not visible to the active transaction.
    Validate,
    Insert {
        table_name: String,
    },
    Update {
        table_name: String,
        expressions: Vec<LqpExpression>,
    },
    Delete {
        table_name: String,
    },
    ShowTables,
    ShowColumns {
        table_name: String,
    },
}

/// A node: kind plus wiring and an optional alias covering its subtree.
#[derive(Debug, Clone)]
pub struct LqpNode {
    pub kind: LqpNodeKind,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub parent: Option<NodeId>,
    pub alias: Option<String>,
    statistics: Option<Arc<TableStatistics>>,
}

/// Arena of LQP nodes plus the root of the plan.
#[derive(Debug, Clone, Default)]
pub struct LqpPlan {
    nodes: Vec<LqpNode>,
    pub root: NodeId,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId(0)
    }
}

impl LqpPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, kind: LqpNodeKind) -> NodeId {
        self.nodes.push(LqpNode {
            kind,
            left: None,
            right: None,
            parent: None,
            alias: None,
            statistics: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &LqpNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LqpNode {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Wire `child` as the left input of `parent`, setting the back-edge.
    pub fn set_left_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].left = Some(child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn set_right_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].right = Some(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Unwire the left input of `parent`, resetting the child's back-edge.
    pub fn clear_left_child(&mut self, parent: NodeId) {
        if let Some(child) = self.nodes[parent.0].left.take() {
            if self.nodes[child.0].parent == Some(parent) {
                self.nodes[child.0].parent = None;
            }
        }
    }

    pub fn set_alias(&mut self, node: NodeId, alias: Option<String>) {
        self.nodes[node.0].alias = alias;
    }

    pub fn set_statistics(&mut self, node: NodeId, statistics: Arc<TableStatistics>) {
        self.nodes[node.0].statistics = Some(statistics);
    }

    /// Statistics of this node: its own if set, otherwise forwarded from the
    /// left input. Leaves get theirs at build time.
    pub fn statistics(&self, node: NodeId) -> Option<Arc<TableStatistics>> {
        let n = self.node(node);
        n.statistics
            .clone()
            .or_else(|| n.left.and_then(|child| self.statistics(child)))
    }

    // ------------------------------------------------------------------
    // Output columns and provenance
    // ------------------------------------------------------------------

    /// Provenance of every output column, in output order.
    pub fn output_column_origins(&self, node: NodeId) -> Vec<ColumnOrigin> {
        let n = self.node(node);
        match &n.kind {
            LqpNodeKind::StoredTable { column_names, .. } => (0..column_names.len())
                .map(|i| ColumnOrigin::new(node, ColumnId(i as u32)))
                .collect(),
            LqpNodeKind::DummyTable => Vec::new(),
            LqpNodeKind::Projection { expressions } => expressions
                .iter()
                .enumerate()
                .map(|(i, expression)| match expression.kind() {
                    ExpressionKind::Column(origin) => *origin,
                    _ => ColumnOrigin::new(node, ColumnId(i as u32)),
                })
                .collect(),
            LqpNodeKind::Aggregate {
                aggregates,
                group_by,
            } => {
                let mut origins = group_by.clone();
                origins.extend((0..aggregates.len()).map(|i| {
                    ColumnOrigin::new(node, ColumnId((group_by.len() + i) as u32))
                }));
                origins
            }
            LqpNodeKind::Join { .. } => {
                let mut origins = n
                    .left
                    .map(|child| self.output_column_origins(child))
                    .unwrap_or_default();
                if let Some(right) = n.right {
                    origins.extend(self.output_column_origins(right));
                }
                origins
            }
            LqpNodeKind::ShowTables => {
                vec![ColumnOrigin::new(node, ColumnId(0))]
            }
            LqpNodeKind::ShowColumns { .. } => (0..3)
                .map(|i| ColumnOrigin::new(node, ColumnId(i)))
                .collect(),
            LqpNodeKind::Insert { .. }
            | LqpNodeKind::Update { .. }
            | LqpNodeKind::Delete { .. } => Vec::new(),
            // Pass-through nodes forward the left input unchanged.
            LqpNodeKind::Predicate { .. }
            | LqpNodeKind::Sort { .. }
            | LqpNodeKind::Limit { .. }
            | LqpNodeKind::Union { .. }
            | LqpNodeKind::Validate => n
                .left
                .map(|child| self.output_column_origins(child))
                .unwrap_or_default(),
        }
    }

    pub fn output_column_count(&self, node: NodeId) -> usize {
        self.output_column_origins(node).len()
    }

    /// Output column names, in output order. Aliases win over derived names.
    pub fn output_column_names(&self, node: NodeId) -> Vec<String> {
        let n = self.node(node);
        match &n.kind {
            LqpNodeKind::StoredTable { column_names, .. } => column_names.clone(),
            LqpNodeKind::DummyTable => Vec::new(),
            LqpNodeKind::Projection { expressions } => {
                let child = n.left;
                expressions
                    .iter()
                    .map(|expression| self.expression_name(expression, child))
                    .collect()
            }
            LqpNodeKind::Aggregate {
                aggregates,
                group_by,
            } => {
                let child = n.left;
                let mut names: Vec<String> = group_by
                    .iter()
                    .map(|origin| self.column_name_for_origin(child, *origin))
                    .collect();
                names.extend(
                    aggregates
                        .iter()
                        .map(|aggregate| self.expression_name(aggregate, child)),
                );
                names
            }
            LqpNodeKind::Join { .. } => {
                let mut names = n
                    .left
                    .map(|child| self.output_column_names(child))
                    .unwrap_or_default();
                if let Some(right) = n.right {
                    names.extend(self.output_column_names(right));
                }
                names
            }
            LqpNodeKind::ShowTables => vec!["table_name".to_string()],
            LqpNodeKind::ShowColumns { .. } => vec![
                "column_name".to_string(),
                "column_type".to_string(),
                "is_nullable".to_string(),
            ],
            LqpNodeKind::Insert { .. }
            | LqpNodeKind::Update { .. }
            | LqpNodeKind::Delete { .. } => Vec::new(),
            LqpNodeKind::Predicate { .. }
            | LqpNodeKind::Sort { .. }
            | LqpNodeKind::Limit { .. }
            | LqpNodeKind::Union { .. }
            | LqpNodeKind::Validate => n
                .left
                .map(|child| self.output_column_names(child))
                .unwrap_or_default(),
        }
    }

    fn expression_name(&self, expression: &LqpExpression, context: Option<NodeId>) -> String {
        if let Some(alias) = expression.alias() {
            return alias.to_string();
        }
        if let ExpressionKind::Column(origin) = expression.kind() {
            return self.column_name_for_origin(context, *origin);
        }
        expression.to_string()
    }

    /// Name of `origin` as seen in `context`'s output, falling back to the
    /// origin's own notation when it does not reach `context`.
    pub fn column_name_for_origin(&self, context: Option<NodeId>, origin: ColumnOrigin) -> String {
        if let Some(context) = context {
            if let Some(column_id) = self.find_output_column_id_by_column_origin(context, origin) {
                return self.output_column_names(context)[column_id.0 as usize].clone();
            }
        }
        origin.to_string()
    }

    /// Provenance of output column `column_id`; defined for every id below
    /// the output column count.
    pub fn find_column_origin_by_output_column_id(
        &self,
        node: NodeId,
        column_id: ColumnId,
    ) -> Option<ColumnOrigin> {
        self.output_column_origins(node)
            .get(column_id.0 as usize)
            .copied()
    }

    /// Inverse of [`Self::find_column_origin_by_output_column_id`].
    pub fn find_output_column_id_by_column_origin(
        &self,
        node: NodeId,
        origin: ColumnOrigin,
    ) -> Option<ColumnId> {
        self.output_column_origins(node)
            .iter()
            .position(|candidate| *candidate == origin)
            .map(|index| ColumnId(index as u32))
    }

    pub fn get_output_column_id_by_column_origin(
        &self,
        node: NodeId,
        origin: ColumnOrigin,
    ) -> Result<ColumnId> {
        self.find_output_column_id_by_column_origin(node, origin)
            .ok_or_else(|| {
                Error::internal(format!("column origin {} does not reach node {}", origin, node.0))
            })
    }

    /// Resolve `name` (optionally qualified by `table_prefix`) within the
    /// output of `node`. Returns `None` when absent; an ambiguous name is a
    /// hard error.
    pub fn find_column_origin_by_named_column_reference(
        &self,
        node: NodeId,
        name: &str,
        table_prefix: Option<&str>,
    ) -> Result<Option<ColumnOrigin>> {
        if let Some(prefix) = table_prefix {
            let Some(origin_node) = self.find_table_name_origin(node, prefix) else {
                return Ok(None);
            };
            let Some(origin) =
                self.find_column_origin_by_named_column_reference(origin_node, name, None)?
            else {
                return Ok(None);
            };
            // The qualified column must still reach this node's output; it
            // may have been discarded by a projection or aggregate between.
            if self
                .find_output_column_id_by_column_origin(node, origin)
                .is_some()
            {
                return Ok(Some(origin));
            }
            return Ok(None);
        }

        let names = self.output_column_names(node);
        let origins = self.output_column_origins(node);
        let mut matches = names
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.as_str() == name);

        match (matches.next(), matches.next()) {
            (None, _) => Ok(None),
            (Some((index, _)), None) => Ok(Some(origins[index])),
            (Some(_), Some(_)) => Err(Error::Sql(SqlError::AmbiguousColumn(name.to_string()))),
        }
    }

    pub fn get_column_origin_by_named_column_reference(
        &self,
        node: NodeId,
        name: &str,
        table_prefix: Option<&str>,
    ) -> Result<ColumnOrigin> {
        self.find_column_origin_by_named_column_reference(node, name, table_prefix)?
            .ok_or_else(|| {
                let qualified = match table_prefix {
                    Some(prefix) => format!("{}.{}", prefix, name),
                    None => name.to_string(),
                };
                Error::Sql(SqlError::ColumnNotFound(qualified))
            })
    }

    /// The node in this subtree that a table qualifier refers to: a node
    /// aliased `name`, or an unaliased stored-table leaf named `name`. An
    /// alias shadows everything beneath it.
    pub fn find_table_name_origin(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let n = self.node(node);
        match n.alias.as_deref() {
            Some(alias) => return (alias == name).then_some(node),
            None => {
                if let LqpNodeKind::StoredTable { table_name, .. } = &n.kind {
                    if table_name == name {
                        return Some(node);
                    }
                }
            }
        }

        let left = n.left.and_then(|child| self.find_table_name_origin(child, name));
        let right = n
            .right
            .and_then(|child| self.find_table_name_origin(child, name));
        left.or(right)
    }

    /// True when this node owns DML access to `name` or is a leaf over it.
    pub fn manages_table(&self, node: NodeId, name: &str) -> bool {
        match &self.node(node).kind {
            LqpNodeKind::StoredTable { table_name, .. }
            | LqpNodeKind::Insert { table_name }
            | LqpNodeKind::Update { table_name, .. }
            | LqpNodeKind::Delete { table_name } => table_name == name,
            _ => false,
        }
    }

    /// Where an aggregate node exposes `expression` in its output. Lets a
    /// HAVING predicate bind to aggregate columns by structural equality.
    pub fn get_column_origin_for_expression(
        &self,
        node: NodeId,
        expression: &LqpExpression,
    ) -> Result<ColumnOrigin> {
        let LqpNodeKind::Aggregate {
            aggregates,
            group_by,
        } = &self.node(node).kind
        else {
            return Err(Error::internal("expression lookup on a non-aggregate node"));
        };

        if let Some(position) = aggregates.iter().position(|a| a == expression) {
            return Ok(ColumnOrigin::new(
                node,
                ColumnId((group_by.len() + position) as u32),
            ));
        }
        if let ExpressionKind::Column(origin) = expression.kind() {
            if group_by.contains(origin) {
                return Ok(*origin);
            }
        }
        Err(Error::Sql(SqlError::ColumnNotFound(expression.to_string())))
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    pub fn description(&self, node: NodeId) -> String {
        match &self.node(node).kind {
            LqpNodeKind::StoredTable { table_name, .. } => {
                format!("[StoredTable] Name: '{}'", table_name)
            }
            LqpNodeKind::DummyTable => "[DummyTable]".to_string(),
            LqpNodeKind::Predicate {
                column,
                scan_type,
                value,
                value2,
            } => match value2 {
                Some(value2) => {
                    format!("[Predicate] {} BETWEEN {} AND {}", column, value, value2)
                }
                None => format!("[Predicate] {} {} {}", column, scan_type, value),
            },
            LqpNodeKind::Projection { .. } => {
                format!("[Projection] {}", self.output_column_names(node).join(", "))
            }
            LqpNodeKind::Aggregate {
                aggregates,
                group_by,
            } => {
                let rendered: Vec<String> =
                    aggregates.iter().map(|a| a.to_string()).collect();
                if group_by.is_empty() {
                    format!("[Aggregate] {}", rendered.join(", "))
                } else {
                    let keys: Vec<String> = group_by.iter().map(|g| g.to_string()).collect();
                    format!(
                        "[Aggregate] {} GROUP BY {}",
                        rendered.join(", "),
                        keys.join(", ")
                    )
                }
            }
            LqpNodeKind::Join { mode, predicate } => match predicate {
                Some(p) => format!("[Join] {} {} {} {}", mode, p.left, p.scan_type, p.right),
                None => format!("[Join] {}", mode),
            },
            LqpNodeKind::Sort { definitions } => {
                let keys: Vec<String> = definitions
                    .iter()
                    .map(|d| {
                        let direction = match d.mode {
                            OrderByMode::Ascending => "ASC",
                            OrderByMode::Descending => "DESC",
                        };
                        format!("{} {}", d.column, direction)
                    })
                    .collect();
                format!("[Sort] {}", keys.join(", "))
            }
            LqpNodeKind::Limit { num_rows } => format!("[Limit] {}", num_rows),
            LqpNodeKind::Union { mode: UnionMode::Positions } => "[UnionPositions]".to_string(),
            LqpNodeKind::Validate => "[Validate]".to_string(),
            LqpNodeKind::Insert { table_name } => format!("[Insert] Table: '{}'", table_name),
            LqpNodeKind::Update { table_name, .. } => {
                format!("[Update] Table: '{}'", table_name)
            }
            LqpNodeKind::Delete { table_name } => format!("[Delete] Table: '{}'", table_name),
            LqpNodeKind::ShowTables => "[ShowTables]".to_string(),
            LqpNodeKind::ShowColumns { table_name } => {
                format!("[ShowColumns] Table: '{}'", table_name)
            }
        }
    }

    /// Indented tree rendering from the root.
    pub fn format_plan(&self) -> String {
        let mut out = String::new();
        self.format_node(self.root, 0, &mut out);
        out
    }

    fn format_node(&self, node: NodeId, indent: usize, out: &mut String) {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&self.description(node));
        out.push('\n');
        let n = self.node(node);
        if let Some(left) = n.left {
            self.format_node(left, indent + 1, out);
        }
        if let Some(right) = n.right {
            self.format_node(right, indent + 1, out);
        }
    }
}
