//! Join graphs.
//!
//! An unordered representation of a join plan: the non-join subtrees of an
//! LQP region become vertices, the join and cross-vertex predicates become
//! edges, and single-vertex predicates attach to their vertex. Join-order
//! search works on this structure; the search itself lives above this crate.

use strata_common::prelude::*;

use crate::lqp::{ColumnOrigin, JoinPredicate, LqpNodeKind, LqpParameterValue, LqpPlan, NodeId};

/// A predicate local to one vertex. `value2` is engaged only for Between.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinVertexPredicate {
    pub column: ColumnOrigin,
    pub scan_type: ScanType,
    pub value: LqpParameterValue,
    pub value2: Option<Value>,
}

/// A non-join subtree of the plan plus the predicates scanning only it.
#[derive(Debug, Clone)]
pub struct JoinVertex {
    pub node: NodeId,
    pub predicates: Vec<JoinVertexPredicate>,
}

impl JoinVertex {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            predicates: Vec::new(),
        }
    }
}

/// A connection between two vertices. Cross joins carry no predicate.
#[derive(Debug, Clone)]
pub struct JoinGraphEdge {
    pub left_vertex: usize,
    pub right_vertex: usize,
    pub mode: JoinMode,
    pub predicate: Option<JoinPredicate>,
}

/// Vertices and the edges connecting them.
#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    pub vertices: Vec<JoinVertex>,
    pub edges: Vec<JoinGraphEdge>,
}

/// Build the join graph of the plan region rooted at `root`. Joins and
/// predicates are dissolved into edges and vertex predicates; every other
/// node becomes a vertex.
pub fn build_join_graph(plan: &LqpPlan, root: NodeId) -> Result<JoinGraph> {
    let mut graph = JoinGraph::default();
    collect(plan, root, &mut graph)?;
    Ok(graph)
}

fn collect(plan: &LqpPlan, node_id: NodeId, graph: &mut JoinGraph) -> Result<()> {
    let node = plan.node(node_id);
    match &node.kind {
        LqpNodeKind::Join { mode, predicate } => {
            let left = node
                .left
                .ok_or_else(|| Error::internal("join without a left input"))?;
            let right = node
                .right
                .ok_or_else(|| Error::internal("join without a right input"))?;
            collect(plan, left, graph)?;
            collect(plan, right, graph)?;

            let (left_vertex, right_vertex, predicate) = match predicate {
                Some(predicate) => (
                    vertex_of(plan, graph, predicate.left.node)?,
                    vertex_of(plan, graph, predicate.right.node)?,
                    Some(predicate.clone()),
                ),
                // A cross join connects the roots of the two subtrees.
                None => (
                    vertex_of(plan, graph, left)?,
                    vertex_of(plan, graph, right)?,
                    None,
                ),
            };
            graph.edges.push(JoinGraphEdge {
                left_vertex,
                right_vertex,
                mode: *mode,
                predicate,
            });
        }
        LqpNodeKind::Predicate {
            column,
            scan_type,
            value,
            value2,
        } => {
            let left = node
                .left
                .ok_or_else(|| Error::internal("predicate without an input"))?;
            collect(plan, left, graph)?;

            let column_vertex = vertex_of(plan, graph, column.node)?;

            // A predicate comparing columns of two different vertices is a
            // join edge in disguise (this is what natural joins decompose
            // into); anything else scans a single vertex.
            if let LqpParameterValue::Column(value_origin) = value {
                let value_vertex = vertex_of(plan, graph, value_origin.node)?;
                if value_vertex != column_vertex {
                    graph.edges.push(JoinGraphEdge {
                        left_vertex: column_vertex,
                        right_vertex: value_vertex,
                        mode: JoinMode::Inner,
                        predicate: Some(JoinPredicate {
                            left: *column,
                            right: *value_origin,
                            scan_type: *scan_type,
                        }),
                    });
                    return Ok(());
                }
            }

            graph.vertices[column_vertex]
                .predicates
                .push(JoinVertexPredicate {
                    column: *column,
                    scan_type: *scan_type,
                    value: value.clone(),
                    value2: value2.clone(),
                });
        }
        _ => graph.vertices.push(JoinVertex::new(node_id)),
    }
    Ok(())
}

/// Index of the vertex whose subtree contains `target`.
fn vertex_of(plan: &LqpPlan, graph: &JoinGraph, target: NodeId) -> Result<usize> {
    graph
        .vertices
        .iter()
        .position(|vertex| subtree_contains(plan, vertex.node, target))
        .ok_or_else(|| {
            Error::internal(format!("node {} is not part of any join vertex", target.0))
        })
}

fn subtree_contains(plan: &LqpPlan, root: NodeId, target: NodeId) -> bool {
    if root == target {
        return true;
    }
    let node = plan.node(root);
    node.left
        .is_some_and(|child| subtree_contains(plan, child, target))
        || node
            .right
            .is_some_and(|child| subtree_contains(plan, child, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ParameterValue;

    fn stored_table(plan: &mut LqpPlan, name: &str, columns: &[&str]) -> NodeId {
        plan.add_node(LqpNodeKind::StoredTable {
            table_name: name.to_string(),
            column_names: columns.iter().map(|c| c.to_string()).collect(),
            column_types: columns.iter().map(|_| ElementType::Int32).collect(),
        })
    }

    #[test]
    fn test_single_vertex_with_local_predicate() {
        let mut plan = LqpPlan::new();
        let t = stored_table(&mut plan, "t", &["a"]);
        let predicate = plan.add_node(LqpNodeKind::Predicate {
            column: ColumnOrigin::new(t, ColumnId(0)),
            scan_type: ScanType::GreaterThan,
            value: ParameterValue::Value(Value::Int64(3)),
            value2: None,
        });
        plan.set_left_child(predicate, t);

        let graph = build_join_graph(&plan, predicate).unwrap();
        assert_eq!(graph.vertices.len(), 1);
        assert_eq!(graph.edges.len(), 0);
        assert_eq!(graph.vertices[0].node, t);
        assert_eq!(graph.vertices[0].predicates.len(), 1);
        assert_eq!(
            graph.vertices[0].predicates[0].scan_type,
            ScanType::GreaterThan
        );
    }

    #[test]
    fn test_predicated_join_becomes_an_edge() {
        let mut plan = LqpPlan::new();
        let t1 = stored_table(&mut plan, "t1", &["a"]);
        let t2 = stored_table(&mut plan, "t2", &["b"]);
        let join = plan.add_node(LqpNodeKind::Join {
            mode: JoinMode::Inner,
            predicate: Some(JoinPredicate {
                left: ColumnOrigin::new(t1, ColumnId(0)),
                right: ColumnOrigin::new(t2, ColumnId(0)),
                scan_type: ScanType::Equals,
            }),
        });
        plan.set_left_child(join, t1);
        plan.set_right_child(join, t2);

        let graph = build_join_graph(&plan, join).unwrap();
        assert_eq!(graph.vertices.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].left_vertex, 0);
        assert_eq!(graph.edges[0].right_vertex, 1);
        assert_eq!(graph.edges[0].mode, JoinMode::Inner);
    }

    #[test]
    fn test_cross_join_predicate_becomes_an_edge() {
        // the shape a natural join decomposes into
        let mut plan = LqpPlan::new();
        let t1 = stored_table(&mut plan, "t1", &["a", "b"]);
        let t2 = stored_table(&mut plan, "t2", &["b", "c"]);
        let cross = plan.add_node(LqpNodeKind::Join {
            mode: JoinMode::Cross,
            predicate: None,
        });
        plan.set_left_child(cross, t1);
        plan.set_right_child(cross, t2);
        let predicate = plan.add_node(LqpNodeKind::Predicate {
            column: ColumnOrigin::new(t1, ColumnId(1)),
            scan_type: ScanType::Equals,
            value: ParameterValue::Column(ColumnOrigin::new(t2, ColumnId(0))),
            value2: None,
        });
        plan.set_left_child(predicate, cross);

        let graph = build_join_graph(&plan, predicate).unwrap();
        assert_eq!(graph.vertices.len(), 2);
        // the cross join contributes one edge, the predicate another
        assert_eq!(graph.edges.len(), 2);
        assert!(graph.edges[0].predicate.is_none());
        let edge = graph.edges[1].predicate.as_ref().unwrap();
        assert_eq!(edge.scan_type, ScanType::Equals);
        assert!(graph.vertices.iter().all(|vertex| vertex.predicates.is_empty()));
    }
}
