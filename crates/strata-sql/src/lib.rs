//! # Strata SQL
//!
//! The SQL layer of StrataDB:
//! - `parse_sql` wraps the external `sqlparser` front-end
//! - Expression trees shared by the logical and physical layers
//! - The logical query plan (LQP): an arena DAG with column provenance
//! - The SQL-to-LQP translator
//! - Join graphs, the unordered join-plan form used by join-order search

pub mod expression;
pub mod join_graph;
pub mod lqp;
pub mod translator;

pub use expression::{
    Expression, ExpressionKind, LqpExpression, OperatorExpression, ParameterValue,
};
pub use join_graph::{build_join_graph, JoinGraph, JoinGraphEdge, JoinVertex};
pub use lqp::{
    ColumnOrigin, JoinPredicate, LqpNode, LqpNodeKind, LqpParameterValue, LqpPlan, NodeId,
    SortDefinition,
};
pub use translator::SqlTranslator;

use strata_common::prelude::*;

pub use sqlparser::ast::Statement;

/// Parse SQL statements.
pub fn parse_sql(sql: &str) -> Result<Vec<Statement>> {
    use sqlparser::dialect::GenericDialect;
    use sqlparser::parser::Parser;

    let dialect = GenericDialect {};
    Parser::parse_sql(&dialect, sql)
        .map_err(|e| Error::Sql(SqlError::ParseError(e.to_string())))
}
