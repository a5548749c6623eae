//! # Strata Query
//!
//! Query execution for StrataDB:
//! - Physical operators consuming and producing tables
//! - A plan builder lowering the LQP onto an operator graph
//! - An execution context with cancellation and memory accounting

pub mod evaluator;
pub mod operators;
pub mod plan_builder;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use strata_common::prelude::*;
use strata_sql::ParameterValue;
use strata_storage::storage_manager::StorageManager;
use strata_storage::table::SharedTable;

pub use plan_builder::build_operator_plan;

/// Parse, translate, lower, and execute `sql`, one result table per
/// statement.
pub fn execute_sql(
    sql: &str,
    storage: &Arc<StorageManager>,
    config: &EngineConfig,
) -> Result<Vec<SharedTable>> {
    let statements = strata_sql::parse_sql(sql)?;
    let translator =
        strata_sql::SqlTranslator::new(storage.clone()).with_validate(config.validate);

    let mut results = Vec::with_capacity(statements.len());
    for statement in &statements {
        let plan = translator.translate_statement(statement)?;
        let operators = build_operator_plan(&plan)?;
        let context = ExecutionContext::with_config(storage.clone(), config);
        results.push(operators.execute(&context)?);
    }
    Ok(results)
}

/// Scan parameter at the operator level: origins have been resolved to
/// output column ids.
pub type OperatorParameterValue = ParameterValue<ColumnId>;

/// Cooperative cancellation flag, polled by operators between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error out of the current operator when cancelled; partial results
    /// are dropped by unwinding the operator's stack frame.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Query(QueryError::Cancelled));
        }
        Ok(())
    }
}

/// Tracks memory allocation during query execution and enforces a limit.
///
/// Memory-intensive operators (sort, hash join, hash aggregate) register
/// their allocations; exceeding the limit fails the query with
/// `OutOfMemory`.
#[derive(Debug)]
pub struct MemoryTracker {
    allocated: AtomicUsize,
    limit: usize,
}

impl MemoryTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            limit,
        }
    }

    pub fn allocate(&self, bytes: usize) -> Result<()> {
        let previous = self.allocated.fetch_add(bytes, Ordering::Relaxed);
        if previous + bytes > self.limit {
            self.allocated.fetch_sub(bytes, Ordering::Relaxed);
            return Err(Error::Query(QueryError::OutOfMemory));
        }
        Ok(())
    }

    pub fn deallocate(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

/// Shared state of one query execution.
pub struct ExecutionContext {
    pub storage: Arc<StorageManager>,
    pub cancellation: CancellationToken,
    pub memory: Arc<MemoryTracker>,
}

impl ExecutionContext {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self::with_config(storage, &EngineConfig::default())
    }

    pub fn with_config(storage: Arc<StorageManager>, config: &EngineConfig) -> Self {
        Self {
            storage,
            cancellation: CancellationToken::new(),
            memory: Arc::new(MemoryTracker::new(config.query_memory_limit)),
        }
    }
}

/// A physical operator: consumes zero or more input tables, materializes
/// one result table.
pub trait PhysicalOperator: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> String {
        self.name().to_string()
    }

    fn num_in_tables(&self) -> u8;

    fn num_out_tables(&self) -> u8 {
        1
    }

    /// A copy of this operator with placeholder parameters substituted;
    /// used to re-run the plan of a prepared statement.
    fn recreate(&self, parameters: &[OperatorParameterValue]) -> Box<dyn PhysicalOperator>;

    fn execute(&self, inputs: &[SharedTable], context: &ExecutionContext) -> Result<SharedTable>;
}

/// Index of an operator within an [`OperatorPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpIndex(pub usize);

/// One operator plus its input wiring.
#[derive(Debug)]
pub struct OperatorNode {
    pub operator: Box<dyn PhysicalOperator>,
    pub left: Option<OpIndex>,
    pub right: Option<OpIndex>,
}

/// The physical plan: an arena of operators executed bottom-up. Outputs are
/// memoized, so a sub-plan shared by two parents runs exactly once.
#[derive(Debug, Default)]
pub struct OperatorPlan {
    nodes: Vec<OperatorNode>,
    pub root: OpIndex,
}

impl Default for OpIndex {
    fn default() -> Self {
        OpIndex(0)
    }
}

impl OperatorPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        operator: Box<dyn PhysicalOperator>,
        left: Option<OpIndex>,
        right: Option<OpIndex>,
    ) -> OpIndex {
        self.nodes.push(OperatorNode {
            operator,
            left,
            right,
        });
        OpIndex(self.nodes.len() - 1)
    }

    pub fn node(&self, index: OpIndex) -> &OperatorNode {
        &self.nodes[index.0]
    }

    pub fn execute(&self, context: &ExecutionContext) -> Result<SharedTable> {
        let mut outputs: Vec<Option<SharedTable>> = vec![None; self.nodes.len()];
        self.execute_node(self.root, &mut outputs, context)
    }

    fn execute_node(
        &self,
        index: OpIndex,
        outputs: &mut Vec<Option<SharedTable>>,
        context: &ExecutionContext,
    ) -> Result<SharedTable> {
        if let Some(output) = &outputs[index.0] {
            return Ok(output.clone());
        }

        let node = &self.nodes[index.0];
        let mut inputs = Vec::new();
        if let Some(left) = node.left {
            inputs.push(self.execute_node(left, outputs, context)?);
        }
        if let Some(right) = node.right {
            inputs.push(self.execute_node(right, outputs, context)?);
        }
        debug_assert_eq!(inputs.len(), node.operator.num_in_tables() as usize);

        context.cancellation.check()?;
        let output = node.operator.execute(&inputs, context)?;
        debug!(
            operator = node.operator.name(),
            rows = output.read().row_count(),
            "operator finished"
        );

        outputs[index.0] = Some(output.clone());
        Ok(output)
    }

    /// Rebuild the plan with placeholder parameters substituted.
    pub fn recreate(&self, parameters: &[OperatorParameterValue]) -> OperatorPlan {
        OperatorPlan {
            nodes: self
                .nodes
                .iter()
                .map(|node| OperatorNode {
                    operator: node.operator.recreate(parameters),
                    left: node.left,
                    right: node.right,
                })
                .collect(),
            root: self.root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(
            token.check(),
            Err(Error::Query(QueryError::Cancelled))
        ));
    }

    #[test]
    fn test_memory_tracker() {
        let tracker = MemoryTracker::new(1000);
        tracker.allocate(600).unwrap();
        assert!(tracker.allocate(600).is_err());
        assert_eq!(tracker.allocated(), 600);
        tracker.deallocate(600);
        tracker.allocate(1000).unwrap();
    }
}
