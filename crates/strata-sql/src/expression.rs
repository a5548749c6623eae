//! Expression trees.
//!
//! One structure serves both plan layers: LQP expressions reference columns
//! by [`ColumnOrigin`](crate::lqp::ColumnOrigin), operator expressions by
//! `ColumnId`. The two share shape but not identity, so everything here is
//! generic over the column-reference payload `C`.

use std::fmt;

use strata_common::prelude::*;

use crate::lqp::ColumnOrigin;

/// Expression over LQP column provenance.
pub type LqpExpression = Expression<ColumnOrigin>;

/// Expression over physical output column ids.
pub type OperatorExpression = Expression<ColumnId>;

/// The kind of an expression node, carrying its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind<C> {
    Literal(Value),
    Column(C),
    /// `*` or `prefix.*`
    Star(Option<String>),
    Function(AggregateFunction),
    Placeholder(u16),

    // Arithmetic operators
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    Power,

    // Comparison operators
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    Like,
    NotLike,
    Between,

    // Logical operators
    And,
    Or,
    Not,
    Exists,
}

/// An expression tree node: kind, optional alias, optional children, and
/// the argument list of aggregate functions.
///
/// Deep copies are plain `Clone`s; children are owned boxes, so a clone is
/// deep by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression<C> {
    kind: ExpressionKind<C>,
    alias: Option<String>,
    left: Option<Box<Expression<C>>>,
    right: Option<Box<Expression<C>>>,
    arguments: Vec<Expression<C>>,
}

impl<C: Clone + PartialEq + fmt::Debug> Expression<C> {
    fn new(kind: ExpressionKind<C>) -> Self {
        Self {
            kind,
            alias: None,
            left: None,
            right: None,
            arguments: Vec::new(),
        }
    }

    pub fn literal(value: Value) -> Self {
        Self::new(ExpressionKind::Literal(value))
    }

    pub fn column(reference: C) -> Self {
        Self::new(ExpressionKind::Column(reference))
    }

    pub fn column_with_alias(reference: C, alias: Option<String>) -> Self {
        let mut expression = Self::column(reference);
        expression.alias = alias;
        expression
    }

    /// One column expression per reference, in order.
    pub fn columns(references: impl IntoIterator<Item = C>) -> Vec<Self> {
        references.into_iter().map(Self::column).collect()
    }

    pub fn star(table_name: Option<String>) -> Self {
        Self::new(ExpressionKind::Star(table_name))
    }

    pub fn placeholder(index: u16) -> Self {
        Self::new(ExpressionKind::Placeholder(index))
    }

    pub fn aggregate(
        function: AggregateFunction,
        arguments: Vec<Self>,
        alias: Option<String>,
    ) -> Self {
        let mut expression = Self::new(ExpressionKind::Function(function));
        expression.arguments = arguments;
        expression.alias = alias;
        expression
    }

    pub fn binary_operator(kind: ExpressionKind<C>, left: Self, right: Self) -> Self {
        let mut expression = Self::new(kind);
        debug_assert!(expression.is_binary_operator(), "not a binary operator");
        expression.left = Some(Box::new(left));
        expression.right = Some(Box::new(right));
        expression
    }

    pub fn unary_operator(kind: ExpressionKind<C>, input: Self) -> Self {
        let mut expression = Self::new(kind);
        debug_assert!(expression.is_unary_operator(), "not a unary operator");
        expression.left = Some(Box::new(input));
        expression
    }

    pub fn kind(&self) -> &ExpressionKind<C> {
        &self.kind
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    pub fn left_child(&self) -> Option<&Expression<C>> {
        self.left.as_deref()
    }

    pub fn right_child(&self) -> Option<&Expression<C>> {
        self.right.as_deref()
    }

    pub fn arguments(&self) -> &[Expression<C>] {
        &self.arguments
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            ExpressionKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn column_reference(&self) -> Option<&C> {
        match &self.kind {
            ExpressionKind::Column(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn aggregate_function(&self) -> Option<AggregateFunction> {
        match &self.kind {
            ExpressionKind::Function(function) => Some(*function),
            _ => None,
        }
    }

    /// Map the column references of this tree into another payload type.
    pub fn map_references<D: Clone + PartialEq + fmt::Debug>(
        &self,
        map: &mut impl FnMut(&C) -> Result<D>,
    ) -> Result<Expression<D>> {
        let kind = match &self.kind {
            ExpressionKind::Column(reference) => ExpressionKind::Column(map(reference)?),
            ExpressionKind::Literal(value) => ExpressionKind::Literal(value.clone()),
            ExpressionKind::Star(table) => ExpressionKind::Star(table.clone()),
            ExpressionKind::Function(function) => ExpressionKind::Function(*function),
            ExpressionKind::Placeholder(index) => ExpressionKind::Placeholder(*index),
            ExpressionKind::Addition => ExpressionKind::Addition,
            ExpressionKind::Subtraction => ExpressionKind::Subtraction,
            ExpressionKind::Multiplication => ExpressionKind::Multiplication,
            ExpressionKind::Division => ExpressionKind::Division,
            ExpressionKind::Modulo => ExpressionKind::Modulo,
            ExpressionKind::Power => ExpressionKind::Power,
            ExpressionKind::Equals => ExpressionKind::Equals,
            ExpressionKind::NotEquals => ExpressionKind::NotEquals,
            ExpressionKind::LessThan => ExpressionKind::LessThan,
            ExpressionKind::LessThanEquals => ExpressionKind::LessThanEquals,
            ExpressionKind::GreaterThan => ExpressionKind::GreaterThan,
            ExpressionKind::GreaterThanEquals => ExpressionKind::GreaterThanEquals,
            ExpressionKind::Like => ExpressionKind::Like,
            ExpressionKind::NotLike => ExpressionKind::NotLike,
            ExpressionKind::Between => ExpressionKind::Between,
            ExpressionKind::And => ExpressionKind::And,
            ExpressionKind::Or => ExpressionKind::Or,
            ExpressionKind::Not => ExpressionKind::Not,
            ExpressionKind::Exists => ExpressionKind::Exists,
        };

        let mut mapped = Expression::<D>::new(kind);
        mapped.alias = self.alias.clone();
        if let Some(left) = &self.left {
            mapped.left = Some(Box::new(left.map_references(map)?));
        }
        if let Some(right) = &self.right {
            mapped.right = Some(Box::new(right.map_references(map)?));
        }
        mapped.arguments = self
            .arguments
            .iter()
            .map(|argument| argument.map_references(map))
            .collect::<Result<_>>()?;
        Ok(mapped)
    }

    pub fn is_operator(&self) -> bool {
        self.is_arithmetic_operator() || self.is_logical_operator()
    }

    pub fn is_arithmetic_operator(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Addition
                | ExpressionKind::Subtraction
                | ExpressionKind::Multiplication
                | ExpressionKind::Division
                | ExpressionKind::Modulo
                | ExpressionKind::Power
        )
    }

    pub fn is_logical_operator(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Equals
                | ExpressionKind::NotEquals
                | ExpressionKind::LessThan
                | ExpressionKind::LessThanEquals
                | ExpressionKind::GreaterThan
                | ExpressionKind::GreaterThanEquals
                | ExpressionKind::Like
                | ExpressionKind::NotLike
                | ExpressionKind::And
                | ExpressionKind::Or
                | ExpressionKind::Between
                | ExpressionKind::Not
                | ExpressionKind::Exists
        )
    }

    pub fn is_binary_operator(&self) -> bool {
        if self.is_arithmetic_operator() {
            return true;
        }
        matches!(
            self.kind,
            ExpressionKind::Equals
                | ExpressionKind::NotEquals
                | ExpressionKind::LessThan
                | ExpressionKind::LessThanEquals
                | ExpressionKind::GreaterThan
                | ExpressionKind::GreaterThanEquals
                | ExpressionKind::Like
                | ExpressionKind::NotLike
                | ExpressionKind::And
                | ExpressionKind::Or
                | ExpressionKind::Between
        )
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(self.kind, ExpressionKind::Not | ExpressionKind::Exists)
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExpressionKind::Literal(Value::Null))
    }

    pub fn is_operand(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Literal(_) | ExpressionKind::Column(_)
        )
    }

    fn operator_token(&self) -> &'static str {
        match self.kind {
            ExpressionKind::Addition => "+",
            ExpressionKind::Subtraction => "-",
            ExpressionKind::Multiplication => "*",
            ExpressionKind::Division => "/",
            ExpressionKind::Modulo => "%",
            ExpressionKind::Power => "^",
            ExpressionKind::Equals => "=",
            ExpressionKind::NotEquals => "!=",
            ExpressionKind::LessThan => "<",
            ExpressionKind::LessThanEquals => "<=",
            ExpressionKind::GreaterThan => ">",
            ExpressionKind::GreaterThanEquals => ">=",
            ExpressionKind::Like => "LIKE",
            ExpressionKind::NotLike => "NOT LIKE",
            ExpressionKind::Between => "BETWEEN",
            ExpressionKind::And => "AND",
            ExpressionKind::Or => "OR",
            ExpressionKind::Not => "NOT",
            ExpressionKind::Exists => "EXISTS",
            _ => "",
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, is_root: bool) -> fmt::Result
    where
        C: fmt::Display,
    {
        match &self.kind {
            ExpressionKind::Literal(Value::Null) => return write!(f, "NULL"),
            ExpressionKind::Literal(Value::String(s)) => return write!(f, "\"{}\"", s),
            ExpressionKind::Literal(value) => return write!(f, "{}", value),
            ExpressionKind::Column(reference) => return write!(f, "{}", reference),
            ExpressionKind::Star(Some(table)) => return write!(f, "{}.*", table),
            ExpressionKind::Star(None) => return write!(f, "*"),
            ExpressionKind::Placeholder(index) => return write!(f, "?{}", index),
            ExpressionKind::Function(function) => {
                write!(f, "{}(", function)?;
                if let Some(argument) = self.arguments.first() {
                    argument.write(f, true)?;
                }
                return write!(f, ")");
            }
            _ => {}
        }

        let left = self.left.as_ref().expect("operator needs left child");
        if self.is_binary_operator() {
            let right = self.right.as_ref().expect("binary operator needs both children");
            // Keep the root bare: "5 + (a * 3)", not "(5 + (a * 3))"
            if !is_root {
                write!(f, "(")?;
            }
            left.write(f, false)?;
            write!(f, " {} ", self.operator_token())?;
            right.write(f, false)?;
            if !is_root {
                write!(f, ")")?;
            }
        } else {
            if !is_root {
                write!(f, "(")?;
            }
            write!(f, "{} ", self.operator_token())?;
            left.write(f, false)?;
            if !is_root {
                write!(f, ")")?;
            }
        }
        Ok(())
    }
}

impl<C: Clone + PartialEq + fmt::Debug + fmt::Display> fmt::Display for Expression<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, true)
    }
}

/// A scan parameter: a typed value, a column reference, or a positional
/// placeholder bound at `recreate` time by prepared statements.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue<C> {
    Value(Value),
    Column(C),
    Placeholder(u16),
}

impl<C: fmt::Display> fmt::Display for ParameterValue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Value(value) => write!(f, "{}", value),
            ParameterValue::Column(reference) => write!(f, "{}", reference),
            ParameterValue::Placeholder(index) => write!(f, "Placeholder #{}", index),
        }
    }
}
