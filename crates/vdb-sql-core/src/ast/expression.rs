//! Expression AST types.

use core::fmt;

use super::statement::{OrderBy, SelectStatement};
use super::write_ident;
use crate::lexer::Span;

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    String(String),
    /// Boolean literal.
    Boolean(bool),
    /// NULL literal.
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            // Whole floats keep their decimal point so they re-parse as
            // floats.
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Null => f.write_str("NULL"),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,

    // String
    Concat,
}

impl BinaryOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Concat => "||",
        }
    }

    /// Returns true for `= != < <= > >=`.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
    /// Identity (+)
    Pos,
    /// Logical NOT
    Not,
}

impl UnaryOp {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Pos => "+",
            Self::Not => "NOT",
        }
    }
}

/// Quantifier for `ALL` / `ANY` subquery comparisons. `SOME` parses as `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// Comparison must hold for every subquery row.
    All,
    /// Comparison must hold for at least one subquery row.
    Any,
}

impl Quantifier {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Any => "ANY",
        }
    }
}

/// A niladic datetime function, written without parentheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiladicFunction {
    /// `CURRENT_DATE`, formatted `YYYY-MM-DD`.
    CurrentDate,
    /// `CURRENT_TIME`, formatted `HH:MM:SS`.
    CurrentTime,
    /// `CURRENT_TIMESTAMP`, formatted `YYYY-MM-DD HH:MM:SS`.
    CurrentTimestamp,
}

impl NiladicFunction {
    /// Returns the SQL spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentDate => "CURRENT_DATE",
            Self::CurrentTime => "CURRENT_TIME",
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP",
        }
    }
}

/// A function call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// The function name (stored uppercase).
    pub name: String,
    /// The arguments; `COUNT(*)` carries a single [`Expr::Wildcard`].
    pub args: Vec<Expr>,
    /// Whether DISTINCT was specified.
    pub distinct: bool,
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// The `OVER (...)` clause of a window function call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverClause {
    /// PARTITION BY expressions.
    pub partition_by: Vec<Expr>,
    /// ORDER BY entries within the partition.
    pub order_by: Vec<OrderBy>,
}

impl fmt::Display for OverClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OVER (")?;
        let mut need_space = false;
        if !self.partition_by.is_empty() {
            f.write_str("PARTITION BY ")?;
            for (i, e) in self.partition_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{e}")?;
            }
            need_space = true;
        }
        if !self.order_by.is_empty() {
            if need_space {
                f.write_str(" ")?;
            }
            f.write_str("ORDER BY ")?;
            for (i, o) in self.order_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{o}")?;
            }
        }
        f.write_str(")")
    }
}

/// An SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Literal),

    /// A column reference (optionally qualified with a table name or alias).
    Column {
        /// Table name or alias (optional).
        table: Option<String>,
        /// Column name.
        name: String,
        /// Source span.
        span: Span,
    },

    /// A parameter placeholder: positional `?` or named `:name`.
    Parameter {
        /// The parameter name for `:name` placeholders.
        name: Option<String>,
        /// 1-based position in lexical order, for positional placeholders.
        position: usize,
    },

    /// A unary expression.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },

    /// A binary expression.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// A function call.
    Function(FunctionCall),

    /// A niladic datetime function (`CURRENT_DATE` and friends).
    Niladic(NiladicFunction),

    /// A window function call (`func(...) OVER (...)`).
    WindowFunction {
        /// The function being windowed.
        call: FunctionCall,
        /// The OVER clause.
        over: OverClause,
    },

    /// CASE expression, simple (with operand) or searched.
    Case {
        /// The operand of a simple CASE, if any.
        operand: Option<Box<Expr>>,
        /// WHEN/THEN pairs.
        when_clauses: Vec<(Expr, Expr)>,
        /// ELSE result.
        else_clause: Option<Box<Expr>>,
    },

    /// BETWEEN expression.
    Between {
        /// The expression to test.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// Whether this is NOT BETWEEN.
        negated: bool,
    },

    /// IN with an explicit value list.
    InList {
        /// The expression to test.
        expr: Box<Expr>,
        /// The candidate values.
        list: Vec<Expr>,
        /// Whether this is NOT IN.
        negated: bool,
    },

    /// IN with a subquery.
    InSubquery {
        /// The expression to test.
        expr: Box<Expr>,
        /// The subquery producing candidates.
        subquery: Box<SelectStatement>,
        /// Whether this is NOT IN.
        negated: bool,
    },

    /// LIKE pattern match.
    Like {
        /// The expression to test.
        expr: Box<Expr>,
        /// The pattern (`%` and `_` wildcards).
        pattern: Box<Expr>,
        /// Whether this is NOT LIKE.
        negated: bool,
    },

    /// IS [NOT] NULL test.
    IsNull {
        /// The expression to test.
        expr: Box<Expr>,
        /// Whether this is IS NOT NULL.
        negated: bool,
    },

    /// EXISTS (subquery).
    Exists(Box<SelectStatement>),

    /// A scalar subquery.
    Subquery(Box<SelectStatement>),

    /// A quantified comparison: `expr op ALL|ANY (subquery)`.
    Quantified {
        /// Left operand.
        left: Box<Expr>,
        /// Comparison operator.
        op: BinaryOp,
        /// ALL or ANY.
        quantifier: Quantifier,
        /// The subquery producing comparison candidates.
        subquery: Box<SelectStatement>,
    },

    /// A parenthesized expression (preserved for faithful rendering).
    Paren(Box<Expr>),

    /// Wildcard (`*` or `t.*`) in a select list or `COUNT(*)`.
    Wildcard {
        /// Table qualifier (optional).
        table: Option<String>,
    },
}

impl Expr {
    /// Creates a column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            table: None,
            name: name.into(),
            span: Span::default(),
        }
    }

    /// Creates a qualified column reference.
    #[must_use]
    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column {
            table: Some(table.into()),
            name: name.into(),
            span: Span::default(),
        }
    }

    /// Creates an integer literal.
    #[must_use]
    pub const fn integer(value: i64) -> Self {
        Self::Literal(Literal::Integer(value))
    }

    /// Creates a float literal.
    #[must_use]
    pub const fn float(value: f64) -> Self {
        Self::Literal(Literal::Float(value))
    }

    /// Creates a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    /// Creates a NULL literal.
    #[must_use]
    pub const fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    /// Creates a binary expression.
    #[must_use]
    pub fn binary(self, op: BinaryOp, right: Self) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right),
        }
    }

    /// Creates an equality comparison.
    #[must_use]
    pub fn eq(self, right: Self) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    /// Creates an AND conjunction.
    #[must_use]
    pub fn and(self, right: Self) -> Self {
        self.binary(BinaryOp::And, right)
    }

    /// Creates an OR disjunction.
    #[must_use]
    pub fn or(self, right: Self) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    /// Creates a LIKE predicate.
    #[must_use]
    pub fn like(self, pattern: Self) -> Self {
        Self::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern),
            negated: false,
        }
    }

    /// Creates an IN-list predicate. An empty list is preserved as-is;
    /// consumers decide its truth value.
    #[must_use]
    pub fn in_list(self, list: Vec<Self>) -> Self {
        Self::InList {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    /// Visits every column reference in this expression tree, not
    /// descending into subqueries (their columns resolve in their own
    /// scope).
    pub fn for_each_column<F>(&self, f: &mut F)
    where
        F: FnMut(Option<&str>, &str),
    {
        match self {
            Self::Column { table, name, .. } => f(table.as_deref(), name),
            Self::Unary { operand, .. } => operand.for_each_column(f),
            Self::Binary { left, right, .. } => {
                left.for_each_column(f);
                right.for_each_column(f);
            }
            Self::Function(call) | Self::WindowFunction { call, .. } => {
                for arg in &call.args {
                    arg.for_each_column(f);
                }
                if let Self::WindowFunction { over, .. } = self {
                    for e in &over.partition_by {
                        e.for_each_column(f);
                    }
                    for o in &over.order_by {
                        o.expr.for_each_column(f);
                    }
                }
            }
            Self::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    op.for_each_column(f);
                }
                for (when, then) in when_clauses {
                    when.for_each_column(f);
                    then.for_each_column(f);
                }
                if let Some(e) = else_clause {
                    e.for_each_column(f);
                }
            }
            Self::Between {
                expr, low, high, ..
            } => {
                expr.for_each_column(f);
                low.for_each_column(f);
                high.for_each_column(f);
            }
            Self::InList { expr, list, .. } => {
                expr.for_each_column(f);
                for e in list {
                    e.for_each_column(f);
                }
            }
            Self::InSubquery { expr, .. } => expr.for_each_column(f),
            Self::Like { expr, pattern, .. } => {
                expr.for_each_column(f);
                pattern.for_each_column(f);
            }
            Self::IsNull { expr, .. } => expr.for_each_column(f),
            Self::Quantified { left, .. } => left.for_each_column(f),
            Self::Paren(inner) => inner.for_each_column(f),
            Self::Literal(_)
            | Self::Parameter { .. }
            | Self::Niladic(_)
            | Self::Exists(_)
            | Self::Subquery(_)
            | Self::Wildcard { .. } => {}
        }
    }

    /// Returns true if this expression contains an aggregate function call
    /// (outside of subqueries).
    #[must_use]
    pub fn contains_aggregate(&self, is_aggregate: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Self::Function(call) => {
                is_aggregate(&call.name)
                    || call.args.iter().any(|a| a.contains_aggregate(is_aggregate))
            }
            Self::Unary { operand, .. } => operand.contains_aggregate(is_aggregate),
            Self::Binary { left, right, .. } => {
                left.contains_aggregate(is_aggregate) || right.contains_aggregate(is_aggregate)
            }
            Self::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                operand
                    .as_deref()
                    .is_some_and(|e| e.contains_aggregate(is_aggregate))
                    || when_clauses.iter().any(|(w, t)| {
                        w.contains_aggregate(is_aggregate) || t.contains_aggregate(is_aggregate)
                    })
                    || else_clause
                        .as_deref()
                        .is_some_and(|e| e.contains_aggregate(is_aggregate))
            }
            Self::Between {
                expr, low, high, ..
            } => {
                expr.contains_aggregate(is_aggregate)
                    || low.contains_aggregate(is_aggregate)
                    || high.contains_aggregate(is_aggregate)
            }
            Self::InList { expr, list, .. } => {
                expr.contains_aggregate(is_aggregate)
                    || list.iter().any(|e| e.contains_aggregate(is_aggregate))
            }
            Self::InSubquery { expr, .. } | Self::IsNull { expr, .. } => {
                expr.contains_aggregate(is_aggregate)
            }
            Self::Like { expr, pattern, .. } => {
                expr.contains_aggregate(is_aggregate) || pattern.contains_aggregate(is_aggregate)
            }
            Self::Quantified { left, .. } => left.contains_aggregate(is_aggregate),
            Self::Paren(inner) => inner.contains_aggregate(is_aggregate),
            Self::Literal(_)
            | Self::Column { .. }
            | Self::Parameter { .. }
            | Self::Niladic(_)
            | Self::WindowFunction { .. }
            | Self::Exists(_)
            | Self::Subquery(_)
            | Self::Wildcard { .. } => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Column { table, name, .. } => {
                if let Some(t) = table {
                    write_ident(f, t)?;
                    f.write_str(".")?;
                }
                write_ident(f, name)
            }
            Self::Parameter { name, .. } => match name {
                Some(n) => write!(f, ":{n}"),
                None => f.write_str("?"),
            },
            Self::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {operand}"),
                _ => write!(f, "{}{operand}", op.as_str()),
            },
            Self::Binary { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::Function(call) => write!(f, "{call}"),
            Self::Niladic(n) => f.write_str(n.as_str()),
            Self::WindowFunction { call, over } => write!(f, "{call} {over}"),
            Self::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                f.write_str("CASE")?;
                if let Some(op) = operand {
                    write!(f, " {op}")?;
                }
                for (when, then) in when_clauses {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(e) = else_clause {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            Self::Between {
                expr,
                low,
                high,
                negated,
            } => {
                write!(f, "{expr} ")?;
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "BETWEEN {low} AND {high}")
            }
            Self::InList { expr, list, negated } => {
                write!(f, "{expr} ")?;
                if *negated {
                    f.write_str("NOT ")?;
                }
                f.write_str("IN (")?;
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
            Self::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                write!(f, "{expr} ")?;
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "IN ({subquery})")
            }
            Self::Like {
                expr,
                pattern,
                negated,
            } => {
                write!(f, "{expr} ")?;
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "LIKE {pattern}")
            }
            Self::IsNull { expr, negated } => {
                write!(f, "{expr} IS ")?;
                if *negated {
                    f.write_str("NOT ")?;
                }
                f.write_str("NULL")
            }
            Self::Exists(subquery) => write!(f, "EXISTS ({subquery})"),
            Self::Subquery(subquery) => write!(f, "({subquery})"),
            Self::Quantified {
                left,
                op,
                quantifier,
                subquery,
            } => write!(f, "{left} {op} {} ({subquery})", quantifier.as_str()),
            Self::Paren(inner) => write!(f, "({inner})"),
            Self::Wildcard { table } => {
                if let Some(t) = table {
                    write_ident(f, t)?;
                    f.write_str(".")?;
                }
                f.write_str("*")
            }
        }
    }
}
