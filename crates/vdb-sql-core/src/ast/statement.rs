//! SQL statement AST types.

use core::fmt;

use super::expression::Expr;
use super::types::DataType;
use super::write_ident;

/// Order direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order (default).
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// The expression to order by.
    pub expr: Expr,
    /// The direction.
    pub direction: OrderDirection,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, self.direction)
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    Left,
    /// RIGHT OUTER JOIN.
    Right,
    /// FULL OUTER JOIN.
    Full,
    /// CROSS JOIN.
    Cross,
}

impl JoinType {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }

    /// Returns true for LEFT, RIGHT and FULL joins.
    #[must_use]
    pub const fn is_outer(&self) -> bool {
        matches!(self, Self::Left | Self::Right | Self::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A JOIN onto a table reference.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// The type of join.
    pub join_type: JoinType,
    /// The table to join.
    pub table: TableRef,
    /// The ON predicate (absent for CROSS joins).
    pub on: Option<Expr>,
}

/// A table reference in a FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// A named table.
    Table {
        /// Table name.
        name: String,
        /// Alias.
        alias: Option<String>,
    },
    /// A derived table.
    Subquery {
        /// The subquery.
        query: Box<SelectStatement>,
        /// Alias (required for derived tables).
        alias: String,
    },
    /// A join tree.
    Join {
        /// Left side of the join.
        left: Box<TableRef>,
        /// The join clause.
        join: Box<JoinClause>,
    },
}

impl TableRef {
    /// Creates a named table reference.
    #[must_use]
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table {
            name: name.into(),
            alias: None,
        }
    }

    /// Returns the alias (or name) this reference binds in scope, if it is
    /// not a join tree.
    #[must_use]
    pub fn binding_name(&self) -> Option<&str> {
        match self {
            Self::Table { name, alias } => Some(alias.as_deref().unwrap_or(name)),
            Self::Subquery { alias, .. } => Some(alias),
            Self::Join { .. } => None,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table { name, alias } => {
                write_ident(f, name)?;
                if let Some(a) = alias {
                    f.write_str(" AS ")?;
                    write_ident(f, a)?;
                }
                Ok(())
            }
            Self::Subquery { query, alias } => {
                write!(f, "({query}) AS ")?;
                write_ident(f, alias)
            }
            Self::Join { left, join } => {
                write!(f, "{left} {} {}", join.join_type, join.table)?;
                if let Some(on) = &join.on {
                    write!(f, " ON {on}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single named CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    /// The CTE name.
    pub name: String,
    /// The defining query.
    pub query: SelectStatement,
}

/// The `WITH [RECURSIVE]` prologue of a SELECT.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WithClause {
    /// Whether RECURSIVE was specified.
    pub recursive: bool,
    /// The CTEs, in declaration order.
    pub ctes: Vec<Cte>,
}

impl fmt::Display for WithClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WITH ")?;
        if self.recursive {
            f.write_str("RECURSIVE ")?;
        }
        for (i, cte) in self.ctes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_ident(f, &cte.name)?;
            write!(f, " AS ({})", cte.query)?;
        }
        Ok(())
    }
}

/// A set operation combining two selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    /// UNION (deduplicating).
    Union,
    /// UNION ALL.
    UnionAll,
    /// INTERSECT.
    Intersect,
    /// EXCEPT.
    Except,
}

impl CompoundOp {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Intersect => "INTERSECT",
            Self::Except => "EXCEPT",
        }
    }

    /// Returns true if the combined result is deduplicated.
    #[must_use]
    pub const fn deduplicates(&self) -> bool {
        !matches!(self, Self::UnionAll)
    }
}

/// One arm of a compound select chain (left-associative).
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundSelect {
    /// The set operator joining this arm to everything before it.
    pub op: CompoundOp,
    /// The right-hand select.
    pub select: SelectStatement,
}

/// A select-list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    /// The projected expression; wildcards appear as [`Expr::Wildcard`].
    pub expr: Expr,
    /// Alias, if any.
    pub alias: Option<String>,
}

impl SelectColumn {
    /// Returns the output column name: the alias if present, the column
    /// name for plain references, otherwise the rendered expression text.
    #[must_use]
    pub fn output_name(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.expr {
            Expr::Column { name, .. } => name.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            f.write_str(" AS ")?;
            write_ident(f, alias)?;
        }
        Ok(())
    }
}

/// A SELECT statement.
///
/// ORDER BY, LIMIT and OFFSET on this node govern the whole compound chain
/// when `compounds` is non-empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    /// The WITH prologue.
    pub with: Option<WithClause>,
    /// Whether DISTINCT was specified.
    pub distinct: bool,
    /// The select list.
    pub columns: Vec<SelectColumn>,
    /// The FROM source (absent for expression-only selects).
    pub from: Option<TableRef>,
    /// The WHERE predicate.
    pub where_clause: Option<Expr>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expr>,
    /// HAVING predicate.
    pub having: Option<Expr>,
    /// Set-operation tail, left-associative.
    pub compounds: Vec<CompoundSelect>,
    /// ORDER BY entries.
    pub order_by: Vec<OrderBy>,
    /// LIMIT expression.
    pub limit: Option<Expr>,
    /// OFFSET expression.
    pub offset: Option<Expr>,
}

impl SelectStatement {
    /// Returns true when the statement has no clauses beyond the select
    /// list and FROM source (so new clauses can be merged in directly).
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.where_clause.is_none()
            && self.group_by.is_empty()
            && self.having.is_none()
            && self.compounds.is_empty()
            && self.order_by.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && !self.distinct
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(with) = &self.with {
            write!(f, "{with} ")?;
        }
        f.write_str("SELECT")?;
        if self.distinct {
            f.write_str(" DISTINCT")?;
        }
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {col}")?;
        }
        if let Some(from) = &self.from {
            write!(f, " FROM {from}")?;
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {w}")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY")?;
            for (i, g) in self.group_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, " {g}")?;
            }
        }
        if let Some(h) = &self.having {
            write!(f, " HAVING {h}")?;
        }
        for compound in &self.compounds {
            write!(f, " {} {}", compound.op.as_str(), compound.select)?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY")?;
            for (i, o) in self.order_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, " {o}")?;
            }
        }
        if let Some(l) = &self.limit {
            write!(f, " LIMIT {l}")?;
        }
        if let Some(o) = &self.offset {
            write!(f, " OFFSET {o}")?;
        }
        Ok(())
    }
}

/// An INSERT statement (`VALUES` form).
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    /// Target table.
    pub table: String,
    /// Column list (may be empty for full-row inserts).
    pub columns: Vec<String>,
    /// The value tuples.
    pub rows: Vec<Vec<Expr>>,
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("INSERT INTO ")?;
        write_ident(f, &self.table)?;
        if !self.columns.is_empty() {
            f.write_str(" (")?;
            for (i, col) in self.columns.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_ident(f, col)?;
            }
            f.write_str(")")?;
        }
        f.write_str(" VALUES")?;
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(" (")?;
            for (j, val) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{val}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// A single `col = expr` assignment in UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateAssignment {
    /// Target column.
    pub column: String,
    /// New value.
    pub value: Expr,
}

impl fmt::Display for UpdateAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ident(f, &self.column)?;
        write!(f, " = {}", self.value)
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    /// Target table.
    pub table: String,
    /// The SET assignments.
    pub assignments: Vec<UpdateAssignment>,
    /// The WHERE predicate.
    pub where_clause: Option<Expr>,
}

impl fmt::Display for UpdateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UPDATE ")?;
        write_ident(f, &self.table)?;
        f.write_str(" SET")?;
        for (i, a) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {a}")?;
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {w}")?;
        }
        Ok(())
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    /// Target table.
    pub table: String,
    /// The WHERE predicate.
    pub where_clause: Option<Expr>,
}

impl fmt::Display for DeleteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DELETE FROM ")?;
        write_ident(f, &self.table)?;
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {w}")?;
        }
        Ok(())
    }
}

/// A column specification in CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type; absent means TEXT.
    pub ty: Option<DataType>,
    /// PRIMARY KEY constraint.
    pub primary_key: bool,
    /// UNIQUE constraint.
    pub unique: bool,
    /// NOT NULL constraint.
    pub not_null: bool,
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ident(f, &self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, " {ty}")?;
        }
        if self.primary_key {
            f.write_str(" PRIMARY KEY")?;
        }
        if self.unique {
            f.write_str(" UNIQUE")?;
        }
        if self.not_null {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

/// A CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    /// Whether IF NOT EXISTS was specified.
    pub if_not_exists: bool,
    /// Table name.
    pub name: String,
    /// Column specifications.
    pub columns: Vec<ColumnSpec>,
}

impl fmt::Display for CreateTableStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CREATE TABLE ")?;
        if self.if_not_exists {
            f.write_str("IF NOT EXISTS ")?;
        }
        write_ident(f, &self.name)?;
        f.write_str(" (")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{col}")?;
        }
        f.write_str(")")
    }
}

/// A DROP TABLE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DropTableStatement {
    /// Whether IF EXISTS was specified.
    pub if_exists: bool,
    /// Table name.
    pub name: String,
}

impl fmt::Display for DropTableStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DROP TABLE ")?;
        if self.if_exists {
            f.write_str("IF EXISTS ")?;
        }
        write_ident(f, &self.name)
    }
}

/// A CREATE INDEX statement. Accepted and ignored by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    /// Index name.
    pub name: String,
    /// Indexed table.
    pub table: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Whether UNIQUE was specified.
    pub unique: bool,
}

impl fmt::Display for CreateIndexStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CREATE ")?;
        if self.unique {
            f.write_str("UNIQUE ")?;
        }
        f.write_str("INDEX ")?;
        write_ident(f, &self.name)?;
        f.write_str(" ON ")?;
        write_ident(f, &self.table)?;
        f.write_str(" (")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_ident(f, col)?;
        }
        f.write_str(")")
    }
}

/// A DROP INDEX statement. Accepted and ignored by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexStatement {
    /// Whether IF EXISTS was specified.
    pub if_exists: bool,
    /// Index name.
    pub name: String,
}

impl fmt::Display for DropIndexStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DROP INDEX ")?;
        if self.if_exists {
            f.write_str("IF EXISTS ")?;
        }
        write_ident(f, &self.name)
    }
}

/// A SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A SELECT statement.
    Select(SelectStatement),
    /// An INSERT statement.
    Insert(InsertStatement),
    /// An UPDATE statement.
    Update(UpdateStatement),
    /// A DELETE statement.
    Delete(DeleteStatement),
    /// A CREATE TABLE statement.
    CreateTable(CreateTableStatement),
    /// A DROP TABLE statement.
    DropTable(DropTableStatement),
    /// A CREATE INDEX statement.
    CreateIndex(CreateIndexStatement),
    /// A DROP INDEX statement.
    DropIndex(DropIndexStatement),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(s) => write!(f, "{s}"),
            Self::Insert(s) => write!(f, "{s}"),
            Self::Update(s) => write!(f, "{s}"),
            Self::Delete(s) => write!(f, "{s}"),
            Self::CreateTable(s) => write!(f, "{s}"),
            Self::DropTable(s) => write!(f, "{s}"),
            Self::CreateIndex(s) => write!(f, "{s}"),
            Self::DropIndex(s) => write!(f, "{s}"),
        }
    }
}
