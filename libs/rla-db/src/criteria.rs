use std::fmt;

use rla_security::ScalarValue;

/// A resolved `(table, column)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    table: String,
    column: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[inline]
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Join flavour. `Inner` is the default used by rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

/// `JOIN <other table> ON left = right`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    left: ColumnRef,
    right: ColumnRef,
    kind: JoinKind,
}

impl Join {
    #[must_use]
    pub fn new(left: ColumnRef, right: ColumnRef, kind: JoinKind) -> Self {
        Self { left, right, kind }
    }

    #[must_use]
    pub fn left(&self) -> &ColumnRef {
        &self.left
    }

    #[must_use]
    pub fn right(&self) -> &ColumnRef {
        &self.right
    }

    #[must_use]
    pub fn kind(&self) -> JoinKind {
        self.kind
    }
}

/// The test a [`Criterion`] applies to its column.
#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    Equal(ScalarValue),
    NotEqual(ScalarValue),
    /// Set membership. An empty set matches no rows.
    In(Vec<ScalarValue>),
    IsNull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// A comparison on one column, with further criteria chained by AND / OR.
///
/// Chained clauses are combined left to right:
/// `a.or(b).and(c)` reads as `(a OR b) AND c`.
#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    column: ColumnRef,
    comparison: Comparison,
    clauses: Vec<(Conjunction, Criterion)>,
}

impl Criterion {
    #[must_use]
    pub fn new(column: ColumnRef, comparison: Comparison) -> Self {
        Self {
            column,
            comparison,
            clauses: Vec::new(),
        }
    }

    #[must_use]
    pub fn equal(column: ColumnRef, value: impl Into<ScalarValue>) -> Self {
        Self::new(column, Comparison::Equal(value.into()))
    }

    #[must_use]
    pub fn not_equal(column: ColumnRef, value: impl Into<ScalarValue>) -> Self {
        Self::new(column, Comparison::NotEqual(value.into()))
    }

    #[must_use]
    pub fn is_in(column: ColumnRef, values: Vec<ScalarValue>) -> Self {
        Self::new(column, Comparison::In(values))
    }

    #[must_use]
    pub fn is_null(column: ColumnRef) -> Self {
        Self::new(column, Comparison::IsNull)
    }

    /// Chain `other` with OR.
    #[must_use]
    pub fn or(mut self, other: Criterion) -> Self {
        self.clauses.push((Conjunction::Or, other));
        self
    }

    /// Chain `other` with AND.
    #[must_use]
    pub fn and(mut self, other: Criterion) -> Self {
        self.clauses.push((Conjunction::And, other));
        self
    }

    #[must_use]
    pub fn column(&self) -> &ColumnRef {
        &self.column
    }

    #[must_use]
    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    #[must_use]
    pub fn clauses(&self) -> &[(Conjunction, Criterion)] {
        &self.clauses
    }

    /// Number of comparisons in this criterion, chained ones included.
    #[must_use]
    pub fn comparison_count(&self) -> usize {
        1 + self
            .clauses
            .iter()
            .map(|(_, c)| c.comparison_count())
            .sum::<usize>()
    }
}

/// Filters and joins accumulated for one SELECT on `table`.
///
/// Holds at most one [`Criterion`] per column; top-level criteria are ANDed
/// when the query is built. Rules only ever append to a `Criteria`.
#[derive(Clone, Debug, PartialEq)]
pub struct Criteria {
    table: String,
    joins: Vec<Join>,
    criterions: Vec<Criterion>,
}

impl Criteria {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            joins: Vec::new(),
            criterions: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    #[must_use]
    pub fn criterions(&self) -> &[Criterion] {
        &self.criterions
    }

    /// The criterion currently held for `column`, if any.
    #[must_use]
    pub fn criterion_for(&self, column: &ColumnRef) -> Option<&Criterion> {
        self.criterions.iter().find(|c| c.column() == column)
    }

    /// `true` when neither joins nor criteria have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.criterions.is_empty()
    }

    /// Set the criterion for its column, replacing any existing one.
    pub fn add(&mut self, criterion: Criterion) -> &mut Self {
        match self.position_of(criterion.column()) {
            Some(idx) => self.criterions[idx] = criterion,
            None => self.criterions.push(criterion),
        }
        self
    }

    /// AND `criterion` into the existing criterion on the same column, or
    /// append it when the column has none yet.
    pub fn add_and(&mut self, criterion: Criterion) -> &mut Self {
        self.merge(criterion, Conjunction::And)
    }

    /// OR `criterion` into the existing criterion on the same column, or
    /// append it when the column has none yet.
    pub fn add_or(&mut self, criterion: Criterion) -> &mut Self {
        self.merge(criterion, Conjunction::Or)
    }

    /// Add an inner join. Identical joins are only added once.
    pub fn add_join(&mut self, left: ColumnRef, right: ColumnRef) -> &mut Self {
        self.add_join_with(left, right, JoinKind::default())
    }

    pub fn add_join_with(&mut self, left: ColumnRef, right: ColumnRef, kind: JoinKind) -> &mut Self {
        let join = Join::new(left, right, kind);
        if self.joins.contains(&join) {
            tracing::trace!(left = %join.left, right = %join.right, "join already present");
        } else {
            self.joins.push(join);
        }
        self
    }

    fn position_of(&self, column: &ColumnRef) -> Option<usize> {
        self.criterions.iter().position(|c| c.column() == column)
    }

    fn merge(&mut self, criterion: Criterion, conjunction: Conjunction) -> &mut Self {
        match self.position_of(criterion.column()) {
            Some(idx) => self.criterions[idx].clauses.push((conjunction, criterion)),
            None => self.criterions.push(criterion),
        }
        self
    }
}
