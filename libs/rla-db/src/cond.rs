//! Translation of [`Criteria`] into sea-orm / sea-query structures.

use rla_security::ScalarValue;
use sea_orm::sea_query::{Alias, Asterisk, Expr, Query, SelectStatement, SimpleExpr};
use sea_orm::{Condition, EntityTrait, JoinType, QueryFilter, QuerySelect, Select};

use crate::criteria::{ColumnRef, Comparison, Conjunction, Criteria, Criterion, Join, JoinKind};

fn scalar_to_sea_value(v: &ScalarValue) -> sea_orm::Value {
    match v {
        ScalarValue::Uuid(u) => sea_orm::Value::from(*u),
        ScalarValue::String(s) => sea_orm::Value::from(s.clone()),
        ScalarValue::Int(n) => sea_orm::Value::from(*n),
        ScalarValue::Float(n) => sea_orm::Value::from(*n),
        ScalarValue::Bool(b) => sea_orm::Value::from(*b),
    }
}

fn column_expr(column: &ColumnRef) -> Expr {
    Expr::col((Alias::new(column.table()), Alias::new(column.column())))
}

fn comparison_expr(column: &ColumnRef, comparison: &Comparison) -> SimpleExpr {
    match comparison {
        Comparison::Equal(v) => column_expr(column).eq(Expr::value(scalar_to_sea_value(v))),
        Comparison::NotEqual(v) => column_expr(column).ne(Expr::value(scalar_to_sea_value(v))),
        // Empty set: match nothing
        Comparison::In(values) if values.is_empty() => Expr::value(false),
        Comparison::In(values) => {
            column_expr(column).is_in(values.iter().map(scalar_to_sea_value))
        }
        Comparison::IsNull => column_expr(column).is_null(),
    }
}

fn join_type(kind: JoinKind) -> JoinType {
    match kind {
        JoinKind::Inner => JoinType::InnerJoin,
        JoinKind::Left => JoinType::LeftJoin,
        JoinKind::Right => JoinType::RightJoin,
    }
}

/// Build the condition for one criterion and its chained clauses.
///
/// Consecutive clauses with the same conjunction are flattened into one
/// group; a change of conjunction wraps everything so far.
#[must_use]
pub fn criterion_condition(criterion: &Criterion) -> Condition {
    let mut acc = Condition::all().add(comparison_expr(criterion.column(), criterion.comparison()));
    let mut acc_conjunction: Option<Conjunction> = None;

    for (conjunction, other) in criterion.clauses() {
        let rhs = criterion_condition(other);
        if acc_conjunction == Some(*conjunction) {
            acc = acc.add(rhs);
        } else {
            let group = match conjunction {
                Conjunction::And => Condition::all(),
                Conjunction::Or => Condition::any(),
            };
            acc = group.add(acc).add(rhs);
            acc_conjunction = Some(*conjunction);
        }
    }
    acc
}

impl Criteria {
    /// AND of all top-level criteria. No criteria yields `Condition::all()`
    /// (no filtering).
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        self.criterions()
            .iter()
            .fold(Condition::all(), |cond, c| cond.add(criterion_condition(c)))
    }

    /// The table a join brings into the query: whichever side is not the
    /// criteria's base table.
    fn joined_table<'a>(&self, join: &'a Join) -> &'a str {
        if join.right().table() == self.table() {
            join.left().table()
        } else {
            join.right().table()
        }
    }

    fn apply_joins(&self, stmt: &mut SelectStatement) {
        for join in self.joins() {
            stmt.join(
                join_type(join.kind()),
                Alias::new(self.joined_table(join)),
                column_expr(join.left()).equals((
                    Alias::new(join.right().table()),
                    Alias::new(join.right().column()),
                )),
            );
        }
    }

    /// Apply joins and criteria onto a sea-orm select.
    ///
    /// The criteria are ANDed with whatever the select already filters on.
    #[must_use]
    pub fn apply_to<E: EntityTrait>(&self, mut select: Select<E>) -> Select<E> {
        self.apply_joins(QuerySelect::query(&mut select));
        if self.criterions().is_empty() {
            select
        } else {
            select.filter(self.to_condition())
        }
    }

    /// Standalone `SELECT * FROM <table> ...` statement for these criteria.
    #[must_use]
    pub fn to_statement(&self) -> SelectStatement {
        let mut stmt = Query::select()
            .column(Asterisk)
            .from(Alias::new(self.table()))
            .to_owned();
        self.apply_joins(&mut stmt);
        if !self.criterions().is_empty() {
            stmt.cond_where(self.to_condition());
        }
        stmt
    }
}
