//! Rules and the built-in rule types.

use std::fmt;

use rla_db::{ColumnRef, Criteria, Criterion, SchemaCatalog};
use rla_security::{BoundUserMethod, ScalarValue, SecurityContext, UserValue};
use serde::{Deserialize, Serialize};

use crate::error::{InvalidArgument, JoinSide, RlaError, SetupError};

/// What a rule needs from the request while generating its filter.
#[derive(Clone, Copy, Debug)]
pub struct GenerateContext<'a> {
    security_context: &'a SecurityContext,
    schema: &'a SchemaCatalog,
}

impl<'a> GenerateContext<'a> {
    #[must_use]
    pub fn new(security_context: &'a SecurityContext, schema: &'a SchemaCatalog) -> Self {
        Self {
            security_context,
            schema,
        }
    }

    #[must_use]
    pub fn security_context(&self) -> &'a SecurityContext {
        self.security_context
    }

    #[must_use]
    pub fn schema(&self) -> &'a SchemaCatalog {
        self.schema
    }
}

/// Restriction strategy for one model.
///
/// Implementations only ever add joins and criteria to the criteria they
/// receive. The default implementation leaves it untouched.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Identifier the rule type is registered under.
    fn type_name(&self) -> &str;

    /// Alter `criteria` so the query only returns permitted rows.
    ///
    /// # Errors
    ///
    /// Returns an [`RlaError`] when the rule cannot produce its filter; the
    /// query must not run unrestricted in that case.
    fn generate<'c>(
        &self,
        criteria: &'c mut Criteria,
        _ctx: &GenerateContext<'_>,
    ) -> Result<&'c mut Criteria, RlaError> {
        Ok(criteria)
    }
}

/// Rule that never restricts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRule;

impl NoOpRule {
    pub const TYPE_NAME: &'static str = "no_op";
}

impl Rule for NoOpRule {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }
}

/// Ordered `(from, to)` pair of field identifiers joined before filtering.
///
/// Deserializes from a two-element list: `[Contact.customer_id, Customer.id]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct JoinPair {
    from: String,
    to: String,
}

impl JoinPair {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Field joined from, on the restricted model's side.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.from
    }

    /// Field joined to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.to
    }
}

impl TryFrom<Vec<String>> for JoinPair {
    type Error = String;

    fn try_from(fields: Vec<String>) -> Result<Self, Self::Error> {
        match <[String; 2]>::try_from(fields) {
            Ok([from, to]) => Ok(Self { from, to }),
            Err(fields) => Err(format!(
                "a join is a [from, to] pair of fields, got {} element(s)",
                fields.len()
            )),
        }
    }
}

impl From<JoinPair> for Vec<String> {
    fn from(pair: JoinPair) -> Self {
        vec![pair.from, pair.to]
    }
}

/// Restricts `field` to the value(s) a user method returns for the current
/// security context.
///
/// A list result becomes `field = v1 OR field = v2 ...`; an empty list
/// matches no rows; `Null` leaves the query unrestricted.
#[derive(Debug, Clone)]
pub struct FieldEqualsUserMethodRule {
    field: String,
    user_method: Option<BoundUserMethod>,
    joins: Vec<JoinPair>,
}

impl FieldEqualsUserMethodRule {
    pub const TYPE_NAME: &'static str = "field_equals_user_method";

    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            user_method: None,
            joins: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_user_method(mut self, user_method: BoundUserMethod) -> Self {
        self.user_method = Some(user_method);
        self
    }

    #[must_use]
    pub fn with_joins(mut self, joins: impl IntoIterator<Item = JoinPair>) -> Self {
        self.joins.extend(joins);
        self
    }

    pub fn add_join(&mut self, join: JoinPair) -> &mut Self {
        self.joins.push(join);
        self
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn user_method(&self) -> Option<&BoundUserMethod> {
        self.user_method.as_ref()
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinPair] {
        &self.joins
    }

    fn resolve_joins(
        &self,
        schema: &SchemaCatalog,
    ) -> Result<Vec<(ColumnRef, ColumnRef)>, InvalidArgument> {
        self.joins
            .iter()
            .enumerate()
            .map(|(index, join)| {
                let from = resolve_join_side(schema, index, JoinSide::From, join.source())?;
                let to = resolve_join_side(schema, index, JoinSide::To, join.target())?;
                Ok((from, to))
            })
            .collect()
    }
}

impl Rule for FieldEqualsUserMethodRule {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn generate<'c>(
        &self,
        criteria: &'c mut Criteria,
        ctx: &GenerateContext<'_>,
    ) -> Result<&'c mut Criteria, RlaError> {
        let method = self
            .user_method
            .as_ref()
            .ok_or_else(|| SetupError::UserMethodNotSet {
                field: self.field.clone(),
            })?;

        let Some(values) = filter_values(method.name(), method.call(ctx.security_context()))?
        else {
            tracing::debug!(
                field = %self.field,
                user_method = method.name(),
                "user method returned null, query left unrestricted"
            );
            return Ok(criteria);
        };

        // Resolve everything before touching the criteria.
        let joins = self.resolve_joins(ctx.schema())?;
        let column =
            ctx.schema()
                .resolve(&self.field)
                .ok_or_else(|| InvalidArgument::UnknownField {
                    field: self.field.clone(),
                })?;

        for (from, to) in joins {
            criteria.add_join(from, to);
        }

        tracing::debug!(
            column = %column,
            user_method = method.name(),
            values = values.len(),
            "restricting query"
        );
        criteria.add_or(or_chain(column, values));
        Ok(criteria)
    }
}

fn resolve_join_side(
    schema: &SchemaCatalog,
    index: usize,
    side: JoinSide,
    identifier: &str,
) -> Result<ColumnRef, InvalidArgument> {
    schema
        .resolve(identifier)
        .ok_or_else(|| InvalidArgument::InvalidJoin {
            index,
            side,
            identifier: identifier.to_owned(),
        })
}

/// Flatten a user method result into the values to match. `None` means
/// no restriction.
fn filter_values(
    method: &str,
    value: UserValue,
) -> Result<Option<Vec<ScalarValue>>, InvalidArgument> {
    let unsupported = |kind: &'static str| InvalidArgument::UnsupportedValue {
        method: method.to_owned(),
        kind,
    };
    match value {
        UserValue::Null => Ok(None),
        UserValue::Scalar(scalar) => Ok(Some(vec![scalar])),
        UserValue::Object(_) => value
            .to_scalar()
            .map(|scalar| Some(vec![scalar]))
            .ok_or_else(|| unsupported("object")),
        UserValue::List(items) => items
            .iter()
            .map(|item| item.to_scalar().ok_or_else(|| unsupported(item.kind())))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        UserValue::Map(_) => Err(unsupported("map")),
    }
}

fn or_chain(column: ColumnRef, values: Vec<ScalarValue>) -> Criterion {
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return Criterion::is_in(column, Vec::new());
    };
    let head = Criterion::equal(column.clone(), first);
    values.fold(head, |chain, value| {
        chain.or(Criterion::equal(column.clone(), value))
    })
}
