#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Query criteria for row level access rules.
//!
//! A [`Criteria`] collects the joins and per-column filters that rules add
//! to a SELECT. It is applied onto a sea-orm `Select<E>` with
//! [`Criteria::apply_to`] or rendered standalone with
//! [`Criteria::to_statement`].
//!
//! Rules refer to columns through field identifiers which the
//! [`SchemaCatalog`] resolves to [`ColumnRef`]s.
//!
//! ```rust
//! use rla_db::{ColumnRef, Criteria, Criterion};
//!
//! let mut criteria = Criteria::new("contact");
//! criteria.add_or(Criterion::equal(ColumnRef::new("contact", "owner_id"), 7));
//! assert_eq!(criteria.criterions().len(), 1);
//! ```

pub mod cond;
pub mod criteria;
pub mod schema;

pub use cond::criterion_condition;
pub use criteria::{ColumnRef, Comparison, Conjunction, Criteria, Criterion, Join, JoinKind};
pub use schema::{
    EntitySchema, ModelSchema, SchemaCatalog, StaticModelSchema, normalize_model_name,
};
