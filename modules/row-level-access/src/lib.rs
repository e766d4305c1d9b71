#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Row level access rules for sea-orm queries.
//!
//! Rules are configured per model in `rla.yml`:
//!
//! ```yaml
//! Contact:
//!   field: Customer.team_id
//!   user_method: team_ids
//!   joins:
//!     - [Contact.customer_id, Customer.id]
//! Invoice:
//!   type: no_op
//! ```
//!
//! Before a SELECT runs, [`RowLevelAccess::on_before_select`] looks up the
//! rule for the model and lets it add joins and filters derived from the
//! request's [`SecurityContext`](rla_security::SecurityContext).

pub mod behavior;
pub mod config;
pub mod error;
pub mod registry;
pub mod rule;
pub mod select;
pub mod types;

pub use behavior::RowLevelAccess;
pub use config::{RlaSettings, RuleDefinition, RuleDefinitions, load_configuration};
pub use error::{ConfigError, InvalidArgument, JoinSide, RlaError, SetupError};
pub use registry::{DEFAULT_RULE_TYPE, RuleRegistry, RuleSet};
pub use rule::{FieldEqualsUserMethodRule, GenerateContext, JoinPair, NoOpRule, Rule};
pub use select::RestrictedSelectExt;
pub use types::{BuildContext, FieldEqualsUserMethodOptions, RuleOptions, RuleTypes, parse_options};
