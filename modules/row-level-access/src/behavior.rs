use std::sync::Arc;

use rla_db::{Criteria, SchemaCatalog, normalize_model_name};
use rla_security::SecurityContext;

use crate::error::RlaError;
use crate::registry::RuleRegistry;
use crate::rule::GenerateContext;

/// Entry point called before a SELECT is built for a model.
///
/// Cheap to clone; the registry and schema catalog are shared.
#[derive(Clone, Debug)]
pub struct RowLevelAccess {
    registry: Arc<RuleRegistry>,
    schema: Arc<SchemaCatalog>,
}

impl RowLevelAccess {
    #[must_use]
    pub fn new(registry: Arc<RuleRegistry>, schema: Arc<SchemaCatalog>) -> Self {
        Self { registry, schema }
    }

    #[must_use]
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    #[must_use]
    pub fn schema(&self) -> &SchemaCatalog {
        &self.schema
    }

    /// Apply the rule configured for `model_class_name`, if any, to
    /// `criteria`.
    ///
    /// # Errors
    ///
    /// Returns the rule's error, or a load error on the first call. The
    /// caller must abort the query in both cases.
    pub fn on_before_select(
        &self,
        model_class_name: &str,
        criteria: &mut Criteria,
        security_context: &SecurityContext,
    ) -> Result<(), RlaError> {
        let Some(rule) = self.registry.get_rule(model_class_name)? else {
            tracing::trace!(model = model_class_name, "no row level access rule");
            return Ok(());
        };

        tracing::debug!(
            model = normalize_model_name(model_class_name),
            rule_type = rule.type_name(),
            "applying row level access rule"
        );
        let ctx = GenerateContext::new(security_context, &self.schema);
        rule.generate(criteria, &ctx)?;
        Ok(())
    }

    /// Whether a rule is configured for `model_class_name`.
    ///
    /// # Errors
    ///
    /// Propagates load failures.
    pub fn is_restricted(&self, model_class_name: &str) -> Result<bool, RlaError> {
        Ok(self.registry.get_rule(model_class_name)?.is_some())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::{RuleDefinition, RuleDefinitions};
    use rla_db::{ColumnRef, StaticModelSchema};
    use rla_security::UserMethodRegistry;
    use tracing_test::traced_test;
    use uuid::Uuid;

    fn access() -> RowLevelAccess {
        let mut definitions = RuleDefinitions::new();
        definitions.insert(
            "Contact".to_owned(),
            RuleDefinition::default()
                .with_option("field", "ContactPeer::OWNER_ID")
                .with_option("user_method", "subject_id"),
        );
        let registry =
            RuleRegistry::from_definitions(definitions, UserMethodRegistry::with_builtins());

        let mut schema = SchemaCatalog::new();
        schema.register(
            StaticModelSchema::new("Contact", "contact").with_columns(["id", "owner_id"]),
        );
        RowLevelAccess::new(Arc::new(registry), Arc::new(schema))
    }

    #[test]
    #[traced_test]
    fn restricts_configured_model() {
        let access = access();
        let subject = Uuid::new_v4();
        let ctx = SecurityContext::builder().subject_id(subject).build();
        let mut criteria = Criteria::new("contact");

        access
            .on_before_select("BaseContactPeer", &mut criteria, &ctx)
            .unwrap();

        assert!(
            criteria
                .criterion_for(&ColumnRef::new("contact", "owner_id"))
                .is_some()
        );
        assert!(logs_contain("applying row level access rule"));
        assert!(logs_contain("restricting query"));
    }

    #[test]
    #[traced_test]
    fn anonymous_subject_is_not_restricted() {
        let access = access();
        let mut criteria = Criteria::new("contact");

        access
            .on_before_select("Contact", &mut criteria, &SecurityContext::anonymous())
            .unwrap();

        assert!(criteria.is_empty());
        assert!(logs_contain("query left unrestricted"));
    }

    #[test]
    fn unconfigured_model_is_ignored() {
        let access = access();
        let mut criteria = Criteria::new("invoice");
        access
            .on_before_select("Invoice", &mut criteria, &SecurityContext::anonymous())
            .unwrap();
        assert!(criteria.is_empty());
        assert!(!access.is_restricted("InvoicePeer").unwrap());
        assert!(access.is_restricted("ContactPeer").unwrap());
    }
}
