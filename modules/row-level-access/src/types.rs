//! Registration table mapping rule type identifiers to factories.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rla_security::UserMethodRegistry;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{ConfigError, RlaError, SetupError};
use crate::rule::{FieldEqualsUserMethodRule, JoinPair, NoOpRule, Rule};

/// Options accepted by a rule definition, minus its `type`.
pub type RuleOptions = serde_json::Map<String, serde_json::Value>;

/// What a factory gets to see besides the options.
#[derive(Clone, Copy, Debug)]
pub struct BuildContext<'a> {
    pub model: &'a str,
    pub user_methods: &'a UserMethodRegistry,
}

type RuleFactory =
    dyn Fn(&BuildContext<'_>, &RuleOptions) -> Result<Arc<dyn Rule>, RlaError> + Send + Sync;

/// Options of the `field_equals_user_method` rule type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldEqualsUserMethodOptions {
    /// Field identifier compared against the user method result.
    pub field: String,

    /// Name of the user method to bind. May be left out, in which case
    /// the rule fails when it is applied.
    #[serde(default)]
    pub user_method: Option<String>,

    #[serde(default)]
    pub joins: Vec<JoinPair>,
}

/// Deserialize a rule's typed options.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOptions`] on unknown keys, missing
/// required keys or mistyped values.
pub fn parse_options<T: DeserializeOwned>(
    model: &str,
    options: &RuleOptions,
) -> Result<T, ConfigError> {
    serde_json::from_value(serde_json::Value::Object(options.clone()))
        .map_err(|e| ConfigError::invalid_options(model, e.to_string()))
}

/// Rule types known to a registry.
#[derive(Clone, Default)]
pub struct RuleTypes {
    factories: HashMap<String, Arc<RuleFactory>>,
}

impl RuleTypes {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `no_op` and `field_equals_user_method`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut types = Self::new();
        types.register(NoOpRule::TYPE_NAME, build_no_op);
        types.register(
            FieldEqualsUserMethodRule::TYPE_NAME,
            build_field_equals_user_method,
        );
        types
    }

    /// Register (or replace) the factory for `type_name`.
    pub fn register<F>(&mut self, type_name: &str, factory: F) -> &mut Self
    where
        F: Fn(&BuildContext<'_>, &RuleOptions) -> Result<Arc<dyn Rule>, RlaError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(type_name.to_owned(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type identifiers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a rule of `type_name` from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRuleType`] if nothing is registered
    /// under `type_name`, otherwise whatever the factory returns.
    pub fn build(
        &self,
        type_name: &str,
        ctx: &BuildContext<'_>,
        options: &RuleOptions,
    ) -> Result<Arc<dyn Rule>, RlaError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownRuleType {
                model: ctx.model.to_owned(),
                rule_type: type_name.to_owned(),
            })?;
        factory(ctx, options)
    }
}

impl fmt::Debug for RuleTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleTypes")
            .field("types", &self.names())
            .finish()
    }
}

fn build_no_op(ctx: &BuildContext<'_>, options: &RuleOptions) -> Result<Arc<dyn Rule>, RlaError> {
    if let Some(key) = options.keys().next() {
        return Err(ConfigError::invalid_options(
            ctx.model,
            format!("no_op rules take no options, got '{key}'"),
        )
        .into());
    }
    Ok(Arc::new(NoOpRule))
}

fn build_field_equals_user_method(
    ctx: &BuildContext<'_>,
    options: &RuleOptions,
) -> Result<Arc<dyn Rule>, RlaError> {
    let options: FieldEqualsUserMethodOptions = parse_options(ctx.model, options)?;
    let mut rule = FieldEqualsUserMethodRule::new(options.field).with_joins(options.joins);
    if let Some(name) = options.user_method {
        let method = ctx.user_methods.bind(&name).map_err(SetupError::from)?;
        rule = rule.with_user_method(method);
    }
    Ok(Arc::new(rule))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> RuleOptions {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn build(type_name: &str, value: serde_json::Value) -> Result<Arc<dyn Rule>, RlaError> {
        let methods = UserMethodRegistry::with_builtins();
        let ctx = BuildContext {
            model: "Contact",
            user_methods: &methods,
        };
        RuleTypes::with_builtins().build(type_name, &ctx, &options(value))
    }

    #[test]
    fn builds_field_equals_user_method() {
        let rule = build(
            "field_equals_user_method",
            json!({
                "field": "Contact.owner_id",
                "user_method": "subject_id",
                "joins": [["Contact.customer_id", "Customer.id"]],
            }),
        )
        .unwrap();
        assert_eq!(rule.type_name(), "field_equals_user_method");
    }

    #[test]
    fn unknown_option_key_is_rejected() {
        let err = build(
            "field_equals_user_method",
            json!({ "field": "Contact.owner_id", "colour": "red" }),
        )
        .unwrap_err();
        assert!(
            matches!(err, RlaError::Config(ConfigError::InvalidOptions { .. })),
            "{err}"
        );
    }

    #[test]
    fn malformed_join_is_rejected() {
        let err = build(
            "field_equals_user_method",
            json!({ "field": "Contact.owner_id", "joins": [["Contact.customer_id"]] }),
        )
        .unwrap_err();
        assert!(
            matches!(err, RlaError::Config(ConfigError::InvalidOptions { .. })),
            "{err}"
        );
    }

    #[test]
    fn unknown_user_method_fails_at_bind_time() {
        let err = build(
            "field_equals_user_method",
            json!({ "field": "Contact.owner_id", "user_method": "getTeamIds" }),
        )
        .unwrap_err();
        assert!(
            matches!(err, RlaError::Setup(SetupError::UnknownUserMethod(_))),
            "{err}"
        );
    }

    #[test]
    fn no_op_rejects_options() {
        assert!(build("no_op", json!({})).is_ok());
        assert!(build("no_op", json!({ "field": "Contact.id" })).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = build("sfRlaRuleCustom", json!({})).unwrap_err();
        assert!(matches!(
            err,
            RlaError::Config(ConfigError::UnknownRuleType { .. })
        ));
    }

    #[test]
    fn custom_types_can_be_registered() {
        let mut types = RuleTypes::with_builtins();
        types.register("always_open", |_, _| Ok(Arc::new(NoOpRule) as Arc<dyn Rule>));
        assert_eq!(
            types.names(),
            vec!["always_open", "field_equals_user_method", "no_op"]
        );
    }
}
