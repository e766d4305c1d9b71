//! Lazily loaded, process-wide table of rules.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rla_db::normalize_model_name;
use rla_security::UserMethodRegistry;

use crate::config::{RlaSettings, RuleDefinition, RuleDefinitions, load_configuration};
use crate::error::RlaError;
use crate::rule::{FieldEqualsUserMethodRule, Rule};
use crate::types::{BuildContext, RuleTypes};

/// Rule type used when neither the definition nor the settings name one.
pub const DEFAULT_RULE_TYPE: &str = FieldEqualsUserMethodRule::TYPE_NAME;

/// Built rules keyed by model class name as configured.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, Arc<dyn Rule>>,
}

impl RuleSet {
    #[must_use]
    pub fn get(&self, model: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(model)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Configured model names, sorted.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// `(model, rule)` pairs, sorted by model.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Arc<dyn Rule>)> {
        self.rules.iter().map(|(model, rule)| (model.as_str(), rule))
    }
}

enum RuleSource {
    File(PathBuf),
    Definitions(RuleDefinitions),
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Definitions(_) => f.write_str("<in-memory>"),
        }
    }
}

/// Loads rule definitions on first use and hands out the built rules.
///
/// Loading is single-flight: concurrent first callers wait for one load and
/// then share its result. The loaded set is never invalidated. A failed load
/// is not cached, the next call retries.
pub struct RuleRegistry {
    source: RuleSource,
    default_type: Option<String>,
    types: RuleTypes,
    user_methods: UserMethodRegistry,
    /// Loaded rule set (sync lock for the fast path).
    cached: RwLock<Option<Arc<RuleSet>>>,
    /// Serializes loads.
    load_lock: Mutex<()>,
}

impl RuleRegistry {
    /// Registry reading the rules file named by `settings`.
    #[must_use]
    pub fn from_settings(settings: &RlaSettings, user_methods: UserMethodRegistry) -> Self {
        let mut registry = Self::new(RuleSource::File(settings.rules_path()), user_methods);
        registry.default_type.clone_from(&settings.default_type);
        registry
    }

    /// Registry over definitions held in memory.
    #[must_use]
    pub fn from_definitions(definitions: RuleDefinitions, user_methods: UserMethodRegistry) -> Self {
        Self::new(RuleSource::Definitions(definitions), user_methods)
    }

    fn new(source: RuleSource, user_methods: UserMethodRegistry) -> Self {
        Self {
            source,
            default_type: None,
            types: RuleTypes::with_builtins(),
            user_methods,
            cached: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Replace the rule type table.
    #[must_use]
    pub fn with_rule_types(mut self, types: RuleTypes) -> Self {
        self.types = types;
        self
    }

    /// Set the type used for definitions without a `type`.
    #[must_use]
    pub fn with_default_type(mut self, rule_type: impl Into<String>) -> Self {
        self.default_type = Some(rule_type.into());
        self
    }

    /// Type a definition without `type` resolves to.
    #[must_use]
    pub fn default_type(&self) -> &str {
        self.default_type.as_deref().unwrap_or(DEFAULT_RULE_TYPE)
    }

    #[must_use]
    pub fn rule_types(&self) -> &RuleTypes {
        &self.types
    }

    #[must_use]
    pub fn user_methods(&self) -> &UserMethodRegistry {
        &self.user_methods
    }

    /// Build the rule for one definition.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`](crate::ConfigError) for unknown types or
    /// invalid options, and a [`SetupError`](crate::SetupError) when the
    /// user method does not exist.
    pub fn load_rule(
        &self,
        model: &str,
        definition: &RuleDefinition,
    ) -> Result<Arc<dyn Rule>, RlaError> {
        let rule_type = definition
            .rule_type
            .as_deref()
            .unwrap_or_else(|| self.default_type());
        let ctx = BuildContext {
            model,
            user_methods: &self.user_methods,
        };
        self.types.build(rule_type, &ctx, &definition.options)
    }

    /// All configured rules, loading them on the first call.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while reading the configuration or
    /// building a rule.
    pub fn get_rules(&self) -> Result<Arc<RuleSet>, RlaError> {
        if let Some(rules) = self.cached.read().as_ref() {
            return Ok(Arc::clone(rules));
        }

        let _load_guard = self.load_lock.lock();

        // Another caller may have loaded while we waited
        if let Some(rules) = self.cached.read().as_ref() {
            return Ok(Arc::clone(rules));
        }

        let rules = Arc::new(self.load().inspect_err(|e| {
            tracing::warn!(source = %self.source, error = %e, "failed to load row level access rules");
        })?);
        *self.cached.write() = Some(Arc::clone(&rules));
        Ok(rules)
    }

    /// The rule for `model`, after stripping a leading `Base` and a trailing
    /// `Peer` from the name. `None` when the model is unrestricted.
    ///
    /// # Errors
    ///
    /// Propagates load failures from [`Self::get_rules`].
    pub fn get_rule(&self, model: &str) -> Result<Option<Arc<dyn Rule>>, RlaError> {
        let rules = self.get_rules()?;
        Ok(rules.get(normalize_model_name(model)).cloned())
    }

    /// Every model that has a rule configured.
    ///
    /// # Errors
    ///
    /// Propagates load failures from [`Self::get_rules`].
    pub fn restricted_models(&self) -> Result<Vec<String>, RlaError> {
        Ok(self.get_rules()?.models().map(str::to_owned).collect())
    }

    /// Whether the rule set has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cached.read().is_some()
    }

    fn load(&self) -> Result<RuleSet, RlaError> {
        let definitions: Cow<'_, RuleDefinitions> = match &self.source {
            RuleSource::File(path) => Cow::Owned(load_configuration(path)?),
            RuleSource::Definitions(definitions) => Cow::Borrowed(definitions),
        };

        let mut rules = BTreeMap::new();
        for (model, definition) in &*definitions {
            let rule = self.load_rule(model, definition)?;
            tracing::debug!(model = %model, rule_type = rule.type_name(), "loaded rule");
            rules.insert(model.clone(), rule);
        }

        tracing::info!(source = %self.source, rules = rules.len(), "row level access rules loaded");
        Ok(RuleSet { rules })
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("source", &format_args!("{}", self.source))
            .field("default_type", &self.default_type())
            .field("types", &self.types)
            .field("user_methods", &self.user_methods)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn definitions() -> RuleDefinitions {
        let mut definitions = RuleDefinitions::new();
        definitions.insert(
            "Contact".to_owned(),
            RuleDefinition::default()
                .with_option("field", "Contact.owner_id")
                .with_option("user_method", "subject_id"),
        );
        definitions.insert("Invoice".to_owned(), RuleDefinition::new(Some("no_op")));
        definitions
    }

    #[test]
    fn type_falls_back_to_registry_default() {
        let registry =
            RuleRegistry::from_definitions(definitions(), UserMethodRegistry::with_builtins());
        assert_eq!(registry.default_type(), "field_equals_user_method");

        let rule = registry.get_rule("Contact").unwrap().unwrap();
        assert_eq!(rule.type_name(), "field_equals_user_method");
    }

    #[test]
    fn settings_default_type_applies_to_untyped_definitions() {
        let mut definitions = RuleDefinitions::new();
        definitions.insert("Contact".to_owned(), RuleDefinition::default());
        let registry =
            RuleRegistry::from_definitions(definitions, UserMethodRegistry::with_builtins())
                .with_default_type("no_op");

        let rule = registry.get_rule("Contact").unwrap().unwrap();
        assert_eq!(rule.type_name(), "no_op");
    }

    #[test]
    fn lookup_normalizes_class_names() {
        let registry =
            RuleRegistry::from_definitions(definitions(), UserMethodRegistry::with_builtins());
        for name in ["Contact", "BaseContact", "ContactPeer", "BaseContactPeer"] {
            assert!(registry.get_rule(name).unwrap().is_some(), "{name}");
        }
        assert!(registry.get_rule("Customer").unwrap().is_none());
    }

    #[test]
    fn rules_are_identity_stable() {
        let registry =
            RuleRegistry::from_definitions(definitions(), UserMethodRegistry::with_builtins());
        assert!(!registry.is_loaded());

        let first = registry.get_rules().unwrap();
        let second = registry.get_rules().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_loaded());

        let a = registry.get_rule("Contact").unwrap().unwrap();
        let b = registry.get_rule("BaseContactPeer").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn restricted_models_lists_every_entry() {
        let registry =
            RuleRegistry::from_definitions(definitions(), UserMethodRegistry::with_builtins());
        assert_eq!(registry.restricted_models().unwrap(), vec!["Contact", "Invoice"]);
    }

    #[test]
    fn concurrent_first_calls_load_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut types = RuleTypes::with_builtins();
        let counter = Arc::clone(&builds);
        types.register("counted", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(crate::rule::NoOpRule) as Arc<dyn Rule>)
        });

        let mut definitions = RuleDefinitions::new();
        definitions.insert("Contact".to_owned(), RuleDefinition::new(Some("counted")));
        let registry = Arc::new(
            RuleRegistry::from_definitions(definitions, UserMethodRegistry::new())
                .with_rule_types(types),
        );

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    registry.get_rules().unwrap()
                })
            })
            .collect();
        let sets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(sets.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut definitions = RuleDefinitions::new();
        definitions.insert("Contact".to_owned(), RuleDefinition::new(Some("missing")));
        let registry =
            RuleRegistry::from_definitions(definitions, UserMethodRegistry::with_builtins());

        let err = registry.get_rules().unwrap_err();
        assert!(matches!(
            err,
            RlaError::Config(ConfigError::UnknownRuleType { .. })
        ));
        assert!(!registry.is_loaded());
    }
}
