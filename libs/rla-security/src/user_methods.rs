//! Named zero-argument accessors on the current [`SecurityContext`].
//!
//! Rules refer to user methods by name in configuration. The name is bound
//! once, when the rule is built, and the bound method is invoked against the
//! request's context every time the rule generates its filter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::SecurityContext;
use crate::value::UserValue;

type UserMethodFn = dyn Fn(&SecurityContext) -> UserValue + Send + Sync;

/// Built-in method names registered by [`UserMethodRegistry::with_builtins`].
pub mod builtin {
    pub const SUBJECT_ID: &str = "subject_id";
    pub const SUBJECT_TENANT_ID: &str = "subject_tenant_id";
    pub const SUBJECT_TYPE: &str = "subject_type";
    pub const TOKEN_SCOPES: &str = "token_scopes";
}

/// Error returned when binding a method name that was never registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("user method '{name}' does not exist")]
pub struct UnknownUserMethod {
    pub name: String,
}

/// Table of user methods available to rules.
#[derive(Clone, Default)]
pub struct UserMethodRegistry {
    methods: HashMap<String, Arc<UserMethodFn>>,
}

impl UserMethodRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with accessors for the context's identity fields.
    ///
    /// An anonymous context yields `Null` from `subject_id` and
    /// `subject_tenant_id`, which rules treat as "no restriction".
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::SUBJECT_ID, |ctx: &SecurityContext| {
            if ctx.is_anonymous() {
                UserValue::Null
            } else {
                ctx.subject_id().into()
            }
        });
        registry.register(builtin::SUBJECT_TENANT_ID, |ctx: &SecurityContext| {
            let tenant = ctx.subject_tenant_id();
            if tenant.is_nil() {
                UserValue::Null
            } else {
                tenant.into()
            }
        });
        registry.register(builtin::SUBJECT_TYPE, |ctx: &SecurityContext| {
            ctx.subject_type().into()
        });
        registry.register(builtin::TOKEN_SCOPES, |ctx: &SecurityContext| {
            ctx.token_scopes().to_vec().into()
        });
        registry
    }

    /// Register (or replace) a method under `name`.
    pub fn register<F>(&mut self, name: &str, method: F) -> &mut Self
    where
        F: Fn(&SecurityContext) -> UserValue + Send + Sync + 'static,
    {
        self.methods.insert(name.to_owned(), Arc::new(method));
        self
    }

    /// Register a method that returns the context attribute `key`.
    ///
    /// A missing attribute yields `Null`.
    pub fn register_attribute(&mut self, name: &str, key: &str) -> &mut Self {
        let key = key.to_owned();
        self.register(name, move |ctx: &SecurityContext| {
            ctx.attribute(&key).map_or(UserValue::Null, UserValue::from)
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Bind `name` to its method.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownUserMethod`] if no method is registered under `name`.
    pub fn bind(&self, name: &str) -> Result<BoundUserMethod, UnknownUserMethod> {
        let method = self.methods.get(name).ok_or_else(|| UnknownUserMethod {
            name: name.to_owned(),
        })?;
        Ok(BoundUserMethod {
            name: Arc::from(name),
            method: Arc::clone(method),
        })
    }
}

impl fmt::Debug for UserMethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserMethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

/// A user method resolved by name, ready to be invoked.
#[derive(Clone)]
pub struct BoundUserMethod {
    name: Arc<str>,
    method: Arc<UserMethodFn>,
}

impl BoundUserMethod {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the method against `ctx`.
    #[must_use]
    pub fn call(&self, ctx: &SecurityContext) -> UserValue {
        (self.method)(ctx)
    }
}

impl fmt::Debug for BoundUserMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundUserMethod")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::value::ScalarValue;
    use uuid::Uuid;

    #[test]
    fn bind_unknown_method_fails() {
        let registry = UserMethodRegistry::with_builtins();
        let err = registry.bind("getTeamIds").unwrap_err();
        assert_eq!(err.name, "getTeamIds");
        assert_eq!(err.to_string(), "user method 'getTeamIds' does not exist");
    }

    #[test]
    fn builtin_subject_id_is_null_for_anonymous() {
        let registry = UserMethodRegistry::with_builtins();
        let method = registry.bind(builtin::SUBJECT_ID).unwrap();

        assert!(method.call(&SecurityContext::anonymous()).is_null());

        let id = Uuid::new_v4();
        let ctx = SecurityContext::builder().subject_id(id).build();
        assert_eq!(method.call(&ctx).to_scalar(), Some(ScalarValue::Uuid(id)));
    }

    #[test]
    fn attribute_method_reads_context() {
        let mut registry = UserMethodRegistry::new();
        registry.register_attribute("team_ids", "teams");
        let method = registry.bind("team_ids").unwrap();

        let ctx = SecurityContext::builder()
            .attribute("teams", serde_json::json!([3, 4]))
            .build();
        let UserValue::List(items) = method.call(&ctx) else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);

        assert!(method.call(&SecurityContext::anonymous()).is_null());
    }

    #[test]
    fn names_are_sorted() {
        let registry = UserMethodRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                builtin::SUBJECT_ID,
                builtin::SUBJECT_TENANT_ID,
                builtin::SUBJECT_TYPE,
                builtin::TOKEN_SCOPES,
            ]
        );
    }
}
