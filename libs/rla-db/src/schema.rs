//! Resolution of field identifiers (`Contact.customer_id`,
//! `ContactPeer::CUSTOMER_ID`) to table columns.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use sea_orm::{EntityTrait, IdenStatic, Iterable};

use crate::criteria::ColumnRef;

const BASE_PREFIX: &str = "Base";
const PEER_SUFFIX: &str = "Peer";

/// Strip one leading `Base` and one trailing `Peer` from a model class name.
///
/// `BaseContactPeer`, `BaseContact`, `ContactPeer` and `Contact` all
/// normalize to `Contact`.
#[must_use]
pub fn normalize_model_name(name: &str) -> &str {
    let name = name.strip_prefix(BASE_PREFIX).unwrap_or(name);
    name.strip_suffix(PEER_SUFFIX).unwrap_or(name)
}

/// Column metadata for one model.
pub trait ModelSchema: Send + Sync {
    /// Model class name, e.g. `Contact`.
    fn model_name(&self) -> &str;

    fn table_name(&self) -> &str;

    /// Resolve a column by name. Matching is ASCII case-insensitive so that
    /// constant-style identifiers (`CUSTOMER_ID`) resolve too.
    fn column(&self, name: &str) -> Option<ColumnRef>;
}

/// Schema declared by hand, for models not backed by a sea-orm entity.
#[derive(Clone, Debug)]
pub struct StaticModelSchema {
    model: String,
    table: String,
    columns: Vec<String>,
}

impl StaticModelSchema {
    #[must_use]
    pub fn new(model: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: table.into(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }
}

impl ModelSchema for StaticModelSchema {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn column(&self, name: &str) -> Option<ColumnRef> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(|c| ColumnRef::new(&self.table, c))
    }
}

/// Schema derived from a sea-orm entity's column enum.
pub struct EntitySchema<E> {
    model: String,
    table: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> EntitySchema<E> {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            table: E::default().table_name().to_owned(),
            _entity: PhantomData,
        }
    }
}

impl<E: EntityTrait> ModelSchema for EntitySchema<E> {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn column(&self, name: &str) -> Option<ColumnRef> {
        <E::Column as Iterable>::iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
            .map(|c| ColumnRef::new(&self.table, c.as_str()))
    }
}

impl<E> fmt::Debug for EntitySchema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("model", &self.model)
            .field("table", &self.table)
            .finish()
    }
}

/// All models a rule may reference, keyed by normalized model name.
#[derive(Clone, Default)]
pub struct SchemaCatalog {
    models: HashMap<String, Arc<dyn ModelSchema>>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any previous schema with the same name.
    pub fn register(&mut self, schema: impl ModelSchema + 'static) -> &mut Self {
        let name = normalize_model_name(schema.model_name()).to_owned();
        tracing::trace!(model = %name, table = schema.table_name(), "registered model schema");
        self.models.insert(name, Arc::new(schema));
        self
    }

    /// Look up a model by (possibly `Base`/`Peer`-decorated) class name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&Arc<dyn ModelSchema>> {
        self.models.get(normalize_model_name(name))
    }

    /// Table backing `model`, if the model is registered.
    #[must_use]
    pub fn table_for(&self, model: &str) -> Option<&str> {
        self.model(model).map(|m| m.table_name())
    }

    /// Resolve a field identifier.
    ///
    /// Accepted forms are `Model.column` and `ModelPeer::COLUMN`; the model
    /// part may also be a table name.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Option<ColumnRef> {
        let (model, field) = split_identifier(identifier)?;
        let schema = self.model(model).or_else(|| {
            self.models
                .values()
                .find(|m| m.table_name() == model)
        })?;
        schema.column(field)
    }
}

impl fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SchemaCatalog").field("models", &names).finish()
    }
}

fn split_identifier(identifier: &str) -> Option<(&str, &str)> {
    let identifier = identifier.trim();
    let (model, field) = identifier
        .split_once("::")
        .or_else(|| identifier.rsplit_once('.'))?;
    if model.is_empty() || field.is_empty() {
        return None;
    }
    Some((model, field))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::new();
        catalog
            .register(
                StaticModelSchema::new("Contact", "contact")
                    .with_columns(["id", "customer_id", "owner_id"]),
            )
            .register(StaticModelSchema::new("Customer", "customer").with_columns(["id", "team_id"]));
        catalog
    }

    #[test]
    fn normalize_strips_base_and_peer() {
        assert_eq!(normalize_model_name("Contact"), "Contact");
        assert_eq!(normalize_model_name("BaseContact"), "Contact");
        assert_eq!(normalize_model_name("ContactPeer"), "Contact");
        assert_eq!(normalize_model_name("BaseContactPeer"), "Contact");
    }

    #[test]
    fn normalize_is_idempotent_for_plain_names() {
        let once = normalize_model_name("BaseContactPeer");
        assert_eq!(normalize_model_name(once), once);
    }

    #[test]
    fn resolves_dotted_identifier() {
        assert_eq!(
            catalog().resolve("Contact.customer_id"),
            Some(ColumnRef::new("contact", "customer_id"))
        );
    }

    #[test]
    fn resolves_constant_style_identifier() {
        assert_eq!(
            catalog().resolve("CustomerPeer::TEAM_ID"),
            Some(ColumnRef::new("customer", "team_id"))
        );
    }

    #[test]
    fn resolves_table_name() {
        assert_eq!(
            catalog().resolve("customer.id"),
            Some(ColumnRef::new("customer", "id"))
        );
    }

    #[test]
    fn unknown_identifiers_do_not_resolve() {
        let catalog = catalog();
        assert!(catalog.resolve("Contact.missing").is_none());
        assert!(catalog.resolve("Invoice.id").is_none());
        assert!(catalog.resolve("customer_id").is_none());
        assert!(catalog.resolve("Contact.").is_none());
    }
}
